//! Error types for the DOM arena and tree-operation execution.

use crate::dom::NodeId;
use crate::types::NodeHandle;

#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum DomError {
    #[error("allocation failed while growing the DOM")]
    OutOfMemory,
    #[error("node {0:?} does not exist")]
    MissingNode(NodeId),
    #[error("node {0:?} cannot have children")]
    NotAContainer(NodeId),
    #[error("node {child:?} is not a child of {parent:?}")]
    NotAChild { parent: NodeId, child: NodeId },
    #[error("inserting {child:?} under {parent:?} would create a cycle")]
    HierarchyRequest { parent: NodeId, child: NodeId },
    #[error("node {0:?} has the wrong kind for this operation")]
    WrongNodeKind(NodeId),
}

/// Failure of a single tree operation.
///
/// Only [`TreeOpError::OutOfMemory`] poisons the flush; every other variant
/// aborts the one operation that raised it.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum TreeOpError {
    #[error("allocation failed while performing a tree operation")]
    OutOfMemory,
    #[error(transparent)]
    Dom(DomError),
    #[error("node handle {0:?} was never bound to a node")]
    UnknownHandle(NodeHandle),
    #[error("localized string lookup failed for {key}")]
    Localization { key: String },
    #[error("form processor service is unavailable")]
    FormProcessorUnavailable,
    #[error("unsupported charset label {0:?}")]
    InvalidCharset(String),
    #[error("could not resolve URL {0:?}")]
    InvalidUrl(String),
    #[error("the document was torn down")]
    Terminated,
}

impl TreeOpError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, TreeOpError::OutOfMemory)
    }
}

impl From<DomError> for TreeOpError {
    fn from(err: DomError) -> Self {
        match err {
            DomError::OutOfMemory => TreeOpError::OutOfMemory,
            other => TreeOpError::Dom(other),
        }
    }
}

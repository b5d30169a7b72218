//! Streaming tree construction.
//!
//! A producer (tokenizer plus tree builder, usually on a parser thread)
//! records [`TreeOperation`]s and [`SpeculativeLoad`]s against
//! [`NodeHandle`]s. Batches reach the [`TreeOpExecutor`] either directly or
//! through an [`OpStage`]; the executor applies them to its [`Dom`] in FIFO
//! order, batching append notifications inside document updates and pausing
//! for parser-blocking scripts.

pub mod builder;
pub mod dom;
#[cfg(any(test, feature = "dom-snapshot"))]
pub mod dom_snapshot;
pub mod error;
pub mod executor;
pub mod speculative_load;
pub mod stage;
pub mod tree_op;
pub mod types;

pub use crate::builder::{
    DocWriteSnapshot, DocumentWriter, HandleAllocator, TreeOpBuilder, TreeOpProducer,
};
pub use crate::dom::{Dom, MutationLog, MutationObserver, MutationRecord, NodeId, NodeKind};
pub use crate::error::{DomError, TreeOpError};
pub use crate::executor::{
    ExecutorConfig, ExecutorHost, FlushOutcome, FlushState, FlushStats, NullHost, TreeOpExecutor,
};
pub use crate::speculative_load::SpeculativeLoad;
pub use crate::stage::{OpStage, TreeOpSink, VecOpSink};
pub use crate::tree_op::{PerformOutcome, TreeOperation};
pub use crate::types::{
    Attribute, AttributeSet, CharsetSource, DocumentMode, ElementCreator, Namespace, NodeHandle,
    OpSource,
};

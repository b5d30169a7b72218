//! Mutation notifications.
//!
//! Observers see records, never the tree itself, so they cannot mutate the
//! document or start loads from inside a notification.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use super::NodeId;
use crate::types::Namespace;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CharacterDataChangeInfo {
    pub append: bool,
    pub change_start: usize,
    pub change_end: usize,
    pub replace_length: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttrModType {
    Addition,
    Modification,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MutationRecord {
    BeginUpdate {
        document: NodeId,
    },
    EndUpdate {
        document: NodeId,
    },
    CharacterDataWillChange {
        node: NodeId,
        info: CharacterDataChangeInfo,
    },
    CharacterDataChanged {
        node: NodeId,
        info: CharacterDataChangeInfo,
    },
    AttributeWillChange {
        element: NodeId,
        ns: Namespace,
        name: Arc<str>,
        mod_type: AttrModType,
    },
    AttributeChanged {
        element: NodeId,
        ns: Namespace,
        name: Arc<str>,
        mod_type: AttrModType,
    },
    /// Children `first_new_index..` of `container` are new.
    ContentAppended {
        container: NodeId,
        first_new_index: usize,
    },
    ContentInserted {
        container: NodeId,
        child: NodeId,
        index: usize,
    },
    ContentRemoved {
        container: NodeId,
        child: NodeId,
        index: usize,
    },
    NodeWillBeDestroyed {
        node: NodeId,
    },
    /// Reactions must be deferred to a later task.
    ParentChainChanged {
        node: NodeId,
    },
}

pub trait MutationObserver {
    fn observe(&mut self, record: &MutationRecord);
}

/// Observer that appends every record to a shared log.
///
/// Clone the log before handing the observer to the DOM to read it back.
#[derive(Clone, Debug, Default)]
pub struct MutationLog {
    records: Rc<RefCell<Vec<MutationRecord>>>,
}

impl MutationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<MutationRecord> {
        self.records.borrow().clone()
    }

    pub fn take(&self) -> Vec<MutationRecord> {
        std::mem::take(&mut *self.records.borrow_mut())
    }

    pub fn len(&self) -> usize {
        self.records.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.borrow().is_empty()
    }

    /// Number of records matching `pred`.
    pub fn count(&self, pred: impl Fn(&MutationRecord) -> bool) -> usize {
        self.records.borrow().iter().filter(|r| pred(r)).count()
    }
}

impl MutationObserver for MutationLog {
    fn observe(&mut self, record: &MutationRecord) {
        self.records.borrow_mut().push(record.clone());
    }
}

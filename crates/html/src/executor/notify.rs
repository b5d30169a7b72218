//! Append-notification batching.
//!
//! Appends inside the executor's document are silent at the DOM level. The
//! executor records the container here instead and fires one
//! `ContentAppended` per container when the batch is flushed.

use std::collections::HashSet;

use crate::dom::{Dom, NodeId};

/// One container that received children since the last flush.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct PendingNotification {
    parent: NodeId,
    /// Children below this index were already visible to observers.
    child_count: usize,
}

impl PendingNotification {
    fn new(dom: &Dom, parent: NodeId) -> Self {
        // The child that triggered the entry is already appended.
        let child_count = dom.child_count(parent).saturating_sub(1);
        Self {
            parent,
            child_count,
        }
    }

    fn contains(&self, node: NodeId) -> bool {
        self.parent == node
    }

    fn have_notified_index(&self, index: usize) -> bool {
        index < self.child_count
    }

    fn fire(&self, dom: &mut Dom) -> bool {
        // Detach may have shrunk the container since the entry was made.
        if dom.child_count(self.parent) > self.child_count {
            dom.notify_content_appended(self.parent, self.child_count);
            true
        } else {
            false
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct PendingNotifications {
    entries: Vec<PendingNotification>,
    seen_in_batch: HashSet<NodeId>,
}

impl PendingNotifications {
    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Record that `child` was appended to `parent`.
    ///
    /// Elements appended earlier in the batch are covered by their own
    /// ancestor's notification, so appending under them adds no entry.
    pub(crate) fn post(&mut self, dom: &Dom, parent: NodeId, child: NodeId) {
        let new_parent = !self.seen_in_batch.contains(&parent);
        if dom.is_element(child) {
            self.seen_in_batch.insert(child);
        }
        self.seen_in_batch.insert(parent);
        if new_parent {
            self.entries.push(PendingNotification::new(dom, parent));
        }
    }

    /// Fire every entry in first-touched order; returns the number fired.
    pub(crate) fn flush(&mut self, dom: &mut Dom) -> usize {
        let mut fired = 0;
        for entry in self.entries.drain(..) {
            if entry.fire(dom) {
                fired += 1;
            }
        }
        self.seen_in_batch.clear();
        fired
    }

    /// Whether observers have already been told about `node`'s insertion.
    pub(crate) fn have_notified(&self, dom: &Dom, node: NodeId) -> bool {
        let mut current = node;
        loop {
            let Some(parent) = dom.parent(current) else {
                return true;
            };
            if let Some(entry) = self.entries.iter().find(|e| e.contains(parent)) {
                return match dom.index_of(parent, current) {
                    Some(index) => entry.have_notified_index(index),
                    None => true,
                };
            }
            current = parent;
        }
    }
}

//! Arena DOM used as the live document collaborator.
//!
//! The executor only reaches the tree through the operations exposed here:
//! node creation, child-list edits, attribute and text edits, update
//! transactions and explicit notification dispatch. Structural edits never
//! notify on their own; callers decide when observers hear about them, which
//! is what makes append batching possible.
//!
//! Invariants:
//! - A node has at most one parent and the parent/child links agree.
//! - A node's owner document equals its parent's owner document.
//! - Documents are never children and are never released.

mod node;
mod observer;

pub use node::{DocumentData, ElementData, NodeKind, ScriptState, StyleLinkState};
pub use observer::{
    AttrModType, CharacterDataChangeInfo, MutationLog, MutationObserver, MutationRecord,
};

use std::sync::Arc;

use crate::error::DomError;
use crate::types::{ElementCreator, Namespace};
use node::NodeRecord;

/// Arena index of a live node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

pub struct Dom {
    nodes: Vec<Option<NodeRecord>>,
    live: usize,
    observers: Vec<Box<dyn MutationObserver>>,
}

impl Dom {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            live: 0,
            observers: Vec::new(),
        }
    }

    pub fn add_observer(&mut self, observer: Box<dyn MutationObserver>) {
        self.observers.push(observer);
    }

    /// Number of live nodes, documents included.
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    // -- Creation ---

    pub fn create_document(&mut self) -> Result<NodeId, DomError> {
        let id = self.next_id()?;
        self.insert(NodeRecord {
            kind: NodeKind::Document(DocumentData::default()),
            owner: id,
            parent: None,
            children: Vec::new(),
        })
    }

    pub fn create_doctype(
        &mut self,
        owner: NodeId,
        name: Arc<str>,
        public_id: String,
        system_id: String,
    ) -> Result<NodeId, DomError> {
        self.ensure_document(owner)?;
        self.insert(NodeRecord {
            kind: NodeKind::Doctype {
                name,
                public_id,
                system_id,
            },
            owner,
            parent: None,
            children: Vec::new(),
        })
    }

    pub fn create_element(
        &mut self,
        owner: NodeId,
        ns: Namespace,
        name: Arc<str>,
        creator: ElementCreator,
    ) -> Result<NodeId, DomError> {
        self.ensure_document(owner)?;
        self.insert(NodeRecord {
            kind: NodeKind::Element(ElementData::new(ns, name, creator)),
            owner,
            parent: None,
            children: Vec::new(),
        })
    }

    pub fn create_text(&mut self, owner: NodeId, text: &str) -> Result<NodeId, DomError> {
        self.ensure_document(owner)?;
        let buf = copy_text(text)?;
        self.insert(NodeRecord {
            kind: NodeKind::Text(buf),
            owner,
            parent: None,
            children: Vec::new(),
        })
    }

    pub fn create_comment(&mut self, owner: NodeId, text: &str) -> Result<NodeId, DomError> {
        self.ensure_document(owner)?;
        let buf = copy_text(text)?;
        self.insert(NodeRecord {
            kind: NodeKind::Comment(buf),
            owner,
            parent: None,
            children: Vec::new(),
        })
    }

    fn next_id(&self) -> Result<NodeId, DomError> {
        let idx: u32 = self
            .nodes
            .len()
            .try_into()
            .map_err(|_| DomError::OutOfMemory)?;
        Ok(NodeId(idx))
    }

    fn insert(&mut self, record: NodeRecord) -> Result<NodeId, DomError> {
        let id = self.next_id()?;
        self.nodes
            .try_reserve(1)
            .map_err(|_| DomError::OutOfMemory)?;
        self.nodes.push(Some(record));
        self.live += 1;
        Ok(id)
    }

    fn ensure_document(&self, id: NodeId) -> Result<(), DomError> {
        match self.record(id)?.kind {
            NodeKind::Document(_) => Ok(()),
            _ => Err(DomError::WrongNodeKind(id)),
        }
    }

    // -- Inspection ---

    fn record(&self, id: NodeId) -> Result<&NodeRecord, DomError> {
        self.nodes
            .get(id.index())
            .and_then(Option::as_ref)
            .ok_or(DomError::MissingNode(id))
    }

    fn record_mut(&mut self, id: NodeId) -> Result<&mut NodeRecord, DomError> {
        self.nodes
            .get_mut(id.index())
            .and_then(Option::as_mut)
            .ok_or(DomError::MissingNode(id))
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.record(id).is_ok()
    }

    pub fn kind(&self, id: NodeId) -> Option<&NodeKind> {
        self.record(id).ok().map(|r| &r.kind)
    }

    pub fn element(&self, id: NodeId) -> Option<&ElementData> {
        match self.kind(id)? {
            NodeKind::Element(data) => Some(data),
            _ => None,
        }
    }

    pub fn element_mut(&mut self, id: NodeId) -> Option<&mut ElementData> {
        match &mut self.record_mut(id).ok()?.kind {
            NodeKind::Element(data) => Some(data),
            _ => None,
        }
    }

    pub fn document(&self, id: NodeId) -> Option<&DocumentData> {
        match self.kind(id)? {
            NodeKind::Document(data) => Some(data),
            _ => None,
        }
    }

    pub fn document_mut(&mut self, id: NodeId) -> Option<&mut DocumentData> {
        match &mut self.record_mut(id).ok()?.kind {
            NodeKind::Document(data) => Some(data),
            _ => None,
        }
    }

    pub fn text(&self, id: NodeId) -> Option<&str> {
        match self.kind(id)? {
            NodeKind::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        self.element(id).is_some()
    }

    pub fn is_text(&self, id: NodeId) -> bool {
        self.text(id).is_some()
    }

    pub fn owner_document(&self, id: NodeId) -> Option<NodeId> {
        self.record(id).ok().map(|r| r.owner)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.record(id).ok().and_then(|r| r.parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.record(id).map(|r| r.children.as_slice()).unwrap_or(&[])
    }

    pub fn child_count(&self, id: NodeId) -> usize {
        self.children(id).len()
    }

    pub fn child_at(&self, id: NodeId, index: usize) -> Option<NodeId> {
        self.children(id).get(index).copied()
    }

    pub fn last_child(&self, id: NodeId) -> Option<NodeId> {
        self.children(id).last().copied()
    }

    pub fn index_of(&self, parent: NodeId, child: NodeId) -> Option<usize> {
        self.children(parent).iter().position(|c| *c == child)
    }

    pub fn previous_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let pos = self.index_of(parent, id)?;
        pos.checked_sub(1).and_then(|p| self.child_at(parent, p))
    }

    // -- Structure ---

    /// Append without notifying observers.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        let index = self.child_count(parent);
        self.insert_child_at(parent, child, index)
    }

    /// Insert without notifying observers.
    pub fn insert_child_at(
        &mut self,
        parent: NodeId,
        child: NodeId,
        index: usize,
    ) -> Result<(), DomError> {
        self.check_insertion(parent, child)?;
        let parent_owner = self.record(parent)?.owner;
        let child_owner = self.record(child)?.owner;
        let record = self.record_mut(parent)?;
        if index > record.children.len() {
            return Err(DomError::NotAChild { parent, child });
        }
        record
            .children
            .try_reserve(1)
            .map_err(|_| DomError::OutOfMemory)?;
        record.children.insert(index, child);
        self.record_mut(child)?.parent = Some(parent);
        if parent_owner != child_owner {
            self.adopt(child, parent_owner);
        }
        Ok(())
    }

    fn check_insertion(&self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        let parent_record = self.record(parent)?;
        if !parent_record.allows_children() {
            return Err(DomError::NotAContainer(parent));
        }
        let child_record = self.record(child)?;
        if matches!(child_record.kind, NodeKind::Document(_)) || child_record.parent.is_some() {
            debug_assert!(false, "inserted node must be a detached non-document");
            return Err(DomError::HierarchyRequest { parent, child });
        }
        let mut cursor = Some(parent);
        while let Some(current) = cursor {
            if current == child {
                return Err(DomError::HierarchyRequest { parent, child });
            }
            cursor = self.parent(current);
        }
        Ok(())
    }

    pub fn remove_child_at(
        &mut self,
        parent: NodeId,
        index: usize,
        notify: bool,
    ) -> Result<NodeId, DomError> {
        let record = self.record_mut(parent)?;
        if index >= record.children.len() {
            return Err(DomError::NotAContainer(parent));
        }
        let child = record.children.remove(index);
        self.record_mut(child)?.parent = None;
        if notify {
            self.notify(MutationRecord::ContentRemoved {
                container: parent,
                child,
                index,
            });
        }
        Ok(child)
    }

    fn adopt(&mut self, root: NodeId, owner: NodeId) {
        let mut stack = vec![root];
        while let Some(current) = stack.pop() {
            if let Ok(record) = self.record_mut(current) {
                record.owner = owner;
                stack.extend(record.children.iter().copied());
            }
        }
        self.notify(MutationRecord::ParentChainChanged { node: root });
    }

    /// Free a detached subtree that nothing links to anymore.
    ///
    /// Documents and attached nodes are left alone; returns whether anything
    /// was released.
    pub fn release(&mut self, root: NodeId) -> bool {
        let Ok(record) = self.record(root) else {
            return false;
        };
        if record.parent.is_some() || matches!(record.kind, NodeKind::Document(_)) {
            return false;
        }
        let mut stack = vec![root];
        while let Some(current) = stack.pop() {
            self.notify(MutationRecord::NodeWillBeDestroyed { node: current });
            if let Some(record) = self.nodes.get_mut(current.index()).and_then(Option::take) {
                self.live -= 1;
                stack.extend(record.children);
            }
        }
        true
    }

    // -- Character data ---

    /// Append to a text node without notifying observers.
    pub fn append_text(&mut self, node: NodeId, text: &str) -> Result<(), DomError> {
        match &mut self.record_mut(node)?.kind {
            NodeKind::Text(existing) => {
                existing
                    .try_reserve(text.len())
                    .map_err(|_| DomError::OutOfMemory)?;
                existing.push_str(text);
                Ok(())
            }
            _ => Err(DomError::WrongNodeKind(node)),
        }
    }

    pub fn text_len(&self, node: NodeId) -> usize {
        self.text(node).map(str::len).unwrap_or(0)
    }

    // -- Attributes ---

    pub fn has_attr(&self, node: NodeId, ns: Namespace, name: &str) -> bool {
        self.get_attr(node, ns, name).is_some()
    }

    pub fn get_attr(&self, node: NodeId, ns: Namespace, name: &str) -> Option<&str> {
        self.element(node)?.attr(ns, name)
    }

    pub fn set_attr(
        &mut self,
        node: NodeId,
        ns: Namespace,
        name: Arc<str>,
        prefix: Option<Arc<str>>,
        value: String,
        notify: bool,
    ) -> Result<(), DomError> {
        let element = self.element(node).ok_or(DomError::WrongNodeKind(node))?;
        let existing = element
            .attributes
            .iter()
            .position(|a| a.ns == ns && a.name == name);
        let mod_type = if existing.is_some() {
            AttrModType::Modification
        } else {
            AttrModType::Addition
        };
        if notify {
            self.notify(MutationRecord::AttributeWillChange {
                element: node,
                ns,
                name: Arc::clone(&name),
                mod_type,
            });
        }
        let element = self.element_mut(node).ok_or(DomError::WrongNodeKind(node))?;
        match existing {
            Some(pos) => element.attributes[pos].value = value,
            None => {
                element
                    .attributes
                    .try_reserve(1)
                    .map_err(|_| DomError::OutOfMemory)?;
                element.attributes.push(crate::types::Attribute {
                    ns,
                    name: Arc::clone(&name),
                    prefix,
                    value,
                });
            }
        }
        if notify {
            self.notify(MutationRecord::AttributeChanged {
                element: node,
                ns,
                name,
                mod_type,
            });
        }
        Ok(())
    }

    // -- Update transactions and notifications ---

    pub fn begin_update(&mut self, document: NodeId) -> Result<(), DomError> {
        let data = self
            .document_mut(document)
            .ok_or(DomError::WrongNodeKind(document))?;
        data.update_depth += 1;
        self.notify(MutationRecord::BeginUpdate { document });
        Ok(())
    }

    pub fn end_update(&mut self, document: NodeId) -> Result<(), DomError> {
        let data = self
            .document_mut(document)
            .ok_or(DomError::WrongNodeKind(document))?;
        assert!(
            data.update_depth > 0,
            "end_update without matching begin_update on {document:?}"
        );
        data.update_depth -= 1;
        self.notify(MutationRecord::EndUpdate { document });
        Ok(())
    }

    pub fn notify_content_appended(&mut self, container: NodeId, first_new_index: usize) {
        self.notify(MutationRecord::ContentAppended {
            container,
            first_new_index,
        });
    }

    pub fn notify_content_inserted(&mut self, container: NodeId, child: NodeId, index: usize) {
        self.notify(MutationRecord::ContentInserted {
            container,
            child,
            index,
        });
    }

    pub fn notify_character_data_will_change(
        &mut self,
        node: NodeId,
        info: CharacterDataChangeInfo,
    ) {
        self.notify(MutationRecord::CharacterDataWillChange { node, info });
    }

    pub fn notify_character_data_changed(&mut self, node: NodeId, info: CharacterDataChangeInfo) {
        self.notify(MutationRecord::CharacterDataChanged { node, info });
    }

    fn notify(&mut self, record: MutationRecord) {
        for observer in &mut self.observers {
            observer.observe(&record);
        }
    }
}

impl Default for Dom {
    fn default() -> Self {
        Self::new()
    }
}

fn copy_text(text: &str) -> Result<String, DomError> {
    let mut buf = String::new();
    buf.try_reserve_exact(text.len())
        .map_err(|_| DomError::OutOfMemory)?;
    buf.push_str(text);
    Ok(buf)
}

//! Producer-side op construction.
//!
//! A tree builder (network or `document.write`) never touches the DOM. It
//! allocates [`NodeHandle`]s for nodes it decides to create and records ops
//! against those handles; the executor binds handles to arena nodes when the
//! creating op runs.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::speculative_load::SpeculativeLoad;
use crate::stage::TreeOpSink;
use crate::tree_op::TreeOperation;
use crate::types::{AttributeSet, Namespace, NodeHandle, OpSource};

/// Hands out handles unique across every builder of one executor.
#[derive(Clone, Debug)]
pub struct HandleAllocator {
    next: Arc<AtomicU32>,
}

impl HandleAllocator {
    pub fn new() -> Self {
        Self {
            next: Arc::new(AtomicU32::new(1)),
        }
    }

    pub fn allocate(&self) -> NodeHandle {
        let raw = self.next.fetch_add(1, Ordering::Relaxed);
        assert!(raw != u32::MAX, "node handle space exhausted");
        NodeHandle(raw)
    }
}

impl Default for HandleAllocator {
    fn default() -> Self {
        Self::new()
    }
}

/// Tree builder state captured at a parser-blocking script, used to resume
/// parsing `document.write` output at the right insertion point.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DocWriteSnapshot {
    /// Stack of open elements, current node last.
    pub open_elements: Vec<NodeHandle>,
    pub line_number: u32,
}

impl DocWriteSnapshot {
    pub fn current_node(&self) -> Option<NodeHandle> {
        self.open_elements.last().copied()
    }
}

/// Accumulates one batch of ops and loads.
#[derive(Debug)]
pub struct TreeOpBuilder {
    handles: HandleAllocator,
    ops: Vec<TreeOperation>,
    loads: Vec<SpeculativeLoad>,
    source: OpSource,
}

impl TreeOpBuilder {
    pub fn new(handles: HandleAllocator) -> Self {
        Self {
            handles,
            ops: Vec::new(),
            loads: Vec::new(),
            source: OpSource::Network,
        }
    }

    /// Builder whose elements are marked as not network-created.
    pub fn for_script(handles: HandleAllocator) -> Self {
        Self {
            source: OpSource::NotNetwork,
            ..Self::new(handles)
        }
    }

    pub fn allocate_handle(&self) -> NodeHandle {
        self.handles.allocate()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty() && self.loads.is_empty()
    }

    pub fn ops(&self) -> &[TreeOperation] {
        &self.ops
    }

    pub fn loads(&self) -> &[SpeculativeLoad] {
        &self.loads
    }

    pub fn push(&mut self, op: TreeOperation) {
        self.ops.push(op);
    }

    pub fn push_load(&mut self, load: SpeculativeLoad) {
        self.loads.push(load);
    }

    pub fn create_element(
        &mut self,
        ns: Namespace,
        name: impl Into<Arc<str>>,
        attributes: AttributeSet,
    ) -> NodeHandle {
        let handle = self.allocate_handle();
        self.ops.push(TreeOperation::CreateElement {
            handle,
            ns,
            name: name.into(),
            attributes,
            source: self.source,
        });
        handle
    }

    pub fn append(&mut self, node: NodeHandle, parent: NodeHandle) {
        self.ops.push(TreeOperation::Append { node, parent });
    }

    pub fn append_to_document(&mut self, node: NodeHandle) {
        self.ops.push(TreeOperation::AppendToDocument { node });
    }

    pub fn append_text(&mut self, parent: NodeHandle, text: impl Into<String>) {
        self.ops.push(TreeOperation::AppendText {
            parent,
            text: text.into(),
        });
    }

    pub fn append_comment(&mut self, parent: NodeHandle, text: impl Into<String>) {
        self.ops.push(TreeOperation::AppendComment {
            parent,
            text: text.into(),
        });
    }

    pub fn append_comment_to_document(&mut self, text: impl Into<String>) {
        self.ops
            .push(TreeOperation::AppendCommentToDocument { text: text.into() });
    }

    pub fn append_doctype(
        &mut self,
        name: impl Into<Arc<str>>,
        public_id: impl Into<String>,
        system_id: impl Into<String>,
    ) {
        self.ops.push(TreeOperation::AppendDoctypeToDocument {
            name: name.into(),
            public_id: public_id.into(),
            system_id: system_id.into(),
        });
    }

    pub fn run_script(&mut self, script: NodeHandle) {
        self.ops.push(TreeOperation::RunScript {
            script,
            snapshot: None,
        });
    }

    /// Attach `snapshot` to the trailing `RunScript`, if the batch ends in one.
    pub fn snapshot_pending_script(&mut self, snapshot: DocWriteSnapshot) -> bool {
        match self.ops.last_mut() {
            Some(op @ TreeOperation::RunScript { .. }) => {
                op.attach_snapshot(snapshot);
                true
            }
            _ => false,
        }
    }

    /// Move the batch into `sink`, loads first.
    pub fn flush_to(&mut self, sink: &mut dyn TreeOpSink) {
        if !self.loads.is_empty() {
            sink.move_speculative_loads_from(&mut self.loads);
        }
        if !self.ops.is_empty() {
            sink.move_ops_from(&mut self.ops);
        }
    }

    pub fn into_parts(self) -> (Vec<TreeOperation>, Vec<SpeculativeLoad>) {
        (self.ops, self.loads)
    }
}

/// Handed to scripts so `document.write` output lands in the same stream.
#[derive(Debug)]
pub struct DocumentWriter {
    builder: TreeOpBuilder,
    snapshot: Option<DocWriteSnapshot>,
}

impl DocumentWriter {
    pub(crate) fn new(handles: HandleAllocator, snapshot: Option<DocWriteSnapshot>) -> Self {
        Self {
            builder: TreeOpBuilder::for_script(handles),
            snapshot,
        }
    }

    /// Where the blocking script left the tree builder, if it recorded it.
    pub fn snapshot(&self) -> Option<&DocWriteSnapshot> {
        self.snapshot.as_ref()
    }

    pub fn builder(&mut self) -> &mut TreeOpBuilder {
        &mut self.builder
    }

    pub(crate) fn into_parts(self) -> (Vec<TreeOperation>, Vec<SpeculativeLoad>) {
        self.builder.into_parts()
    }
}

/// A tokenizer/tree builder that turns input bytes into tree ops.
///
/// Runs on the parser thread; everything it emits goes through `builder`.
pub trait TreeOpProducer: Send {
    fn push_bytes(&mut self, bytes: &[u8], builder: &mut TreeOpBuilder);
    fn finish(&mut self, builder: &mut TreeOpBuilder);
}

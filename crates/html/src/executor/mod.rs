//! Consumer side of the pipeline.
//!
//! [`TreeOpExecutor`] owns the live DOM and drains tree operations against
//! it. Producers hand over batches through [`TreeOpSink`] (same thread) or an
//! [`OpStage`] (other thread); either way the executor sees one FIFO queue.

mod flush;
mod host;
mod notify;

pub use flush::{FlushOutcome, FlushState};
pub use host::{
    CharsetComplaint, DeferredTask, DocumentHost, ExecutorHost, KeygenContent, NullHost,
    PreloadHost, ScriptExecution, ScriptHost, ServiceHost,
};

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use url::Url;

use crate::builder::{DocWriteSnapshot, DocumentWriter, HandleAllocator};
use crate::dom::{Dom, NodeId};
use crate::error::{DomError, TreeOpError};
use crate::speculative_load::SpeculativeLoad;
use crate::stage::{OpStage, TreeOpSink};
use crate::tree_op::TreeOperation;
use crate::types::{CharsetSource, NodeHandle};
use notify::PendingNotifications;

#[derive(Clone, Debug)]
pub struct ExecutorConfig {
    /// Base for resolving preloads until a `<base>` is seen.
    pub document_url: Url,
    /// Parsing a fragment: scripts never run and non-network elements are
    /// tagged as fragment-created.
    pub fragment_parser: bool,
    /// Ops performed per flush before yielding with [`FlushOutcome::Interrupted`].
    pub flush_budget: Option<usize>,
    /// View-source documents decorate markup and never start loads.
    pub view_source: bool,
}

impl ExecutorConfig {
    pub fn new(document_url: Url) -> Self {
        Self {
            document_url,
            fragment_parser: false,
            flush_budget: None,
            view_source: false,
        }
    }

    pub fn with_fragment_parser(mut self, fragment_parser: bool) -> Self {
        self.fragment_parser = fragment_parser;
        self
    }

    pub fn with_flush_budget(mut self, budget: Option<usize>) -> Self {
        assert!(budget != Some(0), "flush budget must be non-zero");
        self.flush_budget = budget;
        self
    }

    pub fn with_view_source(mut self, view_source: bool) -> Self {
        self.view_source = view_source;
        self
    }
}

/// Per-executor counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FlushStats {
    pub flushes: u64,
    pub ops_performed: u64,
    pub op_failures: u64,
    pub doc_updates: u64,
    pub notifications_fired: u64,
    pub script_pauses: u64,
    pub speculative_loads: u64,
    pub preloads_deduped: u64,
}

pub struct TreeOpExecutor<H: ExecutorHost> {
    dom: Dom,
    document: Option<NodeId>,
    host: H,
    config: ExecutorConfig,
    queue: VecDeque<TreeOperation>,
    speculative_loads: Vec<SpeculativeLoad>,
    stage: Option<Arc<OpStage>>,
    pending: PendingNotifications,
    handles: HashMap<NodeHandle, NodeId>,
    handle_allocator: HandleAllocator,
    held: Vec<NodeId>,
    preloaded: HashSet<Url>,
    speculation_base: Option<Url>,
    deferred: VecDeque<DeferredTask>,
    doc_write_snapshot: Option<DocWriteSnapshot>,
    flush_state: FlushState,
    stats: FlushStats,
    broken: bool,
    blocked_on_script: bool,
    layout_started: bool,
    model_built: bool,
    already_complained_about_charset: bool,
    terminated: Arc<AtomicBool>,
}

impl<H: ExecutorHost> TreeOpExecutor<H> {
    pub fn new(host: H, config: ExecutorConfig) -> Result<Self, DomError> {
        let mut dom = Dom::new();
        let document = dom.create_document()?;
        Ok(Self::with_dom(dom, document, host, config))
    }

    /// Executor over an existing arena, e.g. one with observers installed.
    pub fn with_dom(dom: Dom, document: NodeId, host: H, config: ExecutorConfig) -> Self {
        assert!(
            dom.document(document).is_some(),
            "executor document {document:?} is not a document node"
        );
        Self {
            dom,
            document: Some(document),
            host,
            config,
            queue: VecDeque::new(),
            speculative_loads: Vec::new(),
            stage: None,
            pending: PendingNotifications::default(),
            handles: HashMap::new(),
            handle_allocator: HandleAllocator::new(),
            held: Vec::new(),
            preloaded: HashSet::new(),
            speculation_base: None,
            deferred: VecDeque::new(),
            doc_write_snapshot: None,
            flush_state: FlushState::NotFlushing,
            stats: FlushStats::default(),
            broken: false,
            blocked_on_script: false,
            layout_started: false,
            model_built: false,
            already_complained_about_charset: false,
            terminated: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn dom(&self) -> &Dom {
        &self.dom
    }

    pub fn dom_mut(&mut self) -> &mut Dom {
        &mut self.dom
    }

    /// `None` once a flush has observed termination and torn the parse down.
    pub fn document(&self) -> Option<NodeId> {
        self.document
    }

    pub(crate) fn require_document(&self) -> Result<NodeId, TreeOpError> {
        self.document.ok_or(TreeOpError::Terminated)
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    pub fn stats(&self) -> FlushStats {
        self.stats
    }

    pub fn flush_state(&self) -> FlushState {
        self.flush_state
    }

    pub fn is_broken(&self) -> bool {
        self.broken
    }

    pub fn is_blocked_on_script(&self) -> bool {
        self.blocked_on_script
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Allocator shared with every producer feeding this executor.
    pub fn handle_allocator(&self) -> HandleAllocator {
        self.handle_allocator.clone()
    }

    /// Read batches from `stage` at the start of every flush.
    pub fn set_stage(&mut self, stage: Arc<OpStage>) {
        self.stage = Some(stage);
    }

    // -- Termination ---

    /// Flag another thread can set to make in-flight flushes stop.
    pub fn termination_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.terminated)
    }

    pub fn terminate(&mut self) {
        self.terminated.store(true, Ordering::Release);
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::Acquire)
    }

    /// Abandon the parse after an unrecoverable failure.
    pub fn mark_as_broken(&mut self) {
        if !self.broken {
            log::warn!(target: "html.executor", "marking document broken; dropping {} queued ops", self.queue.len());
        }
        self.broken = true;
        self.queue.clear();
        self.speculative_loads.clear();
    }

    // -- Handles ---

    pub fn bind_handle(&mut self, handle: NodeHandle, node: NodeId) {
        assert!(handle != NodeHandle::INVALID, "cannot bind the invalid handle");
        self.handles.insert(handle, node);
    }

    pub fn node_for(&self, handle: NodeHandle) -> Option<NodeId> {
        self.handles.get(&handle).copied()
    }

    pub(crate) fn node(&self, handle: NodeHandle) -> Result<NodeId, TreeOpError> {
        match self.handles.get(&handle) {
            Some(node) => Ok(*node),
            None => {
                debug_assert!(false, "tree op used unbound handle {handle:?}");
                Err(TreeOpError::UnknownHandle(handle))
            }
        }
    }

    pub fn hold_element(&mut self, node: NodeId) {
        self.held.push(node);
    }

    pub fn held_element_count(&self) -> usize {
        self.held.len()
    }

    /// Release the parser's hold on created elements. Those that never made
    /// it into a tree are freed.
    pub fn drop_held_elements(&mut self) {
        let held = std::mem::take(&mut self.held);
        let mut freed = 0usize;
        for node in held {
            if self.dom.release(node) {
                freed += 1;
            }
        }
        self.handles.clear();
        if freed > 0 {
            log::debug!(target: "html.executor", "freed {freed} never-linked elements");
        }
    }

    // -- Notifications ---

    pub fn post_pending_append_notification(&mut self, parent: NodeId, child: NodeId) {
        self.pending.post(&self.dom, parent, child);
    }

    pub fn has_pending_notifications(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn have_notified(&self, node: NodeId) -> bool {
        self.pending.have_notified(&self.dom, node)
    }

    pub(crate) fn queue_deferred(&mut self, task: DeferredTask) {
        self.deferred.push_back(task);
    }

    fn run_deferred_tasks(&mut self) {
        while let Some(task) = self.deferred.pop_front() {
            self.host.run_deferred(task);
        }
    }

    /// Run `f` inside an update on `node`'s owner when that owner is not the
    /// executor's document.
    pub(crate) fn with_owner_update<R>(
        &mut self,
        node: NodeId,
        f: impl FnOnce(&mut Self) -> Result<R, TreeOpError>,
    ) -> Result<R, TreeOpError> {
        let owner = self.dom.owner_document(node);
        let other = owner.filter(|doc| Some(*doc) != self.document);
        if let Some(doc) = other {
            self.dom.begin_update(doc)?;
        }
        let result = f(self);
        if let Some(doc) = other {
            self.dom.end_update(doc)?;
        }
        result
    }

    // -- document.write ---

    pub fn initialize_doc_write_parser_state(&mut self, snapshot: DocWriteSnapshot) {
        self.doc_write_snapshot = Some(snapshot);
    }

    pub fn doc_write_snapshot(&self) -> Option<&DocWriteSnapshot> {
        self.doc_write_snapshot.as_ref()
    }

    /// Parse output of a `document.write` call ahead of everything queued.
    ///
    /// Returns the number of ops spliced in.
    pub fn document_write(&mut self, f: impl FnOnce(&mut DocumentWriter)) -> usize {
        let mut writer =
            DocumentWriter::new(self.handle_allocator.clone(), self.doc_write_snapshot.clone());
        f(&mut writer);
        self.splice_writer(writer)
    }

    fn splice_writer(&mut self, writer: DocumentWriter) -> usize {
        let (ops, loads) = writer.into_parts();
        let count = ops.len();
        for op in ops.into_iter().rev() {
            self.queue.push_front(op);
        }
        self.speculative_loads.extend(loads);
        count
    }

    /// Resume after a blocking script finished loading.
    pub fn unblock_parser(&mut self) -> FlushOutcome {
        self.blocked_on_script = false;
        self.run_flush_loop()
    }

    // -- Document-level side effects ---

    pub fn set_document_charset_and_source(
        &mut self,
        encoding: &'static encoding_rs::Encoding,
        source: CharsetSource,
    ) {
        let Some(doc) = self.document else {
            return;
        };
        if let Some(data) = self.dom.document_mut(doc) {
            data.charset = Some(encoding);
            data.charset_source = source;
        }
    }

    pub(crate) fn needs_charset_switch_to(
        &mut self,
        encoding: &'static encoding_rs::Encoding,
        source: CharsetSource,
        line_number: u32,
    ) {
        self.end_doc_update();
        if self.is_terminated() {
            return;
        }
        if self.host.reload_with_encoding(encoding, source) {
            log::debug!(target: "html.executor", "reloading as {}", encoding.name());
            self.terminate();
            if source == CharsetSource::MetaTag {
                self.maybe_complain_about_charset("EncLateMetaReload", false, line_number);
            }
            return;
        }
        if source == CharsetSource::MetaTag {
            self.maybe_complain_about_charset("EncLateMetaTooLate", true, line_number);
        }
        self.begin_doc_update();
    }

    pub fn maybe_complain_about_charset(&mut self, key: &str, error: bool, line_number: u32) {
        if self.already_complained_about_charset {
            return;
        }
        self.already_complained_about_charset = true;
        self.host.report_charset_complaint(CharsetComplaint {
            key: key.to_string(),
            error,
            line_number,
        });
    }

    pub(crate) fn update_style_sheet(&mut self, element: NodeId) {
        self.end_doc_update();
        if self.is_terminated() {
            return;
        }
        if let Some(style_link) = self
            .dom
            .element_mut(element)
            .and_then(|e| e.style_link.as_mut())
        {
            style_link.updates_enabled = true;
        }
        self.host.update_style_sheet(element);
        self.begin_doc_update();
    }

    pub(crate) fn start_layout(&mut self) {
        if self.layout_started || self.document.is_none() {
            return;
        }
        self.end_doc_update();
        if self.is_terminated() {
            return;
        }
        self.layout_started = true;
        self.host.start_layout();
        self.begin_doc_update();
    }

    /// End of the model: held elements are released and the host is told
    /// once, whether the stream ended or the parse was terminated.
    pub fn did_build_model(&mut self, terminated: bool) {
        if self.flush_state == FlushState::InDocUpdate {
            self.end_doc_update();
        }
        self.drop_held_elements();
        if self.model_built {
            return;
        }
        self.model_built = true;
        self.host.did_build_model(terminated);
    }

    // -- Speculative loads ---

    pub(crate) fn set_speculation_base(&mut self, url: &str) {
        if self.speculation_base.is_some() {
            return;
        }
        match self.config.document_url.join(url) {
            Ok(base) => self.speculation_base = Some(base),
            Err(err) => {
                log::warn!(target: "html.executor", "ignoring speculative base {url:?}: {err}")
            }
        }
    }

    pub fn speculation_base(&self) -> Option<&Url> {
        self.speculation_base.as_ref()
    }

    /// Resolve `url` and claim it, or `None` if it was seen before or does not parse.
    fn convert_if_not_preloaded_yet(&mut self, url: &str) -> Option<Url> {
        let base = self
            .speculation_base
            .as_ref()
            .unwrap_or(&self.config.document_url);
        let absolute = match base.join(url) {
            Ok(absolute) => absolute,
            Err(err) => {
                log::warn!(target: "html.executor", "dropping preload of {url:?}: {err}");
                return None;
            }
        };
        if self.preloaded.insert(absolute.clone()) {
            Some(absolute)
        } else {
            self.stats.preloads_deduped += 1;
            None
        }
    }

    pub(crate) fn preload_script(
        &mut self,
        url: &str,
        charset: Option<&str>,
        mime_type: Option<&str>,
    ) {
        if let Some(url) = self.convert_if_not_preloaded_yet(url) {
            self.host.preload_script(&url, charset, mime_type);
        }
    }

    pub(crate) fn preload_style(&mut self, url: &str, charset: Option<&str>) {
        if let Some(url) = self.convert_if_not_preloaded_yet(url) {
            self.host.preload_style(&url, charset);
        }
    }

    pub(crate) fn preload_image(&mut self, url: &str) {
        if let Some(url) = self.convert_if_not_preloaded_yet(url) {
            self.host.preload_image(&url);
        }
    }

    pub(crate) fn process_offline_manifest(&mut self, url: &str) {
        match self.config.document_url.join(url) {
            Ok(url) => self.host.process_offline_manifest(&url),
            Err(err) => {
                log::warn!(target: "html.executor", "ignoring manifest {url:?}: {err}")
            }
        }
    }
}

impl<H: ExecutorHost> TreeOpSink for TreeOpExecutor<H> {
    fn move_ops_from(&mut self, ops: &mut Vec<TreeOperation>) {
        self.queue.extend(ops.drain(..));
    }

    fn move_speculative_loads_from(&mut self, loads: &mut Vec<SpeculativeLoad>) {
        self.speculative_loads.append(loads);
    }
}

//! Deferred tree-construction steps.
//!
//! A [`TreeOperation`] only exists fully constructed: each variant carries
//! exactly its operands. Node operands are [`NodeHandle`]s resolved by the
//! executor at perform time, so ops can be built before their nodes exist
//! and can cross threads. Owned text and attribute sets are released when
//! the op is dropped.

mod apply;

use std::sync::Arc;

use crate::builder::DocWriteSnapshot;
use crate::dom::NodeId;
use crate::error::TreeOpError;
use crate::executor::{DeferredTask, ExecutorHost, TreeOpExecutor};
use crate::types::{AttributeSet, CharsetSource, DocumentMode, Namespace, NodeHandle, OpSource};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TreeOperation {
    Append {
        node: NodeHandle,
        parent: NodeHandle,
    },
    Detach {
        node: NodeHandle,
    },
    AppendChildrenToNewParent {
        old_parent: NodeHandle,
        new_parent: NodeHandle,
    },
    /// Insert before `table` if it has an element parent, else append to `stack_parent`.
    FosterParent {
        node: NodeHandle,
        table: NodeHandle,
        stack_parent: NodeHandle,
    },
    AppendToDocument {
        node: NodeHandle,
    },
    AddAttributes {
        node: NodeHandle,
        attributes: AttributeSet,
    },
    CreateElement {
        handle: NodeHandle,
        ns: Namespace,
        name: Arc<str>,
        attributes: AttributeSet,
        source: OpSource,
    },
    SetFormElement {
        node: NodeHandle,
        form: NodeHandle,
    },
    AppendText {
        parent: NodeHandle,
        text: String,
    },
    AppendIsindexPrompt {
        parent: NodeHandle,
    },
    FosterParentText {
        text: String,
        table: NodeHandle,
        stack_parent: NodeHandle,
    },
    AppendComment {
        parent: NodeHandle,
        text: String,
    },
    AppendCommentToDocument {
        text: String,
    },
    AppendDoctypeToDocument {
        name: Arc<str>,
        public_id: String,
        system_id: String,
    },
    MarkAsBroken,
    RunScript {
        script: NodeHandle,
        snapshot: Option<DocWriteSnapshot>,
    },
    RunScriptAsyncDefer {
        script: NodeHandle,
    },
    PreventScriptExecution {
        script: NodeHandle,
    },
    DoneAddingChildren {
        node: NodeHandle,
    },
    DoneCreatingElement {
        node: NodeHandle,
    },
    FlushPendingAppendNotifications,
    SetDocumentCharset {
        label: String,
        source: CharsetSource,
    },
    NeedsCharsetSwitchTo {
        label: String,
        source: CharsetSource,
        line_number: u32,
    },
    UpdateStyleSheet {
        node: NodeHandle,
    },
    ProcessMeta {
        node: NodeHandle,
    },
    MarkMalformedIfScript {
        node: NodeHandle,
    },
    StreamEnded,
    StartLayout,
    DocumentMode {
        mode: DocumentMode,
    },
    SetStyleLineNumber {
        node: NodeHandle,
        line_number: u32,
    },
    SetScriptLineNumberAndFreeze {
        node: NodeHandle,
        line_number: u32,
    },
    SvgLoad {
        node: NodeHandle,
    },
    MaybeComplainAboutCharset {
        key: Arc<str>,
        error: bool,
        line_number: u32,
    },
    AddClass {
        node: NodeHandle,
        class: Arc<str>,
    },
    AddLineNumberId {
        node: NodeHandle,
        line_number: u32,
    },
    AddViewSourceHref {
        node: NodeHandle,
        href: String,
    },
    AddError {
        node: NodeHandle,
        message_id: Arc<str>,
        first: Option<Arc<str>>,
        second: Option<Arc<str>>,
    },
}

/// What the flush loop does after an op.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PerformOutcome {
    Continue,
    /// Pause and run this parser-blocking script.
    RunScript(NodeId),
}

impl TreeOperation {
    pub fn name(&self) -> &'static str {
        match self {
            TreeOperation::Append { .. } => "Append",
            TreeOperation::Detach { .. } => "Detach",
            TreeOperation::AppendChildrenToNewParent { .. } => "AppendChildrenToNewParent",
            TreeOperation::FosterParent { .. } => "FosterParent",
            TreeOperation::AppendToDocument { .. } => "AppendToDocument",
            TreeOperation::AddAttributes { .. } => "AddAttributes",
            TreeOperation::CreateElement { .. } => "CreateElement",
            TreeOperation::SetFormElement { .. } => "SetFormElement",
            TreeOperation::AppendText { .. } => "AppendText",
            TreeOperation::AppendIsindexPrompt { .. } => "AppendIsindexPrompt",
            TreeOperation::FosterParentText { .. } => "FosterParentText",
            TreeOperation::AppendComment { .. } => "AppendComment",
            TreeOperation::AppendCommentToDocument { .. } => "AppendCommentToDocument",
            TreeOperation::AppendDoctypeToDocument { .. } => "AppendDoctypeToDocument",
            TreeOperation::MarkAsBroken => "MarkAsBroken",
            TreeOperation::RunScript { .. } => "RunScript",
            TreeOperation::RunScriptAsyncDefer { .. } => "RunScriptAsyncDefer",
            TreeOperation::PreventScriptExecution { .. } => "PreventScriptExecution",
            TreeOperation::DoneAddingChildren { .. } => "DoneAddingChildren",
            TreeOperation::DoneCreatingElement { .. } => "DoneCreatingElement",
            TreeOperation::FlushPendingAppendNotifications => "FlushPendingAppendNotifications",
            TreeOperation::SetDocumentCharset { .. } => "SetDocumentCharset",
            TreeOperation::NeedsCharsetSwitchTo { .. } => "NeedsCharsetSwitchTo",
            TreeOperation::UpdateStyleSheet { .. } => "UpdateStyleSheet",
            TreeOperation::ProcessMeta { .. } => "ProcessMeta",
            TreeOperation::MarkMalformedIfScript { .. } => "MarkMalformedIfScript",
            TreeOperation::StreamEnded => "StreamEnded",
            TreeOperation::StartLayout => "StartLayout",
            TreeOperation::DocumentMode { .. } => "DocumentMode",
            TreeOperation::SetStyleLineNumber { .. } => "SetStyleLineNumber",
            TreeOperation::SetScriptLineNumberAndFreeze { .. } => "SetScriptLineNumberAndFreeze",
            TreeOperation::SvgLoad { .. } => "SvgLoad",
            TreeOperation::MaybeComplainAboutCharset { .. } => "MaybeComplainAboutCharset",
            TreeOperation::AddClass { .. } => "AddClass",
            TreeOperation::AddLineNumberId { .. } => "AddLineNumberId",
            TreeOperation::AddViewSourceHref { .. } => "AddViewSourceHref",
            TreeOperation::AddError { .. } => "AddError",
        }
    }

    /// Record tree builder state on a queued `RunScript`.
    ///
    /// # Panics
    /// On any other op, or if a snapshot is already attached.
    pub fn attach_snapshot(&mut self, state: DocWriteSnapshot) {
        match self {
            TreeOperation::RunScript { snapshot, .. } => {
                assert!(snapshot.is_none(), "RunScript already carries a snapshot");
                *snapshot = Some(state);
            }
            other => panic!("snapshot attached to {}", other.name()),
        }
    }

    pub fn perform<H: ExecutorHost>(
        self,
        executor: &mut TreeOpExecutor<H>,
    ) -> Result<PerformOutcome, TreeOpError> {
        match self {
            TreeOperation::Append { node, parent } => {
                let node = executor.node(node)?;
                let parent = executor.node(parent)?;
                apply::append(executor, node, parent)?;
            }
            TreeOperation::Detach { node } => {
                let node = executor.node(node)?;
                apply::detach(executor, node)?;
            }
            TreeOperation::AppendChildrenToNewParent {
                old_parent,
                new_parent,
            } => {
                let old_parent = executor.node(old_parent)?;
                let new_parent = executor.node(new_parent)?;
                apply::append_children_to_new_parent(executor, old_parent, new_parent)?;
            }
            TreeOperation::FosterParent {
                node,
                table,
                stack_parent,
            } => {
                let node = executor.node(node)?;
                let table = executor.node(table)?;
                let stack_parent = executor.node(stack_parent)?;
                apply::foster_parent(executor, node, table, stack_parent)?;
            }
            TreeOperation::AppendToDocument { node } => {
                let node = executor.node(node)?;
                apply::append_to_document(executor, node)?;
            }
            TreeOperation::AddAttributes { node, attributes } => {
                let node = executor.node(node)?;
                apply::add_attributes(executor, node, attributes)?;
            }
            TreeOperation::CreateElement {
                handle,
                ns,
                name,
                attributes,
                source,
            } => {
                apply::create_element(executor, handle, ns, name, attributes, source)?;
            }
            TreeOperation::SetFormElement { node, form } => {
                let node = executor.node(node)?;
                let form = executor.node(form)?;
                apply::set_form_element(executor, node, form)?;
            }
            TreeOperation::AppendText { parent, text } => {
                let parent = executor.node(parent)?;
                apply::append_text(executor, parent, &text)?;
            }
            TreeOperation::AppendIsindexPrompt { parent } => {
                let parent = executor.node(parent)?;
                apply::append_isindex_prompt(executor, parent)?;
            }
            TreeOperation::FosterParentText {
                text,
                table,
                stack_parent,
            } => {
                let table = executor.node(table)?;
                let stack_parent = executor.node(stack_parent)?;
                apply::foster_parent_text(executor, &text, table, stack_parent)?;
            }
            TreeOperation::AppendComment { parent, text } => {
                let parent = executor.node(parent)?;
                let doc = executor.require_document()?;
                let comment = executor.dom_mut().create_comment(doc, &text)?;
                apply::append(executor, comment, parent)?;
            }
            TreeOperation::AppendCommentToDocument { text } => {
                let doc = executor.require_document()?;
                let comment = executor.dom_mut().create_comment(doc, &text)?;
                apply::append_to_document(executor, comment)?;
            }
            TreeOperation::AppendDoctypeToDocument {
                name,
                public_id,
                system_id,
            } => {
                let doc = executor.require_document()?;
                let doctype = executor
                    .dom_mut()
                    .create_doctype(doc, name, public_id, system_id)?;
                apply::append_to_document(executor, doctype)?;
            }
            TreeOperation::MarkAsBroken => executor.mark_as_broken(),
            TreeOperation::RunScript { script, snapshot } => {
                let script = executor.node(script)?;
                if let Some(snapshot) = snapshot {
                    executor.initialize_doc_write_parser_state(snapshot);
                }
                return Ok(PerformOutcome::RunScript(script));
            }
            TreeOperation::RunScriptAsyncDefer { script } => {
                let script = executor.node(script)?;
                if executor.config().fragment_parser {
                    apply::script_state(executor, script)?.prevent_execution = true;
                } else {
                    executor.host_mut().schedule_async_defer(script);
                }
            }
            TreeOperation::PreventScriptExecution { script } => {
                let script = executor.node(script)?;
                apply::script_state(executor, script)?.prevent_execution = true;
            }
            TreeOperation::DoneAddingChildren { node } => {
                let node = executor.node(node)?;
                let have_notified = executor.have_notified(node);
                apply::element(executor, node)?.done_adding_children = Some(have_notified);
            }
            TreeOperation::DoneCreatingElement { node } => {
                let node = executor.node(node)?;
                apply::element(executor, node)?.done_creating = true;
            }
            TreeOperation::FlushPendingAppendNotifications => {
                executor.flush_pending_append_notifications();
            }
            TreeOperation::SetDocumentCharset { label, source } => {
                let encoding = apply::encoding_for_label(&label)?;
                executor.set_document_charset_and_source(encoding, source);
            }
            TreeOperation::NeedsCharsetSwitchTo {
                label,
                source,
                line_number,
            } => {
                let encoding = apply::encoding_for_label(&label)?;
                executor.needs_charset_switch_to(encoding, source, line_number);
            }
            TreeOperation::UpdateStyleSheet { node } => {
                let node = executor.node(node)?;
                executor.update_style_sheet(node);
            }
            TreeOperation::ProcessMeta { node } => {
                let node = executor.node(node)?;
                executor.host_mut().process_meta(node);
            }
            TreeOperation::MarkMalformedIfScript { node } => {
                let node = executor.node(node)?;
                if let Some(script) = executor
                    .dom_mut()
                    .element_mut(node)
                    .and_then(|e| e.script.as_mut())
                {
                    script.malformed = true;
                }
            }
            TreeOperation::StreamEnded => executor.did_build_model(false),
            TreeOperation::StartLayout => executor.start_layout(),
            TreeOperation::DocumentMode { mode } => {
                let doc = executor.require_document()?;
                if let Some(data) = executor.dom_mut().document_mut(doc) {
                    data.mode = mode;
                }
            }
            TreeOperation::SetStyleLineNumber { node, line_number } => {
                let node = executor.node(node)?;
                if let Some(style_link) = apply::element(executor, node)?.style_link.as_mut() {
                    style_link.line_number = Some(line_number);
                }
            }
            TreeOperation::SetScriptLineNumberAndFreeze { node, line_number } => {
                let node = executor.node(node)?;
                let script = apply::script_state(executor, node)?;
                script.line_number = Some(line_number);
                script.frozen = true;
            }
            TreeOperation::SvgLoad { node } => {
                let element = executor.node(node)?;
                executor.queue_deferred(DeferredTask::SvgLoad { element });
            }
            TreeOperation::MaybeComplainAboutCharset {
                key,
                error,
                line_number,
            } => executor.maybe_complain_about_charset(&key, error, line_number),
            TreeOperation::AddClass { node, class } => {
                let node = executor.node(node)?;
                apply::add_class(executor, node, &class)?;
            }
            TreeOperation::AddLineNumberId { node, line_number } => {
                let node = executor.node(node)?;
                executor.dom_mut().set_attr(
                    node,
                    Namespace::None,
                    Arc::from("id"),
                    None,
                    format!("line{line_number}"),
                    true,
                )?;
            }
            TreeOperation::AddViewSourceHref { node, href } => {
                let node = executor.node(node)?;
                apply::add_view_source_href(executor, node, href)?;
            }
            TreeOperation::AddError {
                node,
                message_id,
                first,
                second,
            } => {
                let node = executor.node(node)?;
                apply::add_error(executor, node, &message_id, first, second)?;
            }
        }
        Ok(PerformOutcome::Continue)
    }
}

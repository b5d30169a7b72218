//! Mutation helpers shared by several ops.

use std::sync::Arc;

use crate::dom::{CharacterDataChangeInfo, ElementData, NodeId, ScriptState, StyleLinkState};
use crate::error::{DomError, TreeOpError};
use crate::executor::{DeferredTask, ExecutorHost, TreeOpExecutor};
use crate::types::{AttributeSet, ElementCreator, Namespace, NodeHandle, OpSource};

const ISINDEX_PROMPT_KEY: &str = "IsIndexPromptWithSpace";

pub(super) fn element<H: ExecutorHost>(
    executor: &mut TreeOpExecutor<H>,
    node: NodeId,
) -> Result<&mut ElementData, TreeOpError> {
    executor
        .dom_mut()
        .element_mut(node)
        .ok_or(TreeOpError::Dom(DomError::WrongNodeKind(node)))
}

pub(super) fn script_state<H: ExecutorHost>(
    executor: &mut TreeOpExecutor<H>,
    node: NodeId,
) -> Result<&mut ScriptState, TreeOpError> {
    element(executor, node)?
        .script
        .as_mut()
        .ok_or(TreeOpError::Dom(DomError::WrongNodeKind(node)))
}

pub(super) fn encoding_for_label(
    label: &str,
) -> Result<&'static encoding_rs::Encoding, TreeOpError> {
    encoding_rs::Encoding::for_label(label.trim().as_bytes())
        .ok_or_else(|| TreeOpError::InvalidCharset(label.to_string()))
}

/// Append within the executor's document is batched; into any other
/// document it notifies at once inside that document's own update.
pub(super) fn append<H: ExecutorHost>(
    executor: &mut TreeOpExecutor<H>,
    node: NodeId,
    parent: NodeId,
) -> Result<(), TreeOpError> {
    let parent_doc = executor.dom().owner_document(parent);
    if parent_doc.is_some() && parent_doc == executor.document() {
        executor.dom_mut().append_child(parent, node)?;
        executor.post_pending_append_notification(parent, node);
        return Ok(());
    }
    executor.with_owner_update(parent, |executor| {
        let dom = executor.dom_mut();
        let index = dom.child_count(parent);
        dom.append_child(parent, node)?;
        dom.notify_content_appended(parent, index);
        Ok(())
    })
}

pub(super) fn append_to_document<H: ExecutorHost>(
    executor: &mut TreeOpExecutor<H>,
    node: NodeId,
) -> Result<(), TreeOpError> {
    executor.flush_pending_append_notifications();
    let doc = executor.require_document()?;
    let dom = executor.dom_mut();
    let index = dom.child_count(doc);
    dom.append_child(doc, node)?;
    dom.notify_content_inserted(doc, node, index);
    if dom.is_element(node) {
        executor.queue_deferred(DeferredTask::DocElementCreated { document: doc });
    }
    Ok(())
}

pub(super) fn detach<H: ExecutorHost>(
    executor: &mut TreeOpExecutor<H>,
    node: NodeId,
) -> Result<(), TreeOpError> {
    executor.flush_pending_append_notifications();
    let Some(parent) = executor.dom().parent(node) else {
        return Ok(());
    };
    executor.with_owner_update(parent, |executor| {
        let dom = executor.dom_mut();
        let index = dom
            .index_of(parent, node)
            .ok_or(DomError::NotAChild { parent, child: node })?;
        dom.remove_child_at(parent, index, true)?;
        Ok(())
    })
}

pub(super) fn append_children_to_new_parent<H: ExecutorHost>(
    executor: &mut TreeOpExecutor<H>,
    old_parent: NodeId,
    new_parent: NodeId,
) -> Result<(), TreeOpError> {
    if old_parent == new_parent {
        return Ok(());
    }
    executor.flush_pending_append_notifications();
    executor.with_owner_update(new_parent, |executor| {
        let dom = executor.dom_mut();
        let first_new = dom.child_count(new_parent);
        let mut moved = false;
        while let Some(child) = dom.child_at(old_parent, 0) {
            dom.remove_child_at(old_parent, 0, true)?;
            dom.append_child(new_parent, child)?;
            moved = true;
        }
        if moved {
            dom.notify_content_appended(new_parent, first_new);
        }
        Ok(())
    })
}

/// Element parent of `table`, if foster parenting applies.
fn foster_target<H: ExecutorHost>(executor: &TreeOpExecutor<H>, table: NodeId) -> Option<NodeId> {
    let dom = executor.dom();
    dom.parent(table).filter(|parent| dom.is_element(*parent))
}

pub(super) fn foster_parent<H: ExecutorHost>(
    executor: &mut TreeOpExecutor<H>,
    node: NodeId,
    table: NodeId,
    stack_parent: NodeId,
) -> Result<(), TreeOpError> {
    let Some(foster) = foster_target(executor, table) else {
        return append(executor, node, stack_parent);
    };
    executor.flush_pending_append_notifications();
    executor.with_owner_update(foster, |executor| {
        let dom = executor.dom_mut();
        let index = dom
            .index_of(foster, table)
            .ok_or(DomError::NotAChild { parent: foster, child: table })?;
        dom.insert_child_at(foster, node, index)?;
        dom.notify_content_inserted(foster, node, index);
        Ok(())
    })
}

pub(super) fn foster_parent_text<H: ExecutorHost>(
    executor: &mut TreeOpExecutor<H>,
    text: &str,
    table: NodeId,
    stack_parent: NodeId,
) -> Result<(), TreeOpError> {
    let Some(foster) = foster_target(executor, table) else {
        return append_text(executor, stack_parent, text);
    };
    executor.flush_pending_append_notifications();
    let doc = executor.require_document()?;
    executor.with_owner_update(foster, |executor| {
        let previous = executor.dom().previous_sibling(table);
        if let Some(previous) = previous.filter(|n| executor.dom().is_text(*n)) {
            return append_text_to_text_node(executor, previous, text);
        }
        let dom = executor.dom_mut();
        let index = dom
            .index_of(foster, table)
            .ok_or(DomError::NotAChild { parent: foster, child: table })?;
        let node = dom.create_text(doc, text)?;
        dom.insert_child_at(foster, node, index)?;
        dom.notify_content_inserted(foster, node, index);
        Ok(())
    })
}

pub(super) fn append_text<H: ExecutorHost>(
    executor: &mut TreeOpExecutor<H>,
    parent: NodeId,
    text: &str,
) -> Result<(), TreeOpError> {
    let last = executor.dom().last_child(parent);
    if let Some(last) = last.filter(|n| executor.dom().is_text(*n)) {
        return executor.with_owner_update(parent, |executor| {
            append_text_to_text_node(executor, last, text)
        });
    }
    let doc = executor.require_document()?;
    let node = executor.dom_mut().create_text(doc, text)?;
    append(executor, node, parent)
}

/// Grow an existing text node. Observers hear about it only if they have
/// already seen the node.
fn append_text_to_text_node<H: ExecutorHost>(
    executor: &mut TreeOpExecutor<H>,
    node: NodeId,
    text: &str,
) -> Result<(), TreeOpError> {
    if !executor.have_notified(node) {
        executor.dom_mut().append_text(node, text)?;
        return Ok(());
    }
    let dom = executor.dom_mut();
    let old_len = dom.text_len(node);
    let info = CharacterDataChangeInfo {
        append: true,
        change_start: old_len,
        change_end: old_len,
        replace_length: text.len(),
    };
    dom.notify_character_data_will_change(node, info);
    let result = dom.append_text(node, text);
    dom.notify_character_data_changed(node, info);
    result.map_err(TreeOpError::from)
}

pub(super) fn append_isindex_prompt<H: ExecutorHost>(
    executor: &mut TreeOpExecutor<H>,
    parent: NodeId,
) -> Result<(), TreeOpError> {
    let prompt = executor
        .host_mut()
        .localized_string(ISINDEX_PROMPT_KEY)
        .ok_or_else(|| TreeOpError::Localization {
            key: ISINDEX_PROMPT_KEY.to_string(),
        })?;
    if prompt.is_empty() {
        return Ok(());
    }
    append_text(executor, parent, &prompt)
}

fn has_style_link(ns: Namespace, name: &str) -> bool {
    match ns {
        Namespace::Html => name == "style" || name == "link",
        Namespace::Svg => name == "style",
        _ => false,
    }
}

pub(super) fn create_element<H: ExecutorHost>(
    executor: &mut TreeOpExecutor<H>,
    handle: NodeHandle,
    ns: Namespace,
    name: Arc<str>,
    attributes: AttributeSet,
    source: OpSource,
) -> Result<(), TreeOpError> {
    let doc = executor.require_document()?;
    let is_keygen = ns == Namespace::Html && &*name == "keygen";
    let name = if is_keygen { Arc::from("select") } else { name };
    let creator = match source {
        OpSource::Network => ElementCreator::Network,
        OpSource::NotNetwork if executor.config().fragment_parser => ElementCreator::Fragment,
        OpSource::NotNetwork => ElementCreator::DocumentWrite,
    };
    let node = executor
        .dom_mut()
        .create_element(doc, ns, Arc::clone(&name), creator)?;
    executor.bind_handle(handle, node);
    executor.hold_element(node);

    if has_style_link(ns, &name) {
        element(executor, node)?.style_link = Some(StyleLinkState {
            updates_enabled: false,
            line_number: None,
        });
    } else if is_keygen {
        populate_keygen(executor, doc, node, creator)?;
    }

    set_missing_attributes(executor, node, attributes, false)
}

/// Options and `_moz-type` for the `<select>` standing in for `<keygen>`.
fn populate_keygen<H: ExecutorHost>(
    executor: &mut TreeOpExecutor<H>,
    doc: NodeId,
    select: NodeId,
    creator: ElementCreator,
) -> Result<(), TreeOpError> {
    let content = executor
        .host_mut()
        .keygen_content()
        .ok_or(TreeOpError::FormProcessorUnavailable)?;
    let dom = executor.dom_mut();
    dom.set_attr(
        select,
        Namespace::None,
        Arc::from("_moz-type"),
        None,
        content.moz_type,
        false,
    )?;
    let option_name: Arc<str> = Arc::from("option");
    for label in &content.options {
        let option = dom.create_element(doc, Namespace::Html, Arc::clone(&option_name), creator)?;
        let text = dom.create_text(doc, label)?;
        dom.append_child(option, text)?;
        dom.append_child(select, option)?;
    }
    if !content.options.is_empty() {
        element(executor, select)?.done_adding_children = Some(false);
    }
    Ok(())
}

/// Set every attribute the element does not have yet, in source order, so
/// the first occurrence of a duplicate wins.
fn set_missing_attributes<H: ExecutorHost>(
    executor: &mut TreeOpExecutor<H>,
    node: NodeId,
    attributes: AttributeSet,
    notify: bool,
) -> Result<(), TreeOpError> {
    let dom = executor.dom_mut();
    for attr in attributes {
        if dom.has_attr(node, attr.ns, &attr.name) {
            continue;
        }
        dom.set_attr(node, attr.ns, attr.name, attr.prefix, attr.value, notify)?;
    }
    Ok(())
}

pub(super) fn add_attributes<H: ExecutorHost>(
    executor: &mut TreeOpExecutor<H>,
    node: NodeId,
    attributes: AttributeSet,
) -> Result<(), TreeOpError> {
    if !executor.dom().is_element(node) {
        return Err(DomError::WrongNodeKind(node).into());
    }
    executor.with_owner_update(node, |executor| {
        set_missing_attributes(executor, node, attributes, true)
    })
}

pub(super) fn set_form_element<H: ExecutorHost>(
    executor: &mut TreeOpExecutor<H>,
    node: NodeId,
    form: NodeId,
) -> Result<(), TreeOpError> {
    let is_form = executor
        .dom()
        .element(form)
        .is_some_and(|e| e.is(Namespace::Html, "form"));
    if !is_form {
        return Err(DomError::WrongNodeKind(form).into());
    }
    let control = element(executor, node)?;
    if control.is_form_associated() && control.attr(Namespace::None, "form").is_none() {
        control.form_owner = Some(form);
    }
    Ok(())
}

pub(super) fn add_class<H: ExecutorHost>(
    executor: &mut TreeOpExecutor<H>,
    node: NodeId,
    class: &str,
) -> Result<(), TreeOpError> {
    let dom = executor.dom_mut();
    let value = match dom.get_attr(node, Namespace::None, "class") {
        Some(existing) if !existing.is_empty() => format!("{existing} {class}"),
        _ => class.to_string(),
    };
    dom.set_attr(node, Namespace::None, Arc::from("class"), None, value, true)?;
    Ok(())
}

pub(super) fn add_view_source_href<H: ExecutorHost>(
    executor: &mut TreeOpExecutor<H>,
    node: NodeId,
    href: String,
) -> Result<(), TreeOpError> {
    let base = executor
        .speculation_base()
        .unwrap_or(&executor.config().document_url);
    let url = match base.join(&href) {
        Ok(url) => url,
        Err(_) => return Err(TreeOpError::InvalidUrl(href)),
    };
    let value = match url.scheme() {
        // Opening these runs script in the view-source document.
        "javascript" => return Ok(()),
        "mailto" => url.to_string(),
        _ => format!("view-source:{url}"),
    };
    executor
        .dom_mut()
        .set_attr(node, Namespace::None, Arc::from("href"), None, value, true)?;
    Ok(())
}

pub(super) fn add_error<H: ExecutorHost>(
    executor: &mut TreeOpExecutor<H>,
    node: NodeId,
    message_id: &str,
    first: Option<Arc<str>>,
    second: Option<Arc<str>>,
) -> Result<(), TreeOpError> {
    add_class(executor, node, "error")?;
    let host = executor.host_mut();
    let message = match (first.as_deref(), second.as_deref()) {
        (Some(a), Some(b)) => host.format_localized_string(message_id, &[a, b]),
        (Some(a), None) => host.format_localized_string(message_id, &[a]),
        (None, _) => host.localized_string(message_id),
    };
    let Some(message) = message else {
        return Err(TreeOpError::Localization {
            key: message_id.to_string(),
        });
    };
    let dom = executor.dom_mut();
    let title = match dom.get_attr(node, Namespace::None, "title") {
        Some(existing) if !existing.is_empty() => format!("{existing}\n{message}"),
        _ => message,
    };
    dom.set_attr(node, Namespace::None, Arc::from("title"), None, title, true)?;
    Ok(())
}

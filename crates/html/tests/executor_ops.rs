mod support;

use std::sync::Arc;

use html::executor::KeygenContent;
use html::{
    AttributeSet, ElementCreator, FlushOutcome, Namespace, SpeculativeLoad, TreeOpBuilder,
    TreeOperation,
};
use support::*;

const ISINDEX_PROMPT: &str = "IsIndexPromptWithSpace";

#[test]
fn keygen_becomes_a_populated_select() {
    let host = TestHost {
        keygen: Some(KeygenContent {
            options: vec!["High Grade".to_string(), "Medium Grade".to_string()],
            moz_type: "-mozilla-keygen".to_string(),
        }),
        ..TestHost::default()
    };
    let (mut exec, _) = executor_with_log(host, config());
    let mut builder = builder_for(&exec);
    let keygen = builder.create_element(Namespace::Html, "keygen", attrs(&[("name", "key")]));
    builder.append_to_document(keygen);
    assert_eq!(flush(&mut exec, &mut builder), FlushOutcome::Drained);

    let select = exec.node_for(keygen).expect("keygen bound");
    let dom = exec.dom();
    let data = dom.element(select).expect("element");
    assert!(data.is(Namespace::Html, "select"));
    assert_eq!(data.attr(Namespace::None, "name"), Some("key"));
    assert_eq!(data.attr(Namespace::None, "_moz-type"), Some("-mozilla-keygen"));
    assert_eq!(data.done_adding_children, Some(false));
    assert_eq!(child_labels(dom, select), vec!["<option>", "<option>"]);
    let second = dom.child_at(select, 1).expect("second option");
    assert_eq!(child_labels(dom, second), vec!["\"Medium Grade\""]);
}

#[test]
fn keygen_without_form_processor_fails_but_keeps_the_select() {
    let (mut exec, _) = executor_with_log(TestHost::default(), config());
    let mut builder = builder_for(&exec);
    let keygen = builder.create_element(Namespace::Html, "keygen", attrs(&[("name", "key")]));
    builder.append_to_document(keygen);
    assert_eq!(flush(&mut exec, &mut builder), FlushOutcome::Drained);

    assert_eq!(exec.stats().op_failures, 1);
    let select = exec.node_for(keygen).expect("keygen bound");
    let data = exec.dom().element(select).expect("element");
    assert!(data.is(Namespace::Html, "select"));
    assert!(data.attributes.is_empty());
    assert_eq!(child_labels(exec.dom(), document(&exec)), vec!["<select>"]);
}

fn isindex_form(builder: &mut TreeOpBuilder) -> html::NodeHandle {
    let form = builder.create_element(Namespace::Html, "form", AttributeSet::new());
    builder.append_to_document(form);
    builder.push(TreeOperation::AppendIsindexPrompt { parent: form });
    form
}

#[test]
fn isindex_prompt_is_localized_text() {
    let host = TestHost::default().with_string(ISINDEX_PROMPT, "Search: ");
    let (mut exec, _) = executor_with_log(host, config());
    let mut builder = builder_for(&exec);
    let form = isindex_form(&mut builder);
    builder.append_text(form, "more");
    assert_eq!(flush(&mut exec, &mut builder), FlushOutcome::Drained);

    let form = exec.node_for(form).expect("form bound");
    assert_eq!(child_labels(exec.dom(), form), vec!["\"Search: more\""]);
}

#[test]
fn empty_isindex_prompt_appends_nothing() {
    let host = TestHost::default().with_string(ISINDEX_PROMPT, "");
    let (mut exec, _) = executor_with_log(host, config());
    let mut builder = builder_for(&exec);
    let form = isindex_form(&mut builder);
    assert_eq!(flush(&mut exec, &mut builder), FlushOutcome::Drained);

    let form = exec.node_for(form).expect("form bound");
    assert_eq!(exec.dom().child_count(form), 0);
    assert_eq!(exec.stats().op_failures, 0);
}

#[test]
fn missing_isindex_prompt_fails_the_op() {
    let (mut exec, _) = executor_with_log(TestHost::default(), config());
    let mut builder = builder_for(&exec);
    let form = isindex_form(&mut builder);
    builder.append_text(form, "after");
    assert_eq!(flush(&mut exec, &mut builder), FlushOutcome::Drained);

    assert_eq!(exec.stats().op_failures, 1);
    let form = exec.node_for(form).expect("form bound");
    assert_eq!(child_labels(exec.dom(), form), vec!["\"after\""]);
}

#[test]
fn errors_decorate_the_view_source_node() {
    let host = TestHost::default()
        .with_string("errDuplicateAttribute", "Duplicate attribute %1$S.")
        .with_string("errBadCharAfterLt", "Bad character after <.");
    let (mut exec, _) = executor_with_log(host, config().with_view_source(true));
    let mut builder = builder_for(&exec);
    let span = builder.create_element(Namespace::Html, "span", attrs(&[("class", "attribute-name")]));
    builder.append_to_document(span);
    builder.push(TreeOperation::AddError {
        node: span,
        message_id: Arc::from("errDuplicateAttribute"),
        first: Some(Arc::from("id")),
        second: None,
    });
    builder.push(TreeOperation::AddError {
        node: span,
        message_id: Arc::from("errBadCharAfterLt"),
        first: None,
        second: None,
    });
    builder.push(TreeOperation::AddError {
        node: span,
        message_id: Arc::from("errUnknown"),
        first: None,
        second: None,
    });
    assert_eq!(flush(&mut exec, &mut builder), FlushOutcome::Drained);

    let span = exec.node_for(span).expect("span bound");
    let dom = exec.dom();
    assert_eq!(
        dom.get_attr(span, Namespace::None, "class"),
        Some("attribute-name error error error")
    );
    assert_eq!(
        dom.get_attr(span, Namespace::None, "title"),
        Some("Duplicate attribute id.\nBad character after <.")
    );
    // errUnknown still marks the node but fails the op.
    assert_eq!(exec.stats().op_failures, 1);
}

#[test]
fn done_adding_children_records_whether_observers_saw_the_element() {
    let (mut exec, _) = executor_with_log(TestHost::default(), config());
    let mut builder = builder_for(&exec);
    let html = builder.create_element(Namespace::Html, "html", AttributeSet::new());
    builder.append_to_document(html);
    assert_eq!(flush(&mut exec, &mut builder), FlushOutcome::Drained);

    let seen = builder.create_element(Namespace::Html, "select", AttributeSet::new());
    builder.append(seen, html);
    builder.push(TreeOperation::FlushPendingAppendNotifications);
    builder.push(TreeOperation::DoneAddingChildren { node: seen });
    let unseen = builder.create_element(Namespace::Html, "object", AttributeSet::new());
    builder.append(unseen, html);
    builder.push(TreeOperation::DoneAddingChildren { node: unseen });
    builder.push(TreeOperation::DoneCreatingElement { node: unseen });
    assert_eq!(flush(&mut exec, &mut builder), FlushOutcome::Drained);

    let seen = exec.node_for(seen).expect("seen bound");
    let unseen = exec.node_for(unseen).expect("unseen bound");
    let dom = exec.dom();
    assert_eq!(dom.element(seen).and_then(|e| e.done_adding_children), Some(true));
    assert_eq!(dom.element(unseen).and_then(|e| e.done_adding_children), Some(false));
    assert!(dom.element(unseen).is_some_and(|e| e.done_creating));
    assert!(dom.element(seen).is_some_and(|e| !e.done_creating));
}

#[test]
fn form_owner_follows_the_parser_rules() {
    let (mut exec, _) = executor_with_log(TestHost::default(), config());
    let mut builder = builder_for(&exec);
    let form = builder.create_element(Namespace::Html, "form", AttributeSet::new());
    builder.append_to_document(form);
    let input = builder.create_element(Namespace::Html, "input", AttributeSet::new());
    let pointed = builder.create_element(Namespace::Html, "input", attrs(&[("form", "other")]));
    let img = builder.create_element(Namespace::Html, "img", AttributeSet::new());
    let div = builder.create_element(Namespace::Html, "div", AttributeSet::new());
    for control in [input, pointed, img, div] {
        builder.append(control, form);
        builder.push(TreeOperation::SetFormElement {
            node: control,
            form,
        });
    }
    builder.push(TreeOperation::SetFormElement {
        node: div,
        form: input,
    });
    assert_eq!(flush(&mut exec, &mut builder), FlushOutcome::Drained);

    let form_id = exec.node_for(form).expect("form bound");
    let owner = |handle| {
        let id = exec.node_for(handle).expect("control bound");
        exec.dom().element(id).and_then(|e| e.form_owner)
    };
    assert_eq!(owner(input), Some(form_id));
    assert_eq!(owner(pointed), None);
    assert_eq!(owner(img), None);
    assert_eq!(owner(div), None);
    assert_eq!(exec.stats().op_failures, 1);
}

#[test]
fn element_creator_tracks_provenance() {
    let (mut exec, _) = executor_with_log(TestHost::default(), config());
    let mut network = builder_for(&exec);
    let from_network = network.create_element(Namespace::Html, "p", AttributeSet::new());
    let mut script = TreeOpBuilder::for_script(exec.handle_allocator());
    let from_script = script.create_element(Namespace::Html, "p", AttributeSet::new());
    network.flush_to(&mut exec);
    script.flush_to(&mut exec);
    assert_eq!(exec.run_flush_loop(), FlushOutcome::Drained);

    let (mut fragment_exec, _) =
        executor_with_log(TestHost::default(), config().with_fragment_parser(true));
    let mut fragment = TreeOpBuilder::for_script(fragment_exec.handle_allocator());
    let from_fragment = fragment.create_element(Namespace::Html, "p", AttributeSet::new());
    fragment.flush_to(&mut fragment_exec);
    assert_eq!(fragment_exec.run_flush_loop(), FlushOutcome::Drained);

    let creator = |exec: &html::TreeOpExecutor<TestHost>, handle| {
        let id = exec.node_for(handle).expect("element bound");
        exec.dom().element(id).map(|e| e.creator)
    };
    assert_eq!(creator(&exec, from_network), Some(ElementCreator::Network));
    assert_eq!(creator(&exec, from_script), Some(ElementCreator::DocumentWrite));
    assert_eq!(
        creator(&fragment_exec, from_fragment),
        Some(ElementCreator::Fragment)
    );
}

#[test]
fn detach_and_reparent_children() {
    let (mut exec, _) = executor_with_log(TestHost::default(), config());
    let mut builder = builder_for(&exec);
    let html = builder.create_element(Namespace::Html, "html", AttributeSet::new());
    builder.append_to_document(html);
    let old = builder.create_element(Namespace::Html, "b", AttributeSet::new());
    let new = builder.create_element(Namespace::Html, "i", AttributeSet::new());
    builder.append(old, html);
    builder.append(new, html);
    builder.append_text(old, "x");
    builder.append_comment(old, "y");
    builder.push(TreeOperation::AppendChildrenToNewParent {
        old_parent: old,
        new_parent: new,
    });
    builder.push(TreeOperation::Detach { node: old });
    builder.push(TreeOperation::Detach { node: old });
    assert_eq!(flush(&mut exec, &mut builder), FlushOutcome::Drained);

    let html = exec.node_for(html).expect("html bound");
    let new = exec.node_for(new).expect("new bound");
    assert_eq!(child_labels(exec.dom(), html), vec!["<i>"]);
    assert_eq!(child_labels(exec.dom(), new), vec!["\"x\"", "<!--y-->"]);
    assert_eq!(exec.stats().op_failures, 0);
}

#[test]
fn view_source_decorations() {
    let (mut exec, _) = executor_with_log(TestHost::default(), config().with_view_source(true));
    let mut builder = builder_for(&exec);
    let a = builder.create_element(Namespace::Html, "a", AttributeSet::new());
    builder.append_to_document(a);
    builder.push(TreeOperation::AddClass {
        node: a,
        class: Arc::from("start-tag"),
    });
    builder.push(TreeOperation::AddClass {
        node: a,
        class: Arc::from("attribute-value"),
    });
    builder.push(TreeOperation::AddLineNumberId {
        node: a,
        line_number: 9,
    });
    let links: Vec<_> = ["../style.css", "mailto:a@example.com", "javascript:alert(1)"]
        .into_iter()
        .map(|href| {
            let link = builder.create_element(Namespace::Html, "a", AttributeSet::new());
            builder.append(link, a);
            builder.push(TreeOperation::AddViewSourceHref {
                node: link,
                href: href.to_string(),
            });
            link
        })
        .collect();
    assert_eq!(flush(&mut exec, &mut builder), FlushOutcome::Drained);

    let a = exec.node_for(a).expect("a bound");
    let dom = exec.dom();
    assert_eq!(
        dom.get_attr(a, Namespace::None, "class"),
        Some("start-tag attribute-value")
    );
    assert_eq!(dom.get_attr(a, Namespace::None, "id"), Some("line9"));
    let href = |handle| {
        let id = exec.node_for(handle).expect("link bound");
        exec.dom()
            .get_attr(id, Namespace::None, "href")
            .map(str::to_string)
    };
    assert_eq!(
        href(links[0]).as_deref(),
        Some("view-source:https://example.com/style.css")
    );
    assert_eq!(href(links[1]).as_deref(), Some("mailto:a@example.com"));
    assert_eq!(href(links[2]), None);
}

#[test]
fn view_source_hrefs_follow_the_tracked_base() {
    let (mut exec, _) = executor_with_log(TestHost::default(), config().with_view_source(true));
    let mut builder = builder_for(&exec);
    builder.push_load(SpeculativeLoad::SetBase {
        url: "https://cdn.example.net/src/".to_string(),
    });
    let link = builder.create_element(Namespace::Html, "a", AttributeSet::new());
    builder.append_to_document(link);
    builder.push(TreeOperation::AddViewSourceHref {
        node: link,
        href: "theme/site.css".to_string(),
    });
    assert_eq!(flush(&mut exec, &mut builder), FlushOutcome::Drained);

    let link = exec.node_for(link).expect("link bound");
    assert_eq!(
        exec.dom().get_attr(link, Namespace::None, "href"),
        Some("view-source:https://cdn.example.net/src/theme/site.css")
    );
    assert!(exec.host().preloads.is_empty());
}

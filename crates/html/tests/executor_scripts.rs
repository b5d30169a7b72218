mod support;

use std::sync::atomic::Ordering;

use html::executor::ScriptExecution;
use html::{
    AttributeSet, DocWriteSnapshot, ElementCreator, FlushOutcome, Namespace, NodeHandle,
    TreeOpBuilder, TreeOperation,
};
use support::*;

struct Page {
    html: NodeHandle,
    body: NodeHandle,
    script: NodeHandle,
}

/// `<html><body><script>` followed by a `RunScript` for the script.
fn page_with_script(builder: &mut TreeOpBuilder) -> Page {
    let html = builder.create_element(Namespace::Html, "html", AttributeSet::new());
    builder.append_to_document(html);
    let body = builder.create_element(Namespace::Html, "body", AttributeSet::new());
    builder.append(body, html);
    let script = builder.create_element(Namespace::Html, "script", AttributeSet::new());
    builder.append(script, body);
    builder.run_script(script);
    Page { html, body, script }
}

#[test]
fn document_write_output_lands_at_the_snapshot_insertion_point() {
    let host = TestHost::default().with_script(|_, _, writer| {
        let parent = writer
            .snapshot()
            .and_then(|snapshot| snapshot.current_node())
            .expect("snapshot with a current node");
        let builder = writer.builder();
        let written = builder.create_element(Namespace::Html, "em", AttributeSet::new());
        builder.append(written, parent);
        builder.append_text(written, "written");
        ScriptExecution::Completed
    });
    let (mut exec, _) = executor_with_log(host, config());
    let mut builder = builder_for(&exec);
    let page = page_with_script(&mut builder);
    assert!(builder.snapshot_pending_script(DocWriteSnapshot {
        open_elements: vec![page.html, page.body],
        line_number: 3,
    }));
    let after = builder.create_element(Namespace::Html, "p", AttributeSet::new());
    builder.append(after, page.body);
    assert_eq!(flush(&mut exec, &mut builder), FlushOutcome::Drained);

    let body = exec.node_for(page.body).expect("body bound");
    assert_eq!(
        child_labels(exec.dom(), body),
        vec!["<script>", "<em>", "<p>"]
    );
    let em = exec.dom().child_at(body, 1).expect("written element");
    assert_eq!(
        exec.dom().element(em).map(|e| e.creator),
        Some(ElementCreator::DocumentWrite)
    );
    assert_eq!(child_labels(exec.dom(), em), vec!["\"written\""]);
    assert_eq!(
        exec.doc_write_snapshot().map(|s| s.line_number),
        Some(3)
    );
}

#[test]
fn blocked_script_holds_the_queue_until_unblocked() {
    let host = TestHost::default().with_script(|_, _, _| ScriptExecution::Blocked);
    let (mut exec, log) = executor_with_log(host, config());
    let mut builder = builder_for(&exec);
    let page = page_with_script(&mut builder);
    let after = builder.create_element(Namespace::Html, "p", AttributeSet::new());
    builder.append(after, page.body);

    assert_eq!(flush(&mut exec, &mut builder), FlushOutcome::BlockedOnScript);
    assert!(exec.is_blocked_on_script());
    assert_eq!(exec.queue_len(), 2);
    let (begins, ends) = begin_end_count(&log.records(), document(&exec));
    assert_eq!(begins, ends);

    assert_eq!(exec.run_flush_loop(), FlushOutcome::BlockedOnScript);
    assert_eq!(exec.queue_len(), 2);

    assert_eq!(exec.unblock_parser(), FlushOutcome::Drained);
    let body = exec.node_for(page.body).expect("body bound");
    assert_eq!(child_labels(exec.dom(), body), vec!["<script>", "<p>"]);
    assert_eq!(exec.host().executed.len(), 1);
}

#[test]
fn terminating_from_a_script_drops_the_rest_of_the_parse() {
    let (mut exec, _) = executor_with_log(TestHost::default(), config());
    let flag = exec.termination_handle();
    exec.host_mut().terminate_on_execute = Some(flag.clone());
    let mut builder = builder_for(&exec);
    let page = page_with_script(&mut builder);
    let after = builder.create_element(Namespace::Html, "p", AttributeSet::new());
    builder.append(after, page.body);

    assert_eq!(flush(&mut exec, &mut builder), FlushOutcome::Terminated);
    assert!(flag.load(Ordering::Acquire));
    assert!(exec.is_terminated());
    assert_eq!(exec.document(), None);
    assert_eq!(exec.queue_len(), 0);
    assert_eq!(exec.node_for(after), None);

    builder.append_comment(page.html, "late");
    assert_eq!(flush(&mut exec, &mut builder), FlushOutcome::Terminated);
    assert_eq!(exec.queue_len(), 0);
    assert_eq!(exec.host().built_model, vec![true]);
}

#[test]
fn termination_frees_unlinked_elements_and_ends_the_model() {
    let (mut exec, _) = executor_with_log(TestHost::default(), config());
    let mut builder = builder_for(&exec);
    let html = builder.create_element(Namespace::Html, "html", AttributeSet::new());
    builder.append_to_document(html);
    let orphan = builder.create_element(Namespace::Html, "div", AttributeSet::new());
    assert_eq!(flush(&mut exec, &mut builder), FlushOutcome::Drained);

    let orphan = exec.node_for(orphan).expect("orphan bound");
    let html = exec.node_for(html).expect("html bound");
    assert_eq!(exec.held_element_count(), 2);
    assert_eq!(exec.dom().len(), 3);

    exec.terminate();
    assert!(exec.document().is_some());
    assert_eq!(exec.run_flush_loop(), FlushOutcome::Terminated);

    assert_eq!(exec.document(), None);
    assert!(!exec.dom().contains(orphan));
    assert!(exec.dom().contains(html));
    assert_eq!(exec.dom().len(), 2);
    assert_eq!(exec.held_element_count(), 0);
    assert_eq!(exec.host().built_model, vec![true]);

    assert_eq!(exec.run_flush_loop(), FlushOutcome::Terminated);
    assert_eq!(exec.host().built_model, vec![true]);
}

#[test]
fn termination_after_stream_end_reports_the_model_once() {
    let (mut exec, _) = executor_with_log(TestHost::default(), config());
    let mut builder = builder_for(&exec);
    let html = builder.create_element(Namespace::Html, "html", AttributeSet::new());
    builder.append_to_document(html);
    builder.push(TreeOperation::StreamEnded);
    assert_eq!(flush(&mut exec, &mut builder), FlushOutcome::Drained);

    exec.terminate();
    assert_eq!(exec.run_flush_loop(), FlushOutcome::Terminated);
    assert_eq!(exec.host().built_model, vec![false]);
}

#[test]
fn fragment_parsing_never_runs_scripts() {
    let (mut exec, _) = executor_with_log(TestHost::default(), config().with_fragment_parser(true));
    let mut builder = builder_for(&exec);
    let page = page_with_script(&mut builder);
    let deferred = builder.create_element(Namespace::Html, "script", AttributeSet::new());
    builder.append(deferred, page.body);
    builder.push(TreeOperation::RunScriptAsyncDefer { script: deferred });
    assert_eq!(flush(&mut exec, &mut builder), FlushOutcome::Drained);

    assert!(exec.host().executed.is_empty());
    assert!(exec.host().async_defer.is_empty());
    for handle in [page.script, deferred] {
        let id = exec.node_for(handle).expect("script bound");
        let state = exec
            .dom()
            .element(id)
            .and_then(|e| e.script.clone())
            .expect("script state");
        assert!(state.prevent_execution);
    }
}

#[test]
fn prevented_script_is_skipped() {
    let (mut exec, _) = executor_with_log(TestHost::default(), config());
    let mut builder = builder_for(&exec);
    let html = builder.create_element(Namespace::Html, "html", AttributeSet::new());
    builder.append_to_document(html);
    let script = builder.create_element(Namespace::Html, "script", AttributeSet::new());
    builder.append(script, html);
    builder.push(TreeOperation::PreventScriptExecution { script });
    builder.run_script(script);
    assert_eq!(flush(&mut exec, &mut builder), FlushOutcome::Drained);

    assert!(exec.host().executed.is_empty());
    assert_eq!(exec.stats().script_pauses, 0);
}

#[test]
fn async_and_defer_scripts_go_to_the_host() {
    let (mut exec, _) = executor_with_log(TestHost::default(), config());
    let mut builder = builder_for(&exec);
    let html = builder.create_element(Namespace::Html, "html", AttributeSet::new());
    builder.append_to_document(html);
    let script = builder.create_element(Namespace::Html, "script", attrs(&[("src", "a.js")]));
    builder.append(script, html);
    builder.push(TreeOperation::SetScriptLineNumberAndFreeze {
        node: script,
        line_number: 12,
    });
    builder.push(TreeOperation::MarkMalformedIfScript { node: script });
    builder.push(TreeOperation::MarkMalformedIfScript { node: html });
    builder.push(TreeOperation::RunScriptAsyncDefer { script });
    assert_eq!(flush(&mut exec, &mut builder), FlushOutcome::Drained);

    let id = exec.node_for(script).expect("script bound");
    assert_eq!(exec.host().async_defer, vec![id]);
    assert!(exec.host().executed.is_empty());
    let state = exec
        .dom()
        .element(id)
        .and_then(|e| e.script.clone())
        .expect("script state");
    assert_eq!(state.line_number, Some(12));
    assert!(state.frozen);
    assert!(state.malformed);
    assert_eq!(exec.stats().op_failures, 0);
}

#[test]
fn run_script_on_a_non_script_element_is_ignored() {
    let (mut exec, _) = executor_with_log(TestHost::default(), config());
    let mut builder = builder_for(&exec);
    let div = builder.create_element(Namespace::Html, "div", AttributeSet::new());
    builder.append_to_document(div);
    builder.run_script(div);
    builder.append_text(div, "still parsed");
    assert_eq!(flush(&mut exec, &mut builder), FlushOutcome::Drained);

    assert!(exec.host().executed.is_empty());
    let id = exec.node_for(div).expect("div bound");
    assert_eq!(child_labels(exec.dom(), id), vec!["\"still parsed\""]);
}

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use html::dom::{Dom, MutationLog, MutationRecord, NodeId, NodeKind};
use html::executor::{
    CharsetComplaint, DeferredTask, DocumentHost, KeygenContent, PreloadHost, ScriptExecution,
    ScriptHost, ServiceHost,
};
use html::{
    CharsetSource, DocumentWriter, ExecutorConfig, FlushOutcome, TreeOpBuilder, TreeOpExecutor,
};
use url::Url;

pub const DOCUMENT_URL: &str = "https://example.com/dir/page.html";

pub type ScriptFn = Box<dyn FnMut(NodeId, &Dom, &mut DocumentWriter) -> ScriptExecution>;

/// Host that records every callback in call order.
#[derive(Default)]
pub struct TestHost {
    pub calls: Vec<String>,
    pub executed: Vec<NodeId>,
    /// Update depth of the script's document seen by each `execute`.
    pub depth_during_execute: Vec<u32>,
    pub async_defer: Vec<NodeId>,
    pub preloads: Vec<String>,
    pub style_sheet_updates: Vec<NodeId>,
    pub metas: Vec<NodeId>,
    pub manifests: Vec<String>,
    pub layouts_started: usize,
    pub built_model: Vec<bool>,
    pub reload_requests: Vec<(&'static str, CharsetSource)>,
    pub accept_reload: bool,
    pub complaints: Vec<CharsetComplaint>,
    pub deferred: Vec<DeferredTask>,
    pub strings: HashMap<String, String>,
    pub keygen: Option<KeygenContent>,
    pub script: Option<ScriptFn>,
    /// Set from inside `execute` to simulate the document going away.
    pub terminate_on_execute: Option<Arc<AtomicBool>>,
}

impl TestHost {
    pub fn with_string(mut self, key: &str, value: &str) -> Self {
        self.strings.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_script(
        mut self,
        script: impl FnMut(NodeId, &Dom, &mut DocumentWriter) -> ScriptExecution + 'static,
    ) -> Self {
        self.script = Some(Box::new(script));
        self
    }
}

impl ScriptHost for TestHost {
    fn execute(&mut self, script: NodeId, dom: &Dom, writer: &mut DocumentWriter) -> ScriptExecution {
        self.calls.push("execute".to_string());
        self.executed.push(script);
        let depth = dom
            .owner_document(script)
            .and_then(|doc| dom.document(doc))
            .map_or(0, |data| data.update_depth());
        self.depth_during_execute.push(depth);
        if let Some(flag) = &self.terminate_on_execute {
            flag.store(true, Ordering::Release);
        }
        match self.script.as_mut() {
            Some(script_fn) => script_fn(script, dom, writer),
            None => ScriptExecution::Completed,
        }
    }

    fn schedule_async_defer(&mut self, script: NodeId) {
        self.calls.push("schedule_async_defer".to_string());
        self.async_defer.push(script);
    }
}

impl PreloadHost for TestHost {
    fn preload_script(&mut self, url: &Url, charset: Option<&str>, mime_type: Option<&str>) {
        self.preloads.push(format!(
            "script {url} {} {}",
            charset.unwrap_or("-"),
            mime_type.unwrap_or("-")
        ));
    }

    fn preload_style(&mut self, url: &Url, charset: Option<&str>) {
        self.preloads
            .push(format!("style {url} {}", charset.unwrap_or("-")));
    }

    fn preload_image(&mut self, url: &Url) {
        self.preloads.push(format!("image {url}"));
    }
}

impl DocumentHost for TestHost {
    fn update_style_sheet(&mut self, element: NodeId) {
        self.calls.push("update_style_sheet".to_string());
        self.style_sheet_updates.push(element);
    }

    fn process_meta(&mut self, element: NodeId) {
        self.metas.push(element);
    }

    fn process_offline_manifest(&mut self, url: &Url) {
        self.manifests.push(url.to_string());
    }

    fn start_layout(&mut self) {
        self.calls.push("start_layout".to_string());
        self.layouts_started += 1;
    }

    fn did_build_model(&mut self, terminated: bool) {
        self.calls.push("did_build_model".to_string());
        self.built_model.push(terminated);
    }

    fn reload_with_encoding(
        &mut self,
        encoding: &'static encoding_rs::Encoding,
        source: CharsetSource,
    ) -> bool {
        self.reload_requests.push((encoding.name(), source));
        self.accept_reload
    }

    fn report_charset_complaint(&mut self, complaint: CharsetComplaint) {
        self.complaints.push(complaint);
    }

    fn run_deferred(&mut self, task: DeferredTask) {
        self.calls.push("run_deferred".to_string());
        self.deferred.push(task);
    }
}

impl ServiceHost for TestHost {
    fn localized_string(&mut self, key: &str) -> Option<String> {
        self.strings.get(key).cloned()
    }

    fn format_localized_string(&mut self, key: &str, params: &[&str]) -> Option<String> {
        let template = self.strings.get(key)?;
        let mut message = template.clone();
        for (i, param) in params.iter().enumerate() {
            message = message.replace(&format!("%{}$S", i + 1), param);
        }
        Some(message)
    }

    fn keygen_content(&mut self) -> Option<KeygenContent> {
        self.keygen.clone()
    }
}

pub fn config() -> ExecutorConfig {
    ExecutorConfig::new(Url::parse(DOCUMENT_URL).expect("document url"))
}

/// Executor whose arena reports every mutation into the returned log.
pub fn executor_with_log(
    host: TestHost,
    config: ExecutorConfig,
) -> (TreeOpExecutor<TestHost>, MutationLog) {
    let mut dom = Dom::new();
    let log = MutationLog::new();
    dom.add_observer(Box::new(log.clone()));
    let document = dom.create_document().expect("document");
    log.take();
    (TreeOpExecutor::with_dom(dom, document, host, config), log)
}

pub fn builder_for(executor: &TreeOpExecutor<TestHost>) -> TreeOpBuilder {
    TreeOpBuilder::new(executor.handle_allocator())
}

/// Hand `builder`'s batch to the executor and flush once.
pub fn flush(executor: &mut TreeOpExecutor<TestHost>, builder: &mut TreeOpBuilder) -> FlushOutcome {
    builder.flush_to(executor);
    executor.run_flush_loop()
}

pub fn document(executor: &TreeOpExecutor<TestHost>) -> NodeId {
    executor.document().expect("executor document")
}

/// Local names and text of `node`'s children, in order.
pub fn child_labels(dom: &Dom, node: NodeId) -> Vec<String> {
    dom.children(node)
        .iter()
        .map(|child| match dom.kind(*child) {
            Some(NodeKind::Element(data)) => format!("<{}>", data.name),
            Some(NodeKind::Text(text)) => format!("{text:?}"),
            Some(NodeKind::Comment(text)) => format!("<!--{text}-->"),
            Some(NodeKind::Doctype { name, .. }) => format!("<!DOCTYPE {name}>"),
            Some(NodeKind::Document(_)) => "#document".to_string(),
            None => "?".to_string(),
        })
        .collect()
}

pub fn begin_end_count(records: &[MutationRecord], document: NodeId) -> (usize, usize) {
    let begins = records
        .iter()
        .filter(|r| matches!(r, MutationRecord::BeginUpdate { document: d } if *d == document))
        .count();
    let ends = records
        .iter()
        .filter(|r| matches!(r, MutationRecord::EndUpdate { document: d } if *d == document))
        .count();
    (begins, ends)
}

pub fn appended(records: &[MutationRecord]) -> Vec<(NodeId, usize)> {
    records
        .iter()
        .filter_map(|r| match r {
            MutationRecord::ContentAppended {
                container,
                first_new_index,
            } => Some((*container, *first_new_index)),
            _ => None,
        })
        .collect()
}

/// Indented dump of the subtree under `root`, attributes in stored order.
pub fn outline(dom: &Dom, root: NodeId) -> Vec<String> {
    fn walk(dom: &Dom, node: NodeId, depth: usize, out: &mut Vec<String>) {
        let indent = "  ".repeat(depth);
        let line = match dom.kind(node) {
            Some(NodeKind::Element(data)) => {
                let mut line = format!("{indent}<{}", data.name);
                for attr in &data.attributes {
                    line.push_str(&format!(" {}=\"{}\"", attr.name, attr.value));
                }
                line.push('>');
                line
            }
            Some(NodeKind::Text(text)) => format!("{indent}{text:?}"),
            Some(NodeKind::Comment(text)) => format!("{indent}<!--{text}-->"),
            Some(NodeKind::Doctype { name, .. }) => format!("{indent}<!DOCTYPE {name}>"),
            Some(NodeKind::Document(_)) => format!("{indent}#document"),
            None => format!("{indent}?"),
        };
        out.push(line);
        for child in dom.children(node) {
            walk(dom, *child, depth + 1, out);
        }
    }
    let mut out = Vec::new();
    walk(dom, root, 0, &mut out);
    out
}

pub fn attrs(pairs: &[(&str, &str)]) -> html::AttributeSet {
    pairs
        .iter()
        .map(|(name, value)| html::Attribute::new(*name, *value))
        .collect::<Vec<_>>()
        .into()
}

pub fn position(records: &[MutationRecord], wanted: &MutationRecord) -> usize {
    records
        .iter()
        .position(|r| r == wanted)
        .unwrap_or_else(|| panic!("{wanted:?} not in {records:#?}"))
}

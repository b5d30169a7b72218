//! Collaborators the executor calls out to.
//!
//! Every method has a default so embedders and tests implement only the
//! parts they care about. Hosts never receive mutable DOM access: scripts see
//! the tree read-only and write back through a [`DocumentWriter`].

use url::Url;

use crate::builder::DocumentWriter;
use crate::dom::{Dom, NodeId};
use crate::types::CharsetSource;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScriptExecution {
    Completed,
    /// The script is waiting on a load; the parser stays blocked until
    /// [`TreeOpExecutor::unblock_parser`](super::TreeOpExecutor::unblock_parser).
    Blocked,
}

/// Work that must not run inside a document update.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeferredTask {
    DocElementCreated { document: NodeId },
    SvgLoad { element: NodeId },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CharsetComplaint {
    pub key: String,
    pub error: bool,
    pub line_number: u32,
}

/// Content the form processor supplies for a `<keygen>` stand-in.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct KeygenContent {
    pub options: Vec<String>,
    pub moz_type: String,
}

pub trait ScriptHost {
    /// Run a parser-inserted script. Any `document.write` output goes through
    /// `writer` and is parsed before the rest of the queue.
    fn execute(&mut self, script: NodeId, dom: &Dom, writer: &mut DocumentWriter) -> ScriptExecution {
        let _ = (script, dom, writer);
        ScriptExecution::Completed
    }

    fn schedule_async_defer(&mut self, script: NodeId) {
        let _ = script;
    }
}

pub trait PreloadHost {
    fn preload_script(&mut self, url: &Url, charset: Option<&str>, mime_type: Option<&str>) {
        let _ = (url, charset, mime_type);
    }

    fn preload_style(&mut self, url: &Url, charset: Option<&str>) {
        let _ = (url, charset);
    }

    fn preload_image(&mut self, url: &Url) {
        let _ = url;
    }
}

pub trait DocumentHost {
    fn update_style_sheet(&mut self, element: NodeId) {
        let _ = element;
    }

    fn process_meta(&mut self, element: NodeId) {
        let _ = element;
    }

    fn process_offline_manifest(&mut self, url: &Url) {
        let _ = url;
    }

    fn start_layout(&mut self) {}

    fn did_build_model(&mut self, terminated: bool) {
        let _ = terminated;
    }

    /// Ask the embedder to restart the load with `encoding`. Returning `true`
    /// means the reload was accepted and this parse is abandoned.
    fn reload_with_encoding(
        &mut self,
        encoding: &'static encoding_rs::Encoding,
        source: CharsetSource,
    ) -> bool {
        let _ = (encoding, source);
        false
    }

    fn report_charset_complaint(&mut self, complaint: CharsetComplaint) {
        let _ = complaint;
    }

    fn run_deferred(&mut self, task: DeferredTask) {
        let _ = task;
    }
}

pub trait ServiceHost {
    /// `None` when the lookup fails; an empty string is a valid translation.
    fn localized_string(&mut self, key: &str) -> Option<String> {
        let _ = key;
        None
    }

    fn format_localized_string(&mut self, key: &str, params: &[&str]) -> Option<String> {
        let _ = (key, params);
        None
    }

    fn keygen_content(&mut self) -> Option<KeygenContent> {
        None
    }
}

pub trait ExecutorHost: ScriptHost + PreloadHost + DocumentHost + ServiceHost {}

impl<T> ExecutorHost for T where T: ScriptHost + PreloadHost + DocumentHost + ServiceHost {}

/// Host that accepts every callback and does nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullHost;

impl ScriptHost for NullHost {}
impl PreloadHost for NullHost {}
impl DocumentHost for NullHost {}
impl ServiceHost for NullHost {}

use std::sync::Arc;

use super::NodeId;
use crate::types::{Attribute, CharsetSource, DocumentMode, ElementCreator, Namespace};

pub(super) struct NodeRecord {
    pub(super) kind: NodeKind,
    pub(super) owner: NodeId,
    pub(super) parent: Option<NodeId>,
    pub(super) children: Vec<NodeId>,
}

impl NodeRecord {
    pub(super) fn allows_children(&self) -> bool {
        matches!(self.kind, NodeKind::Document(_) | NodeKind::Element(_))
    }
}

pub enum NodeKind {
    Document(DocumentData),
    Doctype {
        name: Arc<str>,
        public_id: String,
        system_id: String,
    },
    Element(ElementData),
    Text(String),
    Comment(String),
}

#[derive(Debug, Default)]
pub struct DocumentData {
    pub charset: Option<&'static encoding_rs::Encoding>,
    pub charset_source: CharsetSource,
    pub mode: DocumentMode,
    pub(super) update_depth: u32,
}

impl DocumentData {
    pub fn update_depth(&self) -> u32 {
        self.update_depth
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ScriptState {
    pub prevent_execution: bool,
    pub malformed: bool,
    pub line_number: Option<u32>,
    /// `src`/`async`/`defer` are no longer re-read once frozen.
    pub frozen: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StyleLinkState {
    pub updates_enabled: bool,
    pub line_number: Option<u32>,
}

pub struct ElementData {
    pub ns: Namespace,
    pub name: Arc<str>,
    pub attributes: Vec<Attribute>,
    pub creator: ElementCreator,
    pub script: Option<ScriptState>,
    pub style_link: Option<StyleLinkState>,
    pub form_owner: Option<NodeId>,
    /// `Some(have_notified)` once the parser is done adding children.
    pub done_adding_children: Option<bool>,
    pub done_creating: bool,
}

impl ElementData {
    pub(super) fn new(ns: Namespace, name: Arc<str>, creator: ElementCreator) -> Self {
        let script = is_script(ns, &name).then(ScriptState::default);
        Self {
            ns,
            name,
            attributes: Vec::new(),
            creator,
            script,
            style_link: None,
            form_owner: None,
            done_adding_children: None,
            done_creating: false,
        }
    }

    pub fn is(&self, ns: Namespace, local: &str) -> bool {
        self.ns == ns && &*self.name == local
    }

    pub fn attr(&self, ns: Namespace, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.ns == ns && &*a.name == name)
            .map(|a| a.value.as_str())
    }

    /// Elements whose form owner is set by the parser.
    pub fn is_form_associated(&self) -> bool {
        self.ns == Namespace::Html
            && matches!(
                &*self.name,
                "button"
                    | "fieldset"
                    | "input"
                    | "keygen"
                    | "object"
                    | "output"
                    | "select"
                    | "textarea"
            )
    }
}

fn is_script(ns: Namespace, name: &str) -> bool {
    matches!(ns, Namespace::Html | Namespace::Svg) && name == "script"
}

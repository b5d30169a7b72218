//! TOML op scripts with an expected DOM snapshot.
//!
//! ```toml
//! format = "html-ops-v1"
//! description = "duplicate attribute keeps the first value"
//! expected = """
//! #document
//!   <div class="a">
//! """
//!
//! [[op]]
//! kind = "create_element"
//! handle = 1
//! name = "div"
//! attrs = [["class", "a"], ["class", "b"]]
//!
//! [[op]]
//! kind = "append_to_document"
//! node = 1
//! ```
//!
//! Top-level keys must precede the first `[[op]]` table. Handles are plain
//! integers; `0` is reserved.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use html::{
    Attribute, AttributeSet, DocumentMode, Namespace, NodeHandle, OpSource, TreeOperation,
};
use serde::Deserialize;

pub const OP_FIXTURE_FORMAT_V1: &str = "html-ops-v1";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OpFixture {
    pub format: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub config: FixtureConfig,
    #[serde(rename = "op", default)]
    pub ops: Vec<FixtureOp>,
    pub expected: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FixtureConfig {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub fragment_parser: bool,
    #[serde(default)]
    pub view_source: bool,
}

#[derive(Clone, Copy, Debug, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FixtureNs {
    #[default]
    Html,
    Svg,
    Math,
}

impl From<FixtureNs> for Namespace {
    fn from(ns: FixtureNs) -> Self {
        match ns {
            FixtureNs::Html => Namespace::Html,
            FixtureNs::Svg => Namespace::Svg,
            FixtureNs::Math => Namespace::MathMl,
        }
    }
}

#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FixtureMode {
    NoQuirks,
    LimitedQuirks,
    Quirks,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FixtureOp {
    CreateElement {
        handle: u32,
        name: String,
        #[serde(default)]
        ns: FixtureNs,
        #[serde(default)]
        attrs: Vec<(String, String)>,
        #[serde(default)]
        from_script: bool,
    },
    Append {
        node: u32,
        parent: u32,
    },
    AppendToDocument {
        node: u32,
    },
    Detach {
        node: u32,
    },
    AppendChildrenToNewParent {
        old_parent: u32,
        new_parent: u32,
    },
    FosterParent {
        node: u32,
        table: u32,
        stack_parent: u32,
    },
    FosterParentText {
        text: String,
        table: u32,
        stack_parent: u32,
    },
    AddAttributes {
        node: u32,
        attrs: Vec<(String, String)>,
    },
    AppendText {
        parent: u32,
        text: String,
    },
    AppendComment {
        parent: u32,
        text: String,
    },
    AppendCommentToDocument {
        text: String,
    },
    AppendDoctype {
        name: String,
        #[serde(default)]
        public_id: String,
        #[serde(default)]
        system_id: String,
    },
    DocumentMode {
        mode: FixtureMode,
    },
    FlushNotifications,
    AddClass {
        node: u32,
        class: String,
    },
    AddLineNumberId {
        node: u32,
        line: u32,
    },
    AddViewSourceHref {
        node: u32,
        href: String,
    },
}

fn handle(raw: u32) -> NodeHandle {
    assert!(raw != 0, "fixture handle 0 is reserved");
    NodeHandle(raw)
}

fn attribute_set(attrs: Vec<(String, String)>) -> AttributeSet {
    attrs
        .into_iter()
        .map(|(name, value)| Attribute::new(name, value))
        .collect::<Vec<_>>()
        .into()
}

impl FixtureOp {
    pub fn into_tree_op(self) -> TreeOperation {
        match self {
            FixtureOp::CreateElement {
                handle: raw,
                name,
                ns,
                attrs,
                from_script,
            } => TreeOperation::CreateElement {
                handle: handle(raw),
                ns: ns.into(),
                name: Arc::from(name),
                attributes: attribute_set(attrs),
                source: if from_script {
                    OpSource::NotNetwork
                } else {
                    OpSource::Network
                },
            },
            FixtureOp::Append { node, parent } => TreeOperation::Append {
                node: handle(node),
                parent: handle(parent),
            },
            FixtureOp::AppendToDocument { node } => TreeOperation::AppendToDocument {
                node: handle(node),
            },
            FixtureOp::Detach { node } => TreeOperation::Detach { node: handle(node) },
            FixtureOp::AppendChildrenToNewParent {
                old_parent,
                new_parent,
            } => TreeOperation::AppendChildrenToNewParent {
                old_parent: handle(old_parent),
                new_parent: handle(new_parent),
            },
            FixtureOp::FosterParent {
                node,
                table,
                stack_parent,
            } => TreeOperation::FosterParent {
                node: handle(node),
                table: handle(table),
                stack_parent: handle(stack_parent),
            },
            FixtureOp::FosterParentText {
                text,
                table,
                stack_parent,
            } => TreeOperation::FosterParentText {
                text,
                table: handle(table),
                stack_parent: handle(stack_parent),
            },
            FixtureOp::AddAttributes { node, attrs } => TreeOperation::AddAttributes {
                node: handle(node),
                attributes: attribute_set(attrs),
            },
            FixtureOp::AppendText { parent, text } => TreeOperation::AppendText {
                parent: handle(parent),
                text,
            },
            FixtureOp::AppendComment { parent, text } => TreeOperation::AppendComment {
                parent: handle(parent),
                text,
            },
            FixtureOp::AppendCommentToDocument { text } => {
                TreeOperation::AppendCommentToDocument { text }
            }
            FixtureOp::AppendDoctype {
                name,
                public_id,
                system_id,
            } => TreeOperation::AppendDoctypeToDocument {
                name: Arc::from(name),
                public_id,
                system_id,
            },
            FixtureOp::DocumentMode { mode } => TreeOperation::DocumentMode {
                mode: match mode {
                    FixtureMode::NoQuirks => DocumentMode::NoQuirks,
                    FixtureMode::LimitedQuirks => DocumentMode::LimitedQuirks,
                    FixtureMode::Quirks => DocumentMode::Quirks,
                },
            },
            FixtureOp::FlushNotifications => TreeOperation::FlushPendingAppendNotifications,
            FixtureOp::AddClass { node, class } => TreeOperation::AddClass {
                node: handle(node),
                class: Arc::from(class),
            },
            FixtureOp::AddLineNumberId { node, line } => TreeOperation::AddLineNumberId {
                node: handle(node),
                line_number: line,
            },
            FixtureOp::AddViewSourceHref { node, href } => TreeOperation::AddViewSourceHref {
                node: handle(node),
                href,
            },
        }
    }
}

impl OpFixture {
    pub fn expected_lines(&self) -> Vec<String> {
        self.expected
            .lines()
            .map(str::trim_end)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn tree_ops(self) -> Vec<TreeOperation> {
        self.ops.into_iter().map(FixtureOp::into_tree_op).collect()
    }
}

pub fn load_op_fixture(path: &Path) -> OpFixture {
    let content = fs::read_to_string(path)
        .unwrap_or_else(|err| panic!("failed to read op fixture {path:?}: {err}"));
    let fixture: OpFixture = toml::from_str(&content)
        .unwrap_or_else(|err| panic!("failed to parse op fixture {path:?}: {err}"));
    assert_eq!(
        fixture.format, OP_FIXTURE_FORMAT_V1,
        "unsupported format in {path:?}"
    );
    let expected = fixture.expected_lines();
    assert!(
        expected.first().is_some_and(|line| line.starts_with("#document")),
        "expected snapshot in {path:?} must start with #document"
    );
    fixture
}

/// Every `*.toml` under `dir`, sorted by file name.
pub fn fixture_paths(dir: &Path) -> Vec<PathBuf> {
    let entries =
        fs::read_dir(dir).unwrap_or_else(|err| panic!("failed to list fixtures in {dir:?}: {err}"));
    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.extension().is_some_and(|ext| ext == "toml"))
        .collect();
    paths.sort();
    paths
}

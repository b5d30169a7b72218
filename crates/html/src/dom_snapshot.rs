use crate::dom::{Dom, NodeId, NodeKind};
use std::fmt::{self, Write};

/// Deterministic serialization of an arena subtree for tests and fixtures.
/// Not a public stable format.
///
/// Line shapes, indented two spaces per level:
/// - `#document` (with ` mode=quirks` when not in no-quirks mode)
/// - `<!DOCTYPE name "public" "system">`
/// - `<div class="a">`, `<svg:circle xlink:href="#x">`
/// - `"text"`
/// - `<!-- comment -->`
#[derive(Clone, Copy, Debug, Default)]
pub struct DomSnapshotOptions {
    /// Append ` #<arena index>` to every line.
    pub include_ids: bool,
}

#[derive(Debug)]
pub struct DomSnapshot {
    lines: Vec<String>,
}

impl DomSnapshot {
    pub fn new(dom: &Dom, root: NodeId, options: DomSnapshotOptions) -> Self {
        let mut lines = Vec::new();
        walk_snapshot(dom, root, &options, 0, &mut lines);
        Self { lines }
    }

    pub fn as_lines(&self) -> &[String] {
        &self.lines
    }

    pub fn render(&self) -> String {
        self.lines.join("\n")
    }
}

impl fmt::Display for DomSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, line) in self.lines.iter().enumerate() {
            if i != 0 {
                f.write_str("\n")?;
            }
            f.write_str(line)?;
        }
        Ok(())
    }
}

/// Panics with both renderings when the subtree under `root` differs from `expected`.
pub fn assert_snapshot(dom: &Dom, root: NodeId, expected: &[&str]) {
    let actual = DomSnapshot::new(dom, root, DomSnapshotOptions::default());
    let expected: Vec<String> = expected.iter().map(|s| s.to_string()).collect();
    if actual.as_lines() != expected.as_slice() {
        panic!(
            "DOM snapshot mismatch\nexpected:\n{}\nactual:\n{}",
            expected.join("\n"),
            actual.render()
        );
    }
}

fn walk_snapshot(
    dom: &Dom,
    node: NodeId,
    options: &DomSnapshotOptions,
    indent_level: usize,
    out: &mut Vec<String>,
) {
    const INDENT_STEP: usize = 2;
    let mut line = " ".repeat(indent_level.saturating_mul(INDENT_STEP));
    write_node_line(&mut line, dom, node);
    if options.include_ids {
        let _ = write!(line, " #{}", node.index());
    }
    out.push(line);
    for child in dom.children(node) {
        walk_snapshot(dom, *child, options, indent_level + 1, out);
    }
}

fn write_node_line(out: &mut String, dom: &Dom, node: NodeId) {
    let Some(kind) = dom.kind(node) else {
        out.push_str("#missing");
        return;
    };
    match kind {
        NodeKind::Document(data) => {
            out.push_str("#document");
            match data.mode {
                crate::types::DocumentMode::NoQuirks => {}
                crate::types::DocumentMode::LimitedQuirks => out.push_str(" mode=limited-quirks"),
                crate::types::DocumentMode::Quirks => out.push_str(" mode=quirks"),
            }
        }
        NodeKind::Doctype {
            name,
            public_id,
            system_id,
        } => {
            out.push_str("<!DOCTYPE ");
            out.push_str(name);
            if !public_id.is_empty() || !system_id.is_empty() {
                out.push_str(" \"");
                write_escaped(out, public_id);
                out.push_str("\" \"");
                write_escaped(out, system_id);
                out.push('"');
            }
            out.push('>');
        }
        NodeKind::Element(element) => {
            out.push('<');
            write_qualified(out, element.ns.snapshot_prefix(), &element.name);
            for attr in &element.attributes {
                out.push(' ');
                write_qualified(out, attr.ns.snapshot_prefix(), &attr.name);
                out.push_str("=\"");
                write_escaped(out, &attr.value);
                out.push('"');
            }
            out.push('>');
        }
        NodeKind::Text(text) => {
            out.push('"');
            write_escaped(out, text);
            out.push('"');
        }
        NodeKind::Comment(text) => {
            out.push_str("<!-- ");
            write_escaped(out, text);
            out.push_str(" -->");
        }
    }
}

fn write_qualified(out: &mut String, prefix: &str, local: &str) {
    if !prefix.is_empty() {
        out.push_str(prefix);
        out.push(':');
    }
    out.push_str(local);
}

fn write_escaped(out: &mut String, value: &str) {
    for ch in value.chars() {
        match ch {
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            _ if ch.is_ascii() => out.push(ch),
            _ => {
                let _ = write!(out, "\\u{{{:X}}}", ch as u32);
            }
        }
    }
}

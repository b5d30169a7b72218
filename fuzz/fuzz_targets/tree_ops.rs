#![no_main]

//! Random op sequences against a live executor.
//!
//! Every op only names handles that are already bound, and only detached
//! nodes are inserted, so any panic is a real executor or DOM bug.

use std::sync::Arc;

use html::{
    Attribute, AttributeSet, CharsetSource, DocumentMode, ExecutorConfig, FlushState, Namespace,
    NodeHandle, NullHost, OpSource, TreeOpExecutor, TreeOpSink, TreeOperation,
};
use libfuzzer_sys::fuzz_target;
use url::Url;

const NAMES: [(Namespace, &str); 10] = [
    (Namespace::Html, "div"),
    (Namespace::Html, "p"),
    (Namespace::Html, "table"),
    (Namespace::Html, "script"),
    (Namespace::Html, "style"),
    (Namespace::Html, "keygen"),
    (Namespace::Html, "form"),
    (Namespace::Html, "input"),
    (Namespace::Svg, "svg"),
    (Namespace::MathMl, "math"),
];

const TEXTS: [&str; 4] = ["", "a", "text ", "\u{fffd}"];

struct Input<'a> {
    data: &'a [u8],
}

impl Input<'_> {
    fn byte(&mut self) -> Option<u8> {
        let (first, rest) = self.data.split_first()?;
        self.data = rest;
        Some(*first)
    }

    fn pick<T: Copy>(&mut self, items: &[T]) -> Option<T> {
        if items.is_empty() {
            return None;
        }
        let idx = self.byte()? as usize % items.len();
        Some(items[idx])
    }
}

struct Driver {
    exec: TreeOpExecutor<NullHost>,
    handles: Vec<NodeHandle>,
}

impl Driver {
    fn free_handles(&self) -> Vec<NodeHandle> {
        self.handles
            .iter()
            .copied()
            .filter(|h| {
                self.exec
                    .node_for(*h)
                    .is_some_and(|id| self.exec.dom().parent(id).is_none())
            })
            .collect()
    }

    fn attributes(input: &mut Input<'_>) -> AttributeSet {
        let count = input.byte().unwrap_or(0) % 4;
        (0..count)
            .map(|i| {
                let name = if i % 2 == 0 { "class" } else { "form" };
                Attribute::new(name, TEXTS[i as usize % TEXTS.len()])
            })
            .collect::<Vec<_>>()
            .into()
    }

    fn next_op(&mut self, input: &mut Input<'_>) -> Option<TreeOperation> {
        let opcode = input.byte()?;
        let any = self.handles.clone();
        let op = match opcode {
            254 => {
                self.handles.clear();
                TreeOperation::StreamEnded
            }
            255 => TreeOperation::MarkAsBroken,
            _ => match opcode % 16 {
                0 | 1 => {
                    let (ns, name) = input.pick(&NAMES)?;
                    let handle = self.exec.handle_allocator().allocate();
                    self.handles.push(handle);
                    TreeOperation::CreateElement {
                        handle,
                        ns,
                        name: Arc::from(name),
                        attributes: Self::attributes(input),
                        source: if opcode % 2 == 0 {
                            OpSource::Network
                        } else {
                            OpSource::NotNetwork
                        },
                    }
                }
                2 | 3 => TreeOperation::Append {
                    node: input.pick(&self.free_handles())?,
                    parent: input.pick(&any)?,
                },
                4 => TreeOperation::AppendToDocument {
                    node: input.pick(&self.free_handles())?,
                },
                5 => TreeOperation::Detach {
                    node: input.pick(&any)?,
                },
                6 => TreeOperation::AppendChildrenToNewParent {
                    old_parent: input.pick(&any)?,
                    new_parent: input.pick(&any)?,
                },
                7 => TreeOperation::FosterParent {
                    node: input.pick(&self.free_handles())?,
                    table: input.pick(&any)?,
                    stack_parent: input.pick(&any)?,
                },
                8 => TreeOperation::AppendText {
                    parent: input.pick(&any)?,
                    text: input.pick(&TEXTS)?.to_string(),
                },
                9 => TreeOperation::FosterParentText {
                    text: input.pick(&TEXTS)?.to_string(),
                    table: input.pick(&any)?,
                    stack_parent: input.pick(&any)?,
                },
                10 => TreeOperation::AddAttributes {
                    node: input.pick(&any)?,
                    attributes: Self::attributes(input),
                },
                11 => TreeOperation::AppendComment {
                    parent: input.pick(&any)?,
                    text: input.pick(&TEXTS)?.to_string(),
                },
                12 => TreeOperation::RunScript {
                    script: input.pick(&any)?,
                    snapshot: None,
                },
                13 => TreeOperation::SetFormElement {
                    node: input.pick(&any)?,
                    form: input.pick(&any)?,
                },
                14 => TreeOperation::DoneAddingChildren {
                    node: input.pick(&any)?,
                },
                _ => match input.byte()? % 4 {
                    0 => TreeOperation::FlushPendingAppendNotifications,
                    1 => TreeOperation::StartLayout,
                    2 => TreeOperation::DocumentMode {
                        mode: DocumentMode::Quirks,
                    },
                    _ => TreeOperation::NeedsCharsetSwitchTo {
                        label: "utf-8".to_string(),
                        source: CharsetSource::MetaTag,
                        line_number: 1,
                    },
                },
            },
        };
        Some(op)
    }

    fn check(&self) {
        assert_eq!(self.exec.flush_state(), FlushState::NotFlushing);
        let Some(doc) = self.exec.document() else {
            return;
        };
        let dom = self.exec.dom();
        assert_eq!(dom.document(doc).map(|d| d.update_depth()), Some(0));
        let mut stack = vec![doc];
        while let Some(node) = stack.pop() {
            for child in dom.children(node) {
                assert_eq!(dom.parent(*child), Some(node));
                assert_eq!(dom.owner_document(*child), Some(doc));
                stack.push(*child);
            }
        }
    }
}

fuzz_target!(|data: &[u8]| {
    let url = Url::parse("https://fuzz.example/page.html").expect("static url");
    let config = ExecutorConfig::new(url).with_flush_budget(Some(4));
    let Ok(exec) = TreeOpExecutor::new(NullHost, config) else {
        return;
    };
    let mut driver = Driver {
        exec,
        handles: Vec::new(),
    };
    let mut input = Input { data };
    while !input.data.is_empty() {
        let Some(op) = driver.next_op(&mut input) else {
            continue;
        };
        driver.exec.move_ops_from(&mut vec![op]);
        driver.exec.run_flush_loop();
        driver.check();
    }
});

//! Value types shared by the producer and the executor.
//!
//! Everything here is plain data: cheap to clone, `Send`, and free of live
//! tree references, so it can cross the producer/consumer boundary inside
//! tree operations.

use std::sync::Arc;

/// Producer-side node slot.
///
/// Handles are allocated before the node they name exists; the executor maps
/// them to arena nodes when the creating operation runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeHandle(pub u32);

impl NodeHandle {
    /// Reserved sentinel; never handed out by an allocator.
    pub const INVALID: NodeHandle = NodeHandle(0);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Namespace {
    None,
    Html,
    Svg,
    MathMl,
    XLink,
    Xml,
    Xmlns,
}

impl Namespace {
    /// Short label used by snapshots (`svg`, `math`, ...). Empty for HTML/none.
    pub fn snapshot_prefix(self) -> &'static str {
        match self {
            Namespace::None | Namespace::Html => "",
            Namespace::Svg => "svg",
            Namespace::MathMl => "math",
            Namespace::XLink => "xlink",
            Namespace::Xml => "xml",
            Namespace::Xmlns => "xmlns",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Attribute {
    pub ns: Namespace,
    pub name: Arc<str>,
    pub prefix: Option<Arc<str>>,
    pub value: String,
}

impl Attribute {
    pub fn new(name: impl Into<Arc<str>>, value: impl Into<String>) -> Self {
        Self {
            ns: Namespace::None,
            name: name.into(),
            prefix: None,
            value: value.into(),
        }
    }

    pub fn with_ns(
        ns: Namespace,
        prefix: Option<Arc<str>>,
        name: impl Into<Arc<str>>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            ns,
            name: name.into(),
            prefix,
            value: value.into(),
        }
    }
}

/// Attribute list in source order, duplicates included.
///
/// Deduplication is the applier's job (first occurrence wins).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AttributeSet(Vec<Attribute>);

impl AttributeSet {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, attr: Attribute) {
        self.0.push(attr);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Attribute> {
        self.0.iter()
    }
}

impl From<Vec<Attribute>> for AttributeSet {
    fn from(attrs: Vec<Attribute>) -> Self {
        Self(attrs)
    }
}

impl IntoIterator for AttributeSet {
    type Item = Attribute;
    type IntoIter = std::vec::IntoIter<Attribute>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a AttributeSet {
    type Item = &'a Attribute;
    type IntoIter = std::slice::Iter<'a, Attribute>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DocumentMode {
    #[default]
    NoQuirks,
    LimitedQuirks,
    Quirks,
}

/// Where an element came from; later behavior (scripting, noscript) branches on it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ElementCreator {
    Network,
    Fragment,
    DocumentWrite,
}

/// Provenance recorded on `CreateElement` by the producer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OpSource {
    Network,
    NotNetwork,
}

/// How confident the parser is about a document's character encoding.
///
/// Ordered from weakest to strongest.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum CharsetSource {
    #[default]
    Uninitialized,
    Fallback,
    AutoDetection,
    MetaPrescan,
    MetaTag,
    ByteOrderMark,
    Channel,
    UserForced,
}

pub type SessionId = u64;
pub type RequestId = u64;

/// Kind of subresource a parser may ask the network layer to fetch ahead of use.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Script,
    Style,
    Image,
    Manifest,
}

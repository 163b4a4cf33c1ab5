//! Small newtypes shared by the registry and node binaries.

use std::fmt::Display;

/// A node's identity in the overlay, drawn from `[0,127]`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub i32);

impl NodeId {
    pub const MAX_NODES: i32 = 128;
}

impl Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i32> for NodeId {
    fn from(value: i32) -> Self {
        Self(value)
    }
}

impl From<NodeId> for i32 {
    fn from(value: NodeId) -> Self {
        value.0
    }
}

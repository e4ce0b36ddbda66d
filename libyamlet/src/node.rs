//! The node graph built by the composer.
//!
//! Nodes of one document live in an arena and refer to each other by
//! [`NodeId`]. An alias is the same `NodeId` as its anchor, so shared and
//! cyclic structures need no reference counting.

use std::ops::Index;

use crate::event::FlowStyle;
use crate::mark::Mark;
use crate::token::ScalarStyle;

/// Standard tags of the failsafe, JSON and core schemas.
pub mod tags {
    pub const STR: &str = "tag:yaml.org,2002:str";
    pub const INT: &str = "tag:yaml.org,2002:int";
    pub const FLOAT: &str = "tag:yaml.org,2002:float";
    pub const BOOL: &str = "tag:yaml.org,2002:bool";
    pub const NULL: &str = "tag:yaml.org,2002:null";
    pub const SEQ: &str = "tag:yaml.org,2002:seq";
    pub const MAP: &str = "tag:yaml.org,2002:map";
}

/// Index of a node in its [`Document`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeKind {
    Scalar {
        value: String,
        style: ScalarStyle,
    },
    Sequence {
        items: Vec<NodeId>,
        flow_style: FlowStyle,
    },
    /// Pairs in source order; duplicate keys are kept.
    Mapping {
        pairs: Vec<(NodeId, NodeId)>,
        flow_style: FlowStyle,
    },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Node {
    /// The resolved tag.
    pub tag: String,
    pub kind: NodeKind,
    pub start_mark: Mark,
    pub end_mark: Mark,
    /// Set when an alias inside this node refers back to it.
    pub recursive: bool,
}

impl Node {
    pub fn is_scalar(&self) -> bool {
        matches!(self.kind, NodeKind::Scalar { .. })
    }

    /// The text of a scalar node.
    pub fn as_str(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Scalar { value, .. } => Some(value),
            _ => None,
        }
    }

    pub fn items(&self) -> Option<&[NodeId]> {
        match &self.kind {
            NodeKind::Sequence { items, .. } => Some(items),
            _ => None,
        }
    }

    pub fn pairs(&self) -> Option<&[(NodeId, NodeId)]> {
        match &self.kind {
            NodeKind::Mapping { pairs, .. } => Some(pairs),
            _ => None,
        }
    }
}

/// One composed document: a node arena plus its root.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Document {
    nodes: Vec<Node>,
    root: NodeId,
}

impl Document {
    pub(crate) fn new(nodes: Vec<Node>, root: NodeId) -> Self {
        Self { nodes, root }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn root_node(&self) -> &Node {
        &self[self.root]
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes.iter().enumerate().map(|(i, n)| (NodeId(i), n))
    }

    /// Look up a mapping value by the text of a scalar key. Returns the
    /// first match when keys repeat.
    pub fn get_value(&self, mapping: NodeId, key: &str) -> Option<NodeId> {
        self.get(mapping)?
            .pairs()?
            .iter()
            .find(|(k, _)| self.get(*k).and_then(Node::as_str) == Some(key))
            .map(|(_, v)| *v)
    }
}

impl Index<NodeId> for Document {
    type Output = Node;

    fn index(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }
}

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::identity::Identity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    /// Authored locally.
    Sent,
    Recv,
}

/// A single rendered transcript entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Node {
    /// Sender label that heads a run of messages from one remote sender.
    Label { sender: Identity },
    Message {
        /// Inserted as provided; never sanitized.
        body: String,
        kind: MessageKind,
        /// Captured when the message was rendered, not when it was sent.
        created_at: DateTime<Utc>,
    },
    Info { text: String },
}

impl Node {
    pub fn is_label(&self) -> bool {
        matches!(self, Node::Label { .. })
    }
}

/// Append-only sequence of rendered nodes. Nodes are never removed or
/// mutated once pushed.
#[derive(Debug, Default, Clone)]
pub struct Transcript {
    nodes: Vec<Node>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, node: Node) {
        self.nodes.push(node);
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nodes appended after the first `seen` nodes.
    pub fn since(&self, seen: usize) -> &[Node] {
        &self.nodes[seen.min(self.nodes.len())..]
    }
}

use crate::identity::Identity;
use crate::node::{MessageKind, Node};

/// Text shown on a sender label.
pub fn label_text(sender: &Identity) -> String {
    format!("User {}", sender)
}

/// Render one node as a line of plain text.
///
/// Sent messages are marked with `>`; timestamps (`HH:MM:SS`, UTC) are
/// prefixed to messages only when `show_timestamps` is set.
pub fn format_node(node: &Node, show_timestamps: bool) -> String {
    match node {
        Node::Label { sender } => label_text(sender),
        Node::Message {
            body,
            kind,
            created_at,
        } => {
            let stamp = if show_timestamps {
                format!("[{}] ", created_at.format("%H:%M:%S"))
            } else {
                String::new()
            };
            match kind {
                MessageKind::Sent => format!("  {}> {}", stamp, body),
                MessageKind::Recv => format!("  {}{}", stamp, body),
            }
        }
        Node::Info { text } => format!("-- {} --", text),
    }
}

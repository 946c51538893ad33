mod format;
mod identity;
mod node;
mod renderer;

pub use format::{format_node, label_text};
pub use identity::{Identity, Sender};
pub use node::{MessageKind, Node, Transcript};
pub use renderer::Renderer;

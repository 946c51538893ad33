use chrono::Utc;

use crate::identity::{Identity, Sender};
use crate::node::{MessageKind, Node, Transcript};

/// The most recent sender boundary in the transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Run {
    /// Nothing rendered yet.
    Start,
    Local,
    Remote(Identity),
    Unattributed,
    /// An info entry; the next remote message starts a fresh run.
    Info,
}

/// Owns the transcript and decides where sender labels go.
///
/// Instead of inspecting rendered output, the renderer remembers the last run
/// it produced. A label for sender `S` is emitted only when the last run is
/// not already a run of `S`; local messages never carry a label and always
/// end the current run.
#[derive(Debug)]
pub struct Renderer {
    transcript: Transcript,
    last_run: Run,
    /// Lines the view is scrolled away from the newest entry.
    scroll_back: usize,
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer {
    pub fn new() -> Self {
        Self {
            transcript: Transcript::new(),
            last_run: Run::Start,
            scroll_back: 0,
        }
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Append a message, preceded by a label when it opens a new remote run.
    pub fn render(&mut self, body: impl Into<String>, sender: Sender) {
        let (kind, run) = match sender {
            Sender::Local => (MessageKind::Sent, Run::Local),
            Sender::Remote(id) => {
                if self.last_run != Run::Remote(id.clone()) {
                    self.transcript.push(Node::Label { sender: id.clone() });
                }
                (MessageKind::Recv, Run::Remote(id))
            }
            Sender::Unattributed => (MessageKind::Recv, Run::Unattributed),
        };

        self.transcript.push(Node::Message {
            body: body.into(),
            kind,
            created_at: Utc::now(),
        });
        self.last_run = run;
        self.scroll_to_newest();
    }

    /// Append an informational entry. Never labeled.
    pub fn info(&mut self, text: impl Into<String>) {
        self.transcript.push(Node::Info { text: text.into() });
        self.last_run = Run::Info;
        self.scroll_to_newest();
    }

    pub fn scroll_back(&self) -> usize {
        self.scroll_back
    }

    pub fn scroll_up(&mut self, lines: usize) {
        self.scroll_back = self.scroll_back.saturating_add(lines);
    }

    pub fn scroll_down(&mut self, lines: usize) {
        self.scroll_back = self.scroll_back.saturating_sub(lines);
    }

    pub fn scroll_to_newest(&mut self) {
        self.scroll_back = 0;
    }
}

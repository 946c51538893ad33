//! Session controller: identity lifecycle, inbound frame handling, and the
//! input-field / file-reader event handlers.
//!
//! One `Session` exists per connection. All of its handlers run on the
//! client's single event loop, one event at a time.

use ratatui::crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use transcript::{Identity, Renderer, Sender};

use crate::data_url;
use crate::input::InputLine;
use crate::protocol::{InboundFrame, OutboundFrame, decode_inbound};

/// Committed input starting with this is a file submission.
pub const FILE_COMMAND: &str = "/file ";

const SCROLL_STEP: usize = 5;

/// Whether submitted text is rendered before the relay echoes it back.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderMode {
    /// Render only what the relay sends back.
    #[default]
    Echo,
    /// Render locally as soon as the text is submitted.
    Optimistic,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityState {
    Unidentified,
    Identified(Identity),
}

/// Completion of a file read started by [`Session::submit_file`].
#[derive(Debug)]
pub struct FileLoaded {
    pub path: PathBuf,
    pub result: std::io::Result<Vec<u8>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

pub struct Session {
    identity: IdentityState,
    renderer: Renderer,
    input: InputLine,
    mode: RenderMode,
    show_timestamps: bool,
    connected: bool,
    outbound: mpsc::UnboundedSender<OutboundFrame>,
    file_events: mpsc::UnboundedSender<FileLoaded>,
}

impl Session {
    pub fn new(
        mode: RenderMode,
        outbound: mpsc::UnboundedSender<OutboundFrame>,
        file_events: mpsc::UnboundedSender<FileLoaded>,
    ) -> Self {
        Self {
            identity: IdentityState::Unidentified,
            renderer: Renderer::new(),
            input: InputLine::new(),
            mode,
            show_timestamps: false,
            connected: false,
            outbound,
            file_events,
        }
    }

    pub fn with_timestamps(mut self, show: bool) -> Self {
        self.show_timestamps = show;
        self
    }

    pub fn identity(&self) -> &IdentityState {
        &self.identity
    }

    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    pub fn input(&self) -> &InputLine {
        &self.input
    }

    pub fn show_timestamps(&self) -> bool {
        self.show_timestamps
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    // ── connection events ──────────────────────────────────────────────

    pub fn on_connection_open(&mut self) {
        self.connected = true;
        info!("connection open");
    }

    pub fn on_connection_closed(&mut self) {
        if self.connected {
            warn!("connection closed; chat is no longer live");
        }
        self.connected = false;
    }

    pub fn on_frame_received(&mut self, raw: &str) {
        let frame = match decode_inbound(raw) {
            Ok(frame) => frame,
            Err(e) => {
                debug!(error = %e, "dropping inbound frame");
                return;
            }
        };

        match frame {
            InboundFrame::IdentityAssignment(id) => {
                if let IdentityState::Identified(current) = &self.identity {
                    debug!(current = %current, offered = %id, "ignoring repeated identity assignment");
                    return;
                }
                info!(user_id = %id, "signed in");
                self.renderer
                    .info(format!("You are signed in as User #{}.", id));
                self.identity = IdentityState::Identified(id);
            }
            InboundFrame::ChatMessage { sender, text } => {
                let sender = match sender {
                    Some(id) if self.is_local(&id) => Sender::Local,
                    Some(id) => Sender::Remote(id),
                    None => Sender::Unattributed,
                };
                self.renderer.render(text, sender);
            }
        }
    }

    fn is_local(&self, id: &Identity) -> bool {
        matches!(&self.identity, IdentityState::Identified(me) if me == id)
    }

    // ── input-field events ─────────────────────────────────────────────

    /// Send the current input as a text frame. Whitespace-only input is
    /// ignored and left in place; otherwise the input is cleared whether or
    /// not the send succeeds.
    pub fn submit_text(&mut self) {
        let value = self.input.value().trim().to_string();
        if value.is_empty() {
            return;
        }

        if self.mode == RenderMode::Optimistic {
            self.renderer.render(value.clone(), Sender::Local);
        }
        if self.outbound.send(OutboundFrame::Text(value)).is_err() {
            debug!("outbound channel closed; text dropped");
        }
        self.input.clear();
    }

    /// Start reading `path` in the background. The frame is sent from
    /// [`Session::on_file_loaded`] once the read completes.
    pub fn submit_file(&mut self, path: PathBuf) {
        debug!(path = %path.display(), "reading file");
        let events = self.file_events.clone();
        tokio::spawn(async move {
            let result = tokio::fs::read(&path).await;
            let _ = events.send(FileLoaded { path, result });
        });
    }

    pub fn on_file_loaded(&mut self, loaded: FileLoaded) {
        let bytes = match loaded.result {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(path = %loaded.path.display(), error = %e, "failed to read file");
                return;
            }
        };
        let mime = data_url::mime_for_path(&loaded.path);
        info!(path = %loaded.path.display(), mime = %mime, bytes = bytes.len(), "sending file");
        let frame = OutboundFrame::File(data_url::encode(&mime, &bytes));
        if self.outbound.send(frame).is_err() {
            debug!("outbound channel closed; file dropped");
        }
    }

    /// Commit the input line: either a file submission or a text message.
    fn commit(&mut self) {
        let value = self.input.value().trim();
        if value == FILE_COMMAND.trim_end() {
            // No path yet; keep the command in the input.
            return;
        }
        if let Some(path) = value.strip_prefix(FILE_COMMAND) {
            let path = PathBuf::from(path.trim());
            self.input.clear();
            self.submit_file(path);
            return;
        }
        self.submit_text();
    }

    /// Line-mode equivalent of typing `line` and pressing Enter.
    pub fn on_line(&mut self, line: &str) {
        self.input.set(line);
        self.commit();
    }

    pub fn on_key(&mut self, key: KeyEvent) -> Flow {
        if key.kind == KeyEventKind::Release {
            return Flow::Continue;
        }
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

        match key.code {
            KeyCode::Esc => return Flow::Quit,
            KeyCode::Char('c') if ctrl => return Flow::Quit,
            KeyCode::Char('t') if ctrl => self.show_timestamps = !self.show_timestamps,
            KeyCode::Char(c) if !ctrl => self.input.insert(c),
            KeyCode::Enter => self.commit(),
            KeyCode::Backspace => self.input.backspace(),
            KeyCode::Delete => self.input.delete(),
            KeyCode::Left => self.input.move_left(),
            KeyCode::Right => self.input.move_right(),
            KeyCode::Home => self.input.home(),
            KeyCode::End => self.input.end(),
            KeyCode::PageUp => self.renderer.scroll_up(SCROLL_STEP),
            KeyCode::PageDown => self.renderer.scroll_down(SCROLL_STEP),
            _ => {}
        }
        Flow::Continue
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use transcript::{MessageKind, Node};

    struct Harness {
        session: Session,
        outbound: mpsc::UnboundedReceiver<OutboundFrame>,
        files: mpsc::UnboundedReceiver<FileLoaded>,
    }

    fn harness(mode: RenderMode) -> Harness {
        let (out_tx, outbound) = mpsc::unbounded_channel();
        let (file_tx, files) = mpsc::unbounded_channel();
        Harness {
            session: Session::new(mode, out_tx, file_tx),
            outbound,
            files,
        }
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn type_text(session: &mut Session, text: &str) {
        for c in text.chars() {
            session.on_key(key(KeyCode::Char(c)));
        }
    }

    fn nodes(session: &Session) -> &[Node] {
        session.renderer().transcript().nodes()
    }

    fn info_count(session: &Session) -> usize {
        nodes(session)
            .iter()
            .filter(|n| matches!(n, Node::Info { .. }))
            .count()
    }

    #[test]
    fn first_identity_assignment_identifies_once() {
        let mut h = harness(RenderMode::Echo);
        assert_eq!(h.session.identity(), &IdentityState::Unidentified);

        h.session.on_frame_received(r#"{"initial":true,"userId":7}"#);
        assert_eq!(
            h.session.identity(),
            &IdentityState::Identified(Identity::Number(7))
        );
        assert_eq!(info_count(&h.session), 1);

        h.session.on_frame_received(r#"{"initial":true,"userId":9}"#);
        assert_eq!(
            h.session.identity(),
            &IdentityState::Identified(Identity::Number(7))
        );
        assert_eq!(info_count(&h.session), 1);
        assert_eq!(nodes(&h.session).len(), 1);
    }

    #[test]
    fn info_entry_names_the_identity() {
        let mut h = harness(RenderMode::Echo);
        h.session.on_frame_received(r#"{"initial":true,"userId":7}"#);
        assert_eq!(
            nodes(&h.session)[0],
            Node::Info {
                text: "You are signed in as User #7.".to_string()
            }
        );
    }

    #[test]
    fn malformed_frames_are_dropped() {
        let mut h = harness(RenderMode::Echo);
        h.session.on_frame_received("{not json");
        h.session.on_frame_received("\"just a string\"");
        assert!(nodes(&h.session).is_empty());
        assert_eq!(h.session.identity(), &IdentityState::Unidentified);
    }

    #[test]
    fn end_to_end_frame_sequence() {
        let mut h = harness(RenderMode::Echo);
        for raw in [
            r#"{"initial":true,"userId":7}"#,
            r#"{"text":"hi","userId":3}"#,
            r#"{"text":"yo","userId":3}"#,
            r#"{"text":"hey","userId":7}"#,
        ] {
            h.session.on_frame_received(raw);
        }

        let lines: Vec<String> = nodes(&h.session)
            .iter()
            .map(|n| transcript::format_node(n, false))
            .collect();
        assert_eq!(
            lines,
            vec![
                "-- You are signed in as User #7. --",
                "User 3",
                "  hi",
                "  yo",
                "  > hey",
            ]
        );
    }

    #[test]
    fn own_id_before_identification_is_remote() {
        let mut h = harness(RenderMode::Echo);
        h.session.on_frame_received(r#"{"text":"early","userId":7}"#);
        assert!(nodes(&h.session)[0].is_label());
    }

    #[test]
    fn message_without_sender_is_unlabeled() {
        let mut h = harness(RenderMode::Echo);
        h.session.on_frame_received(r#"{"text":"server notice"}"#);
        assert_eq!(nodes(&h.session).len(), 1);
        assert!(matches!(
            nodes(&h.session)[0],
            Node::Message { kind: MessageKind::Recv, .. }
        ));
    }

    #[test]
    fn submit_text_sends_trimmed_and_clears() {
        let mut h = harness(RenderMode::Echo);
        type_text(&mut h.session, "  hello  ");
        h.session.on_key(key(KeyCode::Enter));

        assert_eq!(
            h.outbound.try_recv().unwrap(),
            OutboundFrame::Text("hello".to_string())
        );
        assert_eq!(h.session.input().value(), "");
        // Echo mode waits for the relay.
        assert!(nodes(&h.session).is_empty());
    }

    #[test]
    fn whitespace_only_input_is_a_noop() {
        let mut h = harness(RenderMode::Echo);
        type_text(&mut h.session, "   ");
        h.session.on_key(key(KeyCode::Enter));

        assert!(h.outbound.try_recv().is_err());
        assert_eq!(h.session.input().value(), "   ");
        assert!(nodes(&h.session).is_empty());
    }

    #[test]
    fn input_clears_even_when_connection_is_gone() {
        let mut h = harness(RenderMode::Echo);
        h.outbound.close();
        type_text(&mut h.session, "lost");
        h.session.on_key(key(KeyCode::Enter));
        assert_eq!(h.session.input().value(), "");
    }

    #[test]
    fn optimistic_mode_renders_before_send() {
        let mut h = harness(RenderMode::Optimistic);
        h.session.on_line("mine");
        assert_eq!(
            h.outbound.try_recv().unwrap(),
            OutboundFrame::Text("mine".to_string())
        );
        assert!(matches!(
            &nodes(&h.session)[0],
            Node::Message { body, kind: MessageKind::Sent, .. } if body == "mine"
        ));
    }

    #[test]
    fn key_editing_and_control_keys() {
        let mut h = harness(RenderMode::Echo);
        type_text(&mut h.session, "abd");
        h.session.on_key(key(KeyCode::Left));
        h.session.on_key(key(KeyCode::Char('c')));
        assert_eq!(h.session.input().value(), "abcd");

        assert!(!h.session.show_timestamps());
        let ctrl_t = KeyEvent::new(KeyCode::Char('t'), KeyModifiers::CONTROL);
        assert_eq!(h.session.on_key(ctrl_t), Flow::Continue);
        assert!(h.session.show_timestamps());
        assert_eq!(h.session.input().value(), "abcd");

        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(h.session.on_key(ctrl_c), Flow::Quit);
        assert_eq!(h.session.on_key(key(KeyCode::Esc)), Flow::Quit);
    }

    #[test]
    fn page_keys_scroll_and_new_messages_follow() {
        let mut h = harness(RenderMode::Echo);
        h.session.on_key(key(KeyCode::PageUp));
        assert_eq!(h.session.renderer().scroll_back(), SCROLL_STEP);
        h.session.on_frame_received(r#"{"text":"new","userId":2}"#);
        assert_eq!(h.session.renderer().scroll_back(), 0);
    }

    #[test]
    fn connection_state_tracks_events() {
        let mut h = harness(RenderMode::Echo);
        assert!(!h.session.is_connected());
        h.session.on_connection_open();
        assert!(h.session.is_connected());
        h.session.on_connection_closed();
        assert!(!h.session.is_connected());
        // No transcript entry for a lost connection.
        assert!(nodes(&h.session).is_empty());
    }

    #[tokio::test]
    async fn file_submission_round_trips_bytes() {
        let mut h = harness(RenderMode::Echo);
        let mut file = tempfile::Builder::new().suffix(".bin").tempfile().unwrap();
        let bytes: Vec<u8> = (0..1024u32).map(|i| (i * 7 % 256) as u8).collect();
        file.write_all(&bytes).unwrap();
        file.flush().unwrap();

        h.session
            .on_line(&format!("{}{}", FILE_COMMAND, file.path().display()));
        assert_eq!(h.session.input().value(), "");

        let loaded = h.files.recv().await.unwrap();
        h.session.on_file_loaded(loaded);

        let frame = h.outbound.try_recv().unwrap();
        let OutboundFrame::File(url) = frame else {
            panic!("expected a file frame, got {frame:?}");
        };
        let decoded = data_url::decode(&url).unwrap();
        assert_eq!(decoded.bytes, bytes);
        assert!(h.outbound.try_recv().is_err());
    }

    #[test]
    fn file_command_without_path_is_a_noop() {
        for line in ["/file ", "/file    ", "  /file"] {
            let mut h = harness(RenderMode::Optimistic);
            h.session.on_line(line);
            assert!(h.outbound.try_recv().is_err(), "{line:?} sent a frame");
            assert!(h.files.try_recv().is_err(), "{line:?} started a read");
            assert!(nodes(&h.session).is_empty(), "{line:?} rendered");
            assert_eq!(h.session.input().value(), line);
        }
    }

    #[tokio::test]
    async fn unreadable_file_sends_nothing() {
        let mut h = harness(RenderMode::Echo);
        let dir = tempfile::tempdir().unwrap();
        h.session.submit_file(dir.path().join("missing.txt"));

        let loaded = h.files.recv().await.unwrap();
        assert!(loaded.result.is_err());
        h.session.on_file_loaded(loaded);
        assert!(h.outbound.try_recv().is_err());
    }

    #[tokio::test]
    async fn text_sent_while_file_is_pending() {
        let mut h = harness(RenderMode::Echo);
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"payload").unwrap();

        h.session.submit_file(file.path().to_path_buf());
        h.session.on_line("meanwhile");
        assert_eq!(
            h.outbound.try_recv().unwrap(),
            OutboundFrame::Text("meanwhile".to_string())
        );

        let loaded = h.files.recv().await.unwrap();
        h.session.on_file_loaded(loaded);
        assert!(matches!(h.outbound.try_recv().unwrap(), OutboundFrame::File(_)));
    }
}

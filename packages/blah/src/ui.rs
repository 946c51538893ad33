use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
};
use transcript::{MessageKind, Node, label_text};

use crate::session::{IdentityState, Session};

const INPUT_HINT: &str = " Enter send · /file <path> · Ctrl-T times · PgUp/PgDn · Esc quit ";

pub fn draw(frame: &mut Frame, session: &Session) {
    let [log_area, input_area] =
        Layout::vertical([Constraint::Min(3), Constraint::Length(3)]).areas(frame.area());

    draw_transcript(frame, log_area, session);
    draw_input(frame, input_area, session);
}

fn draw_transcript(frame: &mut Frame, area: Rect, session: &Session) {
    let nodes = session.renderer().transcript().nodes();
    let height = area.height.saturating_sub(2) as usize;
    let (start, end) = visible_window(nodes.len(), height, session.renderer().scroll_back());
    let back = nodes.len() - end;
    let lines = transcript_lines(&nodes[start..end], session.show_timestamps());

    let title = match (session.identity(), session.is_connected()) {
        (_, false) => " blah · offline ".to_string(),
        (IdentityState::Unidentified, true) => " blah ".to_string(),
        (IdentityState::Identified(id), true) => format!(" blah · User #{} ", id),
    };
    let mut block = Block::default().borders(Borders::ALL).title(title);
    if back > 0 {
        block = block.title_bottom(Line::from(format!(" ↑ {} ", back)).right_aligned());
    }

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn draw_input(frame: &mut Frame, area: Rect, session: &Session) {
    let input = session.input();
    let block = Block::default()
        .borders(Borders::ALL)
        .title_bottom(Line::from(INPUT_HINT).style(Style::default().fg(Color::DarkGray)));
    frame.render_widget(Paragraph::new(input.value()).block(block), area);

    let max_col = area.width.saturating_sub(2);
    let col = (input.cursor() as u16).min(max_col);
    frame.set_cursor_position((area.x + 1 + col, area.y + 1));
}

/// Node range shown in a pane `height` rows tall, `scroll_back` entries up
/// from the newest. Scrolling stops once the oldest node is on screen.
fn visible_window(len: usize, height: usize, scroll_back: usize) -> (usize, usize) {
    let back = scroll_back.min(len.saturating_sub(height));
    let end = len - back;
    (end.saturating_sub(height), end)
}

/// One styled line per transcript node.
pub fn transcript_lines(nodes: &[Node], show_timestamps: bool) -> Vec<Line<'static>> {
    nodes
        .iter()
        .map(|node| match node {
            Node::Label { sender } => Line::from(Span::styled(
                label_text(sender),
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::ITALIC),
            )),
            Node::Message {
                body,
                kind,
                created_at,
            } => {
                let mut spans = vec![Span::raw("  ")];
                if show_timestamps {
                    spans.push(Span::styled(
                        format!("[{}] ", created_at.format("%H:%M:%S")),
                        Style::default().fg(Color::DarkGray),
                    ));
                }
                match kind {
                    MessageKind::Sent => spans.push(Span::styled(
                        format!("> {}", body),
                        Style::default().fg(Color::Green),
                    )),
                    MessageKind::Recv => spans.push(Span::raw(body.clone())),
                }
                Line::from(spans)
            }
            Node::Info { text } => Line::from(Span::styled(
                text.clone(),
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            )),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::RenderMode;
    use ratatui::{Terminal, backend::TestBackend};
    use tokio::sync::mpsc;

    fn session_with(frames: &[&str]) -> Session {
        let (out_tx, _) = mpsc::unbounded_channel();
        let (file_tx, _) = mpsc::unbounded_channel();
        let mut session = Session::new(RenderMode::Echo, out_tx, file_tx);
        session.on_connection_open();
        for raw in frames {
            session.on_frame_received(raw);
        }
        session
    }

    fn screen(session: &Session, width: u16, height: u16) -> Vec<String> {
        let mut terminal = Terminal::new(TestBackend::new(width, height)).unwrap();
        terminal.draw(|f| draw(f, session)).unwrap();
        let buf = terminal.backend().buffer();
        (0..buf.area.height)
            .map(|y| {
                (0..buf.area.width)
                    .map(|x| buf[(x, y)].symbol())
                    .collect::<String>()
            })
            .collect()
    }

    #[test]
    fn lines_follow_node_order() {
        let session = session_with(&[
            r#"{"initial":true,"userId":7}"#,
            r#"{"text":"hi","userId":3}"#,
            r#"{"text":"hey","userId":7}"#,
        ]);
        let lines = transcript_lines(session.renderer().transcript().nodes(), false);
        let text: Vec<String> = lines.iter().map(|l| l.to_string()).collect();
        assert_eq!(
            text,
            vec!["You are signed in as User #7.", "User 3", "  hi", "  > hey"]
        );
    }

    #[test]
    fn timestamps_add_a_prefix() {
        let session = session_with(&[r#"{"text":"hi","userId":3}"#]);
        let lines = transcript_lines(session.renderer().transcript().nodes(), true);
        let msg = lines[1].to_string();
        assert!(msg.starts_with("  ["), "{msg}");
        assert!(msg.ends_with("] hi"), "{msg}");
    }

    #[test]
    fn title_shows_identity() {
        let session = session_with(&[r#"{"initial":true,"userId":7}"#]);
        let rows = screen(&session, 50, 10);
        assert!(rows[0].contains("blah · User #7"), "{:?}", rows[0]);
    }

    #[test]
    fn view_follows_newest_entry() {
        let frames: Vec<String> = (0..30)
            .map(|i| format!(r#"{{"text":"line {}","userId":3}}"#, i))
            .collect();
        let refs: Vec<&str> = frames.iter().map(String::as_str).collect();
        let session = session_with(&refs);

        let rows = screen(&session, 40, 12);
        let joined = rows.join("\n");
        assert!(joined.contains("line 29"));
        assert!(!joined.contains("line 0 "));
    }

    #[test]
    fn window_clamps_to_transcript() {
        assert_eq!(visible_window(0, 10, 0), (0, 0));
        assert_eq!(visible_window(4, 10, 3), (0, 4));
        assert_eq!(visible_window(30, 10, 0), (20, 30));
        assert_eq!(visible_window(30, 10, 5), (15, 25));
        assert_eq!(visible_window(30, 10, 100), (0, 10));
    }

    #[test]
    fn view_follows_newest_entry_in_long_transcripts() {
        let (out_tx, _) = mpsc::unbounded_channel();
        let (file_tx, _) = mpsc::unbounded_channel();
        let mut session = Session::new(RenderMode::Echo, out_tx, file_tx);
        session.on_connection_open();
        for i in 0..70_000 {
            session.on_frame_received(&format!(r#"{{"text":"line {}","userId":3}}"#, i));
        }

        let joined = screen(&session, 40, 12).join("\n");
        assert!(joined.contains("line 69999"), "{joined}");
        assert!(!joined.contains("line 4457"), "{joined}");
    }

    #[test]
    fn scrolled_back_view_shows_older_entries() {
        let frames: Vec<String> = (0..30)
            .map(|i| format!(r#"{{"text":"line {}","userId":3}}"#, i))
            .collect();
        let refs: Vec<&str> = frames.iter().map(String::as_str).collect();
        let mut session = session_with(&refs);
        session.on_key(ratatui::crossterm::event::KeyEvent::new(
            ratatui::crossterm::event::KeyCode::PageUp,
            ratatui::crossterm::event::KeyModifiers::NONE,
        ));

        let joined = screen(&session, 40, 12).join("\n");
        assert!(joined.contains("line 24"), "{joined}");
        assert!(!joined.contains("line 29"), "{joined}");
        assert!(joined.contains("↑ 5"), "{joined}");
    }
}

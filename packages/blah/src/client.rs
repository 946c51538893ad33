//! Client runtime: connects to the relay and runs the single event loop that
//! feeds inbound frames, input, and file-read completions to the session.

use anyhow::Result;
use futures::{SinkExt, StreamExt};
use ratatui::crossterm::event::{self, Event, KeyEvent};
use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::io::AsyncBufReadExt;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite;
use tracing::{debug, info, warn};
use url::Url;

use crate::protocol::{OutboundFrame, endpoint_url};
use crate::session::{FileLoaded, Flow, RenderMode, Session};
use crate::ui;

const WRITER_DRAIN: Duration = Duration::from_secs(1);

pub type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("chat server is unavailable")]
    Unavailable,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ClientError {
    pub fn from_tungstenite(err: tungstenite::Error) -> Self {
        let is_connect = match &err {
            tungstenite::Error::Io(io_err) => matches!(
                io_err.kind(),
                std::io::ErrorKind::ConnectionRefused
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
            ),
            _ => false,
        };
        if is_connect {
            Self::Unavailable
        } else {
            Self::Other(err.into())
        }
    }
}

#[derive(Clone, Debug)]
pub struct ClientOptions {
    pub page_url: Url,
    pub render_mode: RenderMode,
    pub show_timestamps: bool,
}

/// Input arriving from the terminal.
#[derive(Debug)]
pub enum InputEvent {
    Key(KeyEvent),
    Line(String),
    Redraw,
    Eof,
}

/// Where the transcript is displayed.
pub trait Frontend {
    fn draw(&mut self, session: &Session) -> Result<()>;
}

/// Open the WebSocket for the chat endpoint derived from `page`.
pub async fn connect(page: &Url) -> Result<WsStream, ClientError> {
    let endpoint = endpoint_url(page).map_err(|e| ClientError::Other(e.into()))?;
    info!(%endpoint, "connecting");
    let (ws_stream, _) = tokio_tungstenite::connect_async(endpoint.as_str())
        .await
        .map_err(ClientError::from_tungstenite)?;
    Ok(ws_stream)
}

/// Connect and run the chat until the user quits. Uses the TUI when stdin is
/// a terminal and plain lines otherwise.
pub async fn run(options: ClientOptions, interactive: bool) -> Result<(), ClientError> {
    let ws_stream = connect(&options.page_url).await?;

    let (out_tx, out_rx) = mpsc::unbounded_channel();
    let (file_tx, file_rx) = mpsc::unbounded_channel();
    let session = Session::new(options.render_mode, out_tx, file_tx)
        .with_timestamps(options.show_timestamps);
    let (input_tx, input_rx) = mpsc::channel::<InputEvent>(64);

    if interactive {
        let shutdown = Arc::new(AtomicBool::new(false));
        spawn_key_reader(input_tx, shutdown.clone());

        let mut frontend = TuiFrontend {
            terminal: ratatui::init(),
        };
        let result = event_loop(ws_stream, session, out_rx, file_rx, input_rx, &mut frontend).await;
        shutdown.store(true, Ordering::Relaxed);
        ratatui::restore();
        result.map_err(Into::into)
    } else {
        spawn_line_reader(input_tx);
        let mut frontend = LineFrontend::new(std::io::stdout());
        event_loop(ws_stream, session, out_rx, file_rx, input_rx, &mut frontend)
            .await
            .map_err(Into::into)
    }
}

/// Process events one at a time until the user quits or input ends.
pub async fn event_loop<S, F>(
    ws_stream: S,
    mut session: Session,
    mut outbound: mpsc::UnboundedReceiver<OutboundFrame>,
    mut file_events: mpsc::UnboundedReceiver<FileLoaded>,
    mut input: mpsc::Receiver<InputEvent>,
    frontend: &mut F,
) -> Result<()>
where
    S: futures::Stream<Item = Result<tungstenite::Message, tungstenite::Error>>
        + futures::Sink<tungstenite::Message, Error = tungstenite::Error>
        + Send
        + 'static,
    F: Frontend,
{
    let (mut ws_write, mut ws_read) = ws_stream.split();

    let writer = tokio::spawn(async move {
        while let Some(frame) = outbound.recv().await {
            let msg = tungstenite::Message::Text(frame.into_payload().into());
            if let Err(e) = ws_write.send(msg).await {
                warn!(error = %e, "websocket send error");
                break;
            }
        }
    });

    session.on_connection_open();
    frontend.draw(&session)?;

    let mut ws_open = true;
    loop {
        tokio::select! {
            msg = ws_read.next(), if ws_open => match msg {
                Some(Ok(tungstenite::Message::Text(text))) => {
                    session.on_frame_received(text.as_str());
                }
                Some(Ok(tungstenite::Message::Close(_))) | None => {
                    ws_open = false;
                    session.on_connection_closed();
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!(error = %e, "websocket read error");
                    ws_open = false;
                    session.on_connection_closed();
                }
            },

            // A dropped reader ends the loop like end of input.
            ev = input.recv() => match ev {
                Some(InputEvent::Key(key)) => {
                    if session.on_key(key) == Flow::Quit {
                        break;
                    }
                }
                Some(InputEvent::Line(line)) => session.on_line(&line),
                Some(InputEvent::Redraw) => {}
                Some(InputEvent::Eof) | None => break,
            },

            Some(loaded) = file_events.recv() => session.on_file_loaded(loaded),
        }
        frontend.draw(&session)?;
    }

    // Let queued frames drain before tearing down.
    drop(session);
    if tokio::time::timeout(WRITER_DRAIN, writer).await.is_err() {
        debug!("writer still busy at shutdown");
    }
    Ok(())
}

struct TuiFrontend {
    terminal: ratatui::DefaultTerminal,
}

impl Frontend for TuiFrontend {
    fn draw(&mut self, session: &Session) -> Result<()> {
        self.terminal.draw(|frame| ui::draw(frame, session))?;
        Ok(())
    }
}

/// Prints each node once, as it is appended.
pub struct LineFrontend<W: Write> {
    out: W,
    printed: usize,
}

impl<W: Write> LineFrontend<W> {
    pub fn new(out: W) -> Self {
        Self { out, printed: 0 }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Frontend for LineFrontend<W> {
    fn draw(&mut self, session: &Session) -> Result<()> {
        let log = session.renderer().transcript();
        for node in log.since(self.printed) {
            writeln!(
                self.out,
                "{}",
                transcript::format_node(node, session.show_timestamps())
            )?;
        }
        self.out.flush()?;
        self.printed = log.len();
        Ok(())
    }
}

/// Blocking terminal-event reader; polls so it can notice `shutdown`.
fn spawn_key_reader(tx: mpsc::Sender<InputEvent>, shutdown: Arc<AtomicBool>) {
    std::thread::spawn(move || {
        while !shutdown.load(Ordering::Relaxed) {
            match event::poll(Duration::from_millis(100)) {
                Ok(true) => {}
                Ok(false) => continue,
                Err(e) => {
                    warn!(error = %e, "terminal poll failed");
                    break;
                }
            }
            let ev = match event::read() {
                Ok(Event::Key(key)) => InputEvent::Key(key),
                Ok(Event::Resize(..)) => InputEvent::Redraw,
                Ok(_) => continue,
                Err(e) => {
                    warn!(error = %e, "terminal read failed");
                    break;
                }
            };
            if tx.blocking_send(ev).is_err() {
                break;
            }
        }
    });
}

fn spawn_line_reader(tx: mpsc::Sender<InputEvent>) {
    tokio::spawn(async move {
        let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
        loop {
            let ev = match lines.next_line().await {
                Ok(Some(line)) => InputEvent::Line(line),
                Ok(None) => InputEvent::Eof,
                Err(e) => {
                    warn!(error = %e, "stdin read failed");
                    InputEvent::Eof
                }
            };
            let done = matches!(ev, InputEvent::Eof);
            if tx.send(ev).await.is_err() || done {
                break;
            }
        }
    });
}

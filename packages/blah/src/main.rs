use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use url::Url;

use blah::client::{self, ClientError, ClientOptions};
use blah::config::BlahConfig;
use blah::logging;
use blah::server::{self, RelayState};
use blah::session::RenderMode;

#[derive(Parser)]
#[command(name = "blah")]
#[command(about = "Minimal real-time chat over a WebSocket relay")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Custom data directory (defaults to ~/.blah)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Join a chat (the default)
    Connect(ConnectArgs),

    /// Run the relay server in the foreground
    Serve(ServeArgs),
}

#[derive(Parser, Default)]
struct ConnectArgs {
    /// Page URL of the chat; the endpoint is derived from it
    url: Option<String>,

    /// Show your own messages as soon as you send them
    #[arg(long)]
    optimistic: bool,

    /// Show message timestamps
    #[arg(long)]
    timestamps: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[derive(Parser)]
struct ServeArgs {
    /// Host to bind to
    #[arg(short = 'b', long)]
    host: Option<String>,

    /// Port for the relay (0 = auto-select)
    #[arg(short, long)]
    port: Option<u16>,

    /// Do not send messages back to their author
    #[arg(long)]
    no_echo: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = BlahConfig::new(cli.data_dir.clone())?;

    match cli.command {
        None => run_client(ConnectArgs::default(), config).await,
        Some(Commands::Connect(args)) => run_client(args, config).await,
        Some(Commands::Serve(args)) => run_server(args, config).await,
    }
}

async fn run_client(args: ConnectArgs, config: BlahConfig) -> Result<()> {
    let interactive = std::io::stdin().is_terminal();
    if interactive {
        logging::init_file(&config.client_log_path(), args.debug)?;
    } else {
        logging::init_stderr(args.debug);
    }

    let fc = config.file_config()?.client;
    let raw_url = args.url.unwrap_or(fc.url);
    let page_url = Url::parse(&raw_url).with_context(|| format!("Invalid chat URL: {raw_url}"))?;
    let render_mode = if args.optimistic {
        RenderMode::Optimistic
    } else {
        fc.render_mode
    };

    let options = ClientOptions {
        page_url,
        render_mode,
        show_timestamps: args.timestamps || fc.show_timestamps,
    };

    match client::run(options, interactive).await {
        Ok(()) => Ok(()),
        Err(ClientError::Unavailable) => {
            anyhow::bail!("no chat server reachable at {raw_url}")
        }
        Err(ClientError::Other(e)) => Err(e),
    }
}

async fn run_server(args: ServeArgs, config: BlahConfig) -> Result<()> {
    logging::init_stderr(args.debug);

    let fc = config.file_config()?.server;
    let host = args.host.unwrap_or(fc.host);
    let port = args.port.unwrap_or(fc.port);
    let echo_to_sender = fc.echo_to_sender && !args.no_echo;

    info!(echo_to_sender, "Starting blah relay");

    let listener = tokio::net::TcpListener::bind((host.as_str(), port))
        .await
        .with_context(|| format!("Failed to bind {host}:{port}"))?;

    let shutdown_signal = async {
        if tokio::signal::ctrl_c().await.is_err() {
            tracing::warn!("Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
        info!("Received shutdown signal");
    };

    server::serve(listener, Arc::new(RelayState::new(echo_to_sender)), shutdown_signal).await
}

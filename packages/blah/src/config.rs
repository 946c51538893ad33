use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::session::RenderMode;

// =============================================================================
// Tunable config (figment-deserialized from defaults / config.toml / env vars)
// =============================================================================
//
//   config.toml:     [server]
//                    port = 9000
//
//   env var:         BLAH_SERVER__PORT=9000   (double underscore = nesting)

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub client: ClientFileConfig,
    #[serde(default)]
    pub server: ServerFileConfig,
}

/// Client tunables (lives under `[client]` in config.toml).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClientFileConfig {
    /// Page URL the chat endpoint is derived from.
    #[serde(default = "default_url")]
    pub url: String,
    #[serde(default)]
    pub render_mode: RenderMode,
    #[serde(default)]
    pub show_timestamps: bool,
}

impl Default for ClientFileConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            render_mode: RenderMode::default(),
            show_timestamps: false,
        }
    }
}

/// Relay tunables (lives under `[server]` in config.toml).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerFileConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Also deliver each message back to its author.
    #[serde(default = "default_echo_to_sender")]
    pub echo_to_sender: bool,
}

impl Default for ServerFileConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            echo_to_sender: default_echo_to_sender(),
        }
    }
}

fn default_url() -> String {
    "http://127.0.0.1:8080/".to_string()
}
fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_echo_to_sender() -> bool {
    true
}

/// Build a figment that layers: defaults → config.toml → BLAH_* env vars.
pub fn load_config(data_dir: &Path) -> figment::Figment {
    use figment::{
        Figment,
        providers::{Env, Format, Serialized, Toml},
    };

    Figment::from(Serialized::defaults(FileConfig::default()))
        .merge(Toml::file(data_dir.join("config.toml")))
        .merge(Env::prefixed("BLAH_").split("__"))
}

// =============================================================================
// Directory layout (derived from --data-dir)
// =============================================================================

#[derive(Clone, Debug)]
pub struct BlahConfig {
    pub data_dir: PathBuf,
    pub logs_dir: PathBuf,
}

impl BlahConfig {
    pub fn new(custom_dir: Option<PathBuf>) -> Result<Self> {
        let data_dir = match custom_dir {
            Some(dir) => dir,
            None => dirs::home_dir()
                .context("Could not find home directory")?
                .join(".blah"),
        };

        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory: {:?}", data_dir))?;

        let logs_dir = data_dir.join("logs");
        std::fs::create_dir_all(&logs_dir)
            .with_context(|| format!("Failed to create logs directory: {:?}", logs_dir))?;

        debug!("Data directory: {}", data_dir.display());

        Ok(Self { data_dir, logs_dir })
    }

    pub fn config_toml_path(&self) -> PathBuf {
        self.data_dir.join("config.toml")
    }

    pub fn client_log_path(&self) -> PathBuf {
        self.logs_dir.join("client.log")
    }

    /// Extract the layered file config for this data directory.
    pub fn file_config(&self) -> Result<FileConfig> {
        load_config(&self.data_dir)
            .extract()
            .with_context(|| format!("Invalid configuration in {:?}", self.config_toml_path()))
    }
}

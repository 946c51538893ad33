pub mod client;
pub mod config;
pub mod data_url;
pub mod input;
pub mod logging;
pub mod protocol;
pub mod server;
pub mod session;
pub mod ui;

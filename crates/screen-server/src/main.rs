//! Screen server: authoritative playback state for every screen location.
//!
//! Clients connect over TCP, send control frames, and receive a sync
//! snapshot for each screen on connect and after every accepted control.

mod cli;
mod config;
mod hub;
mod runtime;
mod store;
mod transport;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let args = cli::Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("info,screen_server=info")
        }))
        .init();

    let config_path = args.config.clone().or_else(|| {
        std::env::current_exe()
            .ok()
            .and_then(|path| path.parent().map(|dir| dir.join("config.toml")))
            .filter(|path| path.exists())
    });
    let cfg = match config_path.as_ref() {
        Some(path) => config::ServerConfig::load(path)?,
        None => config::ServerConfig::default(),
    };
    let settings = config::settings_from_config(&cfg, args.bind, args.state_path)?;
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        git_sha = env!("GIT_SHA"),
        state_path = ?settings.state_path,
        tick_ms = settings.tick.as_millis() as u64,
        "starting screen-server"
    );
    runtime::run(settings, config_path)
}

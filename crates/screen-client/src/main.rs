//! Screen client: mirrors server state into local playback sessions, or sends
//! a single control command.

mod cli;
mod net;
mod runtime;

use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use screen_player::PlayerConfig;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let args = cli::Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("info,screen_client=info,screen_player=info")
        }))
        .init();

    match args.cmd {
        cli::Command::Watch {
            observer,
            tick_ms,
            status_every,
            master_volume,
            quality,
            source,
            speed,
        } => {
            if tick_ms == 0 {
                anyhow::bail!("--tick-ms must be greater than zero");
            }
            let config = PlayerConfig {
                master_volume: master_volume.clamp(0.0, 1.0),
                ..PlayerConfig::default()
            };
            let options = runtime::WatchOptions {
                observer,
                tick: Duration::from_millis(tick_ms),
                status_every,
                quality,
                source,
                speed,
            };
            runtime::run_watch(args.server, options, config)
        }
        cli::Command::Send { location, action } => runtime::run_send(args.server, location, action),
    }
}

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;

const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("GIT_SHA"),
    ", ",
    env!("BUILD_DATE"),
    ")"
);

#[derive(Parser, Debug)]
#[command(name = "screen-server", version = VERSION)]
pub struct Args {
    /// Optional server config file (TOML)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// TCP bind address, e.g. 0.0.0.0:7410
    #[arg(long)]
    pub bind: Option<SocketAddr>,

    /// JSON file holding persisted screen state
    #[arg(long)]
    pub state_path: Option<PathBuf>,
}

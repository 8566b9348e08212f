use std::net::SocketAddr;

use clap::{Parser, Subcommand};
use screen_types::Location;

const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("GIT_SHA"),
    ", ",
    env!("BUILD_DATE"),
    ")"
);

#[derive(Parser, Debug)]
#[command(name = "screen-client", version = VERSION)]
pub struct Args {
    #[command(subcommand)]
    pub cmd: Command,

    /// Screen server address, e.g. 127.0.0.1:7410
    #[arg(long, default_value = "127.0.0.1:7410")]
    pub server: SocketAddr,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Mirror server state and drive local playback sessions
    Watch {
        /// Observer position as x,y,z (enables distance attenuation and eviction)
        #[arg(long, value_parser = parse_observer)]
        observer: Option<(f64, f64, f64)>,

        /// Tick period in milliseconds
        #[arg(long, default_value_t = 50)]
        tick_ms: u64,

        /// Log a JSON status snapshot every N ticks (0 disables)
        #[arg(long, default_value_t = 200)]
        status_every: u64,

        /// Master volume applied on top of distance attenuation
        #[arg(long, default_value_t = 1.0)]
        master_volume: f32,

        /// Quality index applied to every screen on first sight
        #[arg(long)]
        quality: Option<i32>,

        /// Video source index applied to every screen on first sight
        #[arg(long)]
        source: Option<i32>,

        /// Speed index applied to every screen on first sight
        #[arg(long)]
        speed: Option<i32>,
    },

    /// Send one control command and print the resulting snapshot
    Send {
        /// Screen location as x,y,z
        #[arg(allow_hyphen_values = true)]
        location: Location,

        #[command(subcommand)]
        action: SendAction,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum SendAction {
    Play,
    Pause,
    Stop,
    /// Select a video url (validated locally) and start playback
    Url { input: String },
    /// Set absolute volume in [0, 1]
    Volume { value: f32 },
    VolumeUp,
    VolumeDown,
    /// Seek to a position in milliseconds
    Seek { position_ms: i64 },
}

/// Parse an `x,y,z` observer position with fractional coordinates.
pub fn parse_observer(raw: &str) -> Result<(f64, f64, f64), String> {
    let parts: Vec<&str> = raw.split(',').map(str::trim).collect();
    let [x, y, z] = parts.as_slice() else {
        return Err(format!("invalid observer {raw:?} (expected x,y,z)"));
    };
    let coord = |s: &str| {
        s.parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| format!("invalid coordinate {s:?}"))
    };
    Ok((coord(x)?, coord(y)?, coord(z)?))
}

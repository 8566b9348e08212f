//! Configuration loading and parsing.
//!
//! The TOML file is optional; command-line flags override file values and
//! everything else falls back to defaults.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use screen_types::Location;

const DEFAULT_BIND: &str = "0.0.0.0:7410";
const DEFAULT_STATE_PATH: &str = "screens.json";
const DEFAULT_TICK_MS: u64 = 50;
const DEFAULT_SAVE_INTERVAL_TICKS: u64 = 200;

/// Server configuration as written in TOML.
#[derive(Debug, Default, Deserialize)]
pub struct ServerConfig {
    /// Bind address (host:port).
    pub bind: Option<String>,
    /// JSON file holding persisted screen state.
    pub state_path: Option<String>,
    /// Tick period in milliseconds.
    pub tick_ms: Option<u64>,
    /// Save dirty state every N ticks.
    pub save_interval_ticks: Option<u64>,
    /// Screen locations as `"x,y,z"` strings.
    pub screens: Option<Vec<String>>,
}

/// Fully resolved runtime settings.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub bind: SocketAddr,
    pub state_path: PathBuf,
    pub tick: Duration,
    pub save_interval_ticks: u64,
    /// Authoritative screen list; `None` keeps whatever the state file holds.
    pub screens: Option<Vec<Location>>,
}

impl ServerConfig {
    /// Load configuration from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let raw =
            std::fs::read_to_string(path).with_context(|| format!("read config {:?}", path))?;
        let cfg = toml::from_str::<ServerConfig>(&raw)
            .with_context(|| format!("parse config {:?}", path))?;
        Ok(cfg)
    }
}

/// Resolve the bind address; `override_bind` (from the CLI) wins over the file.
pub fn bind_from_config(cfg: &ServerConfig, override_bind: Option<SocketAddr>) -> Result<SocketAddr> {
    if let Some(bind) = override_bind {
        return Ok(bind);
    }
    let raw = cfg.bind.as_deref().unwrap_or(DEFAULT_BIND);
    raw.parse()
        .with_context(|| format!("parse bind address {raw}"))
}

pub fn state_path_from_config(cfg: &ServerConfig, override_path: Option<PathBuf>) -> PathBuf {
    override_path.unwrap_or_else(|| {
        cfg.state_path
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .unwrap_or(DEFAULT_STATE_PATH)
            .into()
    })
}

/// Parse configured screen locations, rejecting malformed entries and dropping duplicates.
pub fn screens_from_config(cfg: &ServerConfig) -> Result<Option<Vec<Location>>> {
    let Some(raw_screens) = cfg.screens.as_ref() else {
        return Ok(None);
    };
    let mut screens = Vec::new();
    for raw in raw_screens {
        let loc: Location = raw
            .parse()
            .with_context(|| format!("parse screen location {raw:?}"))?;
        if !screens.contains(&loc) {
            screens.push(loc);
        }
    }
    Ok(Some(screens))
}

/// Build runtime settings from the config file plus CLI overrides.
pub fn settings_from_config(
    cfg: &ServerConfig,
    override_bind: Option<SocketAddr>,
    override_state_path: Option<PathBuf>,
) -> Result<ServerSettings> {
    let tick_ms = cfg.tick_ms.unwrap_or(DEFAULT_TICK_MS);
    if tick_ms == 0 {
        anyhow::bail!("tick_ms must be greater than zero");
    }
    Ok(ServerSettings {
        bind: bind_from_config(cfg, override_bind)?,
        state_path: state_path_from_config(cfg, override_state_path),
        tick: Duration::from_millis(tick_ms),
        save_interval_ticks: cfg
            .save_interval_ticks
            .unwrap_or(DEFAULT_SAVE_INTERVAL_TICKS)
            .max(1),
        screens: screens_from_config(cfg)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &str) -> ServerConfig {
        toml::from_str(raw).expect("parse config")
    }

    #[test]
    fn defaults_apply_to_empty_config() {
        let settings = settings_from_config(&ServerConfig::default(), None, None).unwrap();
        assert_eq!(settings.bind, DEFAULT_BIND.parse::<SocketAddr>().unwrap());
        assert_eq!(settings.state_path, PathBuf::from(DEFAULT_STATE_PATH));
        assert_eq!(settings.tick, Duration::from_millis(DEFAULT_TICK_MS));
        assert_eq!(settings.save_interval_ticks, DEFAULT_SAVE_INTERVAL_TICKS);
        assert!(settings.screens.is_none());
    }

    #[test]
    fn file_values_are_used() {
        let cfg = parse(
            r#"
            bind = "127.0.0.1:9000"
            state_path = "/var/lib/screens/state.json"
            tick_ms = 100
            save_interval_ticks = 10
            screens = ["0,64,0", "10,64,-3", "0,64,0"]
            "#,
        );
        let settings = settings_from_config(&cfg, None, None).unwrap();
        assert_eq!(settings.bind.port(), 9000);
        assert_eq!(settings.state_path, PathBuf::from("/var/lib/screens/state.json"));
        assert_eq!(settings.tick, Duration::from_millis(100));
        assert_eq!(settings.save_interval_ticks, 10);
        assert_eq!(
            settings.screens,
            Some(vec![Location::new(0, 64, 0), Location::new(10, 64, -3)])
        );
    }

    #[test]
    fn cli_overrides_win() {
        let cfg = parse(r#"bind = "127.0.0.1:9000""#);
        let bind: SocketAddr = "127.0.0.1:9100".parse().unwrap();
        let settings =
            settings_from_config(&cfg, Some(bind), Some(PathBuf::from("other.json"))).unwrap();
        assert_eq!(settings.bind, bind);
        assert_eq!(settings.state_path, PathBuf::from("other.json"));
    }

    #[test]
    fn bad_screen_location_is_an_error() {
        let cfg = parse(r#"screens = ["1,2"]"#);
        assert!(settings_from_config(&cfg, None, None).is_err());
    }

    #[test]
    fn empty_screen_list_is_kept_distinct_from_missing() {
        let cfg = parse("screens = []");
        let settings = settings_from_config(&cfg, None, None).unwrap();
        assert_eq!(settings.screens, Some(Vec::new()));
    }

    #[test]
    fn zero_tick_is_rejected() {
        let cfg = parse("tick_ms = 0");
        assert!(settings_from_config(&cfg, None, None).is_err());
    }
}

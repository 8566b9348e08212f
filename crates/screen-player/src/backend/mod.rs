//! Playback backend abstraction.
//!
//! A session talks to exactly one [`PlaybackBackend`]. Which implementation it
//! gets is decided once, when the session is built, by probing the host for the
//! known browser capabilities in priority order.

mod browser;
mod none;
pub mod probe;

#[cfg(test)]
pub(crate) mod testing;

use std::fmt;

use screen_types::Location;
use serde::Serialize;

use crate::config::PlayerConfig;

pub use browser::{BrowserBackend, embed_url};
pub use none::NoBackend;
pub use probe::{
    BrowserEngine, BrowserHandle, CapabilityProbe, KNOWN_BROWSER_CAPABILITIES, NoProbe,
    StaticProbe,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// The underlying handle does not exist yet.
    NotReady,
    /// No engine backs this adapter (or it was released).
    Unavailable,
    /// The engine rejected the call.
    Call(String),
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendError::NotReady => write!(f, "backend not ready"),
            BackendError::Unavailable => write!(f, "backend unavailable"),
            BackendError::Call(msg) => write!(f, "backend call failed: {msg}"),
        }
    }
}

impl std::error::Error for BackendError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Readiness {
    /// Engine present and a live handle exists.
    Ready,
    /// Engine present, handle not created yet.
    Uninitialized,
    Unavailable,
}

/// Keyboard event forwarded to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyInput {
    pub key_code: i32,
    pub scan_code: i32,
    pub modifiers: i32,
    pub pressed: bool,
}

pub trait PlaybackBackend {
    /// Short backend identifier for logs and status.
    fn kind(&self) -> &str;
    fn readiness(&self) -> Readiness;

    fn play(&mut self, url: &str, quality: &str, source_index: usize) -> Result<(), BackendError>;
    fn pause(&mut self) -> Result<(), BackendError>;
    fn resume(&mut self) -> Result<(), BackendError>;
    fn stop(&mut self) -> Result<(), BackendError>;
    fn set_volume(&mut self, volume: f32) -> Result<(), BackendError>;
    fn set_speed(&mut self, speed: f32) -> Result<(), BackendError>;
    fn seek(&mut self, position_ms: u64) -> Result<(), BackendError>;

    fn go_back(&mut self) -> Result<(), BackendError>;
    fn go_forward(&mut self) -> Result<(), BackendError>;
    fn reload(&mut self) -> Result<(), BackendError>;
    fn load_url(&mut self, url: &str) -> Result<(), BackendError>;

    fn send_key(&mut self, input: KeyInput) -> Result<(), BackendError>;
    fn send_char(&mut self, ch: char, modifiers: i32) -> Result<(), BackendError>;
    fn send_mouse_move(&mut self, x: i32, y: i32) -> Result<(), BackendError>;
    fn send_mouse_button(
        &mut self,
        x: i32,
        y: i32,
        button: i32,
        pressed: bool,
    ) -> Result<(), BackendError>;
    /// Scroll deltas in notches; the backend scales them to engine units.
    fn send_mouse_scroll(
        &mut self,
        x: i32,
        y: i32,
        delta_x: f64,
        delta_y: f64,
    ) -> Result<(), BackendError>;

    fn title(&self) -> Option<String>;
    fn is_loading(&self) -> bool;
    fn can_go_back(&self) -> bool;
    fn can_go_forward(&self) -> bool;
    fn texture_handle(&self) -> Option<u32>;

    /// Advance deferred work (pending loads). Called every tick.
    fn tick(&mut self);
    /// Best-effort teardown; safe to call more than once.
    fn release(&mut self);
}

/// Pick the backend for a new session.
///
/// Capabilities are tried in [`KNOWN_BROWSER_CAPABILITIES`] order; the first
/// one the probe resolves wins. Without any, the session runs on [`NoBackend`].
pub fn select_backend(
    probe: &dyn CapabilityProbe,
    location: Location,
    config: &PlayerConfig,
) -> Box<dyn PlaybackBackend> {
    for name in KNOWN_BROWSER_CAPABILITIES {
        if let Some(engine) = probe.resolve(name) {
            tracing::info!(%location, capability = name, engine = engine.name(), "browser backend selected");
            return Box::new(BrowserBackend::new(name, engine, location, config));
        }
    }
    tracing::debug!(%location, "no playback backend found; using simulated playback");
    Box::new(NoBackend)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use testing::MockEngine;

    #[test]
    fn no_probe_selects_no_backend() {
        let backend = select_backend(&NoProbe, Location::default(), &PlayerConfig::default());
        assert_eq!(backend.kind(), "none");
        assert_eq!(backend.readiness(), Readiness::Unavailable);
    }

    #[test]
    fn first_known_capability_wins() {
        let probe = StaticProbe::new()
            .with("cinemamod-mcef", Arc::new(MockEngine::new("second")))
            .with("mcef", Arc::new(MockEngine::new("first")));
        let backend = select_backend(&probe, Location::default(), &PlayerConfig::default());
        assert_eq!(backend.kind(), "mcef");
        assert_eq!(backend.readiness(), Readiness::Uninitialized);
    }

    #[test]
    fn fallback_capability_is_used() {
        let probe = StaticProbe::new().with("cinemamod-mcef", Arc::new(MockEngine::new("cm")));
        let backend = select_backend(&probe, Location::default(), &PlayerConfig::default());
        assert_eq!(backend.kind(), "cinemamod-mcef");
    }

    #[test]
    fn unknown_capabilities_are_ignored() {
        let probe = StaticProbe::new().with("watermedia", Arc::new(MockEngine::new("wm")));
        let backend = select_backend(&probe, Location::default(), &PlayerConfig::default());
        assert_eq!(backend.kind(), "none");
    }
}

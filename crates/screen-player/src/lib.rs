//! Client-side playback core.
//!
//! - [`registry::SessionRegistry`]: location-keyed cache of playback sessions.
//! - [`session::PlaybackSession`]: logical playback state plus an optional backend and surface.
//! - [`backend`]: backend trait, capability probing, browser and no-op backends.
//! - [`mirror::ScreenMirror`]: client copy of server state and sync reconciliation.
//! - [`controls::ControlPanel`]: local validation and optimistic echo of user actions.
//! - [`volume`]: distance attenuation.

pub mod backend;
pub mod config;
pub mod controls;
pub mod mirror;
pub mod registry;
pub mod session;
pub mod status;
pub mod surface;
pub mod volume;

pub use config::PlayerConfig;
pub use registry::SessionRegistry;
pub use session::{Observer, PlaybackSession};

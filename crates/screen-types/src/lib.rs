//! Shared screen types used by the server, the client core, and the wire layer.
//!
//! - [`Location`]: the exact-integer key identifying one screen.
//! - [`options`]: the fixed option tables (sizes, qualities, sources, speeds).
//! - [`state::ScreenState`]: the validated, persisted playback record.
//! - [`media_url`]: video URL extraction and general URL normalization.

pub mod location;
pub mod media_url;
pub mod options;
pub mod state;

pub use location::Location;
pub use state::{PersistedScreen, ScreenState};

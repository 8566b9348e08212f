//! Client-side copy of the authoritative screen state.
//!
//! Every sync snapshot overwrites the mirrored [`ScreenState`] for its
//! location and is then reconciled into that location's playback session.
//! Snapshots for unknown locations create both on demand.

use std::collections::HashMap;

use screen_proto::SyncMessage;
use screen_types::{Location, ScreenState};

use crate::registry::SessionRegistry;

/// Drift between a playing session and the snapshot that forces a seek.
pub const SEEK_TOLERANCE_MS: u64 = 1_000;

#[derive(Debug, Default)]
pub struct ScreenMirror {
    states: HashMap<Location, ScreenState>,
}

impl ScreenMirror {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, location: Location) -> Option<&ScreenState> {
        self.states.get(&location)
    }

    pub fn get_mut(&mut self, location: Location) -> Option<&mut ScreenState> {
        self.states.get_mut(&location)
    }

    pub fn get_or_insert(&mut self, location: Location) -> &mut ScreenState {
        self.states.entry(location).or_default()
    }

    pub fn contains(&self, location: Location) -> bool {
        self.states.contains_key(&location)
    }

    pub fn remove(&mut self, location: Location) -> Option<ScreenState> {
        self.states.remove(&location)
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Location, &ScreenState)> {
        self.states.iter().map(|(loc, state)| (*loc, state))
    }

    /// Advance every playing mirror entry, tracking the server's clock.
    pub fn advance(&mut self, delta_ms: u64) {
        for state in self.states.values_mut() {
            state.advance(delta_ms);
        }
    }

    /// Apply a server snapshot and reconcile the session at its location.
    ///
    /// Url and volume are applied unconditionally; the play/pause flag only
    /// triggers a transition when the session disagrees with the snapshot.
    /// A playing session that drifted past [`SEEK_TOLERANCE_MS`] is seeked.
    pub fn apply_sync(&mut self, msg: &SyncMessage, registry: &mut SessionRegistry) {
        let state = self.states.entry(msg.location).or_default();
        if !state.set_url(&msg.url) {
            tracing::warn!(location = %msg.location, url = %msg.url, "snapshot url rejected; keeping previous");
        }
        if msg.playing {
            state.play();
        } else {
            state.pause();
        }
        state.set_position(msg.position);
        state.set_volume(msg.volume);
        self.reconcile(msg.location, registry);
    }

    /// Bring the session at `location` in line with the mirrored state,
    /// creating it if needed. No-op for locations without mirrored state.
    pub fn reconcile(&self, location: Location, registry: &mut SessionRegistry) {
        let Some(state) = self.states.get(&location) else {
            return;
        };
        let session = registry.get_or_create(location);
        session.configure(state.quality(), state.source_index() as usize, state.speed());
        session.cue(state.url());
        session.set_volume(state.volume());

        if state.is_playing() && !session.is_playing() {
            session.seek(state.position());
            session.resume();
        } else if !state.is_playing() && session.is_playing() {
            session.pause();
        } else if state.is_playing()
            && session.position_ms().abs_diff(state.position()) > SEEK_TOLERANCE_MS
        {
            session.seek(state.position());
        }

        tracing::debug!(
            %location,
            url = %state.url(),
            playing = state.is_playing(),
            position_ms = state.position(),
            "session reconciled"
        );
    }
}

//! Location-keyed cache of playback sessions.
//!
//! The registry is owned by the tick loop and is the only place sessions are
//! created or destroyed. Removal always releases the session's backend and
//! surface before the entry is dropped.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use screen_types::Location;

use crate::backend::{CapabilityProbe, select_backend};
use crate::config::PlayerConfig;
use crate::session::{Observer, PlaybackSession};
use crate::status::RegistryStatus;
use crate::surface::SurfaceProvider;

pub struct SessionRegistry {
    sessions: HashMap<Location, PlaybackSession>,
    probe: Box<dyn CapabilityProbe>,
    surfaces: Box<dyn SurfaceProvider>,
    config: PlayerConfig,
    next_serial: u64,
}

impl SessionRegistry {
    pub fn new(
        probe: Box<dyn CapabilityProbe>,
        surfaces: Box<dyn SurfaceProvider>,
        config: PlayerConfig,
    ) -> Self {
        Self {
            sessions: HashMap::new(),
            probe,
            surfaces,
            config,
            next_serial: 1,
        }
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    /// Return the session for `location`, creating it on first reference.
    pub fn get_or_create(&mut self, location: Location) -> &mut PlaybackSession {
        match self.sessions.entry(location) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let serial = self.next_serial;
                self.next_serial += 1;
                let backend = select_backend(self.probe.as_ref(), location, &self.config);
                let surface = self.surfaces.create(
                    location,
                    self.config.surface_width,
                    self.config.surface_height,
                );
                tracing::info!(
                    %location,
                    serial,
                    backend = backend.kind(),
                    surface = surface.is_some(),
                    "session created"
                );
                entry.insert(PlaybackSession::new(
                    location,
                    serial,
                    Some(backend),
                    surface,
                    &self.config,
                ))
            }
        }
    }

    pub fn get(&self, location: Location) -> Option<&PlaybackSession> {
        self.sessions.get(&location)
    }

    pub fn get_mut(&mut self, location: Location) -> Option<&mut PlaybackSession> {
        self.sessions.get_mut(&location)
    }

    pub fn contains(&self, location: Location) -> bool {
        self.sessions.contains_key(&location)
    }

    /// Release and drop the session at `location`. Returns whether one existed.
    pub fn remove(&mut self, location: Location) -> bool {
        match self.sessions.remove(&location) {
            Some(mut session) => {
                session.release();
                tracing::debug!(%location, "session removed");
                true
            }
            None => false,
        }
    }

    /// Tick every session. Failures are logged; returns how many sessions failed.
    pub fn tick(&mut self, observer: Option<Observer>) -> usize {
        let mut failed = 0;
        for (location, session) in self.sessions.iter_mut() {
            if let Err(err) = session.tick(observer) {
                failed += 1;
                tracing::error!(%location, error = %err, "session tick failed");
            }
        }
        failed
    }

    /// Remove every session whose location no longer hosts a screen.
    pub fn cleanup_invalid(&mut self, mut is_still_valid: impl FnMut(Location) -> bool) -> usize {
        let stale: Vec<Location> = self
            .sessions
            .keys()
            .copied()
            .filter(|loc| !is_still_valid(*loc))
            .collect();
        for location in &stale {
            self.remove(*location);
        }
        if !stale.is_empty() {
            tracing::debug!(removed = stale.len(), "removed sessions for invalid locations");
        }
        stale.len()
    }

    /// Remove every session farther than `max_distance` from `observer`.
    pub fn cleanup_distant(&mut self, observer: Observer, max_distance: f64) -> usize {
        let max_sq = max_distance * max_distance;
        let far: Vec<Location> = self
            .sessions
            .keys()
            .copied()
            .filter(|loc| loc.distance_sq_to(observer) > max_sq)
            .collect();
        for location in &far {
            self.remove(*location);
        }
        if !far.is_empty() {
            tracing::debug!(removed = far.len(), max_distance, "removed distant sessions");
        }
        far.len()
    }

    /// Periodic cleanup: invalid locations first, then distance.
    pub fn maintain(
        &mut self,
        observer: Option<Observer>,
        is_still_valid: impl FnMut(Location) -> bool,
    ) -> usize {
        let mut removed = self.cleanup_invalid(is_still_valid);
        if let Some(observer) = observer {
            removed += self.cleanup_distant(observer, self.config.cleanup_distance);
        }
        removed
    }

    /// Release everything (world teardown).
    pub fn clear(&mut self) {
        let count = self.sessions.len();
        for (_, mut session) in self.sessions.drain() {
            session.release();
        }
        if count > 0 {
            tracing::info!(sessions = count, "cleared all sessions");
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn playing_count(&self) -> usize {
        self.sessions.values().filter(|s| s.is_playing()).count()
    }

    /// Sorted session locations.
    pub fn locations(&self) -> Vec<Location> {
        let mut locations: Vec<Location> = self.sessions.keys().copied().collect();
        locations.sort();
        locations
    }

    pub fn status(&self) -> RegistryStatus {
        let sessions = self
            .locations()
            .into_iter()
            .filter_map(|loc| self.sessions.get(&loc).map(|s| s.status()))
            .collect();
        RegistryStatus::new(sessions)
    }
}

impl Drop for SessionRegistry {
    fn drop(&mut self) {
        self.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::Ordering;

    use crate::backend::testing::MockEngine;
    use crate::backend::{NoProbe, StaticProbe};
    use crate::surface::{
        CountingSurfaceProvider, FrameBuffer, NullSurfaceProvider, RenderSurface, SurfaceError,
    };

    const URL: &str = "https://www.youtube.com/watch?v=dQw4w9WgXcQ";

    fn registry() -> SessionRegistry {
        SessionRegistry::new(
            Box::new(NoProbe),
            Box::new(NullSurfaceProvider),
            PlayerConfig::default(),
        )
    }

    #[test]
    fn get_or_create_returns_same_session() {
        let mut reg = registry();
        let loc = Location::new(4, 5, 6);
        let first = reg.get_or_create(loc).serial();
        let second = reg.get_or_create(loc).serial();
        assert_eq!(first, second);
        assert_eq!(reg.len(), 1);
        assert!(reg.contains(loc));

        let other = reg.get_or_create(Location::new(4, 5, 7)).serial();
        assert_ne!(first, other);
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn get_does_not_create() {
        let reg = registry();
        assert!(reg.get(Location::new(1, 1, 1)).is_none());
        assert!(reg.is_empty());
    }

    #[test]
    fn remove_is_idempotent_and_releases() {
        let engine = Arc::new(MockEngine::new("mock"));
        let mut reg = SessionRegistry::new(
            Box::new(StaticProbe::new().with("mcef", engine.clone())),
            Box::new(NullSurfaceProvider),
            PlayerConfig::default(),
        );
        let loc = Location::new(0, 0, 0);
        reg.get_or_create(loc).play(URL, "medium", 1);
        assert!(reg.remove(loc));
        assert!(!reg.remove(loc));
        assert_eq!(engine.state.closed.load(Ordering::SeqCst), 1);
        assert!(reg.get(loc).is_none());
    }

    #[test]
    fn cleanup_distant_keeps_near_sessions() {
        let mut reg = registry();
        let near = Location::new(10, 0, 0);
        let far = Location::new(100, 0, 0);
        reg.get_or_create(near);
        reg.get_or_create(far);
        let removed = reg.cleanup_distant((0.0, 0.0, 0.0), 64.0);
        assert_eq!(removed, 1);
        assert!(reg.contains(near));
        assert!(!reg.contains(far));
    }

    #[test]
    fn cleanup_invalid_uses_predicate() {
        let mut reg = registry();
        let keep = Location::new(1, 0, 0);
        let gone = Location::new(2, 0, 0);
        reg.get_or_create(keep);
        reg.get_or_create(gone);
        assert_eq!(reg.cleanup_invalid(|loc| loc == keep), 1);
        assert_eq!(reg.locations(), vec![keep]);
    }

    #[test]
    fn maintain_runs_both_passes() {
        let mut reg = registry();
        reg.get_or_create(Location::new(0, 0, 0));
        reg.get_or_create(Location::new(1, 0, 0));
        reg.get_or_create(Location::new(500, 0, 0));
        let removed = reg.maintain(Some((0.0, 0.0, 0.0)), |loc| loc.x != 1);
        assert_eq!(removed, 2);
        assert_eq!(reg.locations(), vec![Location::new(0, 0, 0)]);
    }

    #[test]
    fn tick_continues_past_failing_session() {
        struct Failing;
        impl RenderSurface for Failing {
            fn upload(&mut self, _: &FrameBuffer) -> Result<(), SurfaceError> {
                Err(SurfaceError::Upload("gpu lost".to_string()))
            }
            fn present_texture(&mut self, _: u32) -> Result<(), SurfaceError> {
                Err(SurfaceError::Closed)
            }
            fn close(&mut self) {}
        }
        struct Mixed(CountingSurfaceProvider);
        impl SurfaceProvider for Mixed {
            fn create(&self, location: Location, w: u32, h: u32) -> Option<Box<dyn RenderSurface>> {
                if location.x == 0 {
                    Some(Box::new(Failing))
                } else {
                    self.0.create(location, w, h)
                }
            }
        }

        let surfaces = CountingSurfaceProvider::new();
        let mut reg = SessionRegistry::new(
            Box::new(NoProbe),
            Box::new(Mixed(surfaces.clone())),
            PlayerConfig::default(),
        );
        reg.get_or_create(Location::new(0, 0, 0)).play(URL, "medium", 1);
        reg.get_or_create(Location::new(1, 0, 0)).play(URL, "medium", 1);
        assert_eq!(reg.tick(None), 1);
        assert_eq!(surfaces.stats(Location::new(1, 0, 0)).unwrap().uploads, 1);
    }

    #[test]
    fn clear_releases_everything() {
        let engine = Arc::new(MockEngine::new("mock"));
        let mut reg = SessionRegistry::new(
            Box::new(StaticProbe::new().with("mcef", engine.clone())),
            Box::new(NullSurfaceProvider),
            PlayerConfig::default(),
        );
        for x in 0..3 {
            reg.get_or_create(Location::new(x, 0, 0)).play(URL, "medium", 1);
        }
        assert_eq!(reg.playing_count(), 3);
        reg.clear();
        assert!(reg.is_empty());
        assert_eq!(engine.state.closed.load(Ordering::SeqCst), 3);
    }
}

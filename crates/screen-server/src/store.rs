//! Authoritative screen store.
//!
//! Owned by the tick thread. Control messages mutate the per-location
//! [`ScreenState`]; every accepted control yields the snapshot to broadcast.
//! State is persisted as a JSON object keyed by `"x,y,z"`.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};

use screen_proto::{ActionKind, ControlMessage, SyncMessage};
use screen_types::{Location, PersistedScreen, ScreenState};

#[derive(Debug, Default)]
pub struct ScreenStore {
    screens: BTreeMap<Location, ScreenState>,
    dirty: bool,
}

impl ScreenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a screen with default state. Returns `false` if it already existed.
    pub fn register(&mut self, location: Location) -> bool {
        if self.screens.contains_key(&location) {
            return false;
        }
        self.screens.insert(location, ScreenState::default());
        self.dirty = true;
        true
    }

    /// Drop a screen and its persisted state. Returns `false` if it was unknown.
    pub fn unregister(&mut self, location: Location) -> bool {
        if self.screens.remove(&location).is_none() {
            return false;
        }
        self.dirty = true;
        true
    }

    /// Registered locations, ordered.
    pub fn locations(&self) -> Vec<Location> {
        self.screens.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.screens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.screens.is_empty()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Apply one control message.
    ///
    /// Returns `None` for unknown locations. A rejected url still returns the
    /// current snapshot so the sender's optimistic echo gets corrected.
    pub fn apply_control(&mut self, msg: &ControlMessage) -> Option<SyncMessage> {
        let Some(state) = self.screens.get_mut(&msg.location) else {
            tracing::warn!(location = %msg.location, action = ?msg.action, "control for unknown screen ignored");
            return None;
        };
        match msg.action {
            ActionKind::Play => state.play(),
            ActionKind::Pause => state.pause(),
            ActionKind::Stop => state.stop(),
            ActionKind::SetUrl => {
                if !state.set_url(&msg.url) {
                    tracing::warn!(location = %msg.location, url = %msg.url, "rejected url");
                }
            }
            ActionKind::SetVolume => state.set_volume(msg.volume),
            ActionKind::Seek => state.set_position(msg.seek_position),
        }
        self.dirty = true;
        tracing::debug!(
            location = %msg.location,
            action = ?msg.action,
            url = %state.url(),
            playing = state.is_playing(),
            "control applied"
        );
        Some(snapshot_of(msg.location, state))
    }

    pub fn snapshot(&self, location: Location) -> Option<SyncMessage> {
        self.screens
            .get(&location)
            .map(|state| snapshot_of(location, state))
    }

    /// Snapshots for every screen, ordered by location.
    pub fn snapshots(&self) -> Vec<SyncMessage> {
        self.screens
            .keys()
            .filter_map(|location| self.snapshot(*location))
            .collect()
    }

    /// Advance every playing screen by `delta_ms`.
    pub fn advance(&mut self, delta_ms: u64) {
        for state in self.screens.values_mut() {
            if state.is_playing() {
                state.advance(delta_ms);
                self.dirty = true;
            }
        }
    }

    /// Load persisted screens. A missing file yields an empty store.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::info!(path = ?path, "no state file; starting empty");
            return Ok(Self::new());
        }
        let raw = std::fs::read_to_string(path).with_context(|| format!("read state {:?}", path))?;
        let records: BTreeMap<String, PersistedScreen> =
            serde_json::from_str(&raw).with_context(|| format!("parse state {:?}", path))?;
        let mut screens = BTreeMap::new();
        for (key, record) in records {
            match key.parse::<Location>() {
                Ok(location) => {
                    screens.insert(location, ScreenState::restore(&record));
                }
                Err(err) => tracing::warn!(key = %key, error = %err, "skipping bad state entry"),
            }
        }
        tracing::info!(path = ?path, screens = screens.len(), "state loaded");
        Ok(Self {
            screens,
            dirty: false,
        })
    }

    /// Write all screens to `path` and clear the dirty flag.
    pub fn save(&mut self, path: &Path) -> Result<()> {
        let records: BTreeMap<String, PersistedScreen> = self
            .screens
            .iter()
            .map(|(location, state)| (location.to_string(), state.persist()))
            .collect();
        let json = serde_json::to_string_pretty(&records).context("encode state")?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create state dir {:?}", parent))?;
        }
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json).with_context(|| format!("write state {:?}", tmp))?;
        std::fs::rename(&tmp, path).with_context(|| format!("replace state {:?}", path))?;
        self.dirty = false;
        tracing::debug!(path = ?path, screens = self.screens.len(), "state saved");
        Ok(())
    }
}

fn snapshot_of(location: Location, state: &ScreenState) -> SyncMessage {
    SyncMessage {
        location,
        url: state.url().to_string(),
        playing: state.is_playing(),
        position: i64::try_from(state.position()).unwrap_or(i64::MAX),
        volume: state.volume(),
    }
}

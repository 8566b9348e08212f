//! Serializable snapshots of client-side playback state.

use serde::Serialize;

use crate::backend::Readiness;

/// One session as reported by `watch` status logging.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionStatus {
    pub location: String,
    pub serial: u64,
    pub url: String,
    pub playing: bool,
    pub position_ms: u64,
    pub volume: f32,
    /// Last distance-attenuated volume, once one was computed.
    pub effective_volume: Option<f32>,
    pub backend: String,
    pub readiness: Readiness,
    pub title: Option<String>,
}

/// Whole-registry snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegistryStatus {
    pub sessions: Vec<SessionStatus>,
    pub playing: usize,
}

impl RegistryStatus {
    pub fn new(sessions: Vec<SessionStatus>) -> Self {
        let playing = sessions.iter().filter(|s| s.playing).count();
        Self { sessions, playing }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_snake_case_readiness() {
        let status = RegistryStatus::new(vec![SessionStatus {
            location: "1,2,3".to_string(),
            serial: 7,
            url: "https://www.youtube.com/watch?v=dQw4w9WgXcQ".to_string(),
            playing: true,
            position_ms: 1500,
            volume: 0.5,
            effective_volume: None,
            backend: "none".to_string(),
            readiness: Readiness::Uninitialized,
            title: None,
        }]);
        assert_eq!(status.playing, 1);
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["sessions"][0]["readiness"], "uninitialized");
        assert_eq!(json["sessions"][0]["location"], "1,2,3");
    }
}

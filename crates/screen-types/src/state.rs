//! Authoritative per-screen playback record.
//!
//! The server owns one [`ScreenState`] per screen location and persists it;
//! every client keeps a mirrored copy updated from sync snapshots. All writes
//! go through validated setters so the record can never hold an out-of-range
//! value.

use serde::{Deserialize, Serialize};

use crate::media_url;
use crate::options::{
    self, DEFAULT_QUALITY_INDEX, DEFAULT_SCREEN_SIZE, DEFAULT_SOURCE_INDEX, DEFAULT_SPEED_INDEX,
    QUALITY_OPTIONS, SPEED_OPTIONS, VIDEO_SOURCES, VideoSource,
};

/// Persisted field set, as written by the storage layer.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistedScreen {
    #[serde(rename = "VideoUrl")]
    pub video_url: String,
    /// Stored for compatibility; ignored on restore.
    #[serde(rename = "Playing")]
    pub playing: bool,
    #[serde(rename = "Position")]
    pub position: i64,
    #[serde(rename = "Volume")]
    pub volume: f32,
    #[serde(rename = "ScreenSize")]
    pub screen_size: i32,
    #[serde(rename = "QualityIndex")]
    pub quality_index: i32,
    #[serde(rename = "SourceIndex")]
    pub source_index: i32,
    #[serde(rename = "SpeedIndex")]
    pub speed_index: i32,
}

/// Desired playback state for one screen.
#[derive(Clone, Debug, PartialEq)]
pub struct ScreenState {
    url: String,
    playing: bool,
    position: u64,
    volume: f32,
    screen_size: i32,
    quality_index: i32,
    source_index: i32,
    speed_index: i32,
}

impl Default for ScreenState {
    fn default() -> Self {
        Self {
            url: String::new(),
            playing: false,
            position: 0,
            volume: 1.0,
            screen_size: DEFAULT_SCREEN_SIZE,
            quality_index: DEFAULT_QUALITY_INDEX,
            source_index: DEFAULT_SOURCE_INDEX,
            speed_index: DEFAULT_SPEED_INDEX,
        }
    }
}

impl ScreenState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Playback offset in milliseconds.
    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn screen_size(&self) -> i32 {
        self.screen_size
    }

    pub fn quality_index(&self) -> i32 {
        self.quality_index
    }

    pub fn source_index(&self) -> i32 {
        self.source_index
    }

    pub fn speed_index(&self) -> i32 {
        self.speed_index
    }

    pub fn quality(&self) -> &'static str {
        QUALITY_OPTIONS[self.quality_index as usize]
    }

    pub fn speed(&self) -> f32 {
        SPEED_OPTIONS[self.speed_index as usize]
    }

    pub fn source(&self) -> VideoSource {
        VIDEO_SOURCES[self.source_index as usize]
    }

    /// Start playback; ignored while no media is selected.
    pub fn play(&mut self) {
        if !self.url.is_empty() {
            self.playing = true;
        }
    }

    pub fn pause(&mut self) {
        self.playing = false;
    }

    pub fn stop(&mut self) {
        self.playing = false;
        self.position = 0;
    }

    /// Select the media URL.
    ///
    /// Empty input clears the selection (and stops playback). Recognised video
    /// URLs are canonicalized, other web URLs get a default scheme, anything
    /// else is rejected and leaves the state unchanged. Returns `true` when
    /// the input was accepted.
    pub fn set_url(&mut self, url: &str) -> bool {
        let trimmed = url.trim();
        if trimmed.is_empty() {
            self.url.clear();
            self.playing = false;
            return true;
        }
        let canonical = media_url::normalize(trimmed);
        let accepted = if !canonical.is_empty() {
            canonical
        } else if media_url::is_valid_web_url(trimmed) {
            media_url::normalize_web_url(trimmed)
        } else {
            return false;
        };
        if accepted != self.url {
            self.position = 0;
        }
        self.url = accepted;
        true
    }

    /// Clamp to `[0, 1]`; NaN is ignored.
    pub fn set_volume(&mut self, volume: f32) {
        if volume.is_nan() {
            return;
        }
        self.volume = volume.clamp(0.0, 1.0);
    }

    /// Negative offsets clamp to zero.
    pub fn set_position(&mut self, position: i64) {
        self.position = position.max(0) as u64;
    }

    /// Advance the offset while playing.
    pub fn advance(&mut self, delta_ms: u64) {
        if self.playing {
            self.position = self.position.saturating_add(delta_ms);
        }
    }

    /// Sizes outside the allowed table reset to the default.
    pub fn set_screen_size(&mut self, size: i32) {
        self.screen_size = if options::is_valid_size(size) {
            size
        } else {
            DEFAULT_SCREEN_SIZE
        };
    }

    pub fn set_quality_index(&mut self, index: i32) {
        if options::is_valid_quality_index(index) {
            self.quality_index = index;
        }
    }

    pub fn set_source_index(&mut self, index: i32) {
        if options::is_valid_source_index(index) {
            self.source_index = index;
        }
    }

    pub fn set_speed_index(&mut self, index: i32) {
        if options::is_valid_speed_index(index) {
            self.speed_index = index;
        }
    }

    /// Snapshot every field for the storage layer.
    pub fn persist(&self) -> PersistedScreen {
        PersistedScreen {
            video_url: self.url.clone(),
            playing: self.playing,
            position: i64::try_from(self.position).unwrap_or(i64::MAX),
            volume: self.volume,
            screen_size: self.screen_size,
            quality_index: self.quality_index,
            source_index: self.source_index,
            speed_index: self.speed_index,
        }
    }

    /// Rebuild from persisted data, re-validating every field.
    ///
    /// The record may have been written by a build with looser validation, so
    /// out-of-range values fall back to defaults and a url that fails
    /// validation is dropped. Playback never resumes on load: `playing` is
    /// always `false` afterwards.
    pub fn restore(tag: &PersistedScreen) -> Self {
        let volume = if tag.volume.is_nan() || !(0.0..=1.0).contains(&tag.volume) {
            1.0
        } else {
            tag.volume
        };
        let mut state = Self {
            url: String::new(),
            playing: false,
            position: 0,
            volume,
            screen_size: if options::is_valid_size(tag.screen_size) {
                tag.screen_size
            } else {
                DEFAULT_SCREEN_SIZE
            },
            quality_index: if options::is_valid_quality_index(tag.quality_index) {
                tag.quality_index
            } else {
                DEFAULT_QUALITY_INDEX
            },
            source_index: if options::is_valid_source_index(tag.source_index) {
                tag.source_index
            } else {
                DEFAULT_SOURCE_INDEX
            },
            speed_index: if options::is_valid_speed_index(tag.speed_index) {
                tag.speed_index
            } else {
                DEFAULT_SPEED_INDEX
            },
        };
        state.set_url(&tag.video_url);
        state.set_position(tag.position);
        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn populated() -> ScreenState {
        let mut s = ScreenState::new();
        assert!(s.set_url("https://youtu.be/dQw4w9WgXcQ"));
        s.set_position(12_345);
        s.set_volume(0.4);
        s.set_screen_size(8);
        s.set_quality_index(2);
        s.set_source_index(5);
        s.set_speed_index(6);
        s.play();
        s
    }

    #[test]
    fn play_requires_url() {
        let mut s = ScreenState::new();
        s.play();
        assert!(!s.is_playing());
        s.set_url("https://youtu.be/dQw4w9WgXcQ");
        s.play();
        assert!(s.is_playing());
    }

    #[test]
    fn clearing_url_stops_playback() {
        let mut s = populated();
        assert!(s.set_url(""));
        assert_eq!(s.url(), "");
        assert!(!s.is_playing());
    }

    #[test]
    fn set_url_canonicalizes_and_rejects_garbage() {
        let mut s = ScreenState::new();
        assert!(s.set_url("https://youtu.be/abc12345678"));
        assert_eq!(s.url(), "https://www.youtube.com/watch?v=abc12345678");
        assert!(!s.set_url("not a url at all"));
        assert_eq!(s.url(), "https://www.youtube.com/watch?v=abc12345678");
        assert!(s.set_url("cdn.example.com/clip.mp4"));
        assert_eq!(s.url(), "https://cdn.example.com/clip.mp4");
    }

    #[test]
    fn volume_is_clamped_and_nan_ignored() {
        let mut s = ScreenState::new();
        s.set_volume(3.0);
        assert_eq!(s.volume(), 1.0);
        s.set_volume(-1.0);
        assert_eq!(s.volume(), 0.0);
        s.set_volume(f32::NAN);
        assert_eq!(s.volume(), 0.0);
    }

    #[test]
    fn invalid_screen_sizes_reset_to_default() {
        let mut s = ScreenState::new();
        for size in [0, 3, 5, 7, 9, 11, 13, -2, i32::MAX] {
            s.set_screen_size(12);
            s.set_screen_size(size);
            assert_eq!(s.screen_size(), DEFAULT_SCREEN_SIZE, "size {size}");
        }
        s.set_screen_size(10);
        assert_eq!(s.screen_size(), 10);
    }

    #[test]
    fn invalid_indices_keep_prior_value() {
        let mut s = ScreenState::new();
        s.set_quality_index(3);
        s.set_quality_index(4);
        assert_eq!(s.quality_index(), 3);
        s.set_source_index(0);
        s.set_source_index(-1);
        assert_eq!(s.source_index(), 0);
        s.set_speed_index(0);
        s.set_speed_index(7);
        assert_eq!(s.speed_index(), 0);
        assert_eq!(s.speed(), 0.25);
    }

    #[test]
    fn stop_rewinds_and_seek_clamps() {
        let mut s = populated();
        s.set_position(-50);
        assert_eq!(s.position(), 0);
        s.set_position(900);
        s.stop();
        assert!(!s.is_playing());
        assert_eq!(s.position(), 0);
    }

    #[test]
    fn advance_only_while_playing() {
        let mut s = populated();
        let before = s.position();
        s.advance(50);
        assert_eq!(s.position(), before + 50);
        s.pause();
        s.advance(50);
        assert_eq!(s.position(), before + 50);
    }

    #[test]
    fn restore_roundtrip_forces_not_playing() {
        let s = populated();
        assert!(s.is_playing());
        let restored = ScreenState::restore(&s.persist());
        assert!(!restored.is_playing());
        let mut expected = s.clone();
        expected.pause();
        assert_eq!(restored, expected);
    }

    #[test]
    fn restore_resets_out_of_range_fields() {
        let tag = PersistedScreen {
            video_url: "https://www.youtube.com/watch?v=dQw4w9WgXcQ".to_string(),
            playing: true,
            position: -10,
            volume: f32::NAN,
            screen_size: 7,
            quality_index: 9,
            source_index: 6,
            speed_index: -1,
        };
        let s = ScreenState::restore(&tag);
        assert!(!s.is_playing());
        assert_eq!(s.position(), 0);
        assert_eq!(s.volume(), 1.0);
        assert_eq!(s.screen_size(), 2);
        assert_eq!(s.quality_index(), 1);
        assert_eq!(s.source_index(), 1);
        assert_eq!(s.speed_index(), 3);

        let loud = PersistedScreen {
            volume: 1.5,
            ..tag
        };
        assert_eq!(ScreenState::restore(&loud).volume(), 1.0);
    }

    #[test]
    fn restore_validates_stored_url() {
        let tag = PersistedScreen {
            video_url: "https://youtu.be/abc12345678".to_string(),
            position: 9_000,
            volume: 0.5,
            ..PersistedScreen::default()
        };
        let s = ScreenState::restore(&tag);
        assert_eq!(s.url(), "https://www.youtube.com/watch?v=abc12345678");
        assert_eq!(s.position(), 9_000);

        let junk = PersistedScreen {
            video_url: "not a url at all".to_string(),
            ..tag
        };
        let s = ScreenState::restore(&junk);
        assert_eq!(s.url(), "");
        assert_eq!(s.volume(), 0.5);
    }
}

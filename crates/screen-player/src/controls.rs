//! Control-panel logic for one screen.
//!
//! User actions are validated locally, echoed optimistically into the mirror
//! and the session, and returned as control messages for the server. Invalid
//! input produces a [`Notice`] instead and changes nothing.

use screen_proto::ControlMessage;
use screen_types::{Location, media_url};

use crate::mirror::ScreenMirror;
use crate::registry::SessionRegistry;

/// Ticks a notice stays visible.
pub const NOTICE_TICKS: u32 = 60;
/// Volume change per button press.
pub const VOLUME_STEP: f32 = 0.1;

pub const MSG_EMPTY_URL: &str = "Please enter a URL";
pub const MSG_INVALID_URL: &str = "Invalid URL format";

/// Transient user-visible message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub message: String,
    pub remaining_ticks: u32,
}

#[derive(Debug)]
pub struct ControlPanel {
    location: Location,
    notice: Option<Notice>,
}

impl ControlPanel {
    pub fn new(location: Location) -> Self {
        Self {
            location,
            notice: None,
        }
    }

    pub fn location(&self) -> Location {
        self.location
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    /// Count down the active notice.
    pub fn tick(&mut self) {
        if let Some(notice) = self.notice.as_mut() {
            notice.remaining_ticks = notice.remaining_ticks.saturating_sub(1);
            if notice.remaining_ticks == 0 {
                self.notice = None;
            }
        }
    }

    /// Editing the url field dismisses any notice.
    pub fn url_edited(&mut self) {
        self.notice = None;
    }

    fn show(&mut self, message: &str) {
        tracing::debug!(location = %self.location, message, "control panel notice");
        self.notice = Some(Notice {
            message: message.to_string(),
            remaining_ticks: NOTICE_TICKS,
        });
    }

    /// Play a typed video url. Returns `[SetUrl, Play]` on success.
    pub fn submit_url(
        &mut self,
        input: &str,
        mirror: &mut ScreenMirror,
        registry: &mut SessionRegistry,
    ) -> Vec<ControlMessage> {
        let input = input.trim();
        if input.is_empty() {
            self.show(MSG_EMPTY_URL);
            return Vec::new();
        }
        if !media_url::is_valid(input) {
            self.show(MSG_INVALID_URL);
            return Vec::new();
        }
        self.notice = None;

        let url = media_url::normalize(input);
        let state = mirror.get_or_insert(self.location);
        state.set_url(&url);
        state.play();

        let session = registry.get_or_create(self.location);
        session.play(&url, state.quality(), state.source_index() as usize);
        session.set_playback_speed(state.speed());

        vec![
            ControlMessage::set_url(self.location, url),
            ControlMessage::play(self.location),
        ]
    }

    pub fn pause(&mut self, mirror: &mut ScreenMirror, registry: &mut SessionRegistry) -> ControlMessage {
        mirror.get_or_insert(self.location).pause();
        if let Some(session) = registry.get_mut(self.location) {
            session.pause();
        }
        ControlMessage::pause(self.location)
    }

    pub fn stop(&mut self, mirror: &mut ScreenMirror, registry: &mut SessionRegistry) -> ControlMessage {
        mirror.get_or_insert(self.location).stop();
        if let Some(session) = registry.get_mut(self.location) {
            session.stop();
        }
        ControlMessage::stop(self.location)
    }

    pub fn volume_up(&mut self, mirror: &mut ScreenMirror, registry: &mut SessionRegistry) -> ControlMessage {
        self.step_volume(VOLUME_STEP, mirror, registry)
    }

    pub fn volume_down(&mut self, mirror: &mut ScreenMirror, registry: &mut SessionRegistry) -> ControlMessage {
        self.step_volume(-VOLUME_STEP, mirror, registry)
    }

    fn step_volume(
        &mut self,
        delta: f32,
        mirror: &mut ScreenMirror,
        registry: &mut SessionRegistry,
    ) -> ControlMessage {
        let state = mirror.get_or_insert(self.location);
        let volume = (state.volume() + delta).clamp(0.0, 1.0);
        state.set_volume(volume);
        if let Some(session) = registry.get_mut(self.location) {
            session.set_volume(volume);
        }
        ControlMessage::set_volume(self.location, volume)
    }

    /// Quality selection is client-local; applies to the next load.
    pub fn select_quality(
        &mut self,
        index: i32,
        mirror: &mut ScreenMirror,
        registry: &mut SessionRegistry,
    ) -> bool {
        let state = mirror.get_or_insert(self.location);
        let before = state.quality_index();
        state.set_quality_index(index);
        let changed = state.quality_index() == index && before != index;
        self.apply_selection(mirror, registry);
        changed
    }

    pub fn select_source(
        &mut self,
        index: i32,
        mirror: &mut ScreenMirror,
        registry: &mut SessionRegistry,
    ) -> bool {
        let state = mirror.get_or_insert(self.location);
        let before = state.source_index();
        state.set_source_index(index);
        let changed = state.source_index() == index && before != index;
        self.apply_selection(mirror, registry);
        changed
    }

    /// Speed applies to the running session immediately.
    pub fn select_speed(
        &mut self,
        index: i32,
        mirror: &mut ScreenMirror,
        registry: &mut SessionRegistry,
    ) -> bool {
        let state = mirror.get_or_insert(self.location);
        let before = state.speed_index();
        state.set_speed_index(index);
        let changed = state.speed_index() == index && before != index;
        self.apply_selection(mirror, registry);
        changed
    }

    /// Invalid sizes reset to the default size.
    pub fn select_size(&mut self, size: i32, mirror: &mut ScreenMirror) -> i32 {
        let state = mirror.get_or_insert(self.location);
        state.set_screen_size(size);
        state.screen_size()
    }

    fn apply_selection(&self, mirror: &ScreenMirror, registry: &mut SessionRegistry) {
        let (Some(state), Some(session)) = (mirror.get(self.location), registry.get_mut(self.location))
        else {
            return;
        };
        session.configure(state.quality(), state.source_index() as usize, state.speed());
    }
}

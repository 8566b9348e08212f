//! Client-side playback session for one screen location.
//!
//! A session keeps the logical playback state (url, playing flag, position)
//! even when no backend exists, and forwards every command to its backend
//! when one does. Backend failures are logged and otherwise ignored.

use std::time::Instant;

use screen_types::Location;
use screen_types::options::{DEFAULT_QUALITY_INDEX, DEFAULT_SOURCE_INDEX, QUALITY_OPTIONS, VIDEO_SOURCES};

use crate::backend::{BackendError, KeyInput, PlaybackBackend, Readiness};
use crate::config::PlayerConfig;
use crate::status::SessionStatus;
use crate::surface::{COLOR_BLACK, COLOR_PAUSED, FrameBuffer, RenderSurface, SurfaceError};
use crate::volume;

/// Observer position in world coordinates.
pub type Observer = (f64, f64, f64);

pub struct PlaybackSession {
    location: Location,
    serial: u64,
    current_url: String,
    /// The backend has been asked to load `current_url`.
    loaded: bool,
    playing: bool,
    /// Offset at `started_at`, or the frozen offset while not playing.
    position_ms: u64,
    started_at: Option<Instant>,
    volume: f32,
    effective_volume: Option<f32>,
    /// Observer distance from the last spatial update.
    listener_distance: Option<f64>,
    quality: String,
    source_index: usize,
    speed: f32,
    tick_counter: u64,
    frame_owed: bool,
    released: bool,
    frame_interval_ticks: u64,
    volume_interval_ticks: u64,
    master_volume: f32,
    frame: Option<FrameBuffer>,
    backend: Option<Box<dyn PlaybackBackend>>,
    surface: Option<Box<dyn RenderSurface>>,
}

impl PlaybackSession {
    pub fn new(
        location: Location,
        serial: u64,
        backend: Option<Box<dyn PlaybackBackend>>,
        surface: Option<Box<dyn RenderSurface>>,
        config: &PlayerConfig,
    ) -> Self {
        let frame = surface
            .as_ref()
            .map(|_| FrameBuffer::new(config.surface_width, config.surface_height));
        Self {
            location,
            serial,
            current_url: String::new(),
            loaded: false,
            playing: false,
            position_ms: 0,
            started_at: None,
            volume: 1.0,
            effective_volume: None,
            listener_distance: None,
            quality: QUALITY_OPTIONS[DEFAULT_QUALITY_INDEX as usize].to_string(),
            source_index: DEFAULT_SOURCE_INDEX as usize,
            speed: 1.0,
            tick_counter: 0,
            frame_owed: true,
            released: false,
            frame_interval_ticks: u64::from(config.frame_interval_ticks.max(1)),
            volume_interval_ticks: u64::from(config.volume_interval_ticks.max(1)),
            master_volume: config.master_volume,
            frame,
            backend,
            surface,
        }
    }

    pub fn location(&self) -> Location {
        self.location
    }

    /// Registry-unique id; two lookups returning the same serial saw the same session.
    pub fn serial(&self) -> u64 {
        self.serial
    }

    pub fn current_url(&self) -> &str {
        &self.current_url
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    /// Last distance-attenuated volume pushed to the backend.
    pub fn effective_volume(&self) -> Option<f32> {
        self.effective_volume
    }

    pub fn quality(&self) -> &str {
        &self.quality
    }

    pub fn source_index(&self) -> usize {
        self.source_index
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    pub fn started_at(&self) -> Option<Instant> {
        self.started_at
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Media offset, advancing at the playback speed while playing.
    pub fn position_ms(&self) -> u64 {
        match self.started_at {
            Some(start) if self.playing => {
                let elapsed = start.elapsed().as_secs_f64() * 1000.0 * f64::from(self.speed);
                self.position_ms.saturating_add(elapsed as u64)
            }
            _ => self.position_ms,
        }
    }

    pub fn backend_kind(&self) -> &str {
        self.backend.as_ref().map(|b| b.kind()).unwrap_or("none")
    }

    pub fn readiness(&self) -> Readiness {
        self.backend
            .as_ref()
            .map(|b| b.readiness())
            .unwrap_or(Readiness::Unavailable)
    }

    pub fn title(&self) -> Option<String> {
        self.backend.as_ref().and_then(|b| b.title())
    }

    pub fn is_loading(&self) -> bool {
        self.backend.as_ref().is_some_and(|b| b.is_loading())
    }

    pub fn can_go_back(&self) -> bool {
        self.backend.as_ref().is_some_and(|b| b.can_go_back())
    }

    pub fn can_go_forward(&self) -> bool {
        self.backend.as_ref().is_some_and(|b| b.can_go_forward())
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            location: self.location.to_string(),
            serial: self.serial,
            url: self.current_url.clone(),
            playing: self.playing,
            position_ms: self.position_ms(),
            volume: self.volume,
            effective_volume: self.effective_volume,
            backend: self.backend_kind().to_string(),
            readiness: self.readiness(),
            title: self.title(),
        }
    }

    /// Start `url` from the beginning.
    pub fn play(&mut self, url: &str, quality: &str, source_index: usize) {
        if url.is_empty() {
            tracing::warn!(location = %self.location, "cannot play empty url");
            return;
        }
        self.current_url = url.to_string();
        self.quality = quality.to_string();
        if source_index < VIDEO_SOURCES.len() {
            self.source_index = source_index;
        }
        self.loaded = true;
        self.playing = true;
        self.position_ms = 0;
        self.started_at = Some(Instant::now());
        self.frame_owed = true;

        let (url, quality, source) = (self.current_url.clone(), self.quality.clone(), self.source_index);
        self.forward("play", |b| b.play(&url, &quality, source));
        tracing::info!(
            location = %self.location,
            url = %self.current_url,
            quality = %self.quality,
            source = VIDEO_SOURCES[self.source_index].name,
            "playback started"
        );
    }

    pub fn pause(&mut self) {
        if !self.playing {
            return;
        }
        self.position_ms = self.position_ms();
        self.playing = false;
        self.started_at = None;
        self.forward("pause", |b| b.pause());
        self.fill_surface(COLOR_PAUSED);
        tracing::debug!(location = %self.location, position_ms = self.position_ms, "paused");
    }

    /// Continue from the remembered position.
    ///
    /// A url that was only cued is loaded first and then seeked.
    pub fn resume(&mut self) {
        if self.playing || self.current_url.is_empty() {
            return;
        }
        self.playing = true;
        self.started_at = Some(Instant::now());
        self.frame_owed = true;

        if self.loaded {
            self.forward("resume", |b| b.resume());
        } else {
            self.loaded = true;
            let (url, quality, source) = (self.current_url.clone(), self.quality.clone(), self.source_index);
            let position = self.position_ms;
            self.forward("play", |b| b.play(&url, &quality, source));
            if position > 0 {
                self.forward("seek", |b| b.seek(position));
            }
        }
        tracing::debug!(location = %self.location, position_ms = self.position_ms, "resumed");
    }

    pub fn stop(&mut self) {
        self.playing = false;
        self.position_ms = 0;
        self.started_at = None;
        self.loaded = false;
        self.forward("stop", |b| b.stop());
        self.fill_surface(COLOR_BLACK);
        tracing::debug!(location = %self.location, "stopped");
    }

    /// Select `url` without starting it. An empty url stops and clears the session.
    pub fn cue(&mut self, url: &str) {
        if url == self.current_url {
            return;
        }
        if url.is_empty() {
            self.stop();
            self.current_url.clear();
            return;
        }
        if self.playing {
            let (quality, source) = (self.quality.clone(), self.source_index);
            self.play(url, &quality, source);
        } else {
            self.current_url = url.to_string();
            self.loaded = false;
            self.position_ms = 0;
        }
    }

    /// Clamped to `[0, 1]`; NaN is ignored.
    ///
    /// Once a spatial update has run, the backend receives the attenuated
    /// value for the last known observer distance.
    pub fn set_volume(&mut self, volume: f32) {
        if volume.is_nan() {
            return;
        }
        self.volume = volume.clamp(0.0, 1.0);
        let v = match self.listener_distance {
            Some(distance) => {
                let effective = volume::attenuate_with_master(distance, self.volume, self.master_volume);
                self.effective_volume = Some(effective);
                effective
            }
            None => self.volume,
        };
        self.forward("set_volume", |b| b.set_volume(v));
    }

    pub fn set_playback_speed(&mut self, speed: f32) {
        if !(speed > 0.0 && speed.is_finite()) {
            return;
        }
        // Bank the offset reached at the old speed.
        self.position_ms = self.position_ms();
        if self.playing {
            self.started_at = Some(Instant::now());
        }
        self.speed = speed;
        self.forward("set_speed", |b| b.set_speed(speed));
        tracing::debug!(location = %self.location, speed, "playback speed set");
    }

    pub fn seek(&mut self, position_ms: u64) {
        self.position_ms = position_ms;
        if self.playing {
            self.started_at = Some(Instant::now());
        }
        self.forward("seek", |b| b.seek(position_ms));
    }

    /// Update quality/source used by the next load and apply the speed now.
    pub fn configure(&mut self, quality: &str, source_index: usize, speed: f32) {
        self.quality = quality.to_string();
        if source_index < VIDEO_SOURCES.len() {
            self.source_index = source_index;
        }
        if speed != self.speed {
            self.set_playback_speed(speed);
        }
    }

    pub fn go_back(&mut self) {
        self.forward("go_back", |b| b.go_back());
    }

    pub fn go_forward(&mut self) {
        self.forward("go_forward", |b| b.go_forward());
    }

    pub fn reload(&mut self) {
        self.forward("reload", |b| b.reload());
    }

    /// Navigate the backend directly (address-bar input).
    pub fn load_url(&mut self, url: &str) {
        if url.is_empty() {
            return;
        }
        self.current_url = url.to_string();
        self.loaded = true;
        self.forward("load_url", |b| b.load_url(url));
    }

    pub fn send_key(&mut self, input: KeyInput) {
        self.forward("send_key", |b| b.send_key(input));
    }

    pub fn send_char(&mut self, ch: char, modifiers: i32) {
        self.forward("send_char", |b| b.send_char(ch, modifiers));
    }

    pub fn send_mouse_move(&mut self, x: i32, y: i32) {
        self.forward("send_mouse_move", |b| b.send_mouse_move(x, y));
    }

    pub fn send_mouse_button(&mut self, x: i32, y: i32, button: i32, pressed: bool) {
        self.forward("send_mouse_button", |b| b.send_mouse_button(x, y, button, pressed));
    }

    pub fn send_mouse_scroll(&mut self, x: i32, y: i32, delta_x: f64, delta_y: f64) {
        self.forward("send_mouse_scroll", |b| b.send_mouse_scroll(x, y, delta_x, delta_y));
    }

    /// Per-tick update.
    ///
    /// The backend is always ticked so pending loads progress. While playing,
    /// frames are pushed every `frame_interval_ticks` (or right after a state
    /// change) and spatial volume is recomputed every `volume_interval_ticks`.
    pub fn tick(&mut self, observer: Option<Observer>) -> Result<(), SurfaceError> {
        if let Some(backend) = self.backend.as_mut() {
            backend.tick();
        }
        if !self.playing {
            return Ok(());
        }
        self.tick_counter += 1;

        let mut frame_result = Ok(());
        if self.frame_owed || self.tick_counter % self.frame_interval_ticks == 0 {
            self.frame_owed = false;
            frame_result = self.push_frame();
        }

        if self.tick_counter % self.volume_interval_ticks == 0 {
            if let Some(observer) = observer {
                self.update_spatial_volume(observer);
            }
        }
        frame_result
    }

    /// Best-effort teardown of backend and surface, then reset to the empty state.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        tracing::debug!(location = %self.location, serial = self.serial, "releasing session");
        if let Some(mut backend) = self.backend.take() {
            backend.release();
        }
        if let Some(mut surface) = self.surface.take() {
            surface.close();
        }
        self.frame = None;
        self.current_url.clear();
        self.loaded = false;
        self.playing = false;
        self.position_ms = 0;
        self.started_at = None;
        self.effective_volume = None;
        self.listener_distance = None;
        self.released = true;
    }

    fn update_spatial_volume(&mut self, observer: Observer) {
        let distance = self.location.distance_sq_to(observer).sqrt();
        self.listener_distance = Some(distance);
        let effective = volume::attenuate_with_master(distance, self.volume, self.master_volume);
        self.effective_volume = Some(effective);
        self.forward("set_volume", |b| b.set_volume(effective));
    }

    fn push_frame(&mut self) -> Result<(), SurfaceError> {
        let Some(surface) = self.surface.as_mut() else {
            return Ok(());
        };
        if let Some(texture) = self.backend.as_ref().and_then(|b| b.texture_handle()) {
            return surface.present_texture(texture);
        }
        match self.frame.as_mut() {
            Some(frame) => {
                frame.fill_playing_indicator();
                surface.upload(frame)
            }
            None => Ok(()),
        }
    }

    fn fill_surface(&mut self, color: u32) {
        if let (Some(surface), Some(frame)) = (self.surface.as_mut(), self.frame.as_mut()) {
            frame.fill(color);
            if let Err(err) = surface.upload(frame) {
                tracing::debug!(location = %self.location, error = %err, "surface fill failed");
            }
        }
    }

    fn forward(
        &mut self,
        op: &'static str,
        call: impl FnOnce(&mut dyn PlaybackBackend) -> Result<(), BackendError>,
    ) {
        let Some(backend) = self.backend.as_mut() else {
            return;
        };
        match call(&mut **backend) {
            Ok(()) => {}
            Err(BackendError::NotReady) => {
                tracing::debug!(location = %self.location, op, "backend not ready");
            }
            Err(err) => {
                tracing::warn!(location = %self.location, op, error = %err, "backend command failed");
            }
        }
    }
}

impl Drop for PlaybackSession {
    fn drop(&mut self) {
        self.release();
    }
}

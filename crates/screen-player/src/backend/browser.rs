//! Browser-engine backend.
//!
//! Media plays inside an embedded browser page; transport commands are page
//! scripts against the first `<video>` element. Creating the browser handle is
//! deferred until the engine reports ready, so `play` may only record a pending
//! load that [`PlaybackBackend::tick`] completes later.

use std::sync::Arc;

use screen_types::Location;
use screen_types::media_url;
use screen_types::options::{VIDEO_SOURCES, YOUTUBE_SOURCE_INDEX};

use super::probe::{BrowserEngine, BrowserHandle};
use super::{BackendError, KeyInput, PlaybackBackend, Readiness};
use crate::config::PlayerConfig;

const BLANK_PAGE: &str = "about:blank";
/// Engine wheel units per scroll notch.
const WHEEL_UNITS: f64 = 120.0;

/// Derive the page URL to load for `url` under the selected source.
///
/// The direct source (and any URL without a recognisable video id) is loaded
/// verbatim. The first-party source only gets `autoplay`; mirror sources also
/// get the quality selection.
pub fn embed_url(url: &str, source_index: usize, quality: &str) -> String {
    let Some(base) = VIDEO_SOURCES.get(source_index).and_then(|s| s.embed_base) else {
        return url.to_string();
    };
    let Some(id) = media_url::extract_video_id(url) else {
        return url.to_string();
    };
    if source_index == YOUTUBE_SOURCE_INDEX {
        format!("{base}{id}?autoplay=1")
    } else {
        format!("{base}{id}?autoplay=1&local=true&quality={quality}")
    }
}

fn video_script(statement: &str) -> String {
    format!("if (document.querySelector('video')) document.querySelector('video').{statement};")
}

struct PendingLoad {
    url: String,
    ticks: u32,
}

pub struct BrowserBackend {
    capability: &'static str,
    engine: Arc<dyn BrowserEngine>,
    handle: Option<Box<dyn BrowserHandle>>,
    pending: Option<PendingLoad>,
    released: bool,
    location: Location,
    init_delay_ticks: u32,
    init_timeout_ticks: u32,
    width: u32,
    height: u32,
}

impl BrowserBackend {
    pub fn new(
        capability: &'static str,
        engine: Arc<dyn BrowserEngine>,
        location: Location,
        config: &PlayerConfig,
    ) -> Self {
        Self {
            capability,
            engine,
            handle: None,
            pending: None,
            released: false,
            location,
            init_delay_ticks: config.init_delay_ticks,
            init_timeout_ticks: config.init_timeout_ticks,
            width: config.surface_width,
            height: config.surface_height,
        }
    }

    /// URL waiting for the browser handle, if any.
    pub fn pending_url(&self) -> Option<&str> {
        self.pending.as_ref().map(|p| p.url.as_str())
    }

    /// Try to create the handle; returns whether one exists afterwards.
    fn ensure_handle(&mut self) -> bool {
        if self.handle.is_some() {
            return true;
        }
        if !self.engine.is_ready() {
            tracing::debug!(location = %self.location, engine = self.engine.name(), "browser engine not ready");
            return false;
        }
        match self
            .engine
            .create_browser(BLANK_PAGE, self.width, self.height)
        {
            Ok(handle) => {
                tracing::info!(
                    location = %self.location,
                    width = self.width,
                    height = self.height,
                    "browser created"
                );
                self.handle = Some(handle);
                true
            }
            Err(err) => {
                tracing::warn!(location = %self.location, error = %err, "browser creation failed");
                false
            }
        }
    }

    fn handle_mut(&mut self) -> Result<&mut Box<dyn BrowserHandle>, BackendError> {
        if self.released {
            return Err(BackendError::Unavailable);
        }
        self.handle.as_mut().ok_or(BackendError::NotReady)
    }

    fn script(&mut self, statement: &str) -> Result<(), BackendError> {
        let script = video_script(statement);
        self.handle_mut()?
            .execute_script(&script)
            .map_err(BackendError::Call)
    }

    fn load(&mut self, url: &str) -> Result<(), BackendError> {
        let location = self.location;
        self.handle_mut()?.load_url(url).map_err(BackendError::Call)?;
        tracing::info!(%location, url, "browser loading url");
        Ok(())
    }
}

impl PlaybackBackend for BrowserBackend {
    fn kind(&self) -> &str {
        self.capability
    }

    fn readiness(&self) -> Readiness {
        if self.released {
            Readiness::Unavailable
        } else if self.handle.is_some() {
            Readiness::Ready
        } else {
            Readiness::Uninitialized
        }
    }

    fn play(&mut self, url: &str, quality: &str, source_index: usize) -> Result<(), BackendError> {
        if self.released {
            return Err(BackendError::Unavailable);
        }
        if url.is_empty() {
            return Err(BackendError::Call("empty url".to_string()));
        }
        let target = embed_url(url, source_index, quality);
        if self.ensure_handle() {
            self.pending = None;
            self.load(&target)
        } else {
            tracing::debug!(location = %self.location, url = %target, "browser load deferred");
            self.pending = Some(PendingLoad {
                url: target,
                ticks: 0,
            });
            Ok(())
        }
    }

    fn pause(&mut self) -> Result<(), BackendError> {
        self.script("pause()")
    }

    fn resume(&mut self) -> Result<(), BackendError> {
        self.script("play()")
    }

    fn stop(&mut self) -> Result<(), BackendError> {
        self.pending = None;
        self.load(BLANK_PAGE)
    }

    fn set_volume(&mut self, volume: f32) -> Result<(), BackendError> {
        let volume = volume.clamp(0.0, 1.0);
        self.script(&format!("volume = {volume}"))
    }

    fn set_speed(&mut self, speed: f32) -> Result<(), BackendError> {
        self.script(&format!("playbackRate = {speed}"))
    }

    fn seek(&mut self, position_ms: u64) -> Result<(), BackendError> {
        let secs = position_ms as f64 / 1000.0;
        self.script(&format!("currentTime = {secs}"))
    }

    fn go_back(&mut self) -> Result<(), BackendError> {
        self.handle_mut()?.go_back().map_err(BackendError::Call)
    }

    fn go_forward(&mut self) -> Result<(), BackendError> {
        self.handle_mut()?.go_forward().map_err(BackendError::Call)
    }

    fn reload(&mut self) -> Result<(), BackendError> {
        self.handle_mut()?.reload().map_err(BackendError::Call)
    }

    fn load_url(&mut self, url: &str) -> Result<(), BackendError> {
        if url.is_empty() {
            return Err(BackendError::Call("empty url".to_string()));
        }
        self.load(url)
    }

    fn send_key(&mut self, input: KeyInput) -> Result<(), BackendError> {
        let handle = self.handle_mut()?;
        let res = if input.pressed {
            handle.key_press(input.key_code, input.scan_code, input.modifiers)
        } else {
            handle.key_release(input.key_code, input.scan_code, input.modifiers)
        };
        res.map_err(BackendError::Call)
    }

    fn send_char(&mut self, ch: char, modifiers: i32) -> Result<(), BackendError> {
        self.handle_mut()?
            .key_typed(ch, modifiers)
            .map_err(BackendError::Call)
    }

    fn send_mouse_move(&mut self, x: i32, y: i32) -> Result<(), BackendError> {
        self.handle_mut()?
            .mouse_move(x, y)
            .map_err(BackendError::Call)
    }

    fn send_mouse_button(
        &mut self,
        x: i32,
        y: i32,
        button: i32,
        pressed: bool,
    ) -> Result<(), BackendError> {
        self.handle_mut()?
            .mouse_button(x, y, button, pressed)
            .map_err(BackendError::Call)
    }

    fn send_mouse_scroll(
        &mut self,
        x: i32,
        y: i32,
        delta_x: f64,
        delta_y: f64,
    ) -> Result<(), BackendError> {
        let dx = (delta_x * WHEEL_UNITS) as i32;
        let dy = (delta_y * WHEEL_UNITS) as i32;
        self.handle_mut()?
            .mouse_wheel(x, y, dx, dy)
            .map_err(BackendError::Call)
    }

    fn title(&self) -> Option<String> {
        self.handle.as_ref().and_then(|h| h.title())
    }

    fn is_loading(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| h.is_loading())
    }

    fn can_go_back(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| h.can_go_back())
    }

    fn can_go_forward(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| h.can_go_forward())
    }

    fn texture_handle(&self) -> Option<u32> {
        self.handle.as_ref().and_then(|h| h.texture_id())
    }

    fn tick(&mut self) {
        let Some(mut pending) = self.pending.take() else {
            return;
        };
        pending.ticks += 1;
        let ready = self.ensure_handle();

        if ready && pending.ticks >= self.init_delay_ticks {
            if let Err(err) = self.load(&pending.url) {
                tracing::warn!(location = %self.location, error = %err, "pending load failed");
            }
        } else if pending.ticks > self.init_timeout_ticks {
            tracing::warn!(
                location = %self.location,
                url = %pending.url,
                ticks = pending.ticks,
                "browser init timed out; dropping pending load"
            );
        } else {
            self.pending = Some(pending);
        }
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.pending = None;
        if let Some(mut handle) = self.handle.take() {
            if let Err(err) = handle.load_url(BLANK_PAGE) {
                tracing::debug!(location = %self.location, error = %err, "blanking browser on release failed");
            }
            handle.close();
        }
        self.released = true;
        tracing::info!(location = %self.location, "browser released");
    }
}

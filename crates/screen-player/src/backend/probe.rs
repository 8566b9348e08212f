//! Runtime capability discovery and the browser-engine collaborator contracts.
//!
//! The hosting environment decides which playback engines exist. Nothing here
//! links against an engine: a [`CapabilityProbe`] answers "is engine X
//! present" by name and hands back a trait object when it is.

use std::collections::HashMap;
use std::sync::Arc;

/// Capability names tried in priority order.
pub const KNOWN_BROWSER_CAPABILITIES: [&str; 2] = ["mcef", "cinemamod-mcef"];

/// Failure reported by an external engine or handle.
pub type EngineResult<T> = Result<T, String>;

/// An embedded browser engine offered by the host.
pub trait BrowserEngine: Send + Sync {
    fn name(&self) -> &str;
    /// `false` while the engine is still starting up.
    fn is_ready(&self) -> bool;
    fn create_browser(
        &self,
        initial_url: &str,
        width: u32,
        height: u32,
    ) -> EngineResult<Box<dyn BrowserHandle>>;
}

/// One live browser instance. Owned by exactly one adapter.
pub trait BrowserHandle {
    fn load_url(&mut self, url: &str) -> EngineResult<()>;
    fn execute_script(&mut self, script: &str) -> EngineResult<()>;
    fn go_back(&mut self) -> EngineResult<()>;
    fn go_forward(&mut self) -> EngineResult<()>;
    fn reload(&mut self) -> EngineResult<()>;

    fn title(&self) -> Option<String>;
    fn is_loading(&self) -> bool;
    fn can_go_back(&self) -> bool;
    fn can_go_forward(&self) -> bool;
    /// Host texture id of the composited page, when the engine renders to one.
    fn texture_id(&self) -> Option<u32>;

    fn key_press(&mut self, key_code: i32, scan_code: i32, modifiers: i32) -> EngineResult<()>;
    fn key_release(&mut self, key_code: i32, scan_code: i32, modifiers: i32) -> EngineResult<()>;
    fn key_typed(&mut self, ch: char, modifiers: i32) -> EngineResult<()>;
    fn mouse_move(&mut self, x: i32, y: i32) -> EngineResult<()>;
    fn mouse_button(&mut self, x: i32, y: i32, button: i32, pressed: bool) -> EngineResult<()>;
    /// Wheel deltas in engine units.
    fn mouse_wheel(&mut self, x: i32, y: i32, delta_x: i32, delta_y: i32) -> EngineResult<()>;

    fn close(&mut self);
}

pub trait CapabilityProbe {
    /// Resolve an engine by capability name.
    fn resolve(&self, name: &str) -> Option<Arc<dyn BrowserEngine>>;
}

/// Probe for environments with no playback engine.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProbe;

impl CapabilityProbe for NoProbe {
    fn resolve(&self, _name: &str) -> Option<Arc<dyn BrowserEngine>> {
        None
    }
}

/// Probe backed by a fixed name → engine table.
#[derive(Default, Clone)]
pub struct StaticProbe {
    engines: HashMap<String, Arc<dyn BrowserEngine>>,
}

impl StaticProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, engine: Arc<dyn BrowserEngine>) -> Self {
        self.engines.insert(name.into(), engine);
        self
    }

    pub fn register(&mut self, name: impl Into<String>, engine: Arc<dyn BrowserEngine>) {
        self.engines.insert(name.into(), engine);
    }
}

impl CapabilityProbe for StaticProbe {
    fn resolve(&self, name: &str) -> Option<Arc<dyn BrowserEngine>> {
        self.engines.get(name).cloned()
    }
}

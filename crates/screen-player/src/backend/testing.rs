//! Scriptable engine/handle doubles shared by backend, session and registry tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use super::probe::{BrowserEngine, BrowserHandle, EngineResult};

#[derive(Default)]
pub(crate) struct MockState {
    pub ready: AtomicBool,
    pub fail_create: AtomicBool,
    pub fail_scripts: AtomicBool,
    pub created: AtomicUsize,
    pub closed: AtomicUsize,
    pub texture: Mutex<Option<u32>>,
    pub calls: Mutex<Vec<String>>,
}

impl MockState {
    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

pub(crate) struct MockEngine {
    name: String,
    pub state: Arc<MockState>,
}

impl MockEngine {
    /// Ready engine whose handles accept every call.
    pub fn new(name: &str) -> Self {
        let state = MockState::default();
        state.ready.store(true, Ordering::SeqCst);
        Self {
            name: name.to_string(),
            state: Arc::new(state),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.calls.lock().unwrap().clone()
    }
}

impl BrowserEngine for MockEngine {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_ready(&self) -> bool {
        self.state.ready.load(Ordering::SeqCst)
    }

    fn create_browser(
        &self,
        initial_url: &str,
        width: u32,
        height: u32,
    ) -> EngineResult<Box<dyn BrowserHandle>> {
        if self.state.fail_create.load(Ordering::SeqCst) {
            return Err("create failed".to_string());
        }
        self.state.created.fetch_add(1, Ordering::SeqCst);
        self.state
            .record(format!("create {initial_url} {width}x{height}"));
        Ok(Box::new(MockHandle {
            state: self.state.clone(),
        }))
    }
}

pub(crate) struct MockHandle {
    state: Arc<MockState>,
}

impl MockHandle {
    fn call(&self, call: String) -> EngineResult<()> {
        self.state.record(call);
        Ok(())
    }
}

impl BrowserHandle for MockHandle {
    fn load_url(&mut self, url: &str) -> EngineResult<()> {
        self.call(format!("load {url}"))
    }

    fn execute_script(&mut self, script: &str) -> EngineResult<()> {
        if self.state.fail_scripts.load(Ordering::SeqCst) {
            self.state.record(format!("script-failed {script}"));
            return Err("script error".to_string());
        }
        self.call(format!("script {script}"))
    }

    fn go_back(&mut self) -> EngineResult<()> {
        self.call("back".to_string())
    }

    fn go_forward(&mut self) -> EngineResult<()> {
        self.call("forward".to_string())
    }

    fn reload(&mut self) -> EngineResult<()> {
        self.call("reload".to_string())
    }

    fn title(&self) -> Option<String> {
        Some("Mock Page".to_string())
    }

    fn is_loading(&self) -> bool {
        false
    }

    fn can_go_back(&self) -> bool {
        true
    }

    fn can_go_forward(&self) -> bool {
        false
    }

    fn texture_id(&self) -> Option<u32> {
        *self.state.texture.lock().unwrap()
    }

    fn key_press(&mut self, key_code: i32, scan_code: i32, modifiers: i32) -> EngineResult<()> {
        self.call(format!("key-press {key_code} {scan_code} {modifiers}"))
    }

    fn key_release(&mut self, key_code: i32, scan_code: i32, modifiers: i32) -> EngineResult<()> {
        self.call(format!("key-release {key_code} {scan_code} {modifiers}"))
    }

    fn key_typed(&mut self, ch: char, modifiers: i32) -> EngineResult<()> {
        self.call(format!("key-typed {ch} {modifiers}"))
    }

    fn mouse_move(&mut self, x: i32, y: i32) -> EngineResult<()> {
        self.call(format!("mouse-move {x} {y}"))
    }

    fn mouse_button(&mut self, x: i32, y: i32, button: i32, pressed: bool) -> EngineResult<()> {
        self.call(format!("mouse-button {x} {y} {button} {pressed}"))
    }

    fn mouse_wheel(&mut self, x: i32, y: i32, delta_x: i32, delta_y: i32) -> EngineResult<()> {
        self.call(format!("mouse-wheel {x} {y} {delta_x} {delta_y}"))
    }

    fn close(&mut self) {
        self.state.closed.fetch_add(1, Ordering::SeqCst);
        self.state.record("close".to_string());
    }
}

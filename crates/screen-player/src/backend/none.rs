use super::{BackendError, KeyInput, PlaybackBackend, Readiness};

/// Backend used when no engine was found. Every command succeeds and does nothing,
/// so the owning session keeps tracking logical state.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoBackend;

impl PlaybackBackend for NoBackend {
    fn kind(&self) -> &str {
        "none"
    }

    fn readiness(&self) -> Readiness {
        Readiness::Unavailable
    }

    fn play(&mut self, _url: &str, _quality: &str, _source_index: usize) -> Result<(), BackendError> {
        Ok(())
    }

    fn pause(&mut self) -> Result<(), BackendError> {
        Ok(())
    }

    fn resume(&mut self) -> Result<(), BackendError> {
        Ok(())
    }

    fn stop(&mut self) -> Result<(), BackendError> {
        Ok(())
    }

    fn set_volume(&mut self, _volume: f32) -> Result<(), BackendError> {
        Ok(())
    }

    fn set_speed(&mut self, _speed: f32) -> Result<(), BackendError> {
        Ok(())
    }

    fn seek(&mut self, _position_ms: u64) -> Result<(), BackendError> {
        Ok(())
    }

    fn go_back(&mut self) -> Result<(), BackendError> {
        Ok(())
    }

    fn go_forward(&mut self) -> Result<(), BackendError> {
        Ok(())
    }

    fn reload(&mut self) -> Result<(), BackendError> {
        Ok(())
    }

    fn load_url(&mut self, _url: &str) -> Result<(), BackendError> {
        Ok(())
    }

    fn send_key(&mut self, _input: KeyInput) -> Result<(), BackendError> {
        Ok(())
    }

    fn send_char(&mut self, _ch: char, _modifiers: i32) -> Result<(), BackendError> {
        Ok(())
    }

    fn send_mouse_move(&mut self, _x: i32, _y: i32) -> Result<(), BackendError> {
        Ok(())
    }

    fn send_mouse_button(
        &mut self,
        _x: i32,
        _y: i32,
        _button: i32,
        _pressed: bool,
    ) -> Result<(), BackendError> {
        Ok(())
    }

    fn send_mouse_scroll(
        &mut self,
        _x: i32,
        _y: i32,
        _delta_x: f64,
        _delta_y: f64,
    ) -> Result<(), BackendError> {
        Ok(())
    }

    fn title(&self) -> Option<String> {
        None
    }

    fn is_loading(&self) -> bool {
        false
    }

    fn can_go_back(&self) -> bool {
        false
    }

    fn can_go_forward(&self) -> bool {
        false
    }

    fn texture_handle(&self) -> Option<u32> {
        None
    }

    fn tick(&mut self) {}

    fn release(&mut self) {}
}

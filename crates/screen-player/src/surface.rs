//! Render surface abstraction and the software frame buffer.
//!
//! A surface displays either raw pixels uploaded from a [`FrameBuffer`] or a
//! texture composited by the playback backend. The hosting environment
//! supplies surfaces through a [`SurfaceProvider`].

use std::fmt;
use std::sync::{Arc, Mutex};

use screen_types::Location;

/// Opaque ARGB black.
pub const COLOR_BLACK: u32 = 0xFF00_0000;
/// Fill shown while a session is paused.
pub const COLOR_PAUSED: u32 = 0xFF22_2244;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceError {
    /// The surface was closed or its backing texture released.
    Closed,
    /// The host rejected an upload.
    Upload(String),
}

impl fmt::Display for SurfaceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SurfaceError::Closed => write!(f, "surface closed"),
            SurfaceError::Upload(msg) => write!(f, "surface upload failed: {msg}"),
        }
    }
}

impl std::error::Error for SurfaceError {}

pub trait RenderSurface {
    /// Upload a software-rendered frame.
    fn upload(&mut self, frame: &FrameBuffer) -> Result<(), SurfaceError>;
    /// Display a texture composited by the backend.
    fn present_texture(&mut self, texture: u32) -> Result<(), SurfaceError>;
    /// Release host resources. Must tolerate repeated calls.
    fn close(&mut self);
}

pub trait SurfaceProvider {
    /// Create a surface for `location`; `None` when the host cannot provide one.
    fn create(&self, location: Location, width: u32, height: u32) -> Option<Box<dyn RenderSurface>>;
}

/// ARGB pixel buffer reused across frames.
#[derive(Clone, Debug)]
pub struct FrameBuffer {
    width: u32,
    height: u32,
    pixels: Vec<u32>,
}

impl FrameBuffer {
    pub fn new(width: u32, height: u32) -> Self {
        let mut frame = Self {
            width,
            height,
            pixels: vec![0; width as usize * height as usize],
        };
        frame.fill(COLOR_BLACK);
        frame
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u32] {
        &self.pixels
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<u32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixels
            .get(y as usize * self.width as usize + x as usize)
            .copied()
    }

    pub fn fill(&mut self, color: u32) {
        self.pixels.fill(color);
    }

    /// Gradient shown while playing without a backend-composited texture.
    pub fn fill_playing_indicator(&mut self) {
        let (w, h) = (self.width.max(1), self.height.max(1));
        for y in 0..self.height {
            let blue = 100 + y * 100 / h;
            let row = y as usize * self.width as usize;
            for x in 0..self.width {
                let green = 50 + x * 50 / w;
                self.pixels[row + x as usize] = COLOR_BLACK | (blue << 16) | (green << 8) | 30;
            }
        }
    }
}

/// Provider that never yields a surface (headless operation).
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSurfaceProvider;

impl SurfaceProvider for NullSurfaceProvider {
    fn create(&self, _location: Location, _width: u32, _height: u32) -> Option<Box<dyn RenderSurface>> {
        None
    }
}

/// Counters recorded by a [`CountingSurface`].
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SurfaceStats {
    pub uploads: u64,
    pub textures: u64,
    /// Top-left pixel of the most recent upload.
    pub last_pixel: Option<u32>,
    pub last_texture: Option<u32>,
    pub closed: bool,
}

/// Surface that records what it was asked to display.
pub struct CountingSurface {
    stats: Arc<Mutex<SurfaceStats>>,
}

impl CountingSurface {
    pub fn new(stats: Arc<Mutex<SurfaceStats>>) -> Self {
        Self { stats }
    }

    fn with_stats<T>(&self, f: impl FnOnce(&mut SurfaceStats) -> T) -> Result<T, SurfaceError> {
        let mut stats = self
            .stats
            .lock()
            .map_err(|_| SurfaceError::Upload("stats lock poisoned".to_string()))?;
        if stats.closed {
            return Err(SurfaceError::Closed);
        }
        Ok(f(&mut stats))
    }
}

impl RenderSurface for CountingSurface {
    fn upload(&mut self, frame: &FrameBuffer) -> Result<(), SurfaceError> {
        let first = frame.pixel(0, 0);
        self.with_stats(|s| {
            s.uploads += 1;
            s.last_pixel = first;
        })
    }

    fn present_texture(&mut self, texture: u32) -> Result<(), SurfaceError> {
        self.with_stats(|s| {
            s.textures += 1;
            s.last_texture = Some(texture);
        })
    }

    fn close(&mut self) {
        if let Ok(mut stats) = self.stats.lock() {
            stats.closed = true;
        }
    }
}

/// Provider handing out [`CountingSurface`]s and keeping their stats by location.
#[derive(Default, Clone)]
pub struct CountingSurfaceProvider {
    surfaces: Arc<Mutex<Vec<(Location, Arc<Mutex<SurfaceStats>>)>>>,
}

impl CountingSurfaceProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stats for the most recent surface created at `location`.
    pub fn stats(&self, location: Location) -> Option<SurfaceStats> {
        let surfaces = self.surfaces.lock().ok()?;
        surfaces
            .iter()
            .rev()
            .find(|(loc, _)| *loc == location)
            .and_then(|(_, stats)| stats.lock().ok().map(|s| s.clone()))
    }

    pub fn created(&self) -> usize {
        self.surfaces.lock().map(|s| s.len()).unwrap_or(0)
    }
}

impl SurfaceProvider for CountingSurfaceProvider {
    fn create(&self, location: Location, _width: u32, _height: u32) -> Option<Box<dyn RenderSurface>> {
        let stats = Arc::new(Mutex::new(SurfaceStats::default()));
        self.surfaces.lock().ok()?.push((location, stats.clone()));
        Some(Box::new(CountingSurface::new(stats)))
    }
}

/// Tick cadence and surface parameters for client-side playback sessions.
#[derive(Clone, Debug)]
pub struct PlayerConfig {
    /// Push a fresh frame to the surface every N playing ticks.
    pub frame_interval_ticks: u32,
    /// Recompute spatial volume every N playing ticks.
    pub volume_interval_ticks: u32,
    /// Run registry maintenance every N loop ticks.
    pub cleanup_interval_ticks: u32,
    /// Sessions farther than this from the observer are evicted during maintenance.
    pub cleanup_distance: f64,
    /// Ticks a pending load waits for a fresh browser handle before loading.
    pub init_delay_ticks: u32,
    /// Ticks after which a pending load is dropped.
    pub init_timeout_ticks: u32,
    /// Render surface width in pixels.
    pub surface_width: u32,
    /// Render surface height in pixels.
    pub surface_height: u32,
    /// Observer master volume applied on top of distance attenuation.
    pub master_volume: f32,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            frame_interval_ticks: 10,
            volume_interval_ticks: 20,
            cleanup_interval_ticks: 5,
            cleanup_distance: 64.0,
            init_delay_ticks: 10,
            init_timeout_ticks: 30,
            surface_width: 854,
            surface_height: 480,
            master_volume: 1.0,
        }
    }
}

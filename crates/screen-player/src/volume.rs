//! Distance-based volume falloff.

/// Distance at which a screen becomes inaudible.
pub const MAX_DISTANCE: f64 = 32.0;

/// Linear falloff from `base` at distance 0 to silence at [`MAX_DISTANCE`].
pub fn attenuate(distance: f64, base: f32) -> f32 {
    let base = clamp_unit(base);
    if distance <= 0.0 {
        return base;
    }
    if distance >= MAX_DISTANCE {
        return 0.0;
    }
    base * (1.0 - (distance / MAX_DISTANCE) as f32)
}

/// [`attenuate`] scaled by the observer's master volume.
pub fn attenuate_with_master(distance: f64, base: f32, master: f32) -> f32 {
    attenuate(distance, base) * clamp_unit(master)
}

fn clamp_unit(v: f32) -> f32 {
    if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) }
}

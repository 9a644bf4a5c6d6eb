//! Angle (degrees) to raw servo unit conversion.
//!
//! The servo maps 250 degrees of travel onto 0..=1000, so one unit is 0.25
//! degrees.

use crate::constants::{MAX_ANGLE, MAX_POSITION, MIN_ANGLE};

const UNITS_PER_DEGREE: f32 = MAX_POSITION as f32 / (MAX_ANGLE - MIN_ANGLE);

/// Angle in `[-125.0, 125.0]` to position in `[0, 1000]`. Out-of-range
/// input is clamped; callers validate before converting.
pub fn angle_to_position(angle: f32) -> u16 {
    let angle = angle.clamp(MIN_ANGLE, MAX_ANGLE);
    ((angle - MIN_ANGLE) * UNITS_PER_DEGREE).round() as u16
}

pub fn position_to_angle(position: u16) -> f32 {
    let position = position.min(MAX_POSITION as u16);
    position as f32 / UNITS_PER_DEGREE + MIN_ANGLE
}

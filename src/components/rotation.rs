use crate::constants::ROTATION_SPEED_THRESHOLD;
use crate::error::ComponentError;
use crate::math::DVec3;
use crate::state::{MotionDelta, MotionState};

use super::{DeltaSource, TargetPoint};

/// Free-running spin around a pivot at fixed angular velocities
///
/// Each tick applies three small axis rotations, Y then X then Z. At 60 Hz the per-tick angles are
/// small enough that the order makes no audible difference.
#[derive(Debug, Clone)]
pub struct AlgorithmicRotation {
    tag: &'static str,
    pub pivot: TargetPoint,
    speed: DVec3, // rad/s about x, y, z
    pub enabled: bool,
    pub weight: f64,
}

impl AlgorithmicRotation {
    pub fn new(tag: &'static str, pivot: TargetPoint, speed_x: f64, speed_y: f64, speed_z: f64) -> Self {
        AlgorithmicRotation {
            tag,
            pivot,
            speed: DVec3::new(speed_x, speed_y, speed_z),
            enabled: true,
            weight: 1.0,
        }
    }

    pub fn speeds(&self) -> DVec3 {
        self.speed
    }

    pub fn set_speeds(&mut self, speed_x: f64, speed_y: f64, speed_z: f64) {
        self.speed = DVec3::new(speed_x, speed_y, speed_z);
    }

    fn axis_angle(speed: f64, dt: f64) -> f64 {
        if speed.abs() > ROTATION_SPEED_THRESHOLD { speed * dt } else { 0.0 }
    }
}

impl DeltaSource for AlgorithmicRotation {
    fn tag(&self) -> &'static str {
        self.tag
    }

    /// Enabled only while at least one axis actually turns
    fn is_enabled(&self) -> bool {
        self.enabled
            && (self.speed.x.abs() > ROTATION_SPEED_THRESHOLD
                || self.speed.y.abs() > ROTATION_SPEED_THRESHOLD
                || self.speed.z.abs() > ROTATION_SPEED_THRESHOLD)
    }

    fn calculate_delta(&mut self, state: &MotionState, _current_time: f64, dt: f64) -> Result<Option<MotionDelta>, ComponentError> {
        if !self.is_enabled() {
            return Ok(None)
        }

        let center = self.pivot.resolve(self.tag)?;
        let ax = Self::axis_angle(self.speed.x, dt);
        let ay = Self::axis_angle(self.speed.y, dt);
        let az = Self::axis_angle(self.speed.z, dt);

        let relative = state.position - center;
        let rotated = relative.rotate_y(ay).rotate_x(ax).rotate_z(az);
        let position_delta = (rotated + center) - state.position;

        Ok(Some(
            MotionDelta::position(self.tag, position_delta)
                .with_orientation(DVec3::new(az, ax, ay))
                .with_weight(self.weight),
        ))
    }
}

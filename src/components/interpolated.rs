use crate::constants::{ANGLE_EPSILON, MIN_PIVOT_RADIUS, PIVOT_NUDGE};
use crate::error::ComponentError;
use crate::math::{angle_diff, wrap_angles, DVec3};
use crate::state::{MotionDelta, MotionState};

use super::{DeltaSource, TargetPoint};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationPhase {
    Idle,
    Converging,
}

/// "Manual" rotation: eases its current yaw/pitch/roll toward a target and then stops
///
/// Each tick every axis closes `interpolation_speed * dt` of its remaining angle (clamped to the
/// whole remainder), and the source is turned around the pivot by exactly the angle the interpolated
/// state moved. The delta therefore follows the internal current angles, not the target.
///
/// Targets are relative: once converged, the source sits at the angle it started from plus the
/// target, with nothing else moving it. It is never placed at the target as an absolute angle.
#[derive(Debug, Clone)]
pub struct InterpolatedRotation {
    tag: &'static str,
    pub pivot: TargetPoint,
    target: DVec3, // yaw, pitch, roll
    current: DVec3, // yaw, pitch, roll
    pub interpolation_speed: f64, // 1/s
    phase: RotationPhase,
    pub enabled: bool,
    pub weight: f64,
}

fn max_abs(v: &DVec3) -> f64 {
    v.x.abs().max(v.y.abs()).max(v.z.abs())
}

impl InterpolatedRotation {
    pub fn new(tag: &'static str, pivot: TargetPoint, target: DVec3, interpolation_speed: f64) -> Self {
        let mut rotation = InterpolatedRotation {
            tag,
            pivot,
            target: DVec3::zero(),
            current: DVec3::zero(),
            interpolation_speed,
            phase: RotationPhase::Idle,
            enabled: true,
            weight: 1.0,
        };
        rotation.set_target(target);
        rotation
    }

    pub fn phase(&self) -> RotationPhase {
        self.phase
    }

    pub fn current(&self) -> DVec3 {
        self.current
    }

    pub fn target(&self) -> DVec3 {
        self.target
    }

    /// Starts converging toward a new target from wherever the current angles are
    pub fn set_target(&mut self, target: DVec3) {
        self.target = wrap_angles(target);
        self.phase = if self.remaining() == DVec3::zero() {
            RotationPhase::Idle
        } else {
            RotationPhase::Converging
        };
    }

    /// Keeps the interpolation progress of the rotation this one replaces
    pub fn inherit(&mut self, previous: &InterpolatedRotation) {
        self.current = previous.current;
        let target = self.target;
        self.set_target(target);
    }

    fn remaining(&self) -> DVec3 {
        DVec3::new(
            angle_diff(self.current.x, self.target.x),
            angle_diff(self.current.y, self.target.y),
            angle_diff(self.current.z, self.target.z),
        )
    }

    /// Upper bound on the ticks needed to get within the angle epsilon of a target `initial_diff` away
    pub fn ticks_to_converge(initial_diff: f64, interpolation_speed: f64, dt: f64) -> usize {
        let diff = initial_diff.abs();
        let k = (interpolation_speed * dt).min(1.0);
        if diff == 0.0 {
            return 0
        }
        if diff < ANGLE_EPSILON || k >= 1.0 {
            return 1
        }
        if k <= 0.0 {
            return usize::MAX
        }
        // diff * (1 - k)^n < epsilon
        ((ANGLE_EPSILON / diff).ln() / (1.0 - k).ln()).ceil().max(1.0) as usize
    }

    /// Advances the state machine by one tick and returns the applied (yaw, pitch, roll) step
    fn step(&mut self, dt: f64) -> Option<DVec3> {
        let remaining = self.remaining();
        if remaining == DVec3::zero() {
            self.phase = RotationPhase::Idle;
            return None
        }

        let k = (self.interpolation_speed * dt).clamp(0.0, 1.0);
        let mut step = remaining * k;
        if max_abs(&(remaining - step)) < ANGLE_EPSILON {
            // close enough, land exactly on the target
            step = remaining;
            self.current = self.target;
            self.phase = RotationPhase::Idle;
        } else {
            self.current = wrap_angles(self.current + step);
            self.phase = RotationPhase::Converging;
        }
        Some(step)
    }
}

impl DeltaSource for InterpolatedRotation {
    fn tag(&self) -> &'static str {
        self.tag
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn calculate_delta(&mut self, state: &MotionState, _current_time: f64, dt: f64) -> Result<Option<MotionDelta>, ComponentError> {
        if !self.enabled {
            return Ok(None)
        }

        let center = self.pivot.resolve(self.tag)?;
        let step = match self.step(dt) {
            Some(step) => step,
            None => return Ok(None),
        };

        let position_delta = if state.position.length_to(&center) < MIN_PIVOT_RADIUS {
            // no angle to rotate, push it off the pivot
            DVec3::new(PIVOT_NUDGE, 0.0, 0.0)
        } else {
            state.position.rotate_about(&center, step.x, step.y, step.z) - state.position
        };

        Ok(Some(
            MotionDelta::position(self.tag, position_delta)
                .with_orientation(step)
                .with_weight(self.weight),
        ))
    }
}

use crate::constants::{CONCENTRATION, CONVERGENCE_DISTANCE};
use crate::error::ComponentError;
use crate::math::DVec3;
use crate::state::{MotionDelta, MotionState};

use super::{DeltaSource, TargetPoint};

/// Pulls a source toward a target point at `factor` of the remaining distance per second
#[derive(Debug, Clone)]
pub struct Concentration {
    pub target: TargetPoint,
    pub factor: f64, // [0, 1], 1/s
    pub enabled: bool,
    pub weight: f64,
}

impl Concentration {
    pub fn new(target: TargetPoint, factor: f64) -> Self {
        Concentration { target, factor, enabled: true, weight: 1.0 }
    }

    /// The raw displacement for one tick, never longer than the distance left to the target
    pub fn step_toward(position: &DVec3, target: &DVec3, factor: f64, dt: f64) -> Option<DVec3> {
        let direction = target - position;
        let remaining = direction.magnitude();
        if remaining < CONVERGENCE_DISTANCE {
            return None
        }
        Some((direction * (factor * dt)).clamp_magnitude(remaining))
    }
}

impl DeltaSource for Concentration {
    fn tag(&self) -> &'static str {
        CONCENTRATION
    }

    fn is_enabled(&self) -> bool {
        self.enabled && self.factor > 0.0
    }

    fn calculate_delta(&mut self, state: &MotionState, _current_time: f64, dt: f64) -> Result<Option<MotionDelta>, ComponentError> {
        if !self.is_enabled() {
            return Ok(None)
        }

        let target = self.target.resolve(CONCENTRATION)?;
        Ok(Concentration::step_toward(&state.position, &target, self.factor, dt)
            .map(|step| MotionDelta::position(CONCENTRATION, step).with_weight(self.weight)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_tick_matches_closed_form() {
        let mut c = Concentration::new(TargetPoint::Fixed(DVec3::zero()), 0.5);
        let state = MotionState::new(DVec3::new(10.0, 0.0, 0.0));
        let delta = c.calculate_delta(&state, 0.0, 1.0 / 60.0).unwrap().unwrap();
        let after = state.position + delta.weighted_position();
        let distance = after.magnitude();

        assert!((distance - (10.0 - 10.0 * 0.5 / 60.0)).abs() < 1e-9);
        assert!(distance < 10.0 && distance > 0.0);
    }

    #[test]
    fn never_overshoots() {
        let target = DVec3::new(1.0, -1.0, 2.0);
        let start = DVec3::new(4.0, 3.0, -2.0);
        for &(factor, dt) in [(1.0, 5.0), (0.5, 100.0), (0.9, 1.0 / 60.0), (1.0, 1.0)].iter() {
            let step = Concentration::step_toward(&start, &target, factor, dt).unwrap();
            assert!(step.magnitude() <= start.length_to(&target) + 1e-12);
        }
    }

    #[test]
    fn converged_and_disabled_contribute_nothing() {
        let mut c = Concentration::new(TargetPoint::Fixed(DVec3::new(1.0, 1.0, 1.0)), 0.5);
        let at_target = MotionState::new(DVec3::new(1.0, 1.0, 1.0));
        assert_eq!(None, c.calculate_delta(&at_target, 0.0, 0.1).unwrap());

        c.enabled = false;
        let away = MotionState::new(DVec3::new(5.0, 0.0, 0.0));
        for t in 0..10 {
            assert_eq!(None, c.calculate_delta(&away, t as f64, 0.1).unwrap());
        }
    }
}

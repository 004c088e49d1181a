use crate::constants::NEGLIGIBLE_DELTA;
use crate::math::DVec3;

/// Live motion state of one source
///
/// `position` is overwritten from the canonical store at the start of every tick, before any
/// component looks at it. Components read it, they never write it.
#[derive(Debug, Clone, PartialEq)]
pub struct MotionState {
    pub position: DVec3, // world space
    pub orientation: DVec3, // yaw, pitch, roll (rad)
    pub aperture: f64,
    pub last_update_time: f64, // s
}

impl MotionState {
    pub fn new(position: DVec3) -> Self {
        MotionState {
            position,
            orientation: DVec3::zero(),
            aperture: 0.0,
            last_update_time: 0.0,
        }
    }
}

impl Default for MotionState {
    fn default() -> Self {
        MotionState::new(DVec3::zero())
    }
}

/// One component's proposed change for one tick. Additive, never a replacement value
#[derive(Debug, Clone, PartialEq)]
pub struct MotionDelta {
    pub position_delta: DVec3,
    pub orientation_delta: DVec3,
    pub source_tag: &'static str,
    pub weight: f64,
}

impl MotionDelta {
    pub fn new(source_tag: &'static str) -> Self {
        MotionDelta {
            position_delta: DVec3::zero(),
            orientation_delta: DVec3::zero(),
            source_tag,
            weight: 1.0,
        }
    }

    pub fn position(source_tag: &'static str, position_delta: DVec3) -> Self {
        MotionDelta { position_delta, ..MotionDelta::new(source_tag) }
    }

    pub fn with_orientation(mut self, orientation_delta: DVec3) -> Self {
        self.orientation_delta = orientation_delta;
        self
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn is_finite(&self) -> bool {
        self.position_delta.is_finite() && self.orientation_delta.is_finite() && self.weight.is_finite()
    }

    /// True when the delta moves nothing once weighted
    pub fn is_negligible(&self) -> bool {
        let w = self.weight.abs();
        self.position_delta.magnitude() * w <= NEGLIGIBLE_DELTA
            && self.orientation_delta.magnitude() * w <= NEGLIGIBLE_DELTA
    }

    pub fn weighted_position(&self) -> DVec3 {
        self.position_delta * self.weight
    }

    pub fn weighted_orientation(&self) -> DVec3 {
        self.orientation_delta * self.weight
    }
}

//! Motion components
//!
//! A component looks at a source's synchronized `MotionState` once per tick and proposes an additive
//! `MotionDelta`. It may move its own progress (phase, current angles) forward, it never writes the
//! source position.

use std::cell::RefCell;
use std::rc::Weak;

use crate::config::HubConfig;
use crate::constants::*;
use crate::error::{ComponentError, HubError, HubResult};
use crate::group::GroupShared;
use crate::math::DVec3;
use crate::params::ParamBag;
use crate::shapes::{ShapeSpec, SHAPE_PARAMS};
use crate::state::{MotionDelta, MotionState};

pub mod concentration;
pub mod interpolated;
pub mod rotation;
pub mod trajectory;

pub use concentration::Concentration;
pub use interpolated::{InterpolatedRotation, RotationPhase};
pub use rotation::AlgorithmicRotation;
pub use trajectory::{IndividualTrajectory, MacroTrajectory, MovementMode, PhaseDriver, PhaseStep, SharedTrajectory};

/// The uniform capability every component variant provides
pub trait DeltaSource {
    /// Behaviour key, copied into every delta for diagnostics
    fn tag(&self) -> &'static str;

    fn is_enabled(&self) -> bool;

    /// Proposes this tick's change, `None` meaning no contribution. Called exactly once per tick
    fn calculate_delta(&mut self, state: &MotionState, current_time: f64, dt: f64) -> Result<Option<MotionDelta>, ComponentError>;
}

/// A point a component works relative to: fixed, or the live centroid of a macro group
#[derive(Debug, Clone)]
pub enum TargetPoint {
    Fixed(DVec3),
    Centroid(Weak<RefCell<GroupShared>>),
}

impl TargetPoint {
    pub fn resolve(&self, tag: &'static str) -> Result<DVec3, ComponentError> {
        match self {
            TargetPoint::Fixed(point) => Ok(*point),
            TargetPoint::Centroid(group) => group
                .upgrade()
                .map(|shared| shared.borrow().centroid)
                .ok_or(ComponentError::DetachedGroup(tag)),
        }
    }
}

/// Closed set of behaviours a controlling layer can attach by name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Behaviour {
    Concentration,
    IndividualTrajectory,
    MacroTrajectory,
    IndividualRotation,
    MacroRotation,
    ManualIndividualRotation,
    ManualMacroRotation,
}

/// Where a behaviour may be attached
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Source,
    Macro,
    Either,
}

const COMMON_PARAMS: [&str; 2] = ["enabled", "weight"];
const ROTATION_PARAMS: [&str; 4] = ["center", "speed_x", "speed_y", "speed_z"];
const MANUAL_PARAMS: [&str; 5] = ["center", "target_yaw", "target_pitch", "target_roll", "interpolation_speed"];

impl Behaviour {
    pub const ALL: [Behaviour; 7] = [
        Behaviour::Concentration,
        Behaviour::IndividualTrajectory,
        Behaviour::MacroTrajectory,
        Behaviour::IndividualRotation,
        Behaviour::MacroRotation,
        Behaviour::ManualIndividualRotation,
        Behaviour::ManualMacroRotation,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Behaviour::Concentration => CONCENTRATION,
            Behaviour::IndividualTrajectory => INDIVIDUAL_TRAJECTORY,
            Behaviour::MacroTrajectory => MACRO_TRAJECTORY,
            Behaviour::IndividualRotation => INDIVIDUAL_ROTATION,
            Behaviour::MacroRotation => MACRO_ROTATION,
            Behaviour::ManualIndividualRotation => MANUAL_INDIVIDUAL_ROTATION,
            Behaviour::ManualMacroRotation => MANUAL_MACRO_ROTATION,
        }
    }

    pub fn scope(&self) -> Scope {
        match self {
            Behaviour::Concentration => Scope::Either,
            Behaviour::IndividualTrajectory
            | Behaviour::IndividualRotation
            | Behaviour::ManualIndividualRotation => Scope::Source,
            Behaviour::MacroTrajectory
            | Behaviour::MacroRotation
            | Behaviour::ManualMacroRotation => Scope::Macro,
        }
    }

    /// Every parameter key the behaviour understands
    pub fn accepted_params(&self) -> Vec<&'static str> {
        let mut keys: Vec<&'static str> = COMMON_PARAMS.to_vec();
        match self {
            Behaviour::Concentration => keys.extend_from_slice(&["factor", "target"]),
            Behaviour::IndividualTrajectory => {
                keys.extend_from_slice(&SHAPE_PARAMS);
                keys.extend_from_slice(&trajectory::DRIVER_PARAMS);
                keys.push("center");
            },
            Behaviour::MacroTrajectory => {
                keys.extend_from_slice(&SHAPE_PARAMS);
                keys.extend_from_slice(&trajectory::DRIVER_PARAMS);
            },
            Behaviour::IndividualRotation | Behaviour::MacroRotation => keys.extend_from_slice(&ROTATION_PARAMS),
            Behaviour::ManualIndividualRotation | Behaviour::ManualMacroRotation => keys.extend_from_slice(&MANUAL_PARAMS),
        }
        keys
    }
}

impl std::str::FromStr for Behaviour {
    type Err = HubError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim();
        Behaviour::ALL
            .iter()
            .find(|b| b.key() == key)
            .copied()
            .ok_or_else(|| HubError::UnknownBehaviour(key.to_string()))
    }
}

impl std::fmt::Display for Behaviour {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// What a component needs to know about where it's being attached
pub struct BuildContext<'a> {
    pub config: &'a HubConfig,
    pub seed: u64,
    pub group: Option<Weak<RefCell<GroupShared>>>,
}

impl<'a> BuildContext<'a> {
    fn pivot(&self, bag: &ParamBag, behaviour: Behaviour) -> HubResult<TargetPoint> {
        let key = if behaviour == Behaviour::Concentration { "target" } else { "center" };
        if let Some(point) = bag.vector(key)? {
            return Ok(TargetPoint::Fixed(point));
        }
        match (&self.group, behaviour.scope()) {
            (Some(group), Scope::Macro) | (Some(group), Scope::Either) => Ok(TargetPoint::Centroid(group.clone())),
            _ => Ok(TargetPoint::Fixed(DVec3::zero())),
        }
    }
}

/// Closed sum of component kinds. The hub only ever calls `calculate_delta` through this
#[derive(Debug, Clone)]
pub enum MotionComponent {
    Concentration(Concentration),
    IndividualTrajectory(IndividualTrajectory),
    MacroTrajectory(MacroTrajectory),
    AlgorithmicRotation(AlgorithmicRotation),
    InterpolatedRotation(InterpolatedRotation),
}

impl MotionComponent {
    /// Validates a parameter bag and builds the component for `behaviour`
    pub fn build(behaviour: Behaviour, bag: &ParamBag, ctx: &BuildContext) -> HubResult<MotionComponent> {
        bag.expect_keys(behaviour.key(), &behaviour.accepted_params())?;

        let enabled = bag.flag_or("enabled", true)?;
        let weight = bag.scalar_or("weight", 1.0)?;

        let mut component = match behaviour {
            Behaviour::Concentration => {
                let factor = bag.scalar_in("factor", ctx.config.defaults.concentration_factor, 0.0, 1.0)?;
                MotionComponent::Concentration(Concentration::new(ctx.pivot(bag, behaviour)?, factor))
            },
            Behaviour::IndividualTrajectory => {
                let spec = ShapeSpec::from_params(bag)?;
                let driver = PhaseDriver::from_params(bag, &ctx.config.movement, ctx.seed)?;
                let center = bag.vector_or("center", DVec3::zero())?;
                MotionComponent::IndividualTrajectory(IndividualTrajectory::new(spec, driver, center))
            },
            Behaviour::MacroTrajectory => {
                let group = ctx.group.clone().ok_or(HubError::ScopeMismatch { behaviour: MACRO_TRAJECTORY, expected: "a macro" })?;
                MotionComponent::MacroTrajectory(MacroTrajectory::new(group))
            },
            Behaviour::IndividualRotation | Behaviour::MacroRotation => {
                let speed_x = bag.scalar_or("speed_x", 0.0)?;
                let speed_y = bag.scalar_or("speed_y", 0.0)?;
                let speed_z = bag.scalar_or("speed_z", 0.0)?;
                MotionComponent::AlgorithmicRotation(AlgorithmicRotation::new(
                    behaviour.key(),
                    ctx.pivot(bag, behaviour)?,
                    speed_x,
                    speed_y,
                    speed_z,
                ))
            },
            Behaviour::ManualIndividualRotation | Behaviour::ManualMacroRotation => {
                let target = DVec3::new(
                    bag.scalar_or("target_yaw", 0.0)?,
                    bag.scalar_or("target_pitch", 0.0)?,
                    bag.scalar_or("target_roll", 0.0)?,
                );
                let speed = bag.scalar_or("interpolation_speed", ctx.config.defaults.interpolation_speed)?;
                if speed <= 0.0 {
                    return Err(HubError::invalid("interpolation_speed", "must be greater than zero"));
                }
                MotionComponent::InterpolatedRotation(InterpolatedRotation::new(
                    behaviour.key(),
                    ctx.pivot(bag, behaviour)?,
                    target,
                    speed,
                ))
            },
        };

        component.set_enabled(enabled);
        component.set_weight(weight);
        Ok(component)
    }

    fn set_enabled(&mut self, enabled: bool) {
        match self {
            MotionComponent::Concentration(c) => c.enabled = enabled,
            MotionComponent::IndividualTrajectory(c) => c.enabled = enabled,
            MotionComponent::MacroTrajectory(c) => c.enabled = enabled,
            MotionComponent::AlgorithmicRotation(c) => c.enabled = enabled,
            MotionComponent::InterpolatedRotation(c) => c.enabled = enabled,
        }
    }

    fn set_weight(&mut self, weight: f64) {
        match self {
            MotionComponent::Concentration(c) => c.weight = weight,
            MotionComponent::IndividualTrajectory(c) => c.weight = weight,
            MotionComponent::MacroTrajectory(c) => c.weight = weight,
            MotionComponent::AlgorithmicRotation(c) => c.weight = weight,
            MotionComponent::InterpolatedRotation(c) => c.weight = weight,
        }
    }

    /// Carries tick-to-tick progress over from the component this one replaces
    pub fn inherit_progress(&mut self, previous: &MotionComponent) {
        match (self, previous) {
            (MotionComponent::IndividualTrajectory(new), MotionComponent::IndividualTrajectory(old)) => {
                new.driver.inherit(&old.driver)
            },
            (MotionComponent::InterpolatedRotation(new), MotionComponent::InterpolatedRotation(old)) => {
                new.inherit(old)
            },
            _ => {},
        }
    }

    fn inner(&self) -> &dyn DeltaSource {
        match self {
            MotionComponent::Concentration(c) => c,
            MotionComponent::IndividualTrajectory(c) => c,
            MotionComponent::MacroTrajectory(c) => c,
            MotionComponent::AlgorithmicRotation(c) => c,
            MotionComponent::InterpolatedRotation(c) => c,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn DeltaSource {
        match self {
            MotionComponent::Concentration(c) => c,
            MotionComponent::IndividualTrajectory(c) => c,
            MotionComponent::MacroTrajectory(c) => c,
            MotionComponent::AlgorithmicRotation(c) => c,
            MotionComponent::InterpolatedRotation(c) => c,
        }
    }
}

impl DeltaSource for MotionComponent {
    fn tag(&self) -> &'static str {
        self.inner().tag()
    }

    fn is_enabled(&self) -> bool {
        self.inner().is_enabled()
    }

    fn calculate_delta(&mut self, state: &MotionState, current_time: f64, dt: f64) -> Result<Option<MotionDelta>, ComponentError> {
        self.inner_mut().calculate_delta(state, current_time, dt)
    }
}

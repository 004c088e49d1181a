use std::cell::RefCell;
use std::rc::Weak;

use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::config::MovementConfig;
use crate::constants::{DEFAULT_TRAJECTORY_SPEED, INDIVIDUAL_TRAJECTORY, MACRO_TRAJECTORY};
use crate::error::{ComponentError, HubError, HubResult};
use crate::group::GroupShared;
use crate::math::{wrap_phase, DVec3};
use crate::params::ParamBag;
use crate::shapes::ShapeSpec;
use crate::state::{MotionDelta, MotionState};

use super::DeltaSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MovementMode {
    Fix,
    Random,
    Vibration,
    Spin,
    Stop,
}

impl std::str::FromStr for MovementMode {
    type Err = HubError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fix" => Ok(MovementMode::Fix),
            "random" => Ok(MovementMode::Random),
            "vibration" => Ok(MovementMode::Vibration),
            "spin" => Ok(MovementMode::Spin),
            "stop" => Ok(MovementMode::Stop),
            other => Err(HubError::InvalidMovementMode(other.to_string())),
        }
    }
}

/// One tick's phase movement
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhaseStep {
    pub from: f64,
    pub to: f64,
}

impl PhaseStep {
    pub fn still(phase: f64) -> Self {
        PhaseStep { from: phase, to: phase }
    }
}

/// Parameter keys read by `PhaseDriver::from_params`
pub const DRIVER_PARAMS: [&str; 9] = [
    "speed", "mode", "phase", "seed", "spin_multiplier", "vibration_amplitude",
    "vibration_frequency", "random_min", "random_max",
];

/// Advances a normalized phase according to a movement mode
#[derive(Debug, Clone)]
pub struct PhaseDriver {
    phase: f64, // [0, 1)
    pub mode: MovementMode,
    pub speed: f64, // cycles/s
    tuning: MovementConfig,
    random_speed: f64,
    next_reroll: f64,
    rng: StdRng,
}

impl PhaseDriver {
    pub fn new(mode: MovementMode, speed: f64, tuning: MovementConfig, seed: u64) -> Self {
        PhaseDriver {
            phase: 0.0,
            mode,
            speed,
            tuning,
            random_speed: speed,
            next_reroll: f64::NEG_INFINITY,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn from_params(bag: &ParamBag, defaults: &MovementConfig, default_seed: u64) -> HubResult<Self> {
        let mode = match bag.text("mode")? {
            Some(name) => name.parse()?,
            None => MovementMode::Fix,
        };
        let speed = bag.scalar_or("speed", DEFAULT_TRAJECTORY_SPEED)?;

        let mut tuning = defaults.clone();
        tuning.spin_multiplier = bag.scalar_or("spin_multiplier", tuning.spin_multiplier)?;
        tuning.vibration_amplitude = bag.scalar_or("vibration_amplitude", tuning.vibration_amplitude)?;
        tuning.vibration_frequency = bag.scalar_or("vibration_frequency", tuning.vibration_frequency)?;
        tuning.random_speed_min = bag.scalar_or("random_min", tuning.random_speed_min)?;
        tuning.random_speed_max = bag.scalar_or("random_max", tuning.random_speed_max)?;
        tuning.validate()?;

        let seed = match bag.scalar("seed")? {
            Some(s) if s >= 0.0 => s as u64,
            Some(_) => return Err(HubError::invalid("seed", "must not be negative")),
            None => default_seed,
        };

        let mut driver = PhaseDriver::new(mode, speed, tuning, seed);
        driver.phase = wrap_phase(bag.scalar_or("phase", 0.0)?);
        Ok(driver)
    }

    pub fn phase(&self) -> f64 {
        self.phase
    }

    /// Keeps the phase and the random state of a driver this one replaces
    pub fn inherit(&mut self, previous: &PhaseDriver) {
        self.phase = previous.phase;
        self.random_speed = previous.random_speed;
        self.next_reroll = previous.next_reroll;
        self.rng = previous.rng.clone();
    }

    /// Phase rate (cycles/s) at `time`
    fn rate(&mut self, time: f64) -> f64 {
        match self.mode {
            MovementMode::Fix => self.speed,
            MovementMode::Random => {
                if time >= self.next_reroll {
                    let (lo, hi) = (self.tuning.random_speed_min, self.tuning.random_speed_max);
                    self.random_speed = self.rng.random_range(lo..=hi);
                    self.next_reroll = time + self.tuning.random_interval;
                }
                self.random_speed
            },
            MovementMode::Vibration => {
                self.speed + self.tuning.vibration_amplitude * (time * self.tuning.vibration_frequency).sin()
            },
            MovementMode::Spin => self.speed * self.tuning.spin_multiplier,
            MovementMode::Stop => 0.0,
        }
    }

    /// Moves the phase forward by one tick. Call once per tick
    pub fn advance(&mut self, time: f64, dt: f64) -> PhaseStep {
        let from = self.phase;
        let rate = self.rate(time);
        self.phase = wrap_phase(from + rate * dt);
        PhaseStep { from, to: self.phase }
    }
}

/// A source following its own parametric shape
#[derive(Debug, Clone)]
pub struct IndividualTrajectory {
    pub spec: ShapeSpec,
    pub driver: PhaseDriver,
    pub center: DVec3,
    pub enabled: bool,
    pub weight: f64,
}

impl IndividualTrajectory {
    pub fn new(spec: ShapeSpec, driver: PhaseDriver, center: DVec3) -> Self {
        IndividualTrajectory { spec, driver, center, enabled: true, weight: 1.0 }
    }

    /// Where the shape currently puts the source, ignoring everything else acting on it
    pub fn current_point(&self) -> DVec3 {
        self.center + self.spec.point(self.driver.phase())
    }
}

impl DeltaSource for IndividualTrajectory {
    fn tag(&self) -> &'static str {
        INDIVIDUAL_TRAJECTORY
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn calculate_delta(&mut self, _state: &MotionState, current_time: f64, dt: f64) -> Result<Option<MotionDelta>, ComponentError> {
        if !self.enabled {
            return Ok(None)
        }

        // the centre cancels out: (c + f(new)) - (c + f(old))
        let step = self.driver.advance(current_time, dt);
        let delta = self.spec.displacement(step.from, step.to);
        Ok(Some(MotionDelta::position(INDIVIDUAL_TRAJECTORY, delta).with_weight(self.weight)))
    }
}

/// Trajectory state shared by every member of a macro. Owned by the group, advanced once per tick
#[derive(Debug, Clone)]
pub struct SharedTrajectory {
    pub spec: ShapeSpec,
    pub driver: PhaseDriver,
    pub last_step: PhaseStep,
}

impl SharedTrajectory {
    pub fn new(spec: ShapeSpec, driver: PhaseDriver) -> Self {
        let last_step = PhaseStep::still(driver.phase());
        SharedTrajectory { spec, driver, last_step }
    }
}

/// A member's view of its macro's shared trajectory
///
/// Holds a weak reference, the group owns the phase. Every member therefore receives the same
/// displacement each tick and the formation offsets between members stay constant.
#[derive(Debug, Clone)]
pub struct MacroTrajectory {
    pub group: Weak<RefCell<GroupShared>>,
    pub enabled: bool,
    pub weight: f64,
}

impl MacroTrajectory {
    pub fn new(group: Weak<RefCell<GroupShared>>) -> Self {
        MacroTrajectory { group, enabled: true, weight: 1.0 }
    }
}

impl DeltaSource for MacroTrajectory {
    fn tag(&self) -> &'static str {
        MACRO_TRAJECTORY
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn calculate_delta(&mut self, _state: &MotionState, _current_time: f64, _dt: f64) -> Result<Option<MotionDelta>, ComponentError> {
        if !self.enabled {
            return Ok(None)
        }

        let group = self.group.upgrade().ok_or(ComponentError::DetachedGroup(MACRO_TRAJECTORY))?;
        let shared = group.borrow();
        Ok(shared.trajectory.as_ref().map(|trajectory| {
            let step = trajectory.last_step;
            MotionDelta::position(MACRO_TRAJECTORY, trajectory.spec.displacement(step.from, step.to))
                .with_weight(self.weight)
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes::Shape;

    fn driver(mode: MovementMode, speed: f64) -> PhaseDriver {
        PhaseDriver::new(mode, speed, MovementConfig::default(), 7)
    }

    #[test]
    fn phase_always_wraps() {
        for mode in [MovementMode::Fix, MovementMode::Random, MovementMode::Vibration, MovementMode::Spin].iter() {
            let mut d = driver(*mode, 0.37);
            for i in 0..5000 {
                let step = d.advance(i as f64 / 60.0, 1.0 / 60.0);
                assert!(step.to >= 0.0 && step.to < 1.0, "{:?} phase {}", mode, step.to);
            }
        }

        let mut backwards = driver(MovementMode::Fix, -2.3);
        for i in 0..100 {
            let step = backwards.advance(i as f64, 0.1);
            assert!(step.to >= 0.0 && step.to < 1.0);
        }
    }

    #[test]
    fn modes_set_the_rate() {
        let mut fix = driver(MovementMode::Fix, 0.1);
        assert!((fix.advance(0.0, 1.0).to - 0.1).abs() < 1e-12);

        let mut spin = driver(MovementMode::Spin, 0.1);
        let multiplier = MovementConfig::default().spin_multiplier;
        assert!((spin.advance(0.0, 1.0).to - wrap_phase(0.1 * multiplier)).abs() < 1e-12);

        let mut stop = driver(MovementMode::Stop, 0.1);
        assert_eq!(PhaseStep::still(0.0), stop.advance(0.0, 1.0));

        let mut vib = driver(MovementMode::Vibration, 0.1);
        let tuning = MovementConfig::default();
        let expected = 0.1 + tuning.vibration_amplitude * (0.5 * tuning.vibration_frequency).sin();
        assert!((vib.advance(0.5, 0.01).to - expected * 0.01).abs() < 1e-12);
    }

    #[test]
    fn random_mode_rerolls_on_its_interval() {
        let tuning = MovementConfig::default();
        let mut d = driver(MovementMode::Random, 0.1);
        let dt = 1.0 / 60.0;

        let first = d.advance(0.0, dt);
        let rate = (first.to - first.from) / dt;
        assert!(rate >= tuning.random_speed_min - 1e-9 && rate <= tuning.random_speed_max + 1e-9);

        // same rolled speed until the interval has passed
        let second = d.advance(dt, dt);
        assert!(((second.to - second.from) / dt - rate).abs() < 1e-6);

        let mut a = driver(MovementMode::Random, 0.1);
        let mut b = driver(MovementMode::Random, 0.1);
        for i in 0..600 {
            assert_eq!(a.advance(i as f64 * dt, dt), b.advance(i as f64 * dt, dt));
        }
    }

    #[test]
    fn unknown_modes_are_rejected() {
        let bag = ParamBag::new().with("mode", "wobble");
        match PhaseDriver::from_params(&bag, &MovementConfig::default(), 0) {
            Err(HubError::InvalidMovementMode(name)) => assert_eq!("wobble", name),
            other => panic!("expected InvalidMovementMode, got {:?}", other.map(|d| d.phase())),
        }
    }

    #[test]
    fn individual_trajectory_emits_shape_increments() {
        let spec = ShapeSpec::new(Shape::Circle, 2.0);
        let mut t = IndividualTrajectory::new(spec, driver(MovementMode::Fix, 0.25), DVec3::new(5.0, 5.0, 0.0));
        let state = MotionState::default();

        let delta = t.calculate_delta(&state, 0.0, 1.0).unwrap().unwrap();
        assert!(delta.position_delta.length_to(&DVec3::new(-2.0, 2.0, 0.0)) < 1e-12);
        assert!(t.current_point().length_to(&DVec3::new(5.0, 7.0, 0.0)) < 1e-12);

        t.enabled = false;
        assert_eq!(None, t.calculate_delta(&state, 1.0, 1.0).unwrap());
        assert!((t.driver.phase() - 0.25).abs() < 1e-12);
    }

    #[test]
    fn macro_trajectory_without_group_is_an_error() {
        let mut t = MacroTrajectory::new(Weak::new());
        let err = t.calculate_delta(&MotionState::default(), 0.0, 0.1).unwrap_err();
        assert_eq!(ComponentError::DetachedGroup(MACRO_TRAJECTORY), err);
    }
}

// Numeric guards

/// Deltas with a magnitude at or below this are treated as no contribution
pub const NEGLIGIBLE_DELTA: f64 = 1e-12;

/// Concentration considers a source converged below this distance to its target
pub const CONVERGENCE_DISTANCE: f64 = 1e-6;

/// Interpolated rotation snaps to its target once every axis is within this many radians
pub const ANGLE_EPSILON: f64 = 1e-4;

/// A rotation speed below this (rad/s) is treated as zero
pub const ROTATION_SPEED_THRESHOLD: f64 = 1e-3;

/// Distance to a pivot below which a source has no defined rotation angle
pub const MIN_PIVOT_RADIUS: f64 = 1e-6;

/// Offset applied to a source sitting on its pivot so the next tick has an angle to work with
pub const PIVOT_NUDGE: f64 = 1e-4;

/// Highest source id a host may choose. Ids index dense storage, so this also caps its size
pub const MAX_SOURCE_ID: usize = 1 << 20;

// Movement mode defaults

pub const RANDOM_REROLL_INTERVAL: f64 = 2.0; // s
pub const RANDOM_SPEED_MIN: f64 = 0.05; // cycles/s
pub const RANDOM_SPEED_MAX: f64 = 0.5; // cycles/s
pub const SPIN_MULTIPLIER: f64 = 4.0;
pub const VIBRATION_AMPLITUDE: f64 = 0.1; // cycles/s
pub const VIBRATION_FREQUENCY: f64 = 8.0; // rad/s

// Component defaults

pub const DEFAULT_TRAJECTORY_SPEED: f64 = 0.1; // cycles/s
pub const DEFAULT_SHAPE_RADIUS: f64 = 1.0;
pub const DEFAULT_INTERPOLATION_SPEED: f64 = 2.0; // 1/s
pub const DEFAULT_CONCENTRATION_FACTOR: f64 = 0.5; // 1/s
pub const DEFAULT_TICK_RATE: f64 = 60.0; // Hz

// Behaviour keys, as used by the configuration surface

pub const CONCENTRATION: &str = "concentration";
pub const INDIVIDUAL_TRAJECTORY: &str = "individual_trajectory";
pub const MACRO_TRAJECTORY: &str = "macro_trajectory";
pub const INDIVIDUAL_ROTATION: &str = "individual_rotation";
pub const MACRO_ROTATION: &str = "macro_rotation";
pub const MANUAL_INDIVIDUAL_ROTATION: &str = "manual_individual_rotation";
pub const MANUAL_MACRO_ROTATION: &str = "manual_macro_rotation";

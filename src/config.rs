use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::constants::*;
use crate::error::{HubError, HubResult};
use crate::params::ParamBag;

/// Tunables for the trajectory movement modes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovementConfig {
    #[serde(default = "MovementConfig::default_random_interval")]
    pub random_interval: f64, // s
    #[serde(default = "MovementConfig::default_random_speed_min")]
    pub random_speed_min: f64, // cycles/s
    #[serde(default = "MovementConfig::default_random_speed_max")]
    pub random_speed_max: f64, // cycles/s
    #[serde(default = "MovementConfig::default_spin_multiplier")]
    pub spin_multiplier: f64,
    #[serde(default = "MovementConfig::default_vibration_amplitude")]
    pub vibration_amplitude: f64, // cycles/s
    #[serde(default = "MovementConfig::default_vibration_frequency")]
    pub vibration_frequency: f64, // rad/s
}

impl MovementConfig {
    fn default_random_interval() -> f64 {
        RANDOM_REROLL_INTERVAL
    }
    fn default_random_speed_min() -> f64 {
        RANDOM_SPEED_MIN
    }
    fn default_random_speed_max() -> f64 {
        RANDOM_SPEED_MAX
    }
    fn default_spin_multiplier() -> f64 {
        SPIN_MULTIPLIER
    }
    fn default_vibration_amplitude() -> f64 {
        VIBRATION_AMPLITUDE
    }
    fn default_vibration_frequency() -> f64 {
        VIBRATION_FREQUENCY
    }

    pub fn validate(&self) -> HubResult<()> {
        let fields = [
            ("random_interval", self.random_interval),
            ("random_min", self.random_speed_min),
            ("random_max", self.random_speed_max),
            ("spin_multiplier", self.spin_multiplier),
            ("vibration_amplitude", self.vibration_amplitude),
            ("vibration_frequency", self.vibration_frequency),
        ];
        if let Some((name, value)) = fields.iter().find(|(_, v)| !v.is_finite()) {
            return Err(HubError::invalid(name, format!("{} is not finite", value)));
        }
        if !(self.random_interval > 0.0) {
            return Err(HubError::invalid("random_interval", "must be greater than zero"));
        }
        if !(self.spin_multiplier > 0.0) {
            return Err(HubError::invalid("spin_multiplier", "must be greater than zero"));
        }
        if !(self.random_speed_min <= self.random_speed_max) {
            return Err(HubError::invalid("random_min", "must not exceed random_max"));
        }
        Ok(())
    }
}

impl Default for MovementConfig {
    fn default() -> Self {
        Self {
            random_interval: Self::default_random_interval(),
            random_speed_min: Self::default_random_speed_min(),
            random_speed_max: Self::default_random_speed_max(),
            spin_multiplier: Self::default_spin_multiplier(),
            vibration_amplitude: Self::default_vibration_amplitude(),
            vibration_frequency: Self::default_vibration_frequency(),
        }
    }
}

/// Values components fall back to when a parameter bag leaves them out
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentDefaults {
    #[serde(default = "ComponentDefaults::default_concentration_factor")]
    pub concentration_factor: f64,
    #[serde(default = "ComponentDefaults::default_interpolation_speed")]
    pub interpolation_speed: f64,
}

impl ComponentDefaults {
    fn default_concentration_factor() -> f64 {
        DEFAULT_CONCENTRATION_FACTOR
    }
    fn default_interpolation_speed() -> f64 {
        DEFAULT_INTERPOLATION_SPEED
    }
}

impl Default for ComponentDefaults {
    fn default() -> Self {
        Self {
            concentration_factor: Self::default_concentration_factor(),
            interpolation_speed: Self::default_interpolation_speed(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HubConfig {
    #[serde(default = "HubConfig::default_tick_rate")]
    pub tick_rate: f64, // Hz
    #[serde(default)]
    pub movement: MovementConfig,
    #[serde(default)]
    pub defaults: ComponentDefaults,
}

impl HubConfig {
    fn default_tick_rate() -> f64 {
        DEFAULT_TICK_RATE
    }

    pub fn validate(&self) -> HubResult<()> {
        if !(self.tick_rate > 0.0 && self.tick_rate.is_finite()) {
            return Err(HubError::invalid("tick_rate", "must be a positive number"));
        }
        if !(0.0..=1.0).contains(&self.defaults.concentration_factor) {
            return Err(HubError::invalid("concentration_factor", "must be within [0, 1]"));
        }
        if !(self.defaults.interpolation_speed > 0.0 && self.defaults.interpolation_speed.is_finite()) {
            return Err(HubError::invalid("interpolation_speed", "must be greater than zero"));
        }
        self.movement.validate()
    }

    /// Reads a config file, falling back to defaults when it's missing or broken
    pub fn load_or_default(path: &str) -> Self {
        if !Path::new(path).exists() {
            return Self::default();
        }
        match fs::read_to_string(path).map_err(|e| e.to_string()).and_then(|text| {
            toml::from_str::<HubConfig>(&text).map_err(|e| e.to_string())
        }) {
            Ok(cfg) => match cfg.validate() {
                Ok(()) => cfg,
                Err(err) => {
                    warn!("Invalid config {path}: {err}. Using defaults.");
                    Self::default()
                },
            },
            Err(err) => {
                warn!("Failed to load config {path}: {err}. Using defaults.");
                Self::default()
            },
        }
    }
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            tick_rate: Self::default_tick_rate(),
            movement: MovementConfig::default(),
            defaults: ComponentDefaults::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub id: usize,
    #[serde(default)]
    pub position: [f64; 3],
    #[serde(default)]
    pub aperture: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MacroConfig {
    pub name: String,
    #[serde(default)]
    pub anchor: [f64; 3],
    /// one fresh source per offset
    #[serde(default)]
    pub offsets: Vec<[f64; 3]>,
}

/// One behaviour to attach, either to a source (`source = 3`) or a macro (`macro = "ring"`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BehaviourConfig {
    #[serde(default)]
    pub source: Option<usize>,
    #[serde(default, rename = "macro")]
    pub macro_name: Option<String>,
    pub behaviour: String,
    #[serde(default)]
    pub params: ParamBag,
}

/// Everything the headless runner needs to set a scene up
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScenarioConfig {
    #[serde(default)]
    pub hub: HubConfig,
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
    #[serde(default)]
    pub macros: Vec<MacroConfig>,
    #[serde(default)]
    pub behaviours: Vec<BehaviourConfig>,
}

impl ScenarioConfig {
    pub fn load(path: &str) -> HubResult<Self> {
        let text = fs::read_to_string(path).map_err(|source| HubError::ConfigIo { path: path.to_string(), source })?;
        let scenario: ScenarioConfig = toml::from_str(&text).map_err(|source| HubError::ConfigParse { path: path.to_string(), source })?;
        scenario.hub.validate()?;
        Ok(scenario)
    }
}

use thiserror::Error;

use crate::identity::{MacroId, SourceId};

/// Configuration failures, reported to whoever called the configuration operation
#[derive(Debug, Error)]
pub enum HubError {
    #[error("unknown {0}")]
    UnknownSource(SourceId),

    #[error("{0} is already registered")]
    DuplicateSource(SourceId),

    #[error("unknown {0}")]
    UnknownMacro(MacroId),

    #[error("no macro named \"{0}\"")]
    UnknownMacroName(String),

    #[error("a macro named \"{0}\" already exists")]
    DuplicateMacroName(String),

    #[error("{source_id} already belongs to {owner}")]
    SourceAlreadyGrouped { source_id: SourceId, owner: MacroId },

    #[error("{source_id} is not a member of {group}")]
    NotAMember { source_id: SourceId, group: MacroId },

    #[error("unknown behaviour \"{0}\"")]
    UnknownBehaviour(String),

    #[error("behaviour \"{behaviour}\" can only be attached to {expected}")]
    ScopeMismatch { behaviour: &'static str, expected: &'static str },

    #[error("behaviour \"{behaviour}\" is not attached to {target}")]
    NotAttached { behaviour: &'static str, target: String },

    #[error("behaviour \"{behaviour}\" does not take parameter \"{param}\"")]
    UnknownParameter { behaviour: &'static str, param: String },

    #[error("parameter \"{param}\" must be a single number, got {len} values")]
    NonScalar { param: String, len: usize },

    #[error("parameter \"{param}\" is invalid: {reason}")]
    InvalidParameter { param: String, reason: String },

    #[error("unknown trajectory shape \"{0}\"")]
    InvalidShape(String),

    #[error("unknown movement mode \"{0}\"")]
    InvalidMovementMode(String),

    #[error("invalid timestep: dt={dt}, time={time}")]
    InvalidTimestep { dt: f64, time: f64 },

    #[error("failed to read {path}: {source}")]
    ConfigIo { path: String, source: std::io::Error },

    #[error("failed to parse {path}: {source}")]
    ConfigParse { path: String, source: toml::de::Error },
}

impl HubError {
    pub(crate) fn invalid(param: &str, reason: impl Into<String>) -> Self {
        HubError::InvalidParameter { param: param.to_string(), reason: reason.into() }
    }
}

/// Per-tick failure of a single component. Never escapes a tick, the hub logs it and carries on
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ComponentError {
    #[error("group state for {0} is gone")]
    DetachedGroup(&'static str),

    #[error("{0} produced a non-finite delta")]
    NonFinite(&'static str),
}

pub type HubResult<T> = Result<T, HubError>;

//! Parameter bags handed in by a controlling layer
//!
//! Everything is validated and coerced here, once, so the per-tick code only ever sees plain `f64`s.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{HubError, HubResult};
use crate::math::DVec3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Number(f64),
    List(Vec<f64>),
    Text(String),
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Number(v)
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Text(v.to_string())
    }
}

impl From<Vec<f64>> for ParamValue {
    fn from(v: Vec<f64>) -> Self {
        ParamValue::List(v)
    }
}

impl From<DVec3> for ParamValue {
    fn from(v: DVec3) -> Self {
        ParamValue::List(vec![v.x, v.y, v.z])
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParamBag {
    values: BTreeMap<String, ParamValue>,
}

impl ParamBag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, key: &str, value: impl Into<ParamValue>) -> Self {
        self.values.insert(key.to_string(), value.into());
        self
    }

    /// Overlays `other` on top of this bag, later values win
    pub fn merged(&self, other: &ParamBag) -> ParamBag {
        let mut merged = self.clone();
        for (k, v) in other.values.iter() {
            merged.values.insert(k.clone(), v.clone());
        }
        merged
    }

    /// Fails on the first key that isn't in `allowed`
    pub fn expect_keys(&self, behaviour: &'static str, allowed: &[&str]) -> HubResult<()> {
        for key in self.values.keys() {
            if !allowed.contains(&key.as_str()) {
                return Err(HubError::UnknownParameter { behaviour, param: key.clone() });
            }
        }
        Ok(())
    }

    /// A finite scalar. A one-element list is accepted and unwrapped
    pub fn scalar(&self, key: &str) -> HubResult<Option<f64>> {
        let value = match self.values.get(key) {
            Some(ParamValue::Number(v)) => *v,
            Some(ParamValue::List(list)) if list.len() == 1 => list[0],
            Some(ParamValue::List(list)) => {
                return Err(HubError::NonScalar { param: key.to_string(), len: list.len() })
            },
            Some(ParamValue::Bool(_)) | Some(ParamValue::Text(_)) => {
                return Err(HubError::invalid(key, "expected a number"))
            },
            None => return Ok(None),
        };

        if value.is_finite() {
            Ok(Some(value))
        } else {
            Err(HubError::invalid(key, format!("{} is not finite", value)))
        }
    }

    pub fn scalar_or(&self, key: &str, default: f64) -> HubResult<f64> {
        Ok(self.scalar(key)?.unwrap_or(default))
    }

    /// A scalar constrained to `[min, max]`
    pub fn scalar_in(&self, key: &str, default: f64, min: f64, max: f64) -> HubResult<f64> {
        let value = self.scalar_or(key, default)?;
        if value < min || value > max {
            return Err(HubError::invalid(key, format!("{} is outside [{}, {}]", value, min, max)));
        }
        Ok(value)
    }

    pub fn vector(&self, key: &str) -> HubResult<Option<DVec3>> {
        match self.values.get(key) {
            Some(ParamValue::List(list)) if list.len() == 3 => {
                let v = DVec3::new(list[0], list[1], list[2]);
                if v.is_finite() {
                    Ok(Some(v))
                } else {
                    Err(HubError::invalid(key, "components must be finite"))
                }
            },
            Some(_) => Err(HubError::invalid(key, "expected a list of three numbers")),
            None => Ok(None),
        }
    }

    pub fn vector_or(&self, key: &str, default: DVec3) -> HubResult<DVec3> {
        Ok(self.vector(key)?.unwrap_or(default))
    }

    pub fn text(&self, key: &str) -> HubResult<Option<&str>> {
        match self.values.get(key) {
            Some(ParamValue::Text(s)) => Ok(Some(s.as_str())),
            Some(_) => Err(HubError::invalid(key, "expected text")),
            None => Ok(None),
        }
    }

    pub fn flag_or(&self, key: &str, default: bool) -> HubResult<bool> {
        match self.values.get(key) {
            Some(ParamValue::Bool(b)) => Ok(*b),
            Some(_) => Err(HubError::invalid(key, "expected true or false")),
            None => Ok(default),
        }
    }
}

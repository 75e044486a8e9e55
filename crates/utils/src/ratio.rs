//! Sampling ratio configuration value.

use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A real number in the closed interval `[0., 1.]`.
///
/// Transforms use it as the probability of being applied to each candidate.
/// Construction validates the range, so a `Ratio` held by a pass is always
/// usable as is.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Ratio(f64);

impl Ratio {
    /// Always apply.
    pub const ALWAYS: Self = Self(1.0);
    /// Never apply.
    pub const NEVER: Self = Self(0.0);

    /// Validates `value` and wraps it.
    pub fn new(value: f64) -> Result<Self, ConfigError> {
        if value.is_nan() {
            return Err(ConfigError::NotANumber(value.to_string()));
        }
        if !(0.0..=1.0).contains(&value) {
            return Err(ConfigError::OutOfRange(value));
        }
        Ok(Self(value))
    }

    pub const fn get(self) -> f64 {
        self.0
    }
}

impl Default for Ratio {
    fn default() -> Self {
        Self::ALWAYS
    }
}

impl TryFrom<f64> for Ratio {
    type Error = ConfigError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Ratio> for f64 {
    fn from(ratio: Ratio) -> Self {
        ratio.0
    }
}

impl FromStr for Ratio {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s
            .trim()
            .parse::<f64>()
            .map_err(|_| ConfigError::NotANumber(s.to_string()))?;
        if value.is_nan() {
            return Err(ConfigError::NotANumber(s.to_string()));
        }
        Self::new(value)
    }
}

impl fmt::Display for Ratio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub mod duplicate_bb;
pub mod mba;
pub mod pass;
pub mod selector;

use cleft_core::Function;
use cleft_utils::errors::{ConfigError, TransformError};
use cleft_utils::Ratio;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

pub use duplicate_bb::DuplicateBb;
pub use mba::Mba;

/// Trait for CFG obfuscation transforms.
pub trait Transform: Send + Sync {
    /// Returns the transform's name for logging and identification.
    fn name(&self) -> &'static str;
    /// Applies the transform to a function, returning whether changes were made.
    fn apply(&self, ir: &mut Function, rng: &mut StdRng) -> Result<bool, TransformError>;
}

/// Configuration for transform passes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PassConfig {
    /// Probability for each basic block to be duplicated
    #[serde(default)]
    pub duplicate_ratio: Ratio,
    /// Probability for each integer addition to be substituted
    #[serde(default)]
    pub mba_ratio: Ratio,
    /// Minimum quality threshold for accepting transforms
    pub accept_threshold: f64,
    /// Apply transforms aggressively without quality gates
    pub aggressive: bool,
}

impl Default for PassConfig {
    fn default() -> Self {
        Self {
            duplicate_ratio: Ratio::ALWAYS,
            mba_ratio: Ratio::ALWAYS,
            accept_threshold: 0.0,
            aggressive: true,
        }
    }
}

/// Builds the transforms named in `names`, in order.
///
/// Accepted names are `duplicate-bb` and `mba` (case-insensitive).
pub fn build_passes<S: AsRef<str>>(
    names: &[S],
    cfg: &PassConfig,
) -> Result<Vec<Box<dyn Transform>>, ConfigError> {
    names
        .iter()
        .map(|name| {
            let name = name.as_ref().trim();
            match name.to_ascii_lowercase().as_str() {
                "duplicate-bb" | "duplicatebb" => {
                    Ok(Box::new(DuplicateBb::new(cfg.duplicate_ratio)) as Box<dyn Transform>)
                }
                "mba" => Ok(Box::new(Mba::new(cfg.mba_ratio)) as Box<dyn Transform>),
                _ => Err(ConfigError::UnknownPass(name.to_string())),
            }
        })
        .collect()
}

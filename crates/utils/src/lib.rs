//! Shared building blocks for the cleft crates: error types, the sampling
//! ratio configuration value and the deterministic seed source.

pub mod errors;
pub mod ratio;
pub mod seed;

pub use ratio::Ratio;
pub use seed::Seed;

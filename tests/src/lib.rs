//! Cross-crate tests for the analysis, transforms and verification crates.

#[cfg(test)]
mod core;
#[cfg(test)]
mod transforms;

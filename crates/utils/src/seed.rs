//! Deterministic seed source.
//!
//! A single 32-byte seed drives every random decision of a run. Each pass
//! receives its own generator derived from the seed, the compilation unit
//! name and the pass name, so adding or reordering passes does not perturb
//! the decisions of the others and reruns with the same seed are identical.

use crate::errors::SeedError;
use rand::{rngs::StdRng, SeedableRng};
use sha3::{Digest, Keccak256};
use std::fmt;

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Seed([u8; 32]);

impl Seed {
    /// Parses a 64 character hex string, with or without `0x` prefix.
    pub fn from_hex(input: &str) -> Result<Self, SeedError> {
        let clean = input.trim().trim_start_matches("0x");
        if clean.len() != 64 {
            return Err(SeedError::InvalidLength(clean.len()));
        }
        let bytes = hex::decode(clean).map_err(|_| SeedError::InvalidHex)?;
        let mut out = [0u8; 32];
        out.copy_from_slice(&bytes);
        Ok(Self(out))
    }

    /// Expands a numeric seed into a full 32-byte seed.
    pub fn from_u64(seed: u64) -> Self {
        let mut hasher = Keccak256::new();
        hasher.update(seed.to_le_bytes());
        Self(hasher.finalize().into())
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// Creates the generator for `pass` running over compilation unit `unit`.
    pub fn derive_rng(&self, unit: &str, pass: &str) -> StdRng {
        let mut hasher = Keccak256::new();
        hasher.update(self.0);
        hasher.update((unit.len() as u64).to_le_bytes());
        hasher.update(unit.as_bytes());
        hasher.update(pass.as_bytes());
        StdRng::from_seed(hasher.finalize().into())
    }
}

impl fmt::Debug for Seed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Seed({})", self.to_hex())
    }
}

//! Cleft Verification Engine
//!
//! This crate checks that transformed functions are functionally equivalent to their
//! original versions through:
//!
//! 1. **Reference Interpretation**: a direct interpreter for the IR with wrapping integer
//!    semantics and stack slots
//! 2. **Practical Testing**: running original and transformed functions on the same seeded
//!    random inputs and comparing what they return and leave in memory

pub mod config;
pub mod interpreter;
pub mod practical;

pub use config::{VerificationConfig, VerificationLevel};
pub use interpreter::{execute, Execution, Interpreter};
pub use practical::{EquivalenceResults, Mismatch, Outcome, PracticalTester};

use cleft_utils::errors::CfgIrError;

/// Main error type for verification operations
#[derive(thiserror::Error, Debug)]
pub enum VerificationError {
    #[error("function expects {expected} arguments, got {got}")]
    ArityMismatch { expected: usize, got: usize },

    #[error("execution ran out of fuel after {0} steps")]
    OutOfFuel(u64),

    #[error("trap in block {block}: {reason}")]
    Trap { block: usize, reason: String },

    #[error("value %{0} read before it was defined")]
    Undefined(u32),

    #[error("invalid IR: {0}")]
    Ir(#[from] CfgIrError),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for verification operations
pub type VerificationResult<T> = Result<T, VerificationError>;

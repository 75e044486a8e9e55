//! Practical testing using the reference interpreter
//!
//! This module provides empirical validation that transformed functions behave
//! identically to their original versions through:
//!
//! 1. **Output Equivalence**: comparing returned values
//! 2. **State Equivalence**: comparing what is left behind pointer arguments
//! 3. **Trap Equivalence**: a trapping original must trap the same way once transformed

use crate::interpreter::{execute, wrap, Execution};
use crate::{VerificationConfig, VerificationError, VerificationResult};
use cleft_core::cfg_ir::Type;
use cleft_core::{Function, Module};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Transforms grow the number of executed instructions by a bounded factor; the
/// transformed function gets this multiple of the original budget.
const TRANSFORMED_FUEL_FACTOR: u64 = 16;

/// Practical testing engine driving the interpreter
#[derive(Debug, Clone)]
pub struct PracticalTester {
    config: VerificationConfig,
}

/// How a run ended. Step counts and trap locations differ between versions and are left out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    Returned { value: Option<i64>, memory: Vec<i64> },
    Trapped(String),
}

impl From<Execution> for Outcome {
    fn from(run: Execution) -> Self {
        Self::Returned {
            value: run.value,
            memory: run.memory,
        }
    }
}

/// An input on which the two functions disagree
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mismatch {
    pub inputs: Vec<i64>,
    pub original: Outcome,
    pub transformed: Outcome,
}

/// Results of equivalence testing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EquivalenceResults {
    /// Function under test
    pub function: String,
    /// Overall testing result
    pub overall_passed: bool,
    /// Number of test cases compared
    pub test_cases_executed: usize,
    /// Cases skipped because the original ran out of fuel
    pub inconclusive: usize,
    /// Inputs on which the functions disagree
    pub mismatches: Vec<Mismatch>,
    /// Total testing time
    pub testing_time: Duration,
}

impl PracticalTester {
    /// Create a new practical tester
    pub fn new(config: VerificationConfig) -> VerificationResult<Self> {
        config.validate()?;
        tracing::debug!(
            "Initialized practical tester: {} cases, fuel {}",
            config.test_case_count,
            config.fuel
        );
        Ok(Self { config })
    }

    /// Test equivalence between two versions of a function
    pub fn test_equivalence(
        &self,
        original: &Function,
        transformed: &Function,
    ) -> VerificationResult<EquivalenceResults> {
        let start_time = Instant::now();
        let signature = param_types(original)?;
        if signature != param_types(transformed)? {
            return Err(VerificationError::Configuration(format!(
                "signatures of `{}' and `{}' differ",
                original.name, transformed.name
            )));
        }

        let mut rng = StdRng::seed_from_u64(self.config.test_seed);
        let transformed_fuel = self.config.fuel.saturating_mul(TRANSFORMED_FUEL_FACTOR);
        let mut executed = 0;
        let mut inconclusive = 0;
        let mut mismatches = Vec::new();

        for _ in 0..self.config.test_case_count {
            let inputs = generate_inputs(&signature, &mut rng);
            let Some(expected) = outcome(execute(original, &inputs, self.config.fuel))? else {
                inconclusive += 1;
                continue;
            };
            let actual = outcome(execute(transformed, &inputs, transformed_fuel))?
                .unwrap_or_else(|| Outcome::Trapped("ran out of fuel".into()));
            executed += 1;
            if expected != actual {
                tracing::debug!("mismatch on {:?}: {:?} vs {:?}", inputs, expected, actual);
                mismatches.push(Mismatch {
                    inputs,
                    original: expected,
                    transformed: actual,
                });
            }
        }

        let results = EquivalenceResults {
            function: original.name.clone(),
            overall_passed: mismatches.is_empty(),
            test_cases_executed: executed,
            inconclusive,
            mismatches,
            testing_time: start_time.elapsed(),
        };
        tracing::info!(
            "{}: {} cases, {} mismatches, {} inconclusive",
            results.function,
            results.test_cases_executed,
            results.mismatches.len(),
            results.inconclusive
        );
        Ok(results)
    }

    /// Test every function of `original` against the function of the same name in
    /// `transformed`
    pub fn test_module(
        &self,
        original: &Module,
        transformed: &Module,
    ) -> VerificationResult<Vec<EquivalenceResults>> {
        original
            .functions
            .iter()
            .map(|func| {
                let other = transformed
                    .functions
                    .iter()
                    .find(|f| f.name == func.name)
                    .ok_or_else(|| {
                        VerificationError::Configuration(format!(
                            "function `{}' missing from transformed module",
                            func.name
                        ))
                    })?;
                self.test_equivalence(func, other)
            })
            .collect()
    }
}

fn param_types(func: &Function) -> VerificationResult<Vec<Type>> {
    func.params
        .iter()
        .map(|p| func.value_type(*p).map_err(VerificationError::from))
        .collect()
}

/// Classifies a run; `None` when it ran out of fuel.
fn outcome(run: VerificationResult<Execution>) -> VerificationResult<Option<Outcome>> {
    match run {
        Ok(run) => Ok(Some(run.into())),
        Err(VerificationError::OutOfFuel(_)) => Ok(None),
        Err(VerificationError::Trap { reason, .. }) => Ok(Some(Outcome::Trapped(reason))),
        Err(err) => Err(err),
    }
}

/// Draws one argument per parameter, favouring boundary values.
fn generate_inputs(signature: &[Type], rng: &mut StdRng) -> Vec<i64> {
    signature
        .iter()
        .map(|ty| {
            let bits = ty.bits();
            if rng.random_bool(0.25) {
                let max = if bits >= 64 {
                    i64::MAX
                } else {
                    (1i64 << (bits - 1)) - 1
                };
                let edges = [0, 1, -1, max, wrap(max.wrapping_add(1), bits)];
                wrap(edges[rng.random_range(0..edges.len())], bits)
            } else {
                wrap(rng.random::<i64>(), bits)
            }
        })
        .collect()
}

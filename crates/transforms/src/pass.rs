use crate::{PassConfig, Transform};
use cleft_analysis::{collect_metrics, compare};
use cleft_core::{Function, Module};
use cleft_utils::errors::TransformError;
use cleft_utils::Seed;
use rand::rngs::StdRng;
use serde::Serialize;
use tracing::{info, warn};

/// Outcome of one transform on one function.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PassOutcome {
    pub pass: String,
    pub function: String,
    /// Whether the transform reported a change.
    pub mutated: bool,
    /// Metric delta between the function before and after the transform.
    pub delta: f64,
    /// Whether the transformed function replaced the original.
    pub kept: bool,
}

/// Trait for running a sequence of obfuscation transforms.
pub trait Pass {
    /// Runs `passes` over the functions of `module`.
    ///
    /// Every pass draws from its own generator, derived from `seed`, the module name and the
    /// pass name, and visits the functions in order.
    fn run(
        &self,
        module: &mut Module,
        passes: &[Box<dyn Transform>],
        cfg: &PassConfig,
        seed: &Seed,
    ) -> Result<Vec<PassOutcome>, TransformError>;
}

/// Default implementation of the Pass trait.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultPass;

impl Pass for DefaultPass {
    fn run(
        &self,
        module: &mut Module,
        passes: &[Box<dyn Transform>],
        cfg: &PassConfig,
        seed: &Seed,
    ) -> Result<Vec<PassOutcome>, TransformError> {
        let mut outcomes = Vec::new();
        for pass in passes {
            let mut rng = seed.derive_rng(&module.name, pass.name());
            for func in &mut module.functions {
                if let Some(outcome) = apply_pass(func, pass.as_ref(), cfg, &mut rng)? {
                    outcomes.push(outcome);
                }
            }
        }
        Ok(outcomes)
    }
}

/// Applies `pass` to a snapshot of `ir` and keeps the snapshot when the metric delta clears
/// the threshold or the configuration is aggressive.
///
/// Returns `None` when the transform made no change. A failing transform is not rolled back:
/// whatever it changed before the error is written to `ir` and the error is returned.
pub fn apply_pass(
    ir: &mut Function,
    pass: &dyn Transform,
    cfg: &PassConfig,
    rng: &mut StdRng,
) -> Result<Option<PassOutcome>, TransformError> {
    let before = collect_metrics(ir)?;
    let mut snapshot = ir.clone();

    let mutated = match pass.apply(&mut snapshot, rng) {
        Ok(mutated) => mutated,
        Err(err) => {
            warn!("{:>14} {:<16} failed: {}", pass.name(), ir.name, err);
            *ir = snapshot;
            return Err(err);
        }
    };
    if !mutated {
        return Ok(None);
    }

    let after = collect_metrics(&snapshot)?;
    let delta = compare(&before, &after);

    let keep = delta >= cfg.accept_threshold || cfg.aggressive;
    info!(
        "{:>14} {:<16} Δ{:+.2} {}",
        pass.name(),
        ir.name,
        delta,
        if keep { "✓" } else { "×" }
    );

    let outcome = PassOutcome {
        pass: pass.name().to_string(),
        function: ir.name.clone(),
        mutated,
        delta,
        kept: keep,
    };
    if keep {
        *ir = snapshot;
    }
    Ok(Some(outcome))
}

/// Convenience function to run the default pass over a single function.
///
/// The function name serves as the compilation unit name.
pub fn run(
    ir: &mut Function,
    passes: &[Box<dyn Transform>],
    cfg: &PassConfig,
    seed: &Seed,
) -> Result<Vec<PassOutcome>, TransformError> {
    let mut outcomes = Vec::new();
    for pass in passes {
        let mut rng = seed.derive_rng(&ir.name, pass.name());
        if let Some(outcome) = apply_pass(ir, pass.as_ref(), cfg, &mut rng)? {
            outcomes.push(outcome);
        }
    }
    Ok(outcomes)
}

/// Convenience function to run the default pass over a module.
pub fn run_module(
    module: &mut Module,
    passes: &[Box<dyn Transform>],
    cfg: &PassConfig,
    seed: &Seed,
) -> Result<Vec<PassOutcome>, TransformError> {
    DefaultPass.run(module, passes, cfg, seed)
}

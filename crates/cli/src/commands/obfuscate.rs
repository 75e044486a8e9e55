/// Module for the `obfuscate` subcommand, which applies obfuscation transforms to a module.
///
/// This module loads a JSON module, applies the requested transforms (duplicate-bb, mba) to
/// every function, and writes the transformed module back as JSON. It can also emit a report
/// with the per-pass outcomes and size changes, and check the result against the original with
/// the practical tester.
use clap::Args;
use cleft_analysis::collect_metrics;
use cleft_core::{verify::verify, Module};
use cleft_transform::{build_passes, pass, PassConfig};
use cleft_utils::errors::ObfuscateError;
use cleft_utils::{Ratio, Seed};
use cleft_verification::{PracticalTester, VerificationConfig};
use serde_json::json;
use std::error::Error;
use std::fs;
use tracing::info;

/// Arguments for the `obfuscate` subcommand.
#[derive(Debug, Args)]
pub struct ObfuscateArgs {
    /// Random seed: a number or 64 hex characters (default: 42).
    #[arg(long, default_value = "42")]
    seed: String,
    /// Comma-separated list of transforms (default: duplicate-bb).
    #[arg(long, default_value = "duplicate-bb")]
    passes: String,
    /// Only apply the duplicate-bb pass on <ratio> of the basic blocks.
    #[arg(long, value_name = "ratio", default_value = "1.0")]
    duplicate_ratio: Ratio,
    /// Only apply the mba pass on <ratio> of the candidates.
    #[arg(long, value_name = "ratio", default_value = "1.0")]
    mba_ratio: Ratio,
    /// Minimum quality threshold for accepting transforms; without it every change is kept.
    #[arg(long)]
    accept_threshold: Option<f64>,
    /// Output file for the transformed module (default: stdout).
    #[arg(short, long)]
    output: Option<String>,
    /// Path to emit the pass report as JSON (optional).
    #[arg(long)]
    emit: Option<String>,
    /// Check the transformed module against the original on random inputs.
    #[arg(long)]
    verify: bool,
}

/// Parses `--seed`: 64 hex characters, or a number expanded to a full seed.
fn parse_seed(input: &str) -> Result<Seed, ObfuscateError> {
    let trimmed = input.trim();
    match trimmed.parse::<u64>() {
        Ok(n) if !trimmed.starts_with("0x") => Ok(Seed::from_u64(n)),
        _ => Ok(Seed::from_hex(trimmed)?),
    }
}

/// Executes the `obfuscate` subcommand to apply transforms and output the obfuscated module.
impl super::Command for ObfuscateArgs {
    fn execute(self, input: &str) -> Result<(), Box<dyn Error>> {
        let seed = parse_seed(&self.seed)?;
        let cfg = PassConfig {
            duplicate_ratio: self.duplicate_ratio,
            mba_ratio: self.mba_ratio,
            accept_threshold: self.accept_threshold.unwrap_or(0.0),
            aggressive: self.accept_threshold.is_none(),
        };
        let names: Vec<&str> = self
            .passes
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();
        let passes = build_passes(&names, &cfg).map_err(ObfuscateError::from)?;

        let original = super::load_module(input)?;
        let mut module = original.clone();

        info!(
            "applying {} transforms to {} functions of {}",
            passes.len(),
            module.functions.len(),
            module.name
        );
        let outcomes = pass::run_module(&mut module, &passes, &cfg, &seed)
            .map_err(ObfuscateError::from)?;
        for func in &module.functions {
            verify(func).map_err(ObfuscateError::from)?;
        }

        let serialized = serde_json::to_string_pretty(&module)?;
        super::write_output(self.output.as_deref(), &serialized)?;

        let verification = if self.verify {
            let tester = PracticalTester::new(VerificationConfig::standard())?;
            let results = tester.test_module(&original, &module)?;
            if let Some(failed) = results.iter().find(|r| !r.overall_passed) {
                return Err(format!(
                    "transformed `{}' disagrees with the original on {} inputs",
                    failed.function,
                    failed.mismatches.len()
                )
                .into());
            }
            Some(results)
        } else {
            None
        };

        if let Some(path) = self.emit {
            let report = json!({
                "seed": seed.to_hex(),
                "config": cfg,
                "size": size_report(&original, &module)?,
                "passes": outcomes,
                "verification": verification,
            });
            fs::write(&path, serde_json::to_string_pretty(&report)?)?;
            info!("wrote pass report to {}", &path);
        }
        Ok(())
    }
}

/// Instruction and block counts per function, before and after.
fn size_report(
    original: &Module,
    transformed: &Module,
) -> Result<serde_json::Value, Box<dyn Error>> {
    let mut functions = Vec::new();
    for (before, after) in original.functions.iter().zip(&transformed.functions) {
        let (m0, m1) = (collect_metrics(before)?, collect_metrics(after)?);
        functions.push(json!({
            "name": before.name,
            "blocks": [m0.block_cnt, m1.block_cnt],
            "instructions": [m0.inst_cnt, m1.inst_cnt],
            "merges": [m0.merge_cnt, m1.merge_cnt],
            "potency": [m0.potency, m1.potency],
        }));
    }
    Ok(json!(functions))
}

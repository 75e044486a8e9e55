use clap::Args;
use cleft_analysis::ReachableIntegerValues;
use cleft_core::{DominatorTree, Function};
use serde_json::{json, Value};
use std::error::Error;

#[derive(Debug, Args)]
pub struct ReachableArgs {
    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<String>,

    /// Print JSON instead of text
    #[arg(long)]
    json: bool,
}

impl super::Command for ReachableArgs {
    fn execute(self, input: &str) -> Result<(), Box<dyn Error>> {
        let module = super::load_module(input)?;
        let mut analysis = ReachableIntegerValues::new();
        let mut text = String::new();
        let mut functions = Vec::new();

        for func in &module.functions {
            analysis.run(func, &DominatorTree::compute(func));
            if self.json {
                functions.push(function_json(func, &analysis));
            } else {
                text.push_str(&function_text(func, &analysis));
            }
        }

        let out = if self.json {
            serde_json::to_string_pretty(&json!({ "module": module.name, "functions": functions }))?
        } else {
            text
        };
        super::write_output(self.output.as_deref(), &out)?;
        Ok(())
    }
}

fn function_text(func: &Function, analysis: &ReachableIntegerValues) -> String {
    let mut out = format!("{}:\n", func.name);
    for block in func.blocks() {
        let values: Vec<String> = analysis
            .values(block)
            .map(|set| set.iter().map(ToString::to_string).collect())
            .unwrap_or_default();
        out.push_str(&format!("  bb{}: {{{}}}\n", block.index(), values.join(", ")));
    }
    out
}

fn function_json(func: &Function, analysis: &ReachableIntegerValues) -> Value {
    let blocks: Vec<Value> = func
        .blocks()
        .map(|block| {
            let values: Vec<u32> = analysis
                .values(block)
                .map(|set| set.iter().map(|v| v.0).collect())
                .unwrap_or_default();
            json!({ "block": block.index(), "values": values })
        })
        .collect();
    json!({ "name": func.name, "blocks": blocks })
}

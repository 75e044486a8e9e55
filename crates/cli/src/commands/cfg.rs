use clap::Args;
use cleft_core::cfg_ir::{EdgeType, Function, Module};
use std::error::Error;
use std::fmt::Write;

#[derive(Debug, Args)]
pub struct CfgArgs {
    /// Output file for Graphviz .dot (default: stdout)
    #[arg(short, long)]
    output: Option<String>,

    /// Only render the function with this name
    #[arg(short, long)]
    function: Option<String>,
}

impl super::Command for CfgArgs {
    fn execute(self, input: &str) -> Result<(), Box<dyn Error>> {
        let module = super::load_module(input)?;
        if let Some(name) = &self.function {
            if !module.functions.iter().any(|f| &f.name == name) {
                return Err(format!("no function named `{name}' in {}", module.name).into());
            }
        }
        let dot = generate_dot(&module, self.function.as_deref());
        super::write_output(self.output.as_deref(), &dot)?;
        Ok(())
    }
}

/// Renders the selected functions of `module` as one digraph with a cluster per function.
pub fn generate_dot(module: &Module, only: Option<&str>) -> String {
    let mut dot = String::from("digraph CFG {\n    node [shape=box, fontname=monospace];\n");
    for (index, func) in module
        .functions
        .iter()
        .enumerate()
        .filter(|(_, f)| only.map_or(true, |name| f.name == name))
    {
        write_function(&mut dot, index, func);
    }
    dot.push_str("}\n");
    dot
}

fn write_function(dot: &mut String, index: usize, func: &Function) {
    let _ = writeln!(dot, "    subgraph cluster_{index} {{");
    let _ = writeln!(dot, "        label=\"{}\";", escape(&func.name));

    for node in func.cfg.node_indices() {
        let block = &func.cfg[node];
        let mut label = format!("bb{}", node.index());
        if node == func.entry {
            label.push_str(" (entry)");
        }
        if block.landing_pad {
            label.push_str(" (landing pad)");
        }
        for inst in &block.instructions {
            label.push_str("\\l");
            label.push_str(&escape(&func.display_instruction(inst).to_string()));
        }
        let _ = writeln!(
            dot,
            "        f{index}_{} [label=\"{label}\\l\"];",
            node.index()
        );
    }

    for edge in func.cfg.edge_indices() {
        let Some((src, dst)) = func.cfg.edge_endpoints(edge) else {
            continue;
        };
        let label = match func.cfg[edge] {
            EdgeType::Jump => "Jump",
            EdgeType::BranchTrue => "BranchTrue",
            EdgeType::BranchFalse => "BranchFalse",
        };
        let _ = writeln!(
            dot,
            "        f{index}_{} -> f{index}_{} [label=\"{label}\"];",
            src.index(),
            dst.index()
        );
    }
    dot.push_str("    }\n");
}

fn escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

use clap::Subcommand;
use cleft_core::{verify::verify, Module};
use cleft_utils::errors::ObfuscateError;
use std::error::Error;
use std::fs;

pub mod cfg;
pub mod obfuscate;
pub mod reachable;

#[derive(Debug, Subcommand)]
pub enum Cmd {
    /// Write the CFG of every function as Graphviz to stdout or a file
    Cfg(cfg::CfgArgs),

    /// Print the integer values reachable at the entry of every block
    Reachable(reachable::ReachableArgs),

    /// Apply obfuscation transforms and write the resulting module
    Obfuscate(obfuscate::ObfuscateArgs),
}

pub trait Command {
    fn execute(self, input: &str) -> Result<(), Box<dyn Error>>;
}

impl Command for Cmd {
    fn execute(self, input: &str) -> Result<(), Box<dyn Error>> {
        match self {
            Cmd::Cfg(args) => args.execute(input),
            Cmd::Reachable(args) => args.execute(input),
            Cmd::Obfuscate(args) => args.execute(input),
        }
    }
}

/// Reads a JSON module from `path` and checks that every function is well formed.
pub fn load_module(path: &str) -> Result<Module, ObfuscateError> {
    let text = fs::read_to_string(path)?;
    let module: Module = serde_json::from_str(&text)?;
    for func in &module.functions {
        verify(func)?;
    }
    Ok(module)
}

/// Writes `contents` to `path`, or to stdout when no path is given.
pub(crate) fn write_output(path: Option<&str>, contents: &str) -> Result<(), ObfuscateError> {
    match path {
        Some(path) => fs::write(path, contents)?,
        None => println!("{contents}"),
    }
    Ok(())
}

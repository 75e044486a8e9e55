/// Entry point for the Cleft CLI, a CFG obfuscation tool.
///
/// This module parses command-line arguments and dispatches to subcommands for CFG
/// visualization, reachable value inspection, or obfuscating a module. It initializes logging
/// and handles the main execution flow.
use clap::Parser;
use cleft_cli::commands::{Cmd, Command};
use tracing_subscriber::EnvFilter;

/// Command-line interface for Cleft.
///
/// Cleft reads a module serialised as JSON and either renders its control flow graphs,
/// prints the integer values reachable in each block, or applies obfuscation transforms
/// (duplicate-bb, mba).
#[derive(Parser)]
#[command(name = "cleft")]
#[command(about = "Cleft: guarded basic block duplication and friends")]
struct Cli {
    #[command(subcommand)]
    command: Cmd,

    /// Path to the input module (JSON)
    input: String,
}

/// Runs the Cleft CLI with the provided arguments.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    cli.command.execute(&cli.input)
}

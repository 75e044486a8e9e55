//! Command line front end: subcommands working on JSON serialised modules.

pub mod commands;

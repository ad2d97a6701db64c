//! CLI Adapter
//!
//! Command-line interface for dexcross.
//! Uses clap derive macros for argument parsing.

mod commands;

pub use commands::{
    execute, init_logging, log_filter, CliApp, Command, OutputFormat, RunCmd, SecretAction,
    SecretCmd, StatusCmd, RISK_API_KEY_SECRET,
};

/// Initialize the CLI application
pub fn init() -> CliApp {
    use clap::Parser;
    CliApp::parse()
}

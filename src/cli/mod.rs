//! CLI module for the converge tool.
//!
//! This module provides the command-line interface for inspecting
//! configuration, waiting on operations, and comparing resource state.

mod commands;
mod output;

pub use commands::{
    CertCommands, Cli, Commands, ConfigCommands, OperationCommands, OutputFormat,
};
pub use output::OutputFormatter;

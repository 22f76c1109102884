//! CLI command definitions.
//!
//! This module defines all CLI commands and their arguments using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Converge - convergence tooling for control-plane resources.
#[derive(Parser, Debug)]
#[command(name = "converge")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the configuration file.
    #[arg(short, long, global = true, env = "CONVERGE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON.
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Output format (text, json).
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Inspect the client configuration.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Query or wait on long-running operations.
    Operation {
        /// Operation subcommand.
        #[command(subcommand)]
        command: OperationCommands,
    },

    /// Work with certificate bundles.
    Cert {
        /// Certificate subcommand.
        #[command(subcommand)]
        command: CertCommands,
    },

    /// Compare two resource documents.
    Diff {
        /// Stored (or prior) state, as a JSON object.
        old: PathBuf,

        /// Desired (or observed) state, as a JSON object.
        new: PathBuf,

        /// Attributes compared as unordered string lists.
        #[arg(long = "unordered", value_name = "ATTR")]
        unordered: Vec<String>,

        /// Attributes compared as certificate bundles.
        #[arg(long = "certificate", value_name = "ATTR")]
        certificate: Vec<String>,

        /// Attributes where an all-zero object equals null.
        #[arg(long = "zero", value_name = "ATTR")]
        zero: Vec<String>,

        /// Treat `new` as observed state and report drift.
        #[arg(long)]
        drift: bool,
    },
}

/// Configuration subcommands.
#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Validate the configuration and list warnings.
    Validate,

    /// Print the effective configuration after environment overrides.
    Show,
}

/// Operation subcommands.
#[derive(Subcommand, Debug)]
pub enum OperationCommands {
    /// Fetch the current record of an operation.
    Get {
        /// Operation identifier.
        id: String,
    },

    /// Poll an operation until it finishes.
    Wait {
        /// Operation identifier.
        id: String,

        /// Give up after this many seconds (defaults to the configured timeout).
        #[arg(short, long)]
        timeout: Option<u64>,
    },
}

/// Certificate subcommands.
#[derive(Subcommand, Debug)]
pub enum CertCommands {
    /// Print the canonical form of a bundle.
    Normalize {
        /// File holding the bundle.
        input: PathBuf,

        /// The file already holds base64 text rather than PEM.
        #[arg(long)]
        base64: bool,
    },

    /// Check whether two bundles hold the same certificates.
    Compare {
        /// Current bundle file.
        current: PathBuf,

        /// New bundle file.
        new: PathBuf,

        /// The files already hold base64 text rather than PEM.
        #[arg(long)]
        base64: bool,
    },
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output.
    Json,
}

impl Cli {
    /// Parses CLI arguments.
    #[must_use]
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_diff() {
        let cli = Cli::try_parse_from([
            "converge",
            "diff",
            "old.json",
            "new.json",
            "--unordered",
            "aliases",
            "--unordered",
            "tags",
            "--certificate",
            "ca",
        ])
        .unwrap();

        match cli.command {
            Commands::Diff {
                old,
                unordered,
                certificate,
                zero,
                drift,
                ..
            } => {
                assert_eq!(old, PathBuf::from("old.json"));
                assert_eq!(unordered, vec!["aliases", "tags"]);
                assert_eq!(certificate, vec!["ca"]);
                assert!(zero.is_empty());
                assert!(!drift);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_operation_wait_with_global_flags() {
        let cli = Cli::try_parse_from([
            "converge", "operation", "wait", "op-1", "--timeout", "30", "--output", "json", "-v",
        ])
        .unwrap();

        assert!(cli.verbose);
        assert!(matches!(cli.output, OutputFormat::Json));
        assert!(matches!(
            cli.command,
            Commands::Operation {
                command: OperationCommands::Wait { ref id, timeout: Some(30) }
            } if id == "op-1"
        ));
    }

    #[test]
    fn test_diff_requires_two_files() {
        assert!(Cli::try_parse_from(["converge", "diff", "old.json"]).is_err());
    }

    #[test]
    fn test_cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}

//! Output formatting for CLI commands.
//!
//! This module provides formatting utilities for displaying
//! information to the user in various formats.

use colored::Colorize;
use std::fmt::Write;
use tabled::{Table, Tabled};

use crate::config::{ProviderConfig, ValidationResult};
use crate::controlplane::{AsyncOperation, OperationOutcome};
use crate::planner::{DiffType, ResourceDiff};
use crate::values::{CertificateInfo, Diagnostics, Severity};

use super::commands::OutputFormat;

/// Output formatter for CLI.
#[derive(Debug)]
pub struct OutputFormatter {
    /// Output format.
    format: OutputFormat,
}

/// Attribute change row for table display.
#[derive(Tabled)]
struct DiffRow {
    #[tabled(rename = "Field")]
    field: String,
    #[tabled(rename = "Old")]
    old: String,
    #[tabled(rename = "New")]
    new: String,
}

/// Certificate row for table display.
#[derive(Tabled)]
struct CertificateRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Subject")]
    subject: String,
    #[tabled(rename = "Not After")]
    not_after: String,
    #[tabled(rename = "SHA-256")]
    sha256: String,
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats a resource diff for display.
    #[must_use]
    pub fn format_diff(&self, diff: &ResourceDiff) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(diff).unwrap_or_default(),
            OutputFormat::Text => Self::format_diff_text(diff),
        }
    }

    /// Formats a diff as text.
    fn format_diff_text(diff: &ResourceDiff) -> String {
        let mut output = String::new();

        if diff.is_unchanged() {
            let _ = writeln!(output, "{} {}: no changes", "✓".green(), diff.name);
        } else {
            let _ = write!(
                output,
                "\n📋 {}: {}\n\n",
                diff.name,
                Self::format_diff_type(diff.diff_type)
            );

            let rows: Vec<DiffRow> = diff
                .details
                .iter()
                .map(|d| DiffRow {
                    field: d.field.clone(),
                    old: Self::truncate(d.old_value.as_deref().unwrap_or("-"), 40),
                    new: Self::truncate(d.new_value.as_deref().unwrap_or("-"), 40),
                })
                .collect();

            if !rows.is_empty() {
                output.push_str(&Table::new(rows).to_string());
                output.push('\n');
            }

            for detail in &diff.details {
                let Some(members) = &detail.members else {
                    continue;
                };
                let mut added = members.added.clone();
                let mut removed = members.removed.clone();
                added.sort();
                removed.sort();
                let _ = writeln!(output, "\n   {}:", detail.field);
                for member in &added {
                    let _ = writeln!(output, "     {} {member}", "+".green());
                }
                for member in &removed {
                    let _ = writeln!(output, "     {} {member}", "-".red());
                }
            }
        }

        if !diff.diagnostics.is_empty() {
            output.push('\n');
            output.push_str(&Self::format_diagnostics_text(&diff.diagnostics));
        }

        output
    }

    /// Formats an operation record for display.
    #[must_use]
    pub fn format_operation(&self, operation: &AsyncOperation) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(operation).unwrap_or_default(),
            OutputFormat::Text => {
                let mut output = String::new();
                let _ = writeln!(output, "\n⚙ Operation: {}\n", operation.id);
                let _ = writeln!(
                    output,
                    "   State: {}",
                    Self::format_outcome(&operation.outcome())
                );
                if let Some(kind) = &operation.operation_type {
                    let _ = writeln!(output, "   Type: {kind}");
                }
                if let Some(started) = operation.started_time {
                    let _ = writeln!(output, "   Started: {}", started.format("%Y-%m-%d %H:%M:%S"));
                }
                if let Some(finished) = operation.finished_time {
                    let _ = writeln!(output, "   Finished: {}", finished.format("%Y-%m-%d %H:%M:%S"));
                }
                if !operation.failure_reason.is_empty() {
                    let _ = writeln!(output, "   Reason: {}", operation.failure_reason);
                }
                output
            }
        }
    }

    /// Formats the certificates of a normalized bundle.
    #[must_use]
    pub fn format_certificates(&self, normalized: &str, certificates: &[CertificateInfo]) -> String {
        match self.format {
            OutputFormat::Json => {
                let json = serde_json::json!({
                    "normalized": normalized,
                    "certificates": certificates,
                });
                serde_json::to_string_pretty(&json).unwrap_or_default()
            }
            OutputFormat::Text => {
                let rows: Vec<CertificateRow> = certificates
                    .iter()
                    .enumerate()
                    .map(|(i, c)| CertificateRow {
                        index: i + 1,
                        subject: Self::truncate(&c.subject, 40),
                        not_after: c.not_after.clone(),
                        sha256: Self::truncate(&c.sha256, 19),
                    })
                    .collect();

                let mut output = format!("\n🔒 {} certificate(s)\n\n", certificates.len());
                output.push_str(&Table::new(rows).to_string());
                let _ = write!(output, "\n\n{normalized}\n");
                output
            }
        }
    }

    /// Formats the result of comparing two certificate bundles.
    #[must_use]
    pub fn format_comparison(&self, equal: bool, diagnostics: &Diagnostics) -> String {
        match self.format {
            OutputFormat::Json => {
                let json = serde_json::json!({
                    "equal": equal,
                    "diagnostics": diagnostics,
                });
                serde_json::to_string_pretty(&json).unwrap_or_default()
            }
            OutputFormat::Text => {
                let mut output = if equal {
                    format!("{} Bundles hold the same certificates.\n", "✓".green())
                } else {
                    format!("{} Bundles differ.\n", "✗".red())
                };
                if !diagnostics.is_empty() {
                    output.push('\n');
                    output.push_str(&Self::format_diagnostics_text(diagnostics));
                }
                output
            }
        }
    }

    /// Formats a configuration validation result.
    #[must_use]
    pub fn format_validation(&self, result: &ValidationResult) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(result).unwrap_or_default(),
            OutputFormat::Text => {
                let mut output = if result.is_valid() {
                    format!("{} Configuration is valid.\n", "✓".green())
                } else {
                    format!("{} Configuration is invalid:\n", "✗".red())
                };

                for error in &result.errors {
                    let _ = writeln!(output, "   - {}: {}", error.field, error.message);
                }

                if !result.warnings.is_empty() {
                    let _ = write!(output, "\n{} Warnings:\n", "⚠".yellow());
                    for warning in &result.warnings {
                        let _ = writeln!(output, "   - {warning}");
                    }
                }

                output
            }
        }
    }

    /// Formats the effective configuration.
    #[must_use]
    pub fn format_config(&self, config: &ProviderConfig) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(config).unwrap_or_default(),
            OutputFormat::Text => serde_yaml::to_string(config).unwrap_or_default(),
        }
    }

    /// Formats a list of diagnostics.
    #[must_use]
    pub fn format_diagnostics(&self, diagnostics: &Diagnostics) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(diagnostics).unwrap_or_default(),
            OutputFormat::Text => Self::format_diagnostics_text(diagnostics),
        }
    }

    /// Formats diagnostics as text, one per line.
    fn format_diagnostics_text(diagnostics: &Diagnostics) -> String {
        let mut output = String::new();
        for diagnostic in diagnostics {
            let marker = match diagnostic.severity {
                Severity::Error => "✗".red(),
                Severity::Warning => "⚠".yellow(),
            };
            let _ = writeln!(output, "{marker} {diagnostic}");
        }
        output
    }

    /// Formats a diff type with color.
    fn format_diff_type(diff_type: DiffType) -> String {
        match diff_type {
            DiffType::Create => "+create".green().to_string(),
            DiffType::Update => "~update".yellow().to_string(),
            DiffType::Delete => "-delete".red().to_string(),
            DiffType::Drift => "drift".magenta().to_string(),
            DiffType::NoChange => "no change".dimmed().to_string(),
        }
    }

    /// Formats an operation outcome with color.
    fn format_outcome(outcome: &OperationOutcome) -> String {
        let text = outcome.to_string();
        match outcome {
            OperationOutcome::Fulfilled => text.green().to_string(),
            OperationOutcome::Failed(_) | OperationOutcome::Cancelled => text.red().to_string(),
            OperationOutcome::Pending | OperationOutcome::InProgress => text.yellow().to_string(),
            OperationOutcome::Unknown(_) => text.dimmed().to_string(),
        }
    }

    /// Truncates a string to a maximum number of characters.
    fn truncate(s: &str, max_len: usize) -> String {
        if s.chars().count() <= max_len {
            s.to_string()
        } else {
            let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
            format!("{head}...")
        }
    }
}

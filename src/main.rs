//! Converge CLI entrypoint.
//!
//! This is the main entrypoint for the converge command-line tool.

use std::io::Write;
use std::path::Path;
use std::process::ExitCode;
use std::time::Duration;

use converge_provider::cli::{
    CertCommands, Cli, Commands, ConfigCommands, OperationCommands, OutputFormatter,
};
use converge_provider::config::{ConfigParser, ConfigValidator, ProviderConfig, find_config_file};
use converge_provider::controlplane::{
    AsyncOperation, BackoffPolicy, CallContext, CallOptions, ControlPlaneClient, OperationAwaiter,
    RetryingInvoker,
};
use converge_provider::error::{ProviderError, Result};
use converge_provider::planner::DiffEngine;
use converge_provider::values::{
    CertificateBundle, CustomKind, CustomValue, Diagnostics, GenericValue, ResourceState,
    validate_certificate_bundle,
};

use clap::Parser;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Main entrypoint.
fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.log_json);

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Initializes the logging system.
fn init_logging(verbose: bool, json: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Main async entry point.
async fn run(cli: Cli) -> Result<()> {
    let formatter = OutputFormatter::new(cli.output);

    match cli.command {
        Commands::Config { command } => cmd_config(cli.config.as_deref(), &command, &formatter),
        Commands::Operation { command } => {
            cmd_operation(cli.config.as_deref(), command, &formatter).await
        }
        Commands::Cert { command } => cmd_cert(&command, &formatter),
        Commands::Diff {
            old,
            new,
            unordered,
            certificate,
            zero,
            drift,
        } => {
            let kinds = [
                (CustomKind::UnorderedList, unordered),
                (CustomKind::CertificateBundle, certificate),
                (CustomKind::Zero, zero),
            ];
            cmd_diff(&old, &new, &kinds, drift, &formatter)
        }
    }
}

/// Configuration commands.
fn cmd_config(
    config_path: Option<&Path>,
    command: &ConfigCommands,
    formatter: &OutputFormatter,
) -> Result<()> {
    let config = load_config(config_path)?;

    match command {
        ConfigCommands::Validate => {
            let result = ConfigValidator::new().check(&config);
            emit(&formatter.format_validation(&result))?;
            if result.is_valid() {
                Ok(())
            } else {
                Err(ProviderError::internal(format!(
                    "{} validation error(s)",
                    result.errors.len()
                )))
            }
        }
        ConfigCommands::Show => emit(&formatter.format_config(&config)),
    }
}

/// Operation commands.
async fn cmd_operation(
    config_path: Option<&Path>,
    command: OperationCommands,
    formatter: &OutputFormatter,
) -> Result<()> {
    let config = load_config(config_path)?;
    ConfigValidator::new().validate(&config)?;

    let api_key = match ConfigParser::api_key(&config) {
        Ok(key) => Some(key),
        Err(e) => {
            warn!("{e}; sending unauthenticated requests");
            None
        }
    };
    let client = ControlPlaneClient::new(&config.client, api_key)?;
    let invoker = RetryingInvoker::new(BackoffPolicy::from(&config.retry));

    match command {
        OperationCommands::Get { id } => {
            let ctx = CallContext::new();
            let operation = invoker
                .invoke(&ctx, id.as_str(), CallOptions::new(), |id, _| {
                    client.get_async_operation(&ctx, id)
                })
                .await?;
            emit(&formatter.format_operation(&operation))
        }
        OperationCommands::Wait { id, timeout } => {
            let limit = timeout
                .map(Duration::from_secs)
                .or_else(|| config.operations.default_timeout());
            let ctx = limit.map_or_else(CallContext::new, CallContext::with_timeout);

            let interrupt = ctx.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("Interrupted, cancelling wait");
                    interrupt.cancel();
                }
            });

            let awaiter = OperationAwaiter::new(&client)
                .with_tick(config.operations.poll_interval())
                .with_retry(invoker);
            let operation = awaiter
                .wait(&ctx, Some(&AsyncOperation::from_id(id)))
                .await?;
            emit(&formatter.format_operation(&operation))
        }
    }
}

/// Certificate commands.
fn cmd_cert(command: &CertCommands, formatter: &OutputFormatter) -> Result<()> {
    match command {
        CertCommands::Normalize { input, base64 } => {
            let bundle = read_bundle(input, *base64)?;
            let normalized = bundle.normalize()?;
            let certificates = CertificateBundle::new(normalized.as_str()).inspect()?;
            emit(&formatter.format_certificates(&normalized, &certificates))
        }
        CertCommands::Compare {
            current,
            new,
            base64,
        } => {
            let current = read_bundle(current, *base64)?;
            let new = read_bundle(new, *base64)?;

            let mut diags = Diagnostics::new();
            validate_certificate_bundle("new", &GenericValue::custom(new.clone()), &mut diags);

            let equal =
                CustomValue::from(current).semantic_equals(&CustomValue::from(new), &mut diags);
            emit(&formatter.format_comparison(equal, &diags))
        }
    }
}

/// Compares two resource documents.
fn cmd_diff(
    old_path: &Path,
    new_path: &Path,
    kinds: &[(CustomKind, Vec<String>)],
    drift: bool,
    formatter: &OutputFormatter,
) -> Result<()> {
    let mut old = read_document(old_path)?;
    let mut new = read_document(new_path)?;

    for (kind, attributes) in kinds {
        for attribute in attributes {
            let in_old = old.wrap(attribute, *kind)?;
            let in_new = new.wrap(attribute, *kind)?;
            if !in_old && !in_new {
                warn!("Attribute {attribute} is not present in either document");
            }
        }
    }

    let mut diags = Diagnostics::new();
    if let Some((_, attributes)) = kinds
        .iter()
        .find(|(kind, _)| *kind == CustomKind::CertificateBundle)
    {
        for attribute in attributes {
            if let Some(value) = new.get(attribute) {
                validate_certificate_bundle(attribute, value, &mut diags);
            }
        }
    }

    let name = new_path
        .file_stem()
        .map_or_else(|| String::from("resource"), |s| s.to_string_lossy().into_owned());

    let engine = DiffEngine::new();
    let mut diff = if drift {
        engine.drift(&name, &old, Some(&new))
    } else {
        engine.plan(&name, Some(&old), Some(&new))
    };
    diags.append(&mut diff.diagnostics);
    diff.diagnostics = diags;

    emit(&formatter.format_diff(&diff))
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Loads the configuration from `config_path`, a discovered file, or defaults.
fn load_config(config_path: Option<&Path>) -> Result<ProviderConfig> {
    let config_file = match config_path {
        Some(path) => Some(path.to_path_buf()),
        None => find_config_file(".").ok(),
    };

    let base = config_file
        .as_deref()
        .and_then(Path::parent)
        .unwrap_or_else(|| Path::new("."));
    let parser = ConfigParser::new().with_base_path(base);
    parser.load_dotenv()?;

    if let Some(file) = config_file {
        debug!("Loading configuration from: {}", file.display());
        parser.load_with_env(&file)
    } else {
        debug!("No configuration file found, using defaults");
        let mut config = ProviderConfig::default();
        ConfigParser::apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
        Ok(config)
    }
}

/// Reads a certificate bundle from `path`.
fn read_bundle(path: &Path, base64: bool) -> Result<CertificateBundle> {
    let content = std::fs::read_to_string(path)?;
    Ok(if base64 {
        CertificateBundle::new(content.trim())
    } else {
        CertificateBundle::from_pem(&content)
    })
}

/// Reads a resource document from a JSON file.
fn read_document(path: &Path) -> Result<ResourceState> {
    let content = std::fs::read_to_string(path)?;
    let value: serde_json::Value = serde_json::from_str(&content).map_err(|e| {
        ProviderError::internal(format!("Failed to parse {}: {e}", path.display()))
    })?;
    Ok(ResourceState::from_json(value)?)
}

/// Writes command output to stdout.
fn emit(text: &str) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{}", text.trim_end())?;
    Ok(())
}

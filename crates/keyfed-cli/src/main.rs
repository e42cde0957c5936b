// crates/keyfed-cli/src/main.rs
// ============================================================================
// Module: Keyfed CLI Entry Point
// Description: Command dispatcher for federation upload runs.
// Purpose: Wire configured collaborators and execute synchronization passes.
// Dependencies: clap, keyfed-core, keyfed-interop, keyfed-ledger-sqlite,
//               keyfed-providers, serde_json, thiserror
// ============================================================================

//! ## Overview
//! The CLI exposes one operational surface: `run` executes a single upload
//! synchronization pass and prints the run summary as JSON, `status` prints
//! the committed cursor for the configured federation direction, and
//! `config-example` prints a valid configuration file. Scheduling is
//! external; re-invoking `run` is always safe because the ledger commits
//! strictly after gateway acknowledgement.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use clap::Subcommand;
use keyfed_core::BatchTagLedger;
use keyfed_core::JsonLinesEvents;
use keyfed_core::NoopEvents;
use keyfed_core::RunOutcome;
use keyfed_core::RunSummary;
use keyfed_core::SecretSource;
use keyfed_core::SubmissionRepository;
use keyfed_core::SystemClock;
use keyfed_core::UploadController;
use keyfed_core::UploadEvents;
use keyfed_interop::Ed25519BatchSigner;
use keyfed_interop::InteropClient;
use keyfed_interop::InteropClientConfig;
use keyfed_ledger_sqlite::SqliteLedger;
use keyfed_providers::DirSubmissionStore;
use keyfed_providers::EnvSecretSource;
use keyfed_providers::EnvSecretSourceConfig;
use keyfed_providers::FileSecretSource;
use keyfed_providers::S3SubmissionStore;
use keyfed_providers::S3SubmissionStoreConfig;
use serde::Serialize;
use thiserror::Error;

use keyfed_cli::config::KeyfedConfig;
use keyfed_cli::config::SecretsConfig;
use keyfed_cli::config::StoreConfig;
use keyfed_cli::config::config_toml_example;
use keyfed_cli::config::load_config;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "keyfed", version, about = "Diagnosis key federation upload")]
struct Cli {
    /// Path to the configuration file.
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Execute one upload synchronization pass.
    Run,
    /// Print the committed upload cursor for the configured direction.
    Status,
    /// Print a valid example configuration file.
    ConfigExample,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error carrying a rendered message.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`] from a rendered message.
    fn new(error: impl std::fmt::Display) -> Self {
        Self {
            message: error.to_string(),
        }
    }
}

/// Result alias for CLI commands.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
fn main() -> ExitCode {
    let cli = Cli::parse();
    match dispatch(&cli) {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Routes the parsed CLI invocation to its command handler.
fn dispatch(cli: &Cli) -> CliResult<ExitCode> {
    match cli.command {
        Commands::Run => command_run(cli.config.as_deref()),
        Commands::Status => command_status(cli.config.as_deref()),
        Commands::ConfigExample => command_config_example(),
    }
}

// ============================================================================
// SECTION: Commands
// ============================================================================

/// Executes one synchronization pass and prints the summary.
fn command_run(config_path: Option<&Path>) -> CliResult<ExitCode> {
    let config = load_config(config_path).map_err(CliError::new)?;
    if !config.upload.upload_enabled {
        // Mirror the engine's disabled short-circuit without touching any
        // collaborator: no secrets are read and no ledger is opened.
        let summary = RunSummary {
            outcome: RunOutcome::Disabled,
            batches_sent: 0,
            exposures_inserted: 0,
            submissions_skipped: 0,
        };
        write_json_line(&summary)?;
        return Ok(ExitCode::SUCCESS);
    }

    let repository = build_repository(&config)?;
    let ledger = SqliteLedger::new(config.ledger.clone()).map_err(CliError::new)?;
    let secrets = build_secrets(&config)?;
    let auth_token =
        secrets.secret(&config.upload.auth_token_secret_name).map_err(CliError::new)?;
    let signer = Ed25519BatchSigner::from_parameter(
        &secrets,
        &config.upload.signing_key_parameter_name,
        config.signing.issuer.clone(),
    )
    .map_err(CliError::new)?;
    let uploader = InteropClient::new(InteropClientConfig::new(
        config.upload.gateway_base_url.clone(),
        auth_token,
    ))
    .map_err(CliError::new)?;
    let events: Box<dyn UploadEvents> = if config.events.json_lines {
        Box::new(JsonLinesEvents::new(std::io::stderr()))
    } else {
        Box::new(NoopEvents)
    };

    let controller = UploadController::new(
        config.upload,
        repository,
        ledger,
        signer,
        uploader,
        SystemClock,
        events,
    )
    .map_err(CliError::new)?;
    let summary = controller.run().map_err(CliError::new)?;
    write_json_line(&summary)?;
    Ok(ExitCode::SUCCESS)
}

/// Prints the committed cursor for the configured federation direction.
fn command_status(config_path: Option<&Path>) -> CliResult<ExitCode> {
    let config = load_config(config_path).map_err(CliError::new)?;
    let ledger = SqliteLedger::new(config.ledger.clone()).map_err(CliError::new)?;
    let cursor = ledger.load(&config.upload.state_table).map_err(CliError::new)?;
    let rendered = cursor.map(|cursor| {
        let submitted_at = rfc3339(cursor.submitted_at.unix_seconds());
        serde_json::json!({
            "cursor": cursor,
            "submittedAtRfc3339": submitted_at,
        })
    });
    write_json_line(&rendered)?;
    Ok(ExitCode::SUCCESS)
}

/// Prints a valid example configuration file.
fn command_config_example() -> CliResult<ExitCode> {
    write_stdout_line(config_toml_example().trim_end()).map_err(CliError::new)?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Collaborator Wiring
// ============================================================================

/// Builds the configured submission repository.
fn build_repository(config: &KeyfedConfig) -> CliResult<Box<dyn SubmissionRepository>> {
    match &config.store {
        StoreConfig::S3 {
            bucket,
            region,
            endpoint,
            force_path_style,
        } => {
            let store = S3SubmissionStore::new(S3SubmissionStoreConfig {
                bucket: bucket.clone(),
                region: region.clone(),
                endpoint: endpoint.clone(),
                force_path_style: *force_path_style,
            })
            .map_err(CliError::new)?;
            Ok(Box::new(store))
        }
        StoreConfig::Dir {
            root,
            bucket_label,
        } => Ok(Box::new(DirSubmissionStore::new(
            root.clone(),
            keyfed_core::BucketName::new(bucket_label.clone()),
        ))),
    }
}

/// Builds the configured secret source.
fn build_secrets(config: &KeyfedConfig) -> CliResult<Box<dyn SecretSource>> {
    match &config.secrets {
        SecretsConfig::Env {
            prefix,
        } => Ok(Box::new(EnvSecretSource::new(EnvSecretSourceConfig {
            prefix: prefix.clone(),
            overrides: None,
        }))),
        SecretsConfig::File {
            path,
        } => {
            let source = FileSecretSource::load(path).map_err(CliError::new)?;
            Ok(Box::new(source))
        }
    }
}

// ============================================================================
// SECTION: Output Helpers
// ============================================================================

/// Writes one line to stdout.
fn write_stdout_line(message: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
}

/// Writes a value to stdout as one pretty JSON document.
fn write_json_line<T: Serialize>(value: &T) -> CliResult<()> {
    let rendered = serde_json::to_string_pretty(value).map_err(CliError::new)?;
    write_stdout_line(&rendered).map_err(CliError::new)
}

/// Renders unix seconds as RFC 3339, or `None` when out of range.
fn rfc3339(unix_seconds: i64) -> Option<String> {
    time::OffsetDateTime::from_unix_timestamp(unix_seconds)
        .ok()
        .and_then(|instant| instant.format(&time::format_description::well_known::Rfc3339).ok())
}

/// Writes an error line to stderr and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let mut stderr = std::io::stderr();
    let _ = writeln!(&mut stderr, "keyfed: {message}");
    ExitCode::FAILURE
}

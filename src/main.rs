//! # Billing Quarantine CLI (`billq`)
//!
//! Runs the billing file validator against object storage or local files.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `billq handle --event <file>` | Process the object named by a created-event (JSON, `-` for stdin) |
//! | `billq process <container> <key>` | Process one stored object |
//! | `billq check <file>` | Validate a local CSV file without touching storage |
//!
//! ## Examples
//!
//! ```bash
//! # Invoke from an event dispatcher, reading the notification on stdin
//! BILLING_ERROR=billing-errors billq handle < event.json
//!
//! # Re-run validation on an object already in the bucket
//! billq --config ./config/billq.toml process billing uploads/jan-2023.csv
//!
//! # Check a file before uploading it
//! billq check ./jan-2023.csv
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use billing_quarantine::config::{self, Config};
use billing_quarantine::models::{Disposition, ObjectRef};
use billing_quarantine::quarantine::Controller;
use billing_quarantine::validate::{scan_content, RuleSet, Validator};

/// Billing quarantine — validates billing CSV uploads and moves failing
/// files to a quarantine bucket.
#[derive(Parser)]
#[command(
    name = "billq",
    about = "Validate billing CSV uploads and quarantine files with invalid records",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Optional. Without it the S3 backend and the default rule set are used,
    /// and the quarantine bucket is read from `BILLING_ERROR`.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process the object named by an object-created event.
    ///
    /// Prints the invocation result as JSON (`statusCode`, `body`) and exits
    /// non-zero unless the status is 200.
    Handle {
        /// Event JSON file, or `-` for stdin.
        #[arg(long, default_value = "-")]
        event: String,
    },

    /// Validate one stored object and quarantine it if a record is invalid.
    Process {
        /// Source container (bucket) name.
        container: String,
        /// Object key inside the container.
        key: String,
    },

    /// Validate a local CSV file. Nothing is copied or deleted.
    ///
    /// Exits non-zero if the file would be quarantined.
    Check {
        /// Path to the CSV file.
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "billing_quarantine=info,billq=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Handle { event } => run_handle(&cfg, &event).await,
        Commands::Process { container, key } => {
            run_process(&cfg, ObjectRef::new(container, key)).await
        }
        Commands::Check { path } => run_check(&cfg, &path),
    }
}

async fn run_handle(cfg: &Config, event: &str) -> Result<ExitCode> {
    let json = if event == "-" {
        std::io::read_to_string(std::io::stdin()).context("Failed to read event from stdin")?
    } else {
        std::fs::read_to_string(event)
            .with_context(|| format!("Failed to read event file: {}", event))?
    };

    let controller = Controller::from_config(cfg)?;
    let result = controller.handle_event_json(&json).await;
    println!("{}", serde_json::to_string_pretty(&result)?);

    Ok(if result.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

async fn run_process(cfg: &Config, source: ObjectRef) -> Result<ExitCode> {
    let controller = Controller::from_config(cfg)?;
    let disposition = controller
        .process(&source)
        .await
        .with_context(|| format!("Failed to process {}", source))?;

    match disposition {
        Disposition::Accepted { records } => {
            println!("accepted {} ({} records checked)", source, records);
        }
        Disposition::Quarantined {
            rejection,
            destination,
        } => {
            println!("quarantined {} -> {}", source, destination);
            println!("  reason: {}", rejection);
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn run_check(cfg: &Config, path: &Path) -> Result<ExitCode> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let validator = Validator::new(RuleSet::from(&cfg.rules));
    let report = scan_content(&content, &validator);

    match report.rejection {
        None => {
            println!("ok: {} records checked", report.records_checked);
            Ok(ExitCode::SUCCESS)
        }
        Some(rejection) => {
            println!("rejected: {}", rejection);
            Ok(ExitCode::FAILURE)
        }
    }
}

//! certflow - operator CLI for the certificate review workflow
//!
//! Commands:
//! - replay a scripted review session against the configured store
//! - show one application with its history
//! - list the queue waiting on an actor
//! - print the configured stage registry

use anyhow::Context;
use certflow_engine::{JsonCertificateRenderer, NextStage, ReviewHandler, StaticDirectory};
use certflow_storage::{InMemoryStore, QueryWindow, RestStore};
use certflow_types::{Actor, ActorId, Application, ApplicationId, HistoryEntry};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tabled::Tabled;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod error;
mod output;
mod replay;

use crate::config::{CertflowConfig, StorageConfig};
use crate::error::{CliError, CliResult};
use crate::output::OutputFormat;
use crate::replay::{Replayer, Script};

/// certflow CLI
#[derive(Parser)]
#[command(name = "certflow")]
#[command(about = "Certificate application review workflow", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "CERTFLOW_CONFIG")]
    config: Option<String>,

    /// Log level (overrides the configured level)
    #[arg(long, env = "CERTFLOW_LOG_LEVEL")]
    log_level: Option<String>,

    /// Enable JSON logging
    #[arg(long, env = "CERTFLOW_LOG_JSON")]
    json: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    output: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands
#[derive(Subcommand)]
enum Commands {
    /// Replay a scripted review session
    Replay {
        /// Path to the script (JSON)
        script: PathBuf,
    },

    /// Show an application and its history
    Show {
        /// Application id
        id: String,
    },

    /// List applications waiting on an actor
    Queue {
        /// Actor id from the identity directory
        #[arg(long)]
        actor: String,

        /// Maximum number of applications
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },

    /// Print the configured stage registry
    Stages,

    /// Show the effective configuration
    Config,
}

#[derive(Tabled)]
struct StageRow {
    #[tabled(rename = "#")]
    position: usize,
    #[tabled(rename = "Stage")]
    stage: String,
    #[tabled(rename = "Reviewer")]
    role: String,
    #[tabled(rename = "On approval")]
    next: String,
}

#[derive(Tabled)]
struct ApplicationRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Applicant")]
    applicant: String,
    #[tabled(rename = "Stage")]
    stage: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Version")]
    version: u64,
    #[tabled(rename = "Submitted")]
    submitted: String,
}

impl From<&Application> for ApplicationRow {
    fn from(app: &Application) -> Self {
        Self {
            id: app.id.to_string(),
            applicant: app.details.full_name.clone(),
            stage: app.current_stage().to_string(),
            status: app.status().to_string(),
            version: app.version,
            submitted: app.created_at.format("%Y-%m-%d %H:%M").to_string(),
        }
    }
}

#[derive(Tabled)]
struct HistoryRow {
    #[tabled(rename = "#")]
    sequence: u64,
    #[tabled(rename = "Stage")]
    stage: String,
    #[tabled(rename = "Action")]
    action: String,
    #[tabled(rename = "Actor")]
    actor: String,
    #[tabled(rename = "Remarks")]
    remarks: String,
    #[tabled(rename = "At")]
    at: String,
}

impl From<&HistoryEntry> for HistoryRow {
    fn from(entry: &HistoryEntry) -> Self {
        Self {
            sequence: entry.sequence,
            stage: entry.stage.to_string(),
            action: entry.action.to_string(),
            actor: format!("{} ({})", entry.actor, entry.actor_role),
            remarks: entry.remarks.clone().unwrap_or_default(),
            at: entry.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = CertflowConfig::load(cli.config.as_deref()).map_err(CliError::from)?;

    // Initialize tracing
    let level = cli
        .log_level
        .clone()
        .unwrap_or_else(|| config.logging.level.clone());
    init_tracing(&level, cli.json || config.logging.json);

    match cli.command {
        Commands::Replay { script } => {
            let script = Script::from_path(&script)
                .with_context(|| format!("loading script {}", script.display()))?;
            let handler = build_handler(&config, &script.actors)?;
            let mut replayer = Replayer::new(&handler);
            let result = replayer.run(&script).await;

            output::print_rows(replayer.reports(), replayer.reports().to_vec(), cli.output)?;
            match result {
                Ok(()) => {
                    output::print_success(&format!("{} steps replayed", replayer.reports().len()));
                    Ok(())
                }
                Err(err) => {
                    output::print_error(&err.to_string());
                    Err(err.into())
                }
            }
        }

        Commands::Show { id } => {
            let handler = build_handler(&config, &[])?;
            let application = handler
                .application(&ApplicationId::new(id))
                .await
                .map_err(CliError::from)?;
            match cli.output {
                OutputFormat::Json => output::print_single(&application)?,
                OutputFormat::Table => {
                    output::print_rows(
                        &[&application],
                        vec![ApplicationRow::from(&application)],
                        cli.output,
                    )?;
                    let rows: Vec<HistoryRow> =
                        application.history.iter().map(HistoryRow::from).collect();
                    output::print_rows(&application.history, rows, cli.output)?;
                    if let Some(recheck) = application.outstanding_recheck() {
                        output::print_info(&format!(
                            "Recheck outstanding: {} asked {} to re-verify: {}",
                            recheck.raised_by, recheck.target, recheck.description
                        ));
                    }
                }
            }
            Ok(())
        }

        Commands::Queue { actor, limit } => {
            let handler = build_handler(&config, &[])?;
            let queue = handler
                .queue_for(&ActorId::new(actor), QueryWindow::first(limit))
                .await
                .map_err(CliError::from)?;
            let rows: Vec<ApplicationRow> = queue.iter().map(ApplicationRow::from).collect();
            output::print_rows(&queue, rows, cli.output)?;
            Ok(())
        }

        Commands::Stages => {
            let registry = config.workflow.registry().map_err(CliError::from)?;
            let mut rows = Vec::with_capacity(registry.stages().len());
            for (position, stage) in registry.stages().iter().enumerate() {
                let next = match registry.next_stage(*stage).map_err(CliError::from)? {
                    NextStage::Stage(next) => next.to_string(),
                    NextStage::Completed => "COMPLETED".to_string(),
                };
                rows.push(StageRow {
                    position: position + 1,
                    stage: stage.to_string(),
                    role: stage.role().to_string(),
                    next,
                });
            }
            output::print_rows(registry.stages(), rows, cli.output)?;
            Ok(())
        }

        Commands::Config => {
            output::print_single(&config)?;
            Ok(())
        }
    }
}

fn init_tracing(level: &str, json: bool) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| level.to_string().into());

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

/// Build a review handler over the configured store. `extra_actors` extend
/// the configured identity directory.
fn build_handler(config: &CertflowConfig, extra_actors: &[Actor]) -> CliResult<ReviewHandler> {
    let directory: StaticDirectory = config
        .actors
        .iter()
        .chain(extra_actors)
        .cloned()
        .collect();
    let identity = Arc::new(directory);
    let renderer = Arc::new(JsonCertificateRenderer);

    let handler = match &config.storage {
        StorageConfig::Memory => ReviewHandler::new(
            &config.workflow,
            Arc::new(InMemoryStore::new()),
            identity,
            renderer,
        )?,
        StorageConfig::Rest {
            base_url,
            timeout_secs,
        } => {
            let store = RestStore::new(base_url, Duration::from_secs(*timeout_secs))
                .map_err(|e| CliError::Config(format!("REST storage: {}", e)))?;
            ReviewHandler::new(&config.workflow, Arc::new(store), identity, renderer)?
        }
    };
    Ok(handler)
}

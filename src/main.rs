//! Binary entry point for custodian.
//!
//! This binary provides the CLI interface for the evidence custody and
//! memory-capture engine.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// Allow print_stderr in main binary for CLI output
#![allow(clippy::print_stderr)]
#![allow(clippy::print_stdout)]
// Allow needless_pass_by_value for command functions
#![allow(clippy::needless_pass_by_value)]

use anyhow::Context;
use clap::{Parser, Subcommand};
use custodian::config::CustodianConfig;
use custodian::models::{CustodyAction, EvidenceKind, EvidenceState};
use custodian::services::ServiceContainer;
use custodian::{cli, observability};
use std::path::PathBuf;
use std::process::ExitCode;

/// Custodian - evidence custody ledger and memory-capture engine.
#[derive(Parser)]
#[command(name = "custodian")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to configuration file.
    #[arg(short, long, global = true, env = "CUSTODIAN_CONFIG_PATH")]
    config: Option<String>,

    /// Handler identity recorded in custody events.
    #[arg(long, global = true, env = "CUSTODIAN_HANDLER", default_value = "system")]
    handler: String,

    /// Location recorded in custody events.
    #[arg(long, global = true, env = "CUSTODIAN_LOCATION", default_value = "localhost")]
    location: String,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Register a file's content as evidence.
    Ingest {
        /// Path of the content to register.
        path: PathBuf,

        /// Evidence kind: file, email, or memory_dump.
        #[arg(short, long, default_value = "file")]
        kind: String,

        /// Collection notes for the custody record.
        #[arg(short, long)]
        notes: Option<String>,

        /// Reject content already registered under a live item.
        #[arg(long)]
        dedup: bool,
    },

    /// List evidence items (paginated).
    List {
        /// 1-indexed page.
        #[arg(short, long, default_value = "1")]
        page: usize,

        /// Items per page (defaults to the configured page size).
        #[arg(long)]
        page_size: Option<usize>,

        /// Filter by kind.
        #[arg(short, long)]
        kind: Option<String>,

        /// Filter by lifecycle state.
        #[arg(short, long)]
        state: Option<String>,

        /// Only items flagged as forged/suspicious.
        #[arg(long)]
        flagged: bool,

        /// Sort oldest first instead of newest first.
        #[arg(long)]
        oldest_first: bool,

        /// Sort by content size instead of timestamp.
        #[arg(long)]
        by_size: bool,

        /// Emit JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show the chain of custody for an evidence id.
    History {
        /// Evidence id.
        id: String,

        /// Filter to one action (COLLECT, ANALYZE, VIEW, MODIFY, DELETE, CAPTURE).
        #[arg(short, long)]
        action: Option<String>,

        /// 1-indexed page.
        #[arg(short, long, default_value = "1")]
        page: usize,

        /// Events per page.
        #[arg(long, default_value = "50")]
        page_size: usize,

        /// Emit JSON.
        #[arg(long)]
        json: bool,
    },

    /// Begin analysis of an evidence item.
    Analyze {
        /// Evidence id.
        id: String,
    },

    /// Complete analysis, storing the engine's result.
    Complete {
        /// Evidence id.
        id: String,

        /// Analysis result as a JSON document.
        #[arg(short, long, default_value = "{}")]
        result: String,

        /// Mark the item as forged/suspicious.
        #[arg(long)]
        flagged: bool,
    },

    /// Delete (tombstone) evidence items; each id is processed independently.
    Delete {
        /// Evidence ids.
        ids: Vec<String>,
    },

    /// Record a VIEW custody event.
    View {
        /// Evidence id.
        id: String,

        /// Inspection notes.
        #[arg(short, long)]
        notes: Option<String>,
    },

    /// Attach an investigator annotation (MODIFY custody event).
    Annotate {
        /// Evidence id.
        id: String,

        /// Annotation text.
        notes: String,
    },

    /// Capture a process's memory immediately.
    Capture {
        /// Target process id.
        pid: u32,

        /// Capture notes for the custody record.
        #[arg(short, long)]
        notes: Option<String>,
    },

    /// Sample a process's memory over a bounded window.
    Watch {
        /// Target process id.
        pid: u32,

        /// Sampling window in seconds (5-300).
        #[arg(short, long, default_value = "60")]
        duration: u64,

        /// Seconds between samples.
        #[arg(short, long, default_value = "5")]
        interval: u64,
    },

    /// List capture jobs in this session.
    Jobs {
        /// Emit JSON.
        #[arg(long)]
        json: bool,
    },

    /// Cancel a running timed analysis.
    Cancel {
        /// Job id.
        job_id: String,
    },

    /// List running processes visible to the probe.
    Processes {
        /// Maximum rows to print.
        #[arg(short, long, default_value = "25")]
        limit: usize,
    },

    /// Dump artifact operations.
    Dumps {
        #[command(subcommand)]
        action: DumpAction,
    },

    /// Show system status.
    Status,

    /// Manage configuration.
    Config {
        /// Show current configuration.
        #[arg(long)]
        show: bool,
    },
}

/// Dump artifact subcommands.
#[derive(Subcommand)]
enum DumpAction {
    /// List artifact records.
    List {
        /// Emit JSON.
        #[arg(long)]
        json: bool,
    },

    /// Retrieve an artifact payload.
    Get {
        /// Artifact id.
        artifact_id: String,

        /// Output file (stdout when omitted).
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Delete every artifact record and payload.
    Purge {
        /// Skip confirmation.
        #[arg(short, long)]
        force: bool,
    },
}

/// Main entry point.
#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        },
    };

    if let Err(e) = observability::init(&config.logging) {
        eprintln!("Failed to initialize observability: {e}");
        return ExitCode::FAILURE;
    }

    match run_command(cli, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        },
    }
}

/// Loads configuration.
fn load_config(path: Option<&str>) -> anyhow::Result<CustodianConfig> {
    match path {
        Some(config_path) => CustodianConfig::load_from_file(std::path::Path::new(config_path))
            .with_context(|| format!("loading config from {config_path}")),
        None => Ok(CustodianConfig::load_default()),
    }
}

/// Runs the selected command.
async fn run_command(cli: Cli, config: CustodianConfig) -> anyhow::Result<()> {
    let container = ServiceContainer::from_config(&config).context("initializing services")?;
    let handler = cli.handler;
    let location = cli.location;

    match cli.command {
        Commands::Ingest {
            path,
            kind,
            notes,
            dedup,
        } => {
            let kind = parse_kind(&kind)?;
            let dedup = dedup || config.features.dedup_on_ingest;
            cli::cmd_ingest(&container, &path, kind, &handler, &location, notes, dedup)?;
        },

        Commands::List {
            page,
            page_size,
            kind,
            state,
            flagged,
            oldest_first,
            by_size,
            json,
        } => {
            let kind = kind.as_deref().map(parse_kind).transpose()?;
            let state = state.as_deref().map(parse_state).transpose()?;
            cli::cmd_list(
                &container,
                page,
                page_size.unwrap_or(config.page_size),
                kind,
                state,
                flagged.then_some(true),
                oldest_first,
                by_size,
                json,
            )?;
        },

        Commands::History {
            id,
            action,
            page,
            page_size,
            json,
        } => {
            let action = action.as_deref().map(parse_action).transpose()?;
            cli::cmd_history(&container, &id, action, page, page_size, json)?;
        },

        Commands::Analyze { id } => cli::cmd_analyze(&container, &id, &handler, &location)?,

        Commands::Complete {
            id,
            result,
            flagged,
        } => cli::cmd_complete(&container, &id, &result, flagged, &handler, &location)?,

        Commands::Delete { ids } => {
            let ids = cli::parse_evidence_ids(&ids);
            cli::cmd_delete(&container, &ids, &handler, &location)?;
        },

        Commands::View { id, notes } => {
            cli::cmd_view(&container, &id, &handler, &location, notes)?;
        },

        Commands::Annotate { id, notes } => {
            cli::cmd_annotate(&container, &id, &handler, &location, &notes)?;
        },

        Commands::Capture { pid, notes } => {
            cli::cmd_capture(&container, pid, &handler, &location, notes).await?;
        },

        Commands::Watch {
            pid,
            duration,
            interval,
        } => cli::cmd_watch(&container, pid, duration, interval, &handler, &location).await?,

        Commands::Jobs { json } => cli::cmd_jobs(&container, json)?,

        Commands::Cancel { job_id } => cli::cmd_cancel(&container, &job_id)?,

        Commands::Processes { limit } => cli::cmd_processes(&container, limit)?,

        Commands::Dumps { action } => match action {
            DumpAction::List { json } => cli::cmd_dumps(&container, json)?,
            DumpAction::Get {
                artifact_id,
                output,
            } => cli::cmd_dump_get(&container, &artifact_id, output.as_deref())?,
            DumpAction::Purge { force } => cli::cmd_purge(&container, &handler, force)?,
        },

        Commands::Status => cli::cmd_status(&container, &config)?,

        Commands::Config { show } => cli::cmd_config(&config, show)?,
    }

    Ok(())
}

/// Parses an evidence kind argument.
fn parse_kind(s: &str) -> anyhow::Result<EvidenceKind> {
    EvidenceKind::parse(s).ok_or_else(|| anyhow::anyhow!("unknown evidence kind: {s}"))
}

/// Parses an evidence state argument.
fn parse_state(s: &str) -> anyhow::Result<EvidenceState> {
    EvidenceState::parse(s).ok_or_else(|| anyhow::anyhow!("unknown evidence state: {s}"))
}

/// Parses a custody action argument.
fn parse_action(s: &str) -> anyhow::Result<CustodyAction> {
    CustodyAction::parse(s).ok_or_else(|| anyhow::anyhow!("unknown custody action: {s}"))
}

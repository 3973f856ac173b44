//! Tapezone CLI
//!
//! The `tapezone` command inspects and edits the session tape of a workspace.
//!
//! ## Commands
//!
//! - `tape`: info, anchors, search, handoff, reset
//! - `memory`: show, save, daily, recall, clear, prune, context

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use tape_state::entry::Object;
use tape_state::TapeStore;
use tapezone_core::{RecallQuery, ResetOutcome, SessionSpan, TapeConfig, TapeService};
use tracing::{debug, Level};

#[derive(Parser)]
#[command(name = "tapezone")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Append-only session tape with versioned memory", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Workspace whose tape to open (default: current directory)
    #[arg(short, long, global = true, env = "TAPEZONE_WORKSPACE")]
    workspace: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect or modify the session tape
    Tape {
        #[command(subcommand)]
        action: TapeAction,
    },

    /// Read or update the memory zone
    Memory {
        #[command(subcommand)]
        action: MemoryAction,
    },
}

#[derive(Subcommand)]
enum TapeAction {
    /// Show entry and anchor counts
    Info,

    /// List recent anchors
    Anchors {
        /// Maximum number of anchors to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Search entries by substring (case-insensitive)
    Search {
        query: String,

        /// Maximum number of matches
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Create a handoff anchor
    Handoff {
        /// Anchor name
        #[arg(default_value = "handoff")]
        name: String,

        /// Summary of the work so far
        #[arg(short, long)]
        summary: Option<String>,

        /// Next step (repeatable)
        #[arg(short, long = "next-step")]
        next_steps: Vec<String>,
    },

    /// Archive the tape and start a fresh one
    Reset,
}

#[derive(Subcommand)]
enum MemoryAction {
    /// Show memory status
    Show,

    /// Replace long-term memory
    Save { content: String },

    /// Set the daily note for a date
    Daily {
        content: String,

        /// Date in YYYY-MM-DD (default: today)
        #[arg(short, long)]
        date: Option<String>,
    },

    /// Search long-term memory and recent notes
    Recall {
        /// Case-insensitive line filter
        query: Option<String>,

        /// How many days of notes to include
        #[arg(short, long, default_value = "7")]
        days: u32,
    },

    /// Write an empty memory version
    Clear,

    /// Drop daily notes older than the retention window
    Prune {
        /// Retention in days (default: TAPEZONE_RETENTION_DAYS or 30)
        #[arg(long)]
        retention_days: Option<u32>,
    },

    /// Print the memory block injected into prompts
    Context,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    tapezone_core::init_tracing(cli.json, level);

    let workspace = match cli.workspace {
        Some(path) => path,
        None => std::env::current_dir().context("Failed to resolve current directory")?,
    };
    let config = TapeConfig::from_env(&workspace);
    let svc = TapeService::open(&config)
        .with_context(|| format!("Failed to open tape for {}", workspace.display()))?;
    let _span = SessionSpan::enter(svc.store().name());
    debug!(tape = %svc.store().path().display(), "session tape");

    svc.start_session()
        .await
        .context("Failed to initialise session tape")?;

    match cli.command {
        Commands::Tape { action } => match action {
            TapeAction::Info => cmd_tape_info(&svc).await,
            TapeAction::Anchors { limit } => cmd_tape_anchors(&svc, limit).await,
            TapeAction::Search { query, limit } => cmd_tape_search(&svc, &query, limit).await,
            TapeAction::Handoff {
                name,
                summary,
                next_steps,
            } => cmd_tape_handoff(&svc, &name, summary.as_deref(), &next_steps).await,
            TapeAction::Reset => cmd_tape_reset(&svc).await,
        },
        Commands::Memory { action } => match action {
            MemoryAction::Show => cmd_memory_show(&svc).await,
            MemoryAction::Save { content } => cmd_memory_save(&svc, &content).await,
            MemoryAction::Daily { content, date } => {
                cmd_memory_daily(&svc, &content, date.as_deref()).await
            }
            MemoryAction::Recall { query, days } => cmd_memory_recall(&svc, query, days).await,
            MemoryAction::Clear => cmd_memory_clear(&svc).await,
            MemoryAction::Prune { retention_days } => {
                cmd_memory_prune(&svc, retention_days.unwrap_or(config.retention_days)).await
            }
            MemoryAction::Context => cmd_memory_context(&svc).await,
        },
    }
}

/// Show tape summary
async fn cmd_tape_info<S: TapeStore + ?Sized>(svc: &TapeService<S>) -> Result<()> {
    let info = svc.info().await?;
    println!("name: {}", info.name);
    println!("entries: {}", info.entries);
    println!("anchors: {}", info.anchors);
    println!("last_anchor: {}", info.last_anchor.as_deref().unwrap_or("-"));
    Ok(())
}

/// List recent anchors
async fn cmd_tape_anchors<S: TapeStore + ?Sized>(svc: &TapeService<S>, limit: usize) -> Result<()> {
    let anchors = svc.anchors(limit).await?;
    if anchors.is_empty() {
        println!("No anchors found.");
        return Ok(());
    }
    for anchor in anchors {
        if anchor.state.is_empty() {
            println!("#{} {}", anchor.id, anchor.name);
        } else {
            println!("#{} {} {}", anchor.id, anchor.name, Value::Object(anchor.state));
        }
    }
    Ok(())
}

/// Search entries
async fn cmd_tape_search<S: TapeStore + ?Sized>(
    svc: &TapeService<S>,
    query: &str,
    limit: usize,
) -> Result<()> {
    let matches = svc.search(query, limit).await?;
    if matches.is_empty() {
        println!("No entries match '{}'", query);
        return Ok(());
    }
    for entry in matches {
        println!("{}", serde_json::to_string(&entry)?);
    }
    Ok(())
}

/// Create a handoff anchor
async fn cmd_tape_handoff<S: TapeStore + ?Sized>(
    svc: &TapeService<S>,
    name: &str,
    summary: Option<&str>,
    next_steps: &[String],
) -> Result<()> {
    let id = svc.handoff(name, handoff_state(summary, next_steps)).await?;
    println!("Created anchor '{}' (#{})", name, id);
    Ok(())
}

fn handoff_state(summary: Option<&str>, next_steps: &[String]) -> Object {
    let mut state = Object::new();
    if let Some(summary) = summary.filter(|s| !s.trim().is_empty()) {
        state.insert("summary".into(), json!(summary));
    }
    if !next_steps.is_empty() {
        state.insert("next_steps".into(), json!(next_steps));
    }
    state
}

/// Archive and restart the tape
async fn cmd_tape_reset<S: TapeStore + ?Sized>(svc: &TapeService<S>) -> Result<()> {
    match svc.reset().await.context("Failed to reset tape")? {
        ResetOutcome::Archived(path) => println!("Archived tape to {}", path.display()),
        ResetOutcome::Empty => println!("Tape was empty; started fresh"),
    }
    Ok(())
}

/// Show memory status
async fn cmd_memory_show<S: TapeStore + ?Sized>(svc: &TapeService<S>) -> Result<()> {
    let summary = svc.memory().summary().await?;
    println!("{}", summary);
    Ok(())
}

/// Replace long-term memory
async fn cmd_memory_save<S: TapeStore + ?Sized>(svc: &TapeService<S>, content: &str) -> Result<()> {
    let version = svc.memory().save_long_term(content).await?;
    println!("Long-term memory saved (version {})", version);
    Ok(())
}

/// Set a daily note
async fn cmd_memory_daily<S: TapeStore + ?Sized>(
    svc: &TapeService<S>,
    content: &str,
    date: Option<&str>,
) -> Result<()> {
    let version = svc.memory().append_daily(content, date).await?;
    println!("Daily note saved (version {})", version);
    Ok(())
}

/// Search memory
async fn cmd_memory_recall<S: TapeStore + ?Sized>(
    svc: &TapeService<S>,
    query: Option<String>,
    days: u32,
) -> Result<()> {
    let text = svc.memory().recall(&RecallQuery { query, days }).await?;
    println!("{}", text);
    Ok(())
}

/// Clear memory
async fn cmd_memory_clear<S: TapeStore + ?Sized>(svc: &TapeService<S>) -> Result<()> {
    let version = svc.memory().clear().await?;
    println!("Memory cleared (version {})", version);
    Ok(())
}

/// Prune old daily notes
async fn cmd_memory_prune<S: TapeStore + ?Sized>(
    svc: &TapeService<S>,
    retention_days: u32,
) -> Result<()> {
    let removed = svc.memory().prune(retention_days).await?;
    if removed == 0 {
        println!("Nothing to prune (retention {} days)", retention_days);
    } else {
        println!("Pruned {} daily note(s)", removed);
    }
    Ok(())
}

/// Print the prompt memory block
async fn cmd_memory_context<S: TapeStore + ?Sized>(svc: &TapeService<S>) -> Result<()> {
    match svc.memory_prompt_block().await? {
        Some(block) => println!("{}", block),
        None => println!("(memory is empty)"),
    }
    Ok(())
}

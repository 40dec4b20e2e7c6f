//! # newsroll CLI
//!
//! ## Usage
//!
//! ```bash
//! newsroll --config ./config/newsroll.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `newsroll init` | Create the SQLite database and schema |
//! | `newsroll ingest <file\|->` | Ingest JSON payload(s) |
//! | `newsroll get <id>` | Show one item |
//! | `newsroll list` | Page through items, newest first |
//! | `newsroll summarize <id>` | Summarize one item and store the result |
//! | `newsroll case create\|promote\|summarize\|list` | Case workflow |
//! | `newsroll report` | Plain-text report over promoted cases |
//! | `newsroll serve` | Start the HTTP API |
//!
//! Logs go to stderr; set `RUST_LOG` to change verbosity.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use newsroll::app::App;
use newsroll::{case_cmd, config, ingest, items, migrate, server};

/// newsroll: ingest, deduplicate, and summarize monitored channel items.
#[derive(Parser)]
#[command(name = "newsroll", version, about)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/newsroll.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Idempotent.
    Init,

    /// Ingest a JSON payload (object or array of objects).
    Ingest {
        /// Payload file, or `-` for stdin.
        source: String,
    },

    /// Show an item by id.
    Get { id: String },

    /// List items, newest first, 20 per page.
    List {
        #[arg(long, default_value_t = 1)]
        page: i64,
    },

    /// Summarize one item and store the summary on it.
    Summarize {
        id: String,
        /// Soft length limit (default 100 characters).
        #[arg(long)]
        max_chars: Option<usize>,
    },

    /// Case workflow.
    Case {
        #[command(subcommand)]
        action: CaseAction,
    },

    /// Print the report over promoted cases.
    Report {
        /// Only cases created on or after this date (YYYY-MM-DD).
        #[arg(long)]
        from: Option<String>,

        /// Only cases created on or before this date (YYYY-MM-DD).
        #[arg(long)]
        to: Option<String>,

        /// Restrict to these case ids (default: every promoted case).
        case_ids: Vec<String>,

        /// Emit an HTML document instead of plain text.
        #[arg(long)]
        html: bool,
    },

    /// Start the HTTP API on `[server] bind`.
    Serve,
}

#[derive(Subcommand)]
enum CaseAction {
    /// Create an open case and print its id.
    Create {
        name: String,
        #[arg(long)]
        owner: Option<String>,
    },

    /// Replace the case's items and mark it promoted.
    Promote {
        case_id: String,
        /// Item ids, in report order.
        item_ids: Vec<String>,
    },

    /// Summarize the case's items and store the result.
    Summarize {
        case_id: String,
        /// Soft length limit passed to the summarizer.
        #[arg(long)]
        max_chars: Option<usize>,
    },

    /// List cases visible to `--user` (all cases when omitted).
    List {
        #[arg(long)]
        user: Option<String>,
        /// `open` or `promoted`.
        #[arg(long)]
        status: Option<String>,
    },
}

fn init_tracing() -> anyhow::Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(f) => f,
        Err(_) => EnvFilter::new("")
            .add_directive("newsroll=info".parse()?)
            .add_directive("newsroll_core=info".parse()?),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing()?;
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    if let Commands::Init = cli.command {
        migrate::run_migrations(&cfg).await?;
        println!("Database initialized successfully.");
        return Ok(());
    }
    if let Commands::Serve = cli.command {
        return server::run_server(&cfg).await;
    }

    let app = App::open(&cfg).await?;

    match cli.command {
        Commands::Ingest { source } => {
            ingest::run_ingest(&app, &source).await?;
        }
        Commands::Get { id } => {
            items::run_get(&app, &id).await?;
        }
        Commands::List { page } => {
            items::run_list(&app, page).await?;
        }
        Commands::Summarize { id, max_chars } => {
            items::run_summarize(&app, &id, max_chars).await?;
        }
        Commands::Case { action } => match action {
            CaseAction::Create { name, owner } => {
                case_cmd::run_create(&app, &name, owner.as_deref()).await?;
            }
            CaseAction::Promote { case_id, item_ids } => {
                case_cmd::run_promote(&app, &case_id, &item_ids).await?;
            }
            CaseAction::Summarize { case_id, max_chars } => {
                case_cmd::run_summarize(&app, &case_id, max_chars).await?;
            }
            CaseAction::List { user, status } => {
                let status = status.as_deref().map(case_cmd::parse_status).transpose()?;
                case_cmd::run_list(&app, &case_cmd::role_for(user), status).await?;
            }
        },
        Commands::Report {
            from,
            to,
            case_ids,
            html,
        } => {
            let from = from.as_deref().map(case_cmd::parse_date).transpose()?;
            let to = to.as_deref().map(case_cmd::parse_date).transpose()?;
            case_cmd::run_report(&app, &case_ids, from, to, html).await?;
        }
        Commands::Init | Commands::Serve => {}
    }

    Ok(())
}

//! quire: command-line access to notes, bookmarks and tasks with
//! case-insensitive, owner-scoped tags.
//!
//! Every command runs as the owner in `QUIRE_OWNER_ID` against the
//! PostgreSQL database in `DATABASE_URL`. Results are printed as JSON.

mod commands;
mod logging;

use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{error, info};

use commands::{Action, BookmarkCommand, NoteCommand, TaskCommand};
use quire_core::{QuireConfig, StaticSession};
use quire_db::{log_pool_metrics, Database, PoolConfig};

#[derive(Parser)]
#[command(name = "quire")]
#[command(author, version, about = "Notes, bookmarks and tasks with shared tags")]
#[command(propagate_version = true)]
struct Cli {
    /// PostgreSQL connection string
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    database_url: String,

    /// Owner UUID to act as
    #[arg(long, env = "QUIRE_OWNER_ID")]
    owner: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending database migrations
    Migrate,

    /// List the owner's tags with usage counts
    Tags,

    /// Manage notes
    #[command(subcommand)]
    Note(NoteCommand),

    /// Manage bookmarks
    #[command(subcommand)]
    Bookmark(BookmarkCommand),

    /// Manage tasks
    #[command(subcommand)]
    Task(TaskCommand),
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let _log_guard = logging::init(&logging::LogSettings::from_env());

    match run(cli).await {
        Ok(output) => {
            if !output.is_empty() {
                println!("{}", output);
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(subsystem = "cli", error = %e, "Command failed");
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<String> {
    let db = Database::connect_with_config(&cli.database_url, PoolConfig::from_env()?).await?;

    if matches!(cli.command, Commands::Migrate) {
        db.migrate().await?;
        info!(subsystem = "cli", op = "migrate", "Database is up to date");
        return Ok(String::new());
    }

    let session = StaticSession::from_env_value(cli.owner.as_deref())?;
    let quire = db.quire(Arc::new(session), &QuireConfig::from_env()?)?;

    let result = match cli.command {
        Commands::Migrate => Ok(String::new()),
        Commands::Tags => quire
            .list_tags()
            .await
            .map_err(anyhow::Error::from)
            .and_then(|tags| Ok(serde_json::to_string_pretty(&tags)?)),
        Commands::Note(cmd) => commands::run(quire.notes()?, Action::from(cmd)).await,
        Commands::Bookmark(cmd) => commands::run(quire.bookmarks()?, Action::from(cmd)).await,
        Commands::Task(cmd) => commands::run(quire.tasks()?, Action::from(cmd)).await,
    };
    log_pool_metrics(db.pool());
    result
}

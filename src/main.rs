mod app;
mod commands;
mod config;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "famcal")]
#[command(about = "Sync iCal feeds and Notion databases into your local family calendar")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add an iCal feed subscription
    Add {
        /// Calendar name
        name: String,

        /// Public iCal/ICS URL
        url: String,

        /// Display color (hex), e.g. "#3b82f6"
        #[arg(long)]
        color: Option<String>,
    },
    /// Add a Notion database as a calendar
    AddNotion {
        /// Calendar name
        name: String,

        /// Notion integration token
        #[arg(long)]
        token: String,

        /// Notion database id
        #[arg(long)]
        database_id: String,

        /// Check the token against the Notion API before saving
        #[arg(long)]
        verify: bool,
    },
    /// Remove a calendar and all of its stored events
    Remove {
        /// Calendar name or id
        calendar: String,
    },
    /// List configured calendars
    List,
    /// Sync one calendar, or everything with --all
    Sync {
        /// Calendar name or id
        calendar: Option<String>,

        /// Sync every enabled calendar
        #[arg(long)]
        all: bool,
    },
    /// Show sync state and pending background results
    Status,
    /// Run the background sync daemon until interrupted
    Daemon {
        /// Periodic sync interval in hours (minimum 1)
        #[arg(long, default_value_t = 1)]
        interval_hours: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .init();

    let cli = Cli::parse();
    let config = config::load_config()?;
    let app = app::App::build(&config)?;

    match cli.command {
        Commands::Add { name, url, color } => commands::add::run(&app, &name, &url, color).await,
        Commands::AddNotion {
            name,
            token,
            database_id,
            verify,
        } => commands::add::run_notion(&app, &name, &token, &database_id, verify).await,
        Commands::Remove { calendar } => commands::remove::run(&app, &calendar).await,
        Commands::List => commands::list::run(&app),
        Commands::Sync { calendar, all } => commands::sync::run(&app, calendar, all).await,
        Commands::Status => commands::status::run(&app).await,
        Commands::Daemon { interval_hours } => commands::daemon::run(app, interval_hours).await,
    }
}

use clap::{Parser, Subcommand};
use correspondent::db;
use correspondent::delivery::ConsoleDelivery;
use correspondent::fetcher::FeedFetcher;
use correspondent::orchestrator::ReportOrchestrator;
use correspondent::roster::{Roster, SqliteRoster};
use correspondent::seen::SqliteSeenStore;
use correspondent::types::{ComposeConfig, FetchConfig, NewUser, RunConfig};
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[derive(Parser)]
#[command(name = "correspondent")]
#[command(about = "Personalized digest reports from monitored sites")]
struct Cli {
    /// SQLite database path
    #[arg(long, default_value = "correspondent.db")]
    database: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Add a user to the roster
    AddUser {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        /// Comma-separated interest keywords
        #[arg(long)]
        interests: String,
        /// Comma-separated site URLs to monitor
        #[arg(long)]
        sites: String,
    },
    /// Print the current roster as JSON
    ListUsers,
    /// Run the report pipeline once and print the run summary
    RunReport,
    /// Run the report pipeline on a fixed interval
    Schedule {
        #[arg(long, default_value_t = 60)]
        every_minutes: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let pool = db::connect(&cli.database).await?;

    match cli.command {
        Command::AddUser {
            name,
            email,
            interests,
            sites,
        } => {
            let roster = SqliteRoster::new(pool);
            let user = roster
                .add_user(NewUser {
                    name,
                    email,
                    interests,
                    sites,
                })
                .await?;
            println!("{}", serde_json::to_string_pretty(&user)?);
        }
        Command::ListUsers => {
            let roster = SqliteRoster::new(pool);
            let users = roster.list_users().await?;
            println!("{}", serde_json::to_string_pretty(&users)?);
        }
        Command::RunReport => {
            let orchestrator = build_orchestrator(pool)?;
            let summary = orchestrator.run_report().await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Command::Schedule { every_minutes } => {
            let orchestrator = build_orchestrator(pool)?;
            info!("scheduling report runs every {} minutes", every_minutes);
            orchestrator
                .run_scheduled(Duration::from_secs(every_minutes * 60))
                .await;
        }
    }

    Ok(())
}

fn build_orchestrator(pool: SqlitePool) -> anyhow::Result<ReportOrchestrator> {
    let fetcher = FeedFetcher::new(FetchConfig::default())?;
    Ok(ReportOrchestrator::new(
        Arc::new(SqliteRoster::new(pool.clone())),
        Arc::new(fetcher),
        Arc::new(SqliteSeenStore::new(pool)),
        Arc::new(ConsoleDelivery),
        RunConfig::default(),
        ComposeConfig::default(),
    ))
}

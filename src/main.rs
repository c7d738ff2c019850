//! Athwatch Backend Service
//!
//! CLI entry point for the ATH detection & notification pipeline. The
//! pipeline is a pure request/response operation: an external scheduler
//! (cron, cloud scheduler) or an operator invokes a subcommand and gets
//! a run summary back; nothing here schedules itself.

use athwatch::config::AppConfig;
use athwatch::database::{create_pool, run_migrations};
use athwatch::error::{AppError, AppResult};
use athwatch::AppState;
use clap::{Parser, Subcommand};
use tracing::{error, info};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "athwatch", about = "ATH detection & notification pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Execute one pipeline run and print the summary
    Run {
        /// Bypass the single-flight lock (diagnostics only)
        #[arg(long)]
        force: bool,
    },
    /// Send a test notification to one user (requires an active subscription)
    TestSend {
        #[arg(long)]
        user: Uuid,
    },
    /// Re-derive every user's notification flag from entitlement
    Reconcile,
    /// Print the last recorded run summary
    Status,
}

#[tokio::main]
async fn main() -> AppResult<()> {
    dotenv::dotenv().ok();

    let config = AppConfig::from_env().map_err(|e| {
        eprintln!("Configuration error: {}", e);
        AppError::Config(e)
    })?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("athwatch={},sqlx=warn", config.log_level).into()
            }),
        )
        .init();

    let cli = Cli::parse();

    info!("Connecting to database...");
    let pool = create_pool(&config.database).await.map_err(|e| {
        error!("Failed to create database pool: {}", e);
        AppError::Database(e)
    })?;

    run_migrations(&pool, None).await.map_err(|e| {
        error!("Database migration failed: {}", e);
        AppError::Database(e)
    })?;

    let state = AppState::new(pool, config);

    match cli.command {
        Command::Run { force } => match state.pipeline().run(force).await {
            Ok(summary) => {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            }
            Err(e) if e.is_skip() => {
                // A concurrent run holds the lock; normal outcome.
                println!("{{\"skipped\": \"{}\"}}", e.reason_code());
            }
            Err(e) => {
                error!("Pipeline run failed: {} (reason: {})", e, e.reason_code());
                return Err(e);
            }
        },
        Command::TestSend { user } => {
            let provider_id = state.dispatcher().send_test(user).await?;
            println!("Test notification accepted: {}", provider_id);
        }
        Command::Reconcile => {
            let report = state.resolver().reconcile_preferences().await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Status => match state.control.last_run().await? {
            Some(summary) => println!("{}", serde_json::to_string_pretty(&summary)?),
            None => println!("No completed runs recorded"),
        },
    }

    Ok(())
}

//! Mailshot - Campaign server entry point

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use mailshot_api::AppState;
use mailshot_common::config::{Config, LoggingConfig};
use mailshot_core::{
    DispatchOutcome, DispatchSettings, DispatchWorker, Dispatcher, ManualTrigger, SmtpMailer,
};
use mailshot_storage::{AccessScope, DatabasePool};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "mailshot", version, about = "Scheduled bulk-email campaigns")]
struct Cli {
    /// Config file (default: ./config.toml, then /etc/mailshot/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the API server and the recurring dispatch worker (default)
    Serve,
    /// Run one dispatch pass over the due campaigns and exit
    Dispatch,
    /// Send one campaign now, ignoring its window
    Send {
        /// Campaign ID
        campaign_id: Uuid,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => Config::load()?,
    };

    init_logging(&config.logging);

    let db_pool = DatabasePool::new(&config.database).await?;
    db_pool.migrate().await?;

    let mailer = SmtpMailer::new(&config.smtp)?;
    if let Err(e) = mailer.check_connection().await {
        warn!(error = %e, "SMTP relay check failed; deliveries will fail until it is reachable");
    }
    let mailer = Arc::new(mailer);
    let dispatcher = Arc::new(Dispatcher::from_pool(
        db_pool.clone(),
        mailer,
        DispatchSettings::from(&config.dispatch),
    ));

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config, db_pool, dispatcher).await,
        Command::Dispatch => {
            let summary = dispatcher.run_pass().await?;
            info!(
                "Dispatch pass complete: {} due, {} dispatched, {} skipped, {} errors",
                summary.due, summary.dispatched, summary.skipped, summary.errors
            );
            Ok(())
        }
        Command::Send { campaign_id } => {
            let report = ManualTrigger::new(dispatcher)
                .send_now(&AccessScope::All, campaign_id)
                .await?;
            println!("{}", report.summary());
            if report.outcome == DispatchOutcome::Failed {
                bail!("campaign {} was not delivered", campaign_id);
            }
            Ok(())
        }
    }
}

async fn serve(config: Config, db_pool: DatabasePool, dispatcher: Arc<Dispatcher>) -> Result<()> {
    info!("Starting Mailshot server...");

    // Start dispatch worker
    let worker_handle = if config.dispatch.enabled {
        let worker = DispatchWorker::new(dispatcher.clone())
            .with_interval(config.dispatch.interval_secs);
        Some(tokio::spawn(async move {
            worker.run().await;
        }))
    } else {
        info!("Dispatch worker disabled");
        None
    };

    // Start API server
    let addr = format!("{}:{}", config.server.bind_address, config.api.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind API server to {}", addr))?;
    let app = mailshot_api::create_router(AppState::new(db_pool, dispatcher));

    info!("Starting API server on {}", addr);
    let api_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("API server error: {}", e);
        }
    });

    info!("Mailshot server started successfully");

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");

    api_handle.abort();
    if let Some(handle) = worker_handle {
        handle.abort();
    }

    info!("Mailshot server shutdown complete");

    Ok(())
}

fn init_logging(config: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let registry = tracing_subscriber::registry().with(filter);

    if config.format == "json" {
        registry.with(fmt::layer().json().with_target(true)).init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_level(true))
            .init();
    }
}

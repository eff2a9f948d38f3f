//! # Volley Club Bot Main Entry Point
//!
//! Initializes logging, loads configuration, opens the store, starts the
//! scheduled jobs and the health server, and runs the Telegram bot.

use anyhow::Result;
use std::sync::Arc;
use teloxide::prelude::*;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use volley_club_bot::bot::handlers::BotHandler;
use volley_club_bot::config::Config;
use volley_club_bot::database::open_store;
use volley_club_bot::services::clock::SystemClock;
use volley_club_bot::services::health::HealthService;
use volley_club_bot::services::notifier::TelegramNotifier;
use volley_club_bot::services::orchestrator::{Orchestrator, Settings};
use volley_club_bot::services::scheduler::{JobHours, Jobs, SchedulerService};
use volley_club_bot::utils::logging::log_system_event;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "volley_club_bot=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    info!("Starting Volley Club Bot v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "Configuration loaded - Database: {}, HTTP Port: {}, UTC{:+}",
        config.database_url, config.http_port, config.timezone_offset_hours
    );

    info!("Opening store...");
    let store = open_store(&config.database_url).await?;
    info!("Store ready ({})", store.backend());

    let bot = Bot::new(&config.telegram_bot_token);
    let core = Arc::new(Orchestrator::new(
        store,
        Arc::new(SystemClock::new(config.timezone())),
        Arc::new(TelegramNotifier::new(bot.clone())),
        Settings::from(&config),
    ));
    core.provision().await?;
    info!(
        "Roster provisioned: {} admin(s), {} excluded from stats",
        config.admin_ids.len(),
        config.stats_excluded_ids.len()
    );

    info!("Initializing scheduler...");
    let jobs = Arc::new(Jobs::new(core.clone()));
    let hours = JobHours {
        open: config.open_hour,
        remind: config.remind_hour,
        reconcile: config.reconcile_hour,
    };
    let mut scheduler = match SchedulerService::new(jobs, hours, config.timezone_offset_hours).await {
        Ok(service) => service,
        Err(e) => {
            tracing::error!("Failed to create scheduler: {}", e);
            return Err(anyhow::anyhow!("Failed to create scheduler: {}", e));
        }
    };
    if let Err(e) = scheduler.start().await {
        tracing::error!("Failed to start scheduler: {}", e);
    } else {
        info!("Scheduler started successfully");
    }

    let health_service = HealthService::new(core.db.clone());
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.http_port))
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind to port {}: {}", config.http_port, e))?;
    info!("Health check server starting on port {}", config.http_port);

    let bot_task = tokio::spawn(async move {
        Dispatcher::builder(bot, BotHandler::schema())
            .dependencies(dptree::deps![core])
            .enable_ctrlc_handler()
            .build()
            .dispatch()
            .await;
    });

    let health_task = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, health_service.router).await {
            tracing::error!("Health server error: {}", e);
        }
    });

    tokio::select! {
        result = bot_task => {
            if let Err(e) = result {
                tracing::error!("Bot task error: {}", e);
            }
        }
        result = health_task => {
            if let Err(e) = result {
                tracing::error!("Health task error: {}", e);
            }
        }
    }

    if let Err(e) = scheduler.stop().await {
        tracing::warn!("Error stopping scheduler: {}", e);
    }

    log_system_event("shutdown", None);
    Ok(())
}

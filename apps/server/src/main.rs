//! Tipo de Cambio Bot - Headless Server
//!
//! Telegram bot reporting USD/GTQ buy rates from Guatemalan institutions,
//! with an optional daily notification to subscribers.

mod config;
mod scheduler;

use clap::Parser;
use config::AppConfig;
use scheduler::{run_daily, DailySchedule};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tipocambio_alerts::{
    Database, DailyNotifier, DisplayNames, NotifierError, RateFormatter, TelegramBot,
};
use tipocambio_feeds::{default_fetchers, RateAggregator};
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Tipo de Cambio Bot CLI
#[derive(Parser, Debug)]
#[command(name = "tipocambio-bot")]
#[command(about = "USD/GTQ exchange rate Telegram bot", long_about = None)]
struct Args {
    /// Log level used when RUST_LOG is not set: trace, debug, info, warn, error
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Send the daily notification once and exit
    #[arg(long, default_value_t = false)]
    run_once: bool,

    /// Answer commands only, without the daily notification
    #[arg(long, default_value_t = false)]
    no_scheduler: bool,
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    init_logging(&args.log_level);

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    info!("🚀 Tipo de Cambio Bot starting...");
    info!("  Database: {}", config.database_url);
    info!("  Timezone: {}", config.timezone);
    info!(
        "  Daily notification: {:02}:{:02}{}",
        config.notify_hour,
        config.notify_minute,
        if args.no_scheduler { " (disabled)" } else { "" }
    );
    info!("  Fetch timeout: {}s", config.sources.banguat.timeout_secs);

    let db = match Database::connect(&config.database_url).await {
        Ok(db) => db,
        Err(e) => {
            error!(error = %e, "Failed to open database");
            return ExitCode::FAILURE;
        }
    };

    let aggregator = match RateAggregator::new(default_fetchers(&config.sources)) {
        Ok(aggregator) => aggregator,
        Err(e) => {
            error!(error = %e, "Failed to register rate sources");
            return ExitCode::FAILURE;
        }
    };
    info!("  Sources: {:?}", aggregator.sources());

    let formatter = RateFormatter::new(DisplayNames::default(), config.timezone);

    let bot = Arc::new(TelegramBot::new(
        &config.telegram_token,
        db.clone(),
        aggregator.clone(),
        formatter.clone(),
    ));
    let notifier = Arc::new(
        DailyNotifier::new(aggregator, formatter, db.clone(), Arc::clone(&bot))
            .with_delay(config.broadcast_delay),
    );

    if args.run_once {
        return match notifier.run().await {
            Ok(outcome) => {
                info!(sent = outcome.sent, failed = outcome.failed, "One-shot notification done");
                ExitCode::SUCCESS
            }
            Err(e) => {
                error!(error = %e, "One-shot notification failed");
                ExitCode::FAILURE
            }
        };
    }

    match db.subscriber_count().await {
        Ok(count) => info!("  Subscribers: {}", count),
        Err(e) => warn!(error = %e, "Failed to count subscribers"),
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let scheduler_handle = if args.no_scheduler {
        None
    } else {
        let Some(schedule) =
            DailySchedule::new(config.notify_hour, config.notify_minute, config.timezone)
        else {
            error!("Invalid notification time");
            return ExitCode::FAILURE;
        };

        let job_notifier = Arc::clone(&notifier);
        Some(tokio::spawn(run_daily(
            schedule,
            move || {
                let notifier = Arc::clone(&job_notifier);
                async move {
                    match notifier.run().await {
                        Ok(_) | Err(NotifierError::AlreadyRunning) => {}
                        Err(e) => warn!(error = %e, "Daily notification not sent"),
                    }
                }
            },
            shutdown_rx,
        )))
    };

    // Polls until Ctrl+C
    info!("Press Ctrl+C to stop...");
    bot.run().await;

    warn!("Shutdown signal received");
    let _ = shutdown_tx.send(true);
    if let Some(handle) = scheduler_handle {
        let _ = tokio::time::timeout(Duration::from_secs(2), handle).await;
    }

    info!("👋 Tipo de Cambio Bot stopped");
    ExitCode::SUCCESS
}

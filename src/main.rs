use anyhow::Result;
use dotenvy::dotenv;
use std::sync::Arc;
use std::time::Duration;
use teloxide::prelude::*;
use tokio::signal;
use tokio::time::{interval, sleep};

use grosh::cli::{Cli, Commands};
use grosh::core::{config, init_logger, AppError};
use grosh::engine::UserLocks;
use grosh::storage::{create_pool, get_connection, raffles, DbPool};
use grosh::telegram::{create_bot, schema, setup_bot_commands, ConversationTracker, HandlerDeps};

/// Main entry point for the Telegram bot
///
/// Parses CLI arguments and dispatches to appropriate subcommand.
///
/// # Errors
/// Returns an error if initialization fails (logging, database, bot creation).
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    // Set up global panic handler to catch panics in dispatcher
    // This allows us to log the panic and continue working instead of terminating
    std::panic::set_hook(Box::new(|panic_info| {
        log::error!("Panic caught: {:?}", panic_info);
        if let Some(location) = panic_info.location() {
            log::error!(
                "Panic at {}:{}:{}",
                location.file(),
                location.line(),
                location.column()
            );
        }
        if let Some(msg) = panic_info.payload().downcast_ref::<&str>() {
            log::error!("Panic message: {}", msg);
        }
    }));

    // Initialize logger (console + file)
    init_logger(&config::LOG_FILE_PATH)?;

    // Load environment variables from .env if present
    let _ = dotenv();

    match cli.command {
        Some(Commands::Run) | None => run_bot().await,
        Some(Commands::SweepRaffles) => run_raffle_sweep().await,
    }
}

/// Run the raffle sweeper once and exit.
async fn run_raffle_sweep() -> Result<()> {
    let db_pool =
        create_pool(&config::DATABASE_PATH).map_err(|e| anyhow::anyhow!("Failed to create database pool: {}", e))?;

    let conn = get_connection(&db_pool)?;
    let now = chrono::Utc::now().to_rfc3339();
    let count = raffles::deactivate_ended_raffles(&conn, &now)?;
    log::info!("Raffle sweep: deactivated {} raffle(s)", count);
    Ok(())
}

/// Spawn the periodic raffle expiry sweeper.
fn spawn_raffle_sweeper(db_pool: Arc<DbPool>) {
    tokio::spawn(async move {
        let mut interval = interval(config::maintenance::raffle_sweep_interval());
        loop {
            interval.tick().await;
            match get_connection(&db_pool) {
                Ok(conn) => {
                    let now = chrono::Utc::now().to_rfc3339();
                    match raffles::deactivate_ended_raffles(&conn, &now) {
                        Ok(count) if count > 0 => {
                            log::info!("Deactivated {} ended raffle(s)", count);
                        }
                        Ok(_) => {} // Nothing to sweep
                        Err(e) => log::error!("Failed to sweep raffles: {}", e),
                    }
                }
                Err(e) => log::error!("Failed to get DB connection for raffle sweep: {}", e),
            }
        }
    });
}

/// Run the Telegram bot
async fn run_bot() -> Result<()> {
    let bot_init_start = std::time::Instant::now();
    log::info!("Starting bot...");

    // Create database connection pool
    let db_pool = Arc::new(
        create_pool(&config::DATABASE_PATH).map_err(|e| anyhow::anyhow!("Failed to create database pool: {}", e))?,
    );

    // Background maintenance runs with or without the transport
    spawn_raffle_sweeper(Arc::clone(&db_pool));

    let user_locks = Arc::new(UserLocks::new());
    Arc::clone(&user_locks).spawn_cleanup_task(Duration::from_secs(300));

    let conversation = Arc::new(ConversationTracker::new());
    Arc::clone(&conversation).spawn_cleanup_task(config::conversation::cleanup_interval());

    // Create bot instance. A missing token is fatal to the transport only:
    // the process keeps running maintenance in a degraded mode.
    let bot = match create_bot() {
        Ok(bot) => bot,
        Err(AppError::Config(reason)) => {
            log::error!("Bot transport disabled: {}", reason);
            log::warn!("Running in degraded mode (maintenance only). Press Ctrl-C to stop.");
            signal::ctrl_c().await?;
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    // Get bot information; retry while the Bot API is still waking up
    let bot_info = {
        let startup_max_retries = 60; // Up to 5 minutes (60 * 5s)
        let mut startup_retry = 0;
        loop {
            match bot.get_me().await {
                Ok(info) => break info,
                Err(e) => {
                    let err_str = e.to_string();
                    let is_retryable = err_str.contains("restart")
                        || err_str.contains("network")
                        || err_str.contains("connection")
                        || err_str.contains("timed out")
                        || err_str.contains("Connection refused");

                    startup_retry += 1;
                    if startup_retry >= startup_max_retries || !is_retryable {
                        return Err(anyhow::anyhow!(
                            "Failed to connect to Bot API after {} retries: {}",
                            startup_retry,
                            e
                        ));
                    }

                    log::warn!(
                        "Bot API not ready (attempt {}/{}): {}. Retrying in 5 seconds...",
                        startup_retry,
                        startup_max_retries,
                        err_str
                    );
                    sleep(Duration::from_secs(5)).await;
                }
            }
        }
    };
    log::info!("Bot username: {:?}, Bot ID: {}", bot_info.username, bot_info.id);

    // Register the visible command list
    setup_bot_commands(&bot).await?;

    // Create handler dependencies for the modular schema
    let handler_deps = HandlerDeps::new(
        Arc::clone(&db_pool),
        Arc::clone(&user_locks),
        Arc::clone(&conversation),
    );

    // Create the dispatcher handler tree using the modular schema
    let handler = schema(handler_deps);

    let init_elapsed = bot_init_start.elapsed();
    log::info!("Bot initialization complete in {:.2}s", init_elapsed.as_secs_f64());
    log::info!("Starting bot in long polling mode");

    // Run the dispatcher with retry logic
    let mut retry_count = 0;
    let max_retries = config::retry::MAX_DISPATCHER_RETRIES;
    loop {
        let bot_clone = bot.clone();
        let handler_clone = handler.clone();

        // Create a new dispatcher in a separate task to isolate panics;
        // they are caught via the JoinHandle
        let handle = tokio::spawn(async move {
            use teloxide::update_listeners::Polling;

            // Create polling listener that drops pending updates on start
            let listener = Polling::builder(bot_clone.clone()).drop_pending_updates().build();

            Dispatcher::builder(bot_clone, handler_clone)
                .dependencies(DependencyMap::new())
                .enable_ctrlc_handler()
                .build()
                .dispatch_with_listener(
                    listener,
                    LoggingErrorHandler::with_custom_text("An error from the update listener"),
                )
                .await
        });

        match handle.await {
            Ok(()) => {
                // Dispatcher finished normally
                log::info!("Dispatcher shutdown gracefully");
                break;
            }
            Err(join_err) => {
                if join_err.is_panic() {
                    let panic_msg = join_err.to_string();
                    log::error!("Dispatcher panicked: {}", panic_msg);

                    if retry_count < max_retries {
                        retry_count += 1;
                        log::info!(
                            "Retrying dispatcher connection after panic (attempt {}/{})...",
                            retry_count,
                            max_retries
                        );
                        exponential_backoff(retry_count).await;
                    } else {
                        log::error!("Max retries reached after panic. Exiting...");
                        break;
                    }
                } else {
                    log::warn!("Dispatcher task was cancelled: {}", join_err);
                    break;
                }
            }
        }

        // Add a delay between retries to avoid overwhelming the API
        if retry_count > 0 {
            sleep(config::retry::dispatcher_delay()).await;
        }
    }

    Ok(())
}

/// Sleep for an exponentially growing delay between dispatcher retries.
async fn exponential_backoff(retry_count: u32) {
    let factor = config::retry::EXPONENTIAL_BACKOFF_BASE.saturating_pow(retry_count.saturating_sub(1));
    let delay = config::retry::DISPATCHER_RETRY_DELAY_SECS.saturating_mul(factor);
    sleep(Duration::from_secs(delay)).await;
}

//! catman worker
//!
//! Processes pipeline jobs from the SQS queue:
//! 1. Receives `link_to_journal`, `link_to_issue` and `index_article` jobs
//! 2. Runs them against the catalog database and the search engine
//! 3. Deletes handled messages, leaving failures for redelivery
//!
//! Also schedules the orphan and dirty sweeps. `worker sweep` runs both
//! sweeps once and exits.

mod processor;

use crate::processor::{Disposition, JobProcessor};
use catman_common::{
    config::{AppConfig, ObservabilityConfig, SweeperConfig},
    db::{DbPool, Repository},
    metrics,
    queue::Queue,
    search::{CircuitBreaker, ElasticsearchClient},
    CatalogStore, Pipeline, VERSION,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const MAX_FAILURES: u32 = 5;
const CIRCUIT_BREAK_DURATION: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load()?;
    init_tracing(&config.observability);

    info!("Starting catman worker v{}", VERSION);

    let config = Arc::new(config);

    metrics::install_exporter(config.observability.metrics_port)?;
    metrics::register_metrics();

    // Initialize database connection
    info!("Connecting to database...");
    let db = DbPool::new(&config.database).await?;
    if config.database.run_migrations {
        db.migrate(&config.database.migrations_dir).await?;
    }
    let store: Arc<dyn CatalogStore> = Arc::new(Repository::new(db));

    let queue = Arc::new(Queue::new(&config.queue).await?);

    let search = CircuitBreaker::new(
        ElasticsearchClient::new(&config.search)?,
        config.search.breaker_failure_threshold,
        config.search.breaker_cooldown(),
    );
    info!(
        nodes = ?config.search.nodes,
        index = %config.search.index_name,
        "Search client initialized"
    );

    let pipeline = Arc::new(Pipeline::new(
        store,
        queue.clone(),
        Arc::new(search),
        &config.search,
        &config.sweeper,
    ));

    let args: Vec<String> = std::env::args().collect();

    if args.get(1).map(String::as_str) == Some("sweep") {
        // One-shot mode: catch up on everything pending
        info!("Running sweeps once...");
        let orphans = pipeline.sweeper.sweep_orphans().await?;
        let dirty = pipeline.sweeper.sweep_dirty().await?;
        info!(
            orphans = orphans.enqueued,
            dirty = dirty.enqueued,
            "Sweeps complete"
        );
        return Ok(());
    }

    let sweeps = if config.sweeper.enabled {
        spawn_sweeps(pipeline.clone(), &config.sweeper)
    } else {
        info!("Periodic sweeps disabled");
        Vec::new()
    };

    let processor = JobProcessor::new(pipeline);
    info!("Worker ready, starting queue polling...");

    let mut consecutive_failures = 0;

    loop {
        if consecutive_failures >= MAX_FAILURES {
            warn!(
                failures = consecutive_failures,
                "Too many consecutive failures, pausing..."
            );
            tokio::time::sleep(CIRCUIT_BREAK_DURATION).await;
            consecutive_failures = 0;
            info!("Resuming queue polling");
        }

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
            result = queue.receive() => {
                match result {
                    Ok(messages) => {
                        for message in messages {
                            let disposition = processor.process(&message).await;

                            match disposition {
                                Disposition::Completed => consecutive_failures = 0,
                                Disposition::Retry => {
                                    consecutive_failures += 1;
                                    // redelivered after the visibility timeout
                                    continue;
                                }
                                Disposition::Discard => {
                                    if let Err(e) = queue.dead_letter(&message).await {
                                        error!(error = %e, "Failed to forward message to DLQ");
                                    }
                                }
                            }

                            if let Some(receipt_handle) = message.receipt_handle() {
                                if let Err(e) = queue.delete(receipt_handle).await {
                                    error!(error = %e, "Failed to delete message");
                                }
                            }
                        }
                    }
                    Err(e) => {
                        consecutive_failures += 1;
                        error!(error = %e, "Failed to receive messages from queue");
                        tokio::time::sleep(Duration::from_secs(5)).await;
                    }
                }
            }
        }
    }

    for sweep in sweeps {
        sweep.abort();
    }

    info!("Worker shutting down");
    Ok(())
}

fn init_tracing(observability: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&observability.log_level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    if observability.json_logging {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

/// Start the orphan and dirty sweep schedules
fn spawn_sweeps(pipeline: Arc<Pipeline>, config: &SweeperConfig) -> Vec<JoinHandle<()>> {
    let orphans = {
        let pipeline = pipeline.clone();
        let mut ticker = tokio::time::interval(config.orphan_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::spawn(async move {
            loop {
                ticker.tick().await;
                if let Err(e) = pipeline.sweeper.sweep_orphans().await {
                    error!(error = %e, "Orphan sweep failed");
                }
            }
        })
    };

    let dirty = {
        let mut ticker = tokio::time::interval(config.dirty_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::spawn(async move {
            loop {
                ticker.tick().await;
                if let Err(e) = pipeline.sweeper.sweep_dirty().await {
                    error!(error = %e, "Dirty sweep failed");
                }
            }
        })
    };

    info!(
        orphan_interval_secs = config.orphan_interval_secs,
        dirty_interval_secs = config.dirty_interval_secs,
        "Periodic sweeps scheduled"
    );

    vec![orphans, dirty]
}

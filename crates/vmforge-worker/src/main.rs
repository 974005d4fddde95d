//! VMForge provisioning worker entry point.
//!
//! Polls the event store's approval feed and runs the provisioning saga
//! for each entry. At-least-once: the position checkpoint lives in memory,
//! so a restart replays the feed from the start; the saga's state-guarded
//! transitions make that safe.

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::EnvFilter;
use vmforge_core::clock::SystemClock;
use vmforge_event_store::feed::{EventFeed, PgEventFeed};
use vmforge_event_store::pg_event_repository::PgEventRepository;
use vmforge_hypervisor::dev::DevHypervisor;
use vmforge_hypervisor::port::HypervisorPort;
use vmforge_projection::pg_projection_store::PgProjectionStore;
use vmforge_provisioner::handlers::Provisioner;
use vmforge_provisioner::saga::ProvisioningSaga;
use vmforge_request::application::command_handlers::RequestServices;
use vmforge_request::application::ports::AlwaysAllow;

mod adapters;
mod config;
mod error;

use adapters::{LoggingNotifier, LoggingTimeline, StaticMappingSource};
use config::{HypervisorKind, WorkerConfig};
use error::WorkerError;

const APPROVAL_EVENT_TYPE: &str = "request.approved";

#[tokio::main]
async fn main() -> Result<(), WorkerError> {
    // Initialize tracing subscriber.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    tracing::info!("Starting VMForge provisioning worker");

    let config = WorkerConfig::from_env()?;

    // Create database connection pool.
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await?;

    run(&config, pool).await;
    Ok(())
}

fn build_hypervisor(kind: HypervisorKind) -> Box<dyn HypervisorPort> {
    match kind {
        HypervisorKind::Dev { capacity } => Box::new(DevHypervisor::new(capacity)),
    }
}

async fn run(config: &WorkerConfig, pool: sqlx::PgPool) {
    let repo = PgEventRepository::new(pool.clone());
    let projections = PgProjectionStore::new(pool.clone());
    let feed = PgEventFeed::new(pool, APPROVAL_EVENT_TYPE);

    let clock = SystemClock;
    let notifier = LoggingNotifier;
    let timeline = LoggingTimeline;
    let quota = AlwaysAllow;
    let hypervisor = build_hypervisor(config.hypervisor);
    let mappings = StaticMappingSource::new(config.mapping.clone());

    let services = RequestServices {
        clock: &clock,
        repo: &repo,
        projections: &projections,
        notifier: &notifier,
        timeline: &timeline,
        quota: &quota,
    };
    let provisioner = Provisioner {
        services: &services,
        hypervisor: hypervisor.as_ref(),
        mappings: &mappings,
        actor_id: config.actor_id,
    };
    let saga = ProvisioningSaga {
        repo: &repo,
        provisioner: &provisioner,
    };

    let mut position = 0_i64;
    let mut poll = tokio::time::interval(Duration::from_millis(config.poll_interval_ms));
    tracing::info!(
        poll_interval_ms = config.poll_interval_ms,
        batch_size = config.feed_batch_size,
        "worker started"
    );

    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    tracing::error!(error = %e, "shutdown signal listener failed; stopping");
                } else {
                    tracing::info!("shutdown signal received");
                }
                break;
            }
            _ = poll.tick() => {
                position = drain_feed(&feed, &saga, position, config.feed_batch_size).await;
            }
        }
    }

    tracing::info!(position, "worker stopped");
}

/// Processes one batch of feed entries, returning the new checkpoint.
///
/// A failed delivery stops the batch without advancing past the failure,
/// so the next tick retries it.
async fn drain_feed(
    feed: &PgEventFeed,
    saga: &ProvisioningSaga<'_>,
    mut position: i64,
    batch_size: i64,
) -> i64 {
    let entries = match feed.poll_after(position, batch_size).await {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(error = %e, position, "approval feed poll failed");
            return position;
        }
    };

    for entry in entries {
        let aggregate_id = entry.event.aggregate_id;
        match saga
            .on_request_approved(aggregate_id, entry.event.correlation_id)
            .await
        {
            Ok(()) => position = entry.position,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    %aggregate_id,
                    position = entry.position,
                    "saga delivery failed; will retry from this position"
                );
                break;
            }
        }
    }

    position
}

//! Campus points demo.
//!
//! Seeds the campus data set through the ledger, shows a few refused requests, and prints
//! balances, reconciliation, event pools and the transaction log.
//!
//! ```bash
//! RUST_LOG=info METRICS_ENABLED=true cargo run -p campus-points-demo
//! ```

#![allow(missing_docs)]

mod seed;

use campus_points_runtime::metrics::PrometheusRecorder;
use campus_points_runtime::{Config, InMemoryLedgerStore, Ledger};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

struct FrozenClock(chrono::DateTime<chrono::Utc>);

impl campus_points_core::environment::Clock for FrozenClock {
    fn now(&self) -> chrono::DateTime<chrono::Utc> {
        self.0
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    let _ = dotenvy::dotenv();

    let config = Config::from_env();
    config.validate()?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_new(&config.log_filter)
                .unwrap_or_else(|_| Config::DEFAULT_LOG_FILTER.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut recorder = PrometheusRecorder::new();
    if config.metrics_enabled {
        recorder.install()?;
    }

    tracing::info!(now = %config.demo_now, "Starting campus points demo");

    let store = Arc::new(InMemoryLedgerStore::new());
    let ledger = Ledger::new(store.clone(), Arc::new(FrozenClock(config.demo_now)))
        .with_retry_policy(config.retry_policy());

    seed::register(&store, config.demo_now).await?;
    seed::fund(&ledger).await?;
    seed::history(&ledger).await?;

    println!("=== Refused requests ===");
    for reason in seed::refused(&ledger).await? {
        println!("  {reason}");
    }

    println!("\n=== Balances ===");
    for id in seed::account_ids() {
        let account = ledger.account(&id).await?;
        let report = ledger.reconcile(&id).await?;
        println!(
            "  {:<12} {:<16} {:<10} {:>6} pts  ({} records, {})",
            account.id.as_str(),
            account.name,
            account.role.as_str(),
            account.balance,
            report.transaction_count,
            if report.is_consistent() { "reconciled" } else { "MISMATCH" }
        );
    }

    println!("\n=== Event pools ===");
    for event in store.event_ids().await {
        let pool = ledger.event(event).await?;
        println!(
            "  {event} {:<28} awarded {:>4} / {:>4}  remaining {:>4}{}",
            pool.name,
            pool.points_awarded(),
            pool.capacity,
            pool.remaining,
            if pool.published { "" } else { "  (unpublished)" }
        );
    }

    println!("\n=== Transaction log ===");
    for record in ledger.ledger_log().await? {
        println!("  {}", serde_json::to_string(&record)?);
    }

    if let Some(text) = recorder.render() {
        println!("\n=== Metrics ===\n{text}");
    }

    Ok(())
}

//! # Campus Points Runtime
//!
//! The ledger service and its runtime collaborators.
//!
//! ## Core Components
//!
//! - **Ledger** ([`ledger`]): every balance-changing operation, run as an atomic
//!   read-decide-commit unit with transparent conflict retry
//! - **In-memory store** ([`memory`]): an arena of per-entity locks implementing
//!   `LedgerStore`, plus the account/promotion/event administration surface
//! - **Retry** ([`retry`]): exponential backoff with jitter
//! - **Metrics** ([`metrics`]): Prometheus counters and histograms
//! - **Config** ([`config`]): environment-driven settings
//!
//! ## Example
//!
//! ```rust
//! use campus_points_core::environment::SystemClock;
//! use campus_points_core::{Account, AccountId, Actor, Money, Role, Utc};
//! use campus_points_runtime::{InMemoryLedgerStore, Ledger};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(InMemoryLedgerStore::new());
//! store
//!     .register_account(Account::new(AccountId::new("user0001"), "Regular User", Role::Regular, Utc::now()).verified())
//!     .await?;
//!
//! let ledger = Ledger::new(store, Arc::new(SystemClock));
//! let cashier = Actor::new("cashier01", Role::Cashier);
//! let record = ledger
//!     .record_purchase(&cashier, &AccountId::new("user0001"), Money::from_cents(2550), "Coffee")
//!     .await?;
//! assert_eq!(record.points, 25);
//! # Ok(())
//! # }
//! ```

/// Environment-driven configuration
pub mod config;

/// The ledger service
pub mod ledger;

/// In-memory arena store
pub mod memory;

/// Prometheus metrics for observability
pub mod metrics;

/// Retry logic with exponential backoff
pub mod retry;

pub use config::{Config, ConfigError};
pub use ledger::{Ledger, Reconciliation};
pub use memory::InMemoryLedgerStore;
pub use retry::RetryPolicy;

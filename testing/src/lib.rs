//! # Campus Points Testing
//!
//! Testing utilities for the campus points ledger.
//!
//! This crate provides:
//! - Deterministic clocks and a conflict-injecting store decorator ([`mocks`])
//! - A fixture builder that registers accounts and funds them through the ledger
//!   ([`fixtures`])
//! - Reconciliation assertions ([`assertions`])
//! - proptest strategies for random ledger operation sequences ([`properties`])
//!
//! ## Example
//!
//! ```rust
//! use campus_points_testing::{LedgerFixture, assert_reconciled};
//! use campus_points_core::{AccountId, Actor, Role};
//!
//! # async fn example() {
//! let fixture = LedgerFixture::builder()
//!     .member("user0001", 100)
//!     .member("user0002", 0)
//!     .build()
//!     .await
//!     .unwrap();
//!
//! let alice = AccountId::new("user0001");
//! let bob = AccountId::new("user0002");
//! fixture
//!     .ledger
//!     .record_transfer(&Actor::new("user0001", Role::Regular), &alice, &bob, 100, "")
//!     .await
//!     .unwrap();
//!
//! assert_reconciled(&fixture.ledger, &[alice, bob]).await;
//! # }
//! ```

pub mod assertions;
pub mod fixtures;
pub mod mocks;
pub mod properties;

// Re-export commonly used items
pub use assertions::{assert_pool_conserved, assert_reconciled, assert_transfers_paired};
pub use fixtures::{LedgerFixture, LedgerFixtureBuilder};
pub use mocks::{ConflictingStore, FixedClock, test_clock};

/// Install a `tracing` subscriber for test output, honoring `RUST_LOG`.
///
/// Safe to call from every test; only the first call installs.
pub fn init_test_tracing() {
    use tracing_subscriber::{EnvFilter, fmt};

    let _ = fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_test_writer()
        .try_init();
}

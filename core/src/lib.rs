//! # Campus Points Core
//!
//! Domain types and pure policy for the campus loyalty-points ledger.
//!
//! Members accrue, spend and transfer points through purchases, redemptions, transfers,
//! manager adjustments and event attendance. This crate holds everything that can be
//! decided without I/O:
//!
//! - **Accounts** ([`account`]): balances, roles, verification and review flags
//! - **Promotions** ([`promotion`]): one-time and automatic rules with validity windows
//! - **Event pools** ([`event_pool`]): finite point budgets and guest lists
//! - **Transactions** ([`transaction`]): immutable signed point-delta records
//! - **Authorization gate** ([`authorization`]): role-and-ownership policy
//! - **Rules engine** ([`rules`]): purchase points and promotion bonuses
//! - **Store** ([`store`]): the versioned, atomic persistence contract
//!
//! The ledger service that ties these together lives in `campus-points-runtime`.
//!
//! ## Architecture Principles
//!
//! - Balances change only through ledger commits
//! - Every commit is all-or-nothing
//! - `balance == Σ deltas` for every account, always
//! - Time is injected through [`environment::Clock`]

pub mod account;
pub mod authorization;
pub mod error;
pub mod event_pool;
pub mod promotion;
pub mod rules;
pub mod store;
pub mod transaction;
pub mod types;

// Re-export commonly used types
pub use account::{Account, Actor, Role};
pub use authorization::{AuthorizationGate, Denial};
pub use error::LedgerError;
pub use event_pool::EventPool;
pub use promotion::{Promotion, PromotionKind};
pub use rules::{Bonus, RulesEngine};
pub use store::{CommitBatch, LedgerStore, StoreError, Versioned};
pub use transaction::{RelatedRef, Transaction, TransactionDraft, TransactionKind};
pub use types::{AccountId, CorrelationId, EventId, Money, PromotionId, Rate, TransactionId, Version};

pub use chrono::{DateTime, Utc};

/// Environment module - Dependency injection traits
///
/// External dependencies of the ledger are abstracted behind traits so tests can
/// substitute deterministic implementations.
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    ///
    /// Promotion windows are evaluated against this clock at request time.
    ///
    /// # Examples
    ///
    /// ```
    /// use campus_points_core::environment::{Clock, SystemClock};
    ///
    /// let clock = SystemClock;
    /// let before = chrono::Utc::now();
    /// assert!(clock.now() >= before);
    /// ```
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Wall-clock time.
    #[derive(Clone, Copy, Debug, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}

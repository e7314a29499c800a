//! Mock implementations of environment traits and store decorators.

use campus_points_core::environment::Clock;
use campus_points_core::store::{EntityRef, StoreFuture, Versioned};
use campus_points_core::{
    Account, AccountId, CommitBatch, EventId, EventPool, LedgerStore, Promotion, StoreError,
    Transaction, TransactionId, Version,
};
use chrono::{DateTime, TimeZone, Utc};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

/// Fixed clock for deterministic tests
///
/// Always returns the same time, making tests reproducible.
///
/// # Example
///
/// ```
/// use campus_points_testing::mocks::FixedClock;
/// use campus_points_core::environment::Clock;
/// use chrono::Utc;
///
/// let clock = FixedClock::new(Utc::now());
/// let time1 = clock.now();
/// let time2 = clock.now();
/// assert_eq!(time1, time2); // Always the same!
/// ```
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    time: DateTime<Utc>,
}

impl FixedClock {
    /// Create a new fixed clock with the given time
    #[must_use]
    pub const fn new(time: DateTime<Utc>) -> Self {
        Self { time }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.time
    }
}

/// Default fixed clock for tests: 2025-01-20 15:00:00 UTC.
///
/// Inside the January "double points" window and the first-half-year promotion windows
/// of the campus seed data.
///
/// # Panics
///
/// Never in practice; the hardcoded timestamp is valid.
#[must_use]
#[allow(clippy::expect_used)]
pub fn test_clock() -> FixedClock {
    FixedClock::new(
        Utc.with_ymd_and_hms(2025, 1, 20, 15, 0, 0)
            .single()
            .expect("hardcoded timestamp should always be valid"),
    )
}

/// Store decorator that makes commits lose optimistic concurrency races.
///
/// The first `failures` commits are rejected with [`StoreError::Conflict`] without
/// reaching the inner store; later commits pass through. Reads always pass through.
pub struct ConflictingStore {
    inner: Arc<dyn LedgerStore>,
    failures: AtomicU32,
    attempts: AtomicU32,
}

impl ConflictingStore {
    /// Reject the first `failures` commits.
    #[must_use]
    pub fn new(inner: Arc<dyn LedgerStore>, failures: u32) -> Self {
        Self {
            inner,
            failures: AtomicU32::new(failures),
            attempts: AtomicU32::new(0),
        }
    }

    /// Reject every commit.
    #[must_use]
    pub fn always(inner: Arc<dyn LedgerStore>) -> Self {
        Self::new(inner, u32::MAX)
    }

    /// Commit attempts seen so far, including rejected ones.
    #[must_use]
    pub fn commit_attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    fn take_failure(&self) -> bool {
        self.failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl LedgerStore for ConflictingStore {
    fn load_account<'a>(&'a self, id: &'a AccountId) -> StoreFuture<'a, Versioned<Account>> {
        self.inner.load_account(id)
    }

    fn load_event(&self, id: EventId) -> StoreFuture<'_, Versioned<EventPool>> {
        self.inner.load_event(id)
    }

    fn load_promotions(&self) -> StoreFuture<'_, Versioned<Vec<Promotion>>> {
        self.inner.load_promotions()
    }

    fn load_transactions<'a>(&'a self, account: &'a AccountId) -> StoreFuture<'a, Vec<Transaction>> {
        self.inner.load_transactions(account)
    }

    fn load_transaction(&self, id: TransactionId) -> StoreFuture<'_, Transaction> {
        self.inner.load_transaction(id)
    }

    fn load_log(&self) -> StoreFuture<'_, Vec<Transaction>> {
        self.inner.load_log()
    }

    fn commit(&self, batch: CommitBatch) -> StoreFuture<'_, Vec<Transaction>> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if !self.take_failure() {
            return self.inner.commit(batch);
        }

        let entity = batch
            .entities()
            .into_iter()
            .next()
            .unwrap_or(EntityRef::Catalog);
        let expected = batch
            .accounts
            .first()
            .map_or(Version::INITIAL, |w| w.expected);
        Box::pin(async move {
            Err(StoreError::Conflict {
                entity,
                expected,
                actual: expected.next(),
            })
        })
    }
}

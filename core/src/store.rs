//! Persistence abstraction for the ledger.
//!
//! The ledger reads entities together with their [`Version`], decides, and then hands the
//! store one [`CommitBatch`]: the new balances, pool counts and consumption markers, plus
//! the records to append. The store applies the whole batch or nothing. If any named
//! version is stale the batch is rejected with [`StoreError::Conflict`] and the ledger
//! re-runs the read-decide-commit unit.
//!
//! # Implementations
//!
//! - `InMemoryLedgerStore` (in `campus-points-runtime`): arena of per-entity locks
//! - `ConflictingStore` (in `campus-points-testing`): injects conflicts for retry tests
//!
//! # Dyn Compatibility
//!
//! Methods return boxed futures instead of using `async fn` so the ledger can hold an
//! `Arc<dyn LedgerStore>`.

use crate::account::Account;
use crate::event_pool::EventPool;
use crate::promotion::Promotion;
use crate::transaction::{Transaction, TransactionDraft};
use crate::types::{AccountId, EventId, PromotionId, TransactionId, Version};
use smallvec::SmallVec;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Boxed future returned by [`LedgerStore`] methods.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

/// A lockable entity in the store.
///
/// The derived ordering (all accounts by id, then all events by id, then the promotion
/// catalog) is the global lock order for multi-entity commits.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EntityRef {
    /// An account
    Account(AccountId),
    /// An event pool
    Event(EventId),
    /// The promotion catalog as a whole
    Catalog,
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Account(id) => write!(f, "account {id}"),
            Self::Event(id) => write!(f, "{id}"),
            Self::Catalog => f.write_str("promotion catalog"),
        }
    }
}

/// Errors that can occur during store operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Optimistic concurrency conflict: the entity changed since it was read.
    #[error("Concurrency conflict on {entity}: expected {expected}, found {actual}")]
    Conflict {
        /// Entity that changed
        entity: EntityRef,
        /// Version the batch was built against
        expected: Version,
        /// Current version
        actual: Version,
    },

    /// Entity does not exist.
    #[error("Not found: {0}")]
    NotFound(EntityRef),

    /// Entity already exists.
    #[error("Already exists: {0}")]
    AlreadyExists(EntityRef),

    /// Transaction does not exist.
    #[error("Transaction not found: {0}")]
    TransactionNotFound(TransactionId),

    /// A one-time promotion in the batch is already marked consumed.
    #[error("{promotion} already consumed by {account}")]
    PromotionConsumed {
        /// Promotion
        promotion: PromotionId,
        /// Account
        account: AccountId,
    },

    /// An admin write would create an entity that breaks its invariants.
    #[error("Invalid {entity}: {reason}")]
    InvalidEntity {
        /// Entity being written
        entity: EntityRef,
        /// What is wrong with it
        reason: String,
    },

    /// The batch is malformed (e.g. the same entity written twice).
    #[error("Invalid commit batch: {0}")]
    InvalidBatch(String),

    /// Backend failure.
    #[error("Backend error: {0}")]
    Backend(String),
}

/// An entity snapshot with the version it was read at.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Versioned<T> {
    /// Snapshot
    pub value: T,
    /// Version at read time
    pub version: Version,
}

impl<T> Versioned<T> {
    /// Wraps a value.
    #[must_use]
    pub const fn new(value: T, version: Version) -> Self {
        Self { value, version }
    }
}

/// New state for one account, guarded by the version it was computed from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccountWrite {
    /// Account
    pub id: AccountId,
    /// Version the new state was computed from
    pub expected: Version,
    /// New balance
    pub balance: i64,
    /// One-time promotions to mark consumed
    pub consume: SmallVec<[PromotionId; 2]>,
}

impl AccountWrite {
    /// New balance for a snapshot read at `snapshot.version`.
    #[must_use]
    pub fn new(snapshot: &Versioned<Account>, balance: i64) -> Self {
        Self {
            id: snapshot.value.id.clone(),
            expected: snapshot.version,
            balance,
            consume: SmallVec::new(),
        }
    }

    /// Also mark these one-time promotions consumed.
    #[must_use]
    pub fn consuming(mut self, promotions: impl IntoIterator<Item = PromotionId>) -> Self {
        self.consume.extend(promotions);
        self
    }
}

/// New remaining count for one event pool.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventWrite {
    /// Event
    pub id: EventId,
    /// Version the new count was computed from
    pub expected: Version,
    /// New remaining points
    pub remaining: i64,
}

impl EventWrite {
    /// New remaining count for a snapshot read at `snapshot.version`.
    #[must_use]
    pub const fn new(snapshot: &Versioned<EventPool>, remaining: i64) -> Self {
        Self {
            id: snapshot.value.id,
            expected: snapshot.version,
            remaining,
        }
    }
}

/// One all-or-nothing unit of ledger writes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CommitBatch {
    /// Account updates
    pub accounts: SmallVec<[AccountWrite; 2]>,
    /// Event pool updates
    pub events: SmallVec<[EventWrite; 1]>,
    /// Records to append, in order
    pub transactions: Vec<TransactionDraft>,
    /// Catalog version the decision was made against, if it read promotions
    pub catalog: Option<Version>,
}

impl CommitBatch {
    /// Empty batch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an account update.
    #[must_use]
    pub fn account(mut self, write: AccountWrite) -> Self {
        self.accounts.push(write);
        self
    }

    /// Add an event pool update.
    #[must_use]
    pub fn event(mut self, write: EventWrite) -> Self {
        self.events.push(write);
        self
    }

    /// Require the promotion catalog to still be at `version`.
    #[must_use]
    pub fn catalog(mut self, version: Version) -> Self {
        self.catalog = Some(version);
        self
    }

    /// Append a record.
    #[must_use]
    pub fn transaction(mut self, draft: TransactionDraft) -> Self {
        self.transactions.push(draft);
        self
    }

    /// Every entity the batch writes, in global lock order.
    #[must_use]
    pub fn entities(&self) -> Vec<EntityRef> {
        let mut entities: Vec<EntityRef> = self
            .accounts
            .iter()
            .map(|w| EntityRef::Account(w.id.clone()))
            .chain(self.events.iter().map(|w| EntityRef::Event(w.id)))
            .collect();
        entities.sort();
        entities
    }
}

/// Storage the ledger needs: versioned reads and atomic multi-entity commits.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; the ledger is shared across request tasks.
pub trait LedgerStore: Send + Sync {
    /// Load an account snapshot.
    ///
    /// # Errors
    ///
    /// - `NotFound`: no such account
    /// - `Backend`: storage failure
    fn load_account<'a>(&'a self, id: &'a AccountId) -> StoreFuture<'a, Versioned<Account>>;

    /// Load an event pool snapshot.
    ///
    /// # Errors
    ///
    /// - `NotFound`: no such event
    /// - `Backend`: storage failure
    fn load_event(&self, id: EventId) -> StoreFuture<'_, Versioned<EventPool>>;

    /// Load the promotion catalog with its version.
    ///
    /// Every catalog edit bumps the version; a batch that names an older one is rejected
    /// with `Conflict` on [`EntityRef::Catalog`].
    ///
    /// # Errors
    ///
    /// - `Backend`: storage failure
    fn load_promotions(&self) -> StoreFuture<'_, Versioned<Vec<Promotion>>>;

    /// Load all records owned by an account, oldest first.
    ///
    /// # Errors
    ///
    /// - `Backend`: storage failure
    fn load_transactions<'a>(&'a self, account: &'a AccountId) -> StoreFuture<'a, Vec<Transaction>>;

    /// Load one record.
    ///
    /// # Errors
    ///
    /// - `TransactionNotFound`: no such record
    /// - `Backend`: storage failure
    fn load_transaction(&self, id: TransactionId) -> StoreFuture<'_, Transaction>;

    /// Load the whole log, oldest first.
    ///
    /// # Errors
    ///
    /// - `Backend`: storage failure
    fn load_log(&self) -> StoreFuture<'_, Vec<Transaction>>;

    /// Apply a batch atomically and return the sealed records in batch order.
    ///
    /// # Errors
    ///
    /// - `Conflict`: a named version (entity or catalog) is stale; nothing was written
    /// - `PromotionConsumed`: a consumption marker is already set; nothing was written
    /// - `NotFound`: a named entity does not exist; nothing was written
    /// - `InvalidBatch`: the batch names an entity twice
    /// - `Backend`: storage failure
    fn commit(&self, batch: CommitBatch) -> StoreFuture<'_, Vec<Transaction>>;
}

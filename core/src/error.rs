//! Ledger error kinds.
//!
//! Every rejection is terminal for the request except
//! [`LedgerError::TransientFailure`], which the caller may retry. A rejected
//! operation never leaves partial writes.

use crate::authorization::Denial;
use crate::store::{EntityRef, StoreError};
use crate::types::{AccountId, EventId, PromotionId, TransactionId};
use thiserror::Error;

/// Errors returned by ledger operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Role or ownership policy failure.
    #[error("Unauthorized: {0}")]
    Unauthorized(Denial),

    /// The acting account is not verified.
    #[error("Actor {0} is not verified")]
    UnverifiedActor(AccountId),

    /// The target account is not verified.
    #[error("Account {0} is not verified")]
    UnverifiedAccount(AccountId),

    /// Negative or zero amount where it is not allowed.
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// The account cannot cover the requested points.
    #[error("Insufficient balance on {account}: balance {balance} < requested {requested}")]
    InsufficientBalance {
        /// Debited account
        account: AccountId,
        /// Balance at the time of the check
        balance: i64,
        /// Points requested
        requested: i64,
    },

    /// Sender and recipient are the same account.
    #[error("Account {0} cannot transfer to itself")]
    SelfTransfer(AccountId),

    /// The account is not on the event's guest list.
    #[error("Account {account} is not a guest of {event}")]
    NotAGuest {
        /// Event
        event: EventId,
        /// Account
        account: AccountId,
    },

    /// The event pool cannot cover the award.
    #[error("Point pool of {event} exhausted: remaining {remaining} < requested {requested}")]
    PoolExhausted {
        /// Event
        event: EventId,
        /// Points remaining at the time of the check
        remaining: i64,
        /// Points requested
        requested: i64,
    },

    /// A one-time promotion was already consumed by the account.
    #[error("{promotion} already consumed by {account}")]
    PromotionAlreadyConsumed {
        /// Promotion
        promotion: PromotionId,
        /// Account
        account: AccountId,
    },

    /// Awards require a published event.
    #[error("{0} is not published")]
    EventNotPublished(EventId),

    /// No such account.
    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),

    /// No such event.
    #[error("Event not found: {0}")]
    EventNotFound(EventId),

    /// No such transaction.
    #[error("Transaction not found: {0}")]
    TransactionNotFound(TransactionId),

    /// A point computation does not fit in 64 bits.
    #[error("Point arithmetic overflow")]
    Overflow,

    /// The atomic commit lost a race with a concurrent writer.
    ///
    /// Retried internally by the ledger; only visible if a store is driven directly.
    #[error("Persistence conflict: {0}")]
    PersistenceConflict(String),

    /// Conflicts persisted through every retry. The caller may retry the request.
    #[error("Transient failure after {attempts} attempts")]
    TransientFailure {
        /// Attempts made
        attempts: u32,
    },

    /// The storage backend failed.
    #[error("Storage error: {0}")]
    Storage(String),
}

impl LedgerError {
    /// Whether the caller may retry the same request.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::TransientFailure { .. })
    }

    /// Short stable name of the error kind, for metric labels.
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::Unauthorized(_) => "unauthorized",
            Self::UnverifiedActor(_) => "unverified_actor",
            Self::UnverifiedAccount(_) => "unverified_account",
            Self::InvalidAmount(_) => "invalid_amount",
            Self::InsufficientBalance { .. } => "insufficient_balance",
            Self::SelfTransfer(_) => "self_transfer",
            Self::NotAGuest { .. } => "not_a_guest",
            Self::PoolExhausted { .. } => "pool_exhausted",
            Self::PromotionAlreadyConsumed { .. } => "promotion_already_consumed",
            Self::EventNotPublished(_) => "event_not_published",
            Self::AccountNotFound(_) => "account_not_found",
            Self::EventNotFound(_) => "event_not_found",
            Self::TransactionNotFound(_) => "transaction_not_found",
            Self::Overflow => "overflow",
            Self::PersistenceConflict(_) => "persistence_conflict",
            Self::TransientFailure { .. } => "transient_failure",
            Self::Storage(_) => "storage",
        }
    }
}

impl From<Denial> for LedgerError {
    fn from(denial: Denial) -> Self {
        match denial {
            Denial::UnverifiedActor(id) => Self::UnverifiedActor(id),
            Denial::UnverifiedAccount(id) => Self::UnverifiedAccount(id),
            other => Self::Unauthorized(other),
        }
    }
}

impl From<StoreError> for LedgerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict { .. } => Self::PersistenceConflict(err.to_string()),
            StoreError::NotFound(EntityRef::Account(id)) => Self::AccountNotFound(id),
            StoreError::NotFound(EntityRef::Event(id)) => Self::EventNotFound(id),
            StoreError::TransactionNotFound(id) => Self::TransactionNotFound(id),
            StoreError::PromotionConsumed { promotion, account } => {
                Self::PromotionAlreadyConsumed { promotion, account }
            }
            StoreError::NotFound(EntityRef::Catalog)
            | StoreError::AlreadyExists(_)
            | StoreError::InvalidEntity { .. }
            | StoreError::InvalidBatch(_)
            | StoreError::Backend(_) => Self::Storage(err.to_string()),
        }
    }
}

//! Event point pools.

use crate::types::{AccountId, EventId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// The finite budget of points an event may award to its guests.
///
/// `remaining` only ever decreases, and only through the ledger's award operations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventPool {
    /// Event identifier
    pub id: EventId,
    /// Display name
    pub name: String,
    /// Points originally allotted
    pub capacity: i64,
    /// Points still awardable
    pub remaining: i64,
    /// Accounts on the guest list
    pub guests: BTreeSet<AccountId>,
    /// Whether the event is visible to members
    pub published: bool,
}

impl EventPool {
    /// Creates an unpublished pool with no guests.
    #[must_use]
    pub fn new(id: EventId, name: impl Into<String>, capacity: i64) -> Self {
        Self {
            id,
            name: name.into(),
            capacity,
            remaining: capacity,
            guests: BTreeSet::new(),
            published: false,
        }
    }

    /// Whether `account` is on the guest list.
    #[must_use]
    pub fn is_guest(&self, account: &AccountId) -> bool {
        self.guests.contains(account)
    }

    /// Points already awarded from this pool.
    #[must_use]
    pub const fn points_awarded(&self) -> i64 {
        self.capacity - self.remaining
    }

    /// Whether the pool can cover an award of `points`.
    #[must_use]
    pub const fn can_award(&self, points: i64) -> bool {
        points <= self.remaining
    }
}

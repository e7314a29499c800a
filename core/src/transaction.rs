//! Immutable ledger records.

use crate::account::Actor;
use crate::types::{AccountId, CorrelationId, EventId, Money, PromotionId, TransactionId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Type of a ledger record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    /// Points earned on a purchase
    Purchase,
    /// Points spent on a reward
    Redemption,
    /// One half of a transfer between accounts
    Transfer,
    /// Manual correction by a manager
    Adjustment,
    /// Points awarded for attending an event
    Event,
    /// Promotion credit issued by the rules engine
    #[serde(rename = "promotion-credit")]
    PromotionCredit,
}

impl TransactionKind {
    /// Stable lowercase name, used for log fields and metric labels.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Purchase => "purchase",
            Self::Redemption => "redemption",
            Self::Transfer => "transfer",
            Self::Adjustment => "adjustment",
            Self::Event => "event",
            Self::PromotionCredit => "promotion-credit",
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Entity a record points at.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RelatedRef {
    /// The event pool an award drew from
    Event(EventId),
    /// The other side of a transfer
    Counterparty(AccountId),
}

/// A committed ledger record. Never mutated or deleted once written.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Sequential id
    pub id: TransactionId,
    /// Account whose balance this record changes
    pub account: AccountId,
    /// Record type
    pub kind: TransactionKind,
    /// Signed point delta
    pub points: i64,
    /// Amount spent (purchases only)
    pub spent: Option<Money>,
    /// Related entity
    pub related: Option<RelatedRef>,
    /// Shared by both halves of a transfer
    pub correlation: Option<CorrelationId>,
    /// Promotions that contributed to a purchase
    pub promotion_ids: Vec<PromotionId>,
    /// Free-form remark
    pub remark: String,
    /// Identity that created the record
    pub created_by: AccountId,
    /// Commit time
    pub created_at: DateTime<Utc>,
    /// Set when the creator was flagged for review at write time
    pub suspicious: bool,
}

/// A record waiting to be committed; the store assigns its id.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionDraft {
    /// Account whose balance this record changes
    pub account: AccountId,
    /// Record type
    pub kind: TransactionKind,
    /// Signed point delta
    pub points: i64,
    /// Amount spent (purchases only)
    pub spent: Option<Money>,
    /// Related entity
    pub related: Option<RelatedRef>,
    /// Shared by both halves of a transfer
    pub correlation: Option<CorrelationId>,
    /// Promotions that contributed to a purchase
    pub promotion_ids: Vec<PromotionId>,
    /// Free-form remark
    pub remark: String,
    /// Identity that created the record
    pub created_by: AccountId,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Creator flagged for review
    pub suspicious: bool,
}

impl TransactionDraft {
    /// Starts a draft for `account`, created by `actor` at `now`.
    #[must_use]
    pub fn new(
        account: AccountId,
        kind: TransactionKind,
        points: i64,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            account,
            kind,
            points,
            spent: None,
            related: None,
            correlation: None,
            promotion_ids: Vec::new(),
            remark: String::new(),
            created_by: actor.id.clone(),
            created_at: now,
            suspicious: actor.suspicious,
        }
    }

    /// Sets the amount spent.
    #[must_use]
    pub const fn with_spent(mut self, spent: Money) -> Self {
        self.spent = Some(spent);
        self
    }

    /// Sets the related entity.
    #[must_use]
    pub fn with_related(mut self, related: RelatedRef) -> Self {
        self.related = Some(related);
        self
    }

    /// Sets the correlation reference.
    #[must_use]
    pub const fn with_correlation(mut self, correlation: CorrelationId) -> Self {
        self.correlation = Some(correlation);
        self
    }

    /// Sets the contributing promotions.
    #[must_use]
    pub fn with_promotions(mut self, promotion_ids: Vec<PromotionId>) -> Self {
        self.promotion_ids = promotion_ids;
        self
    }

    /// Sets the remark.
    #[must_use]
    pub fn with_remark(mut self, remark: impl Into<String>) -> Self {
        self.remark = remark.into();
        self
    }

    /// Seals the draft under the id assigned by the store.
    #[must_use]
    pub fn into_transaction(self, id: TransactionId) -> Transaction {
        Transaction {
            id,
            account: self.account,
            kind: self.kind,
            points: self.points,
            spent: self.spent,
            related: self.related,
            correlation: self.correlation,
            promotion_ids: self.promotion_ids,
            remark: self.remark,
            created_by: self.created_by,
            created_at: self.created_at,
            suspicious: self.suspicious,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::account::Role;

    #[test]
    fn draft_carries_actor_flags() {
        let actor = Actor::new("cashier01", Role::Cashier).with_suspicious(true);
        let draft = TransactionDraft::new(AccountId::new("user0001"), TransactionKind::Purchase, 26, &actor, Utc::now())
            .with_spent(Money::from_cents(2550))
            .with_remark("Coffee and snacks at campus cafe");

        let txn = draft.into_transaction(TransactionId::new(7));
        assert_eq!(txn.id, TransactionId::new(7));
        assert_eq!(txn.created_by, AccountId::new("cashier01"));
        assert!(txn.suspicious);
        assert_eq!(txn.spent, Some(Money::from_cents(2550)));
    }

    #[test]
    fn kind_names() {
        assert_eq!(TransactionKind::PromotionCredit.as_str(), "promotion-credit");
        assert_eq!(
            serde_json::to_string(&TransactionKind::PromotionCredit).unwrap(),
            "\"promotion-credit\""
        );
        assert_eq!(serde_json::to_string(&TransactionKind::Event).unwrap(), "\"event\"");
    }
}

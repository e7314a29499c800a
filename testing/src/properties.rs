//! Property-based testing utilities using proptest.
//!
//! [`ledger_ops`] generates random operation sequences over a small set of members and
//! one event; [`apply_op`] runs one against a ledger with the actor each kind needs.
//! Rejections are expected and ignored by callers; the properties are checked on
//! whatever was accepted.

use crate::fixtures::{LedgerFixture, LedgerFixtureBuilder};
use campus_points_core::environment::Clock;
use campus_points_core::{
    AccountId, Actor, EventId, EventPool, LedgerError, Money, Promotion, PromotionId,
    PromotionKind, Rate, Role,
};
use campus_points_runtime::Ledger;
use chrono::Duration;
use proptest::prelude::*;

/// The event every generated award draws from.
pub const PROPERTY_EVENT: EventId = EventId::new(1);

/// One generated ledger operation. Account fields index into the member list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LedgerOp {
    /// Cashier-recorded purchase
    Purchase {
        /// Member index
        account: usize,
        /// Amount in cents
        cents: i64,
    },
    /// Self-service redemption
    Redemption {
        /// Member index
        account: usize,
        /// Points requested
        points: i64,
    },
    /// Member-to-member transfer, sent by `from`
    Transfer {
        /// Sender index
        from: usize,
        /// Recipient index
        to: usize,
        /// Points moved
        points: i64,
    },
    /// Manager adjustment, possibly negative
    Adjustment {
        /// Member index
        account: usize,
        /// Signed delta
        delta: i64,
    },
    /// Award from [`PROPERTY_EVENT`]
    EventAward {
        /// Member index
        account: usize,
        /// Points awarded
        points: i64,
    },
}

/// Strategy for one operation over `members` accounts.
pub fn ledger_op(members: usize) -> impl Strategy<Value = LedgerOp> {
    let member = 0..members.max(1);
    prop_oneof![
        (member.clone(), 0_i64..20_000).prop_map(|(account, cents)| LedgerOp::Purchase { account, cents }),
        (member.clone(), 0_i64..400).prop_map(|(account, points)| LedgerOp::Redemption { account, points }),
        (member.clone(), member.clone(), 0_i64..400)
            .prop_map(|(from, to, points)| LedgerOp::Transfer { from, to, points }),
        (member.clone(), -300_i64..300).prop_map(|(account, delta)| LedgerOp::Adjustment { account, delta }),
        (member, 0_i64..150).prop_map(|(account, points)| LedgerOp::EventAward { account, points }),
    ]
}

/// Strategy for a sequence of up to `max_len` operations.
pub fn ledger_ops(members: usize, max_len: usize) -> impl Strategy<Value = Vec<LedgerOp>> {
    prop::collection::vec(ledger_op(members), 0..=max_len)
}

/// Ids of the generated members: `member0`, `member1`, ...
#[must_use]
pub fn member_ids(members: usize) -> Vec<AccountId> {
    (0..members).map(|i| AccountId::new(format!("member{i}"))).collect()
}

/// A fixture with `members` funded members, a one-time and an automatic promotion active
/// at the test clock, and [`PROPERTY_EVENT`] published with every member as a guest.
#[must_use]
pub fn property_fixture(members: usize, opening_balance: i64, pool: i64) -> LedgerFixtureBuilder {
    let starts_at = crate::mocks::test_clock().now() - Duration::days(30);
    let ends_at = starts_at + Duration::days(365);

    let mut event = EventPool::new(PROPERTY_EVENT, "Property Event", pool);
    event.published = true;

    let mut builder = LedgerFixture::builder()
        .promotion(Promotion {
            id: PromotionId::new(1),
            name: "Welcome Bonus".to_string(),
            kind: PromotionKind::OneTime,
            starts_at,
            ends_at,
            min_spend: Money::from_dollars(10),
            rate: Rate::from_hundredths(0),
            bonus_points: 100,
        })
        .promotion(Promotion {
            id: PromotionId::new(2),
            name: "Double Points".to_string(),
            kind: PromotionKind::Automatic,
            starts_at,
            ends_at,
            min_spend: Money::ZERO,
            rate: Rate::from_multiplier(2),
            bonus_points: 0,
        });

    for id in member_ids(members) {
        event.guests.insert(id.clone());
        builder = builder.member(id.as_str(), opening_balance);
    }
    builder.event(event)
}

/// Run `op` against `ledger` with the actor its kind requires.
///
/// # Errors
///
/// Returns whatever the ledger rejects the operation with.
pub async fn apply_op(ledger: &Ledger, members: &[AccountId], op: &LedgerOp) -> Result<(), LedgerError> {
    let cashier = Actor::new("cashier", Role::Cashier);
    let manager = LedgerFixture::funding_manager();
    let self_actor = |id: &AccountId| Actor::new(id.clone(), Role::Regular);
    let member = |index: usize| {
        members
            .get(index)
            .cloned()
            .ok_or_else(|| LedgerError::AccountNotFound(AccountId::new(format!("member{index}"))))
    };

    match *op {
        LedgerOp::Purchase { account, cents } => {
            let id = member(account)?;
            ledger.record_purchase(&cashier, &id, Money::from_cents(cents), "").await?;
        }
        LedgerOp::Redemption { account, points } => {
            let id = member(account)?;
            ledger.record_redemption(&self_actor(&id), &id, points, "").await?;
        }
        LedgerOp::Transfer { from, to, points } => {
            let (from, to) = (member(from)?, member(to)?);
            ledger.record_transfer(&self_actor(&from), &from, &to, points, "").await?;
        }
        LedgerOp::Adjustment { account, delta } => {
            let id = member(account)?;
            ledger.record_adjustment(&manager, &id, delta, "").await?;
        }
        LedgerOp::EventAward { account, points } => {
            let id = member(account)?;
            ledger.record_event_award(&cashier, PROPERTY_EVENT, &id, points, "").await?;
        }
    }
    Ok(())
}

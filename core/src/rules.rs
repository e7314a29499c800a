//! Rules engine: purchase points and promotion bonuses.
//!
//! The engine is a pure computation over the promotion catalog. It reports which
//! one-time promotions a purchase would consume, and the ledger records that consumption
//! in the same atomic commit as the purchase record; if the commit fails nothing is
//! marked.

use crate::account::Account;
use crate::error::LedgerError;
use crate::promotion::{Promotion, PromotionKind};
use crate::types::{Money, PromotionId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Points earned by a purchase, broken down.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bonus {
    /// One point per whole currency unit spent
    pub base: i64,
    /// Sum of all eligible promotion contributions
    pub promotional: i64,
    /// Every promotion that contributed, ascending by id
    pub applied: Vec<PromotionId>,
    /// One-time promotions this purchase consumes, ascending by id
    pub consumed: Vec<PromotionId>,
}

impl Bonus {
    /// Total point delta for the purchase.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Overflow`] if the sum does not fit.
    pub fn total(&self) -> Result<i64, LedgerError> {
        self.base.checked_add(self.promotional).ok_or(LedgerError::Overflow)
    }
}

/// Selects applicable promotions and computes purchase points.
#[derive(Clone, Copy, Debug, Default)]
pub struct RulesEngine;

impl RulesEngine {
    /// Creates the engine.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Compute the points a purchase of `amount` by `account` earns at `now`.
    ///
    /// Eligible promotions are every automatic promotion active at `now` whose minimum
    /// spend is met, plus every such one-time promotion the account has not consumed.
    /// All eligible contributions are summed; the result does not depend on catalog
    /// order.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::InvalidAmount`] if `amount` is negative
    /// - [`LedgerError::Overflow`] if any intermediate sum does not fit
    pub fn compute_bonus(
        &self,
        account: &Account,
        amount: Money,
        now: DateTime<Utc>,
        catalog: &[Promotion],
    ) -> Result<Bonus, LedgerError> {
        if amount.is_negative() {
            return Err(LedgerError::InvalidAmount(format!(
                "purchase amount {amount} is negative"
            )));
        }

        let mut bonus = Bonus {
            base: amount.whole_units(),
            ..Bonus::default()
        };

        for promotion in catalog.iter().filter(|p| Self::is_eligible(p, account, amount, now)) {
            let contribution = promotion.contribution(amount).ok_or(LedgerError::Overflow)?;
            bonus.promotional = bonus
                .promotional
                .checked_add(contribution)
                .ok_or(LedgerError::Overflow)?;
            bonus.applied.push(promotion.id);
            if promotion.kind == PromotionKind::OneTime {
                bonus.consumed.push(promotion.id);
            }
        }

        bonus.applied.sort_unstable();
        bonus.applied.dedup();
        bonus.consumed.sort_unstable();
        bonus.consumed.dedup();
        Ok(bonus)
    }

    fn is_eligible(promotion: &Promotion, account: &Account, amount: Money, now: DateTime<Utc>) -> bool {
        if !promotion.is_active(now) || !promotion.qualifies(amount) {
            return false;
        }
        match promotion.kind {
            PromotionKind::Automatic => true,
            PromotionKind::OneTime => !account.has_consumed(promotion.id),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::account::Role;
    use crate::types::{AccountId, Rate};
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 20, 15, 0, 0).unwrap()
    }

    fn member() -> Account {
        Account::new(AccountId::new("user0002"), "Alice Johnson", Role::Regular, now()).verified()
    }

    fn promo(id: u64, kind: PromotionKind, min_dollars: i64, rate: Rate, bonus_points: i64) -> Promotion {
        Promotion {
            id: PromotionId::new(id),
            name: format!("promo {id}"),
            kind,
            starts_at: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
            ends_at: Utc.with_ymd_and_hms(2025, 6, 30, 0, 0, 0).unwrap(),
            min_spend: Money::from_dollars(min_dollars),
            rate,
            bonus_points,
        }
    }

    #[test]
    fn base_points_without_promotions() {
        let bonus = RulesEngine::new()
            .compute_bonus(&member(), Money::from_cents(2550), now(), &[])
            .unwrap();
        assert_eq!(bonus.base, 25);
        assert_eq!(bonus.total().unwrap(), 25);
        assert!(bonus.applied.is_empty());
    }

    #[test]
    fn big_spender_purchase_earns_255() {
        let catalog = [promo(3, PromotionKind::Automatic, 50, Rate::ONE, 200)];
        let bonus = RulesEngine::new()
            .compute_bonus(&member(), Money::from_dollars(55), now(), &catalog)
            .unwrap();
        assert_eq!(bonus.total().unwrap(), 255);
        assert_eq!(bonus.applied, vec![PromotionId::new(3)]);
        assert!(bonus.consumed.is_empty());
    }

    #[test]
    fn automatic_promotions_stack() {
        let catalog = [
            promo(2, PromotionKind::Automatic, 0, Rate::from_multiplier(2), 0),
            promo(3, PromotionKind::Automatic, 50, Rate::ONE, 200),
        ];
        let bonus = RulesEngine::new()
            .compute_bonus(&member(), Money::from_dollars(55), now(), &catalog)
            .unwrap();
        assert_eq!(bonus.total().unwrap(), 55 + 55 + 200);
    }

    #[test]
    fn one_time_promotion_is_consumed_once() {
        let catalog = [promo(1, PromotionKind::OneTime, 10, Rate::from_hundredths(0), 100)];
        let mut account = member();

        let first = RulesEngine::new()
            .compute_bonus(&account, Money::from_dollars(15), now(), &catalog)
            .unwrap();
        assert_eq!(first.total().unwrap(), 115);
        assert_eq!(first.consumed, vec![PromotionId::new(1)]);

        account.consumed_promotions.insert(PromotionId::new(1));
        let second = RulesEngine::new()
            .compute_bonus(&account, Money::from_dollars(15), now(), &catalog)
            .unwrap();
        assert_eq!(second.total().unwrap(), 15);
        assert!(second.consumed.is_empty());
    }

    #[test]
    fn below_min_spend_or_outside_window_does_not_apply() {
        let catalog = [promo(3, PromotionKind::Automatic, 50, Rate::ONE, 200)];
        let engine = RulesEngine::new();

        let small = engine.compute_bonus(&member(), Money::from_cents(4999), now(), &catalog).unwrap();
        assert_eq!(small.total().unwrap(), 49);

        let later = Utc.with_ymd_and_hms(2025, 7, 1, 0, 0, 0).unwrap();
        let expired = engine.compute_bonus(&member(), Money::from_dollars(55), later, &catalog).unwrap();
        assert_eq!(expired.total().unwrap(), 55);
    }

    #[test]
    fn negative_amount_is_rejected() {
        let err = RulesEngine::new()
            .compute_bonus(&member(), Money::from_cents(-1), now(), &[])
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidAmount(_)));
    }

    proptest! {
        #[test]
        fn catalog_order_does_not_change_the_result(
            cents in 0i64..1_000_000,
            specs in prop::collection::vec((0u32..400, 0i64..500, 0i64..100, any::<bool>()), 0..6),
        ) {
            let catalog: Vec<Promotion> = specs
                .iter()
                .enumerate()
                .map(|(i, (rate, bonus, min, one_time))| {
                    let kind = if *one_time { PromotionKind::OneTime } else { PromotionKind::Automatic };
                    promo(i as u64 + 1, kind, *min, Rate::from_hundredths(*rate), *bonus)
                })
                .collect();
            let mut reversed = catalog.clone();
            reversed.reverse();

            let engine = RulesEngine::new();
            let amount = Money::from_cents(cents);
            let forward = engine.compute_bonus(&member(), amount, now(), &catalog).unwrap();
            let backward = engine.compute_bonus(&member(), amount, now(), &reversed).unwrap();
            prop_assert_eq!(forward, backward);
        }
    }
}

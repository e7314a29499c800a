//! Promotion definitions.
//!
//! Promotions are created and edited by management outside the ledger. The ledger only
//! reads them, and records consumption of one-time promotions on the account.

use crate::types::{Money, PromotionId, Rate};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How often a promotion may apply to the same account.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PromotionKind {
    /// At most once per account, ever
    #[serde(rename = "onetime")]
    OneTime,
    /// Every qualifying purchase inside the window
    #[serde(rename = "automatic")]
    Automatic,
}

/// A promotional rule.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Promotion {
    /// Promotion identifier
    pub id: PromotionId,
    /// Display name
    pub name: String,
    /// One-time or automatic
    pub kind: PromotionKind,
    /// Start of the validity window (inclusive)
    pub starts_at: DateTime<Utc>,
    /// End of the validity window (exclusive)
    pub ends_at: DateTime<Utc>,
    /// Minimum purchase amount to qualify
    pub min_spend: Money,
    /// Earn-rate multiplier relative to the base rate
    pub rate: Rate,
    /// Flat bonus points
    pub bonus_points: i64,
}

impl Promotion {
    /// Whether `now` falls in `[starts_at, ends_at)`.
    #[must_use]
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.starts_at <= now && now < self.ends_at
    }

    /// Whether a purchase of `amount` meets the minimum spend.
    #[must_use]
    pub fn qualifies(&self, amount: Money) -> bool {
        amount >= self.min_spend
    }

    /// Points this promotion adds on top of the base `floor(amount)` points.
    ///
    /// The rate multiplies the base earn rate, so only the part above the base counts:
    /// `max(floor(amount × rate) − base, 0) + bonus_points`. Returns `None` on overflow.
    ///
    /// ```
    /// use campus_points_core::promotion::{Promotion, PromotionKind};
    /// use campus_points_core::types::{Money, PromotionId, Rate};
    /// use chrono::{TimeZone, Utc};
    ///
    /// let big_spender = Promotion {
    ///     id: PromotionId::new(3),
    ///     name: "Big Spender Bonus".to_string(),
    ///     kind: PromotionKind::Automatic,
    ///     starts_at: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
    ///     ends_at: Utc.with_ymd_and_hms(2025, 6, 30, 0, 0, 0).unwrap(),
    ///     min_spend: Money::from_dollars(50),
    ///     rate: Rate::ONE,
    ///     bonus_points: 200,
    /// };
    /// assert_eq!(big_spender.contribution(Money::from_dollars(55)), Some(200));
    /// ```
    #[must_use]
    pub fn contribution(&self, amount: Money) -> Option<i64> {
        let base = amount.whole_units();
        let multiplied = self.rate.apply(amount)?;
        let extra = multiplied.checked_sub(base)?.max(0);
        extra.checked_add(self.bonus_points)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn promotion(rate: Rate, bonus_points: i64) -> Promotion {
        Promotion {
            id: PromotionId::new(1),
            name: "test".to_string(),
            kind: PromotionKind::Automatic,
            starts_at: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
            ends_at: Utc.with_ymd_and_hms(2025, 1, 31, 0, 0, 0).unwrap(),
            min_spend: Money::from_dollars(10),
            rate,
            bonus_points,
        }
    }

    #[test]
    fn window_is_half_open() {
        let promo = promotion(Rate::ONE, 0);
        assert!(promo.is_active(promo.starts_at));
        assert!(!promo.is_active(promo.ends_at));
        assert!(!promo.is_active(promo.starts_at - chrono::Duration::seconds(1)));
    }

    #[test]
    fn min_spend_is_inclusive() {
        let promo = promotion(Rate::ONE, 0);
        assert!(promo.qualifies(Money::from_dollars(10)));
        assert!(!promo.qualifies(Money::from_cents(999)));
    }

    #[test]
    fn double_rate_doubles_base() {
        let promo = promotion(Rate::from_multiplier(2), 0);
        assert_eq!(promo.contribution(Money::from_dollars(55)), Some(55));
    }

    #[test]
    fn zero_rate_contributes_only_flat_bonus() {
        let promo = promotion(Rate::from_hundredths(0), 100);
        assert_eq!(promo.contribution(Money::from_cents(2550)), Some(100));
    }

    #[test]
    fn kind_serde_names() {
        let json = serde_json::to_string(&PromotionKind::OneTime).unwrap();
        assert_eq!(json, "\"onetime\"");
    }
}

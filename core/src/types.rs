//! Identifier and quantity types shared across the ledger.
//!
//! Identifiers are newtypes so an account id can never be passed where an event id is
//! expected. Monetary amounts are integer cents and promotion rates are fixed-point
//! hundredths, so the bonus formula never touches floating point.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Error type for `AccountId` parsing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid account ID: {0:?}")]
pub struct ParseAccountIdError(String);

/// External identity of an account (the campus id, e.g. `"user0001"`).
///
/// The id is assigned at registration and never changes. Ordering is lexicographic and
/// doubles as the global lock order when an operation touches several accounts.
///
/// # Validation
///
/// - `FromStr::from_str()`: rejects empty or whitespace-only input
/// - `new()` and `From`: no validation (trusted, application-controlled input)
///
/// # Examples
///
/// ```
/// use campus_points_core::types::AccountId;
///
/// let id = AccountId::new("user0001");
/// assert_eq!(id.as_str(), "user0001");
///
/// let parsed: AccountId = "cashier01".parse().unwrap();
/// assert_eq!(parsed, AccountId::new("cashier01"));
/// assert!("  ".parse::<AccountId>().is_err());
/// ```
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AccountId(String);

impl AccountId {
    /// Create a new `AccountId` from trusted input.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AccountId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl FromStr for AccountId {
    type Err = ParseAccountIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Err(ParseAccountIdError(s.to_string()));
        }
        Ok(Self(s.to_string()))
    }
}

/// Identifier of a promotion definition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PromotionId(u64);

impl PromotionId {
    /// Create a new `PromotionId`.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Get the numeric value.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for PromotionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "promotion-{}", self.0)
    }
}

/// Identifier of an event and its point pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EventId(u64);

impl EventId {
    /// Create a new `EventId`.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Get the numeric value.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "event-{}", self.0)
    }
}

/// Sequential identifier of a ledger record, assigned by the store at commit time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TransactionId(u64);

impl TransactionId {
    /// Create a new `TransactionId`.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Get the numeric value.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Correlation reference shared by the two halves of a transfer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CorrelationId(Uuid);

impl CorrelationId {
    /// Creates a new random `CorrelationId`.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a `CorrelationId` from a UUID.
    #[must_use]
    pub const fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Returns the inner UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Money amount in cents (avoids floating point issues).
///
/// Signed so that a negative amount coming from an untrusted caller is representable and
/// can be rejected with a proper error instead of wrapping.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Money(i64);

impl Money {
    /// Zero.
    pub const ZERO: Self = Self(0);

    /// Creates a new `Money` amount from cents.
    #[must_use]
    pub const fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    /// Creates a `Money` amount from whole currency units.
    #[must_use]
    pub const fn from_dollars(dollars: i64) -> Self {
        Self(dollars * 100)
    }

    /// Returns the amount in cents.
    #[must_use]
    pub const fn cents(self) -> i64 {
        self.0
    }

    /// Checks if this amount is below zero.
    #[must_use]
    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    /// Whole currency units, rounded toward negative infinity.
    ///
    /// ```
    /// use campus_points_core::types::Money;
    ///
    /// assert_eq!(Money::from_cents(2550).whole_units(), 25);
    /// assert_eq!(Money::from_cents(99).whole_units(), 0);
    /// ```
    #[must_use]
    pub const fn whole_units(self) -> i64 {
        self.0.div_euclid(100)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}${}.{:02}", abs / 100, abs % 100)
    }
}

/// Promotion rate multiplier, stored as fixed-point hundredths (`200` = 2.0x).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Rate(u32);

impl Rate {
    /// The neutral multiplier (1.0x).
    pub const ONE: Self = Self(100);

    /// Create a rate from hundredths (`150` = 1.5x).
    #[must_use]
    pub const fn from_hundredths(hundredths: u32) -> Self {
        Self(hundredths)
    }

    /// Create a whole-number multiplier.
    #[must_use]
    pub const fn from_multiplier(multiplier: u32) -> Self {
        Self(multiplier.saturating_mul(100))
    }

    /// Returns the rate in hundredths.
    #[must_use]
    pub const fn hundredths(self) -> u32 {
        self.0
    }

    /// `floor(amount × rate)` in whole currency units, or `None` on overflow.
    ///
    /// ```
    /// use campus_points_core::types::{Money, Rate};
    ///
    /// assert_eq!(Rate::from_multiplier(2).apply(Money::from_cents(5500)), Some(110));
    /// assert_eq!(Rate::from_hundredths(150).apply(Money::from_cents(1099)), Some(16));
    /// ```
    #[must_use]
    pub fn apply(self, amount: Money) -> Option<i64> {
        let scaled = i128::from(amount.cents()) * i128::from(self.0);
        i64::try_from(scaled.div_euclid(10_000)).ok()
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}x", self.0 / 100, self.0 % 100)
    }
}

/// Version of a stored entity for optimistic concurrency.
///
/// Every accepted write bumps the version; a commit that names a stale version is
/// rejected as a conflict and re-run from a fresh read.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Version(u64);

impl Version {
    /// The version of a freshly created entity.
    pub const INITIAL: Self = Self(0);

    /// Create a new `Version` with the given value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Get the version number.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }

    /// Get the next version (current + 1).
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

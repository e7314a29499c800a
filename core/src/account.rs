//! Accounts, roles and the acting identity.

use crate::types::{AccountId, PromotionId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error type for `Role` parsing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown role: {0:?}")]
pub struct ParseRoleError(String);

/// Role of an account, ordered by privilege.
///
/// The derived ordering is the role hierarchy: `Regular < Cashier < Manager < Superuser`,
/// so policy checks compare ranks instead of strings.
///
/// ```
/// use campus_points_core::account::Role;
///
/// assert!(Role::Manager >= Role::Cashier);
/// assert!(Role::Regular < Role::Cashier);
/// assert_eq!("superuser".parse::<Role>().unwrap(), Role::Superuser);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Regular campus member
    Regular,
    /// Point-of-sale operator
    Cashier,
    /// Program manager
    Manager,
    /// Administrator
    Superuser,
}

impl Role {
    /// Numeric rank in the hierarchy (0 = regular).
    #[must_use]
    pub const fn rank(self) -> u8 {
        match self {
            Self::Regular => 0,
            Self::Cashier => 1,
            Self::Manager => 2,
            Self::Superuser => 3,
        }
    }

    /// Whether this role is at least as privileged as `required`.
    #[must_use]
    pub const fn at_least(self, required: Self) -> bool {
        self.rank() >= required.rank()
    }

    /// Lowercase name, as used on the wire.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Regular => "regular",
            Self::Cashier => "cashier",
            Self::Manager => "manager",
            Self::Superuser => "superuser",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ParseRoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "regular" => Ok(Self::Regular),
            "cashier" => Ok(Self::Cashier),
            "manager" => Ok(Self::Manager),
            "superuser" => Ok(Self::Superuser),
            _ => Err(ParseRoleError(s.to_string())),
        }
    }
}

/// A points account.
///
/// `balance` is only ever written by the ledger and always equals the sum of the deltas
/// of the account's transactions. `consumed_promotions` is the set of one-time promotions
/// this account has already benefited from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// External identity
    pub id: AccountId,
    /// Display name
    pub name: String,
    /// Privilege level
    pub role: Role,
    /// Whether the account has been verified by staff
    pub verified: bool,
    /// Whether the account is flagged for review
    pub suspicious: bool,
    /// Current point balance
    pub balance: i64,
    /// One-time promotions already applied to this account
    pub consumed_promotions: BTreeSet<PromotionId>,
    /// Registration time
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// Creates a new, unverified account with a zero balance.
    #[must_use]
    pub fn new(id: AccountId, name: impl Into<String>, role: Role, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            name: name.into(),
            role,
            verified: false,
            suspicious: false,
            balance: 0,
            consumed_promotions: BTreeSet::new(),
            created_at,
        }
    }

    /// Marks the account verified.
    #[must_use]
    pub const fn verified(mut self) -> Self {
        self.verified = true;
        self
    }

    /// Whether the given one-time promotion was already consumed.
    #[must_use]
    pub fn has_consumed(&self, promotion: PromotionId) -> bool {
        self.consumed_promotions.contains(&promotion)
    }

    /// Whether the balance covers `points`.
    #[must_use]
    pub const fn can_afford(&self, points: i64) -> bool {
        self.balance >= points
    }
}

/// The authenticated identity performing an operation.
///
/// Supplied by the session layer and trusted as-is; the ledger never re-derives role or
/// verification from the account store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    /// Identity of the acting account
    pub id: AccountId,
    /// Role tag carried by the session
    pub role: Role,
    /// Whether the acting account is verified
    pub verified: bool,
    /// Whether the acting account is flagged for review
    pub suspicious: bool,
}

impl Actor {
    /// Creates a verified, unflagged actor.
    #[must_use]
    pub fn new(id: impl Into<AccountId>, role: Role) -> Self {
        Self {
            id: id.into(),
            role,
            verified: true,
            suspicious: false,
        }
    }

    /// Overrides the verified flag.
    #[must_use]
    pub const fn with_verified(mut self, verified: bool) -> Self {
        self.verified = verified;
        self
    }

    /// Overrides the suspicious flag.
    #[must_use]
    pub const fn with_suspicious(mut self, suspicious: bool) -> Self {
        self.suspicious = suspicious;
        self
    }
}

impl From<&Account> for Actor {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id.clone(),
            role: account.role,
            verified: account.verified,
            suspicious: account.suspicious,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn role_hierarchy() {
        assert!(Role::Superuser.at_least(Role::Manager));
        assert!(Role::Cashier.at_least(Role::Cashier));
        assert!(!Role::Regular.at_least(Role::Cashier));
        assert!(!Role::Manager.at_least(Role::Superuser));
    }

    #[test]
    fn role_parse_is_case_insensitive() {
        assert_eq!("Manager".parse::<Role>(), Ok(Role::Manager));
        assert!("admin".parse::<Role>().is_err());
    }

    #[test]
    fn role_serializes_lowercase() {
        let json = serde_json::to_string(&Role::Cashier).unwrap();
        assert_eq!(json, "\"cashier\"");
    }

    #[test]
    fn new_account_starts_empty_and_unverified() {
        let account = Account::new(AccountId::new("user0003"), "Bob Smith", Role::Regular, Utc::now());
        assert_eq!(account.balance, 0);
        assert!(!account.verified);
        assert!(account.consumed_promotions.is_empty());
    }

    #[test]
    fn actor_from_account_copies_flags() {
        let mut account = Account::new(AccountId::new("cashier01"), "Cashier", Role::Cashier, Utc::now()).verified();
        account.suspicious = true;
        let actor = Actor::from(&account);
        assert_eq!(actor.role, Role::Cashier);
        assert!(actor.verified);
        assert!(actor.suspicious);
    }
}

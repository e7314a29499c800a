//! Authorization gate: who may create which transaction against which account.
//!
//! The policy is a pure function of the actor, the transaction kind and the target
//! account. Balance sufficiency is not checked here; that belongs to the ledger, which
//! reports it as a distinct error.
//!
//! | Kind               | Actor requirement                                   |
//! |--------------------|-----------------------------------------------------|
//! | `purchase`, `event`| role ≥ cashier, target verified                     |
//! | `redemption`       | the target itself, or role ≥ cashier on a verified target |
//! | `transfer`         | the sending account itself                          |
//! | `adjustment`       | role ≥ manager                                      |
//! | `promotion-credit` | never (issued internally)                           |
//!
//! Every kind additionally requires a verified actor.

use crate::account::{Account, Actor, Role};
use crate::transaction::TransactionKind;
use crate::types::AccountId;
use thiserror::Error;

/// Reason an actor was denied.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Denial {
    /// Role below what the transaction kind requires.
    #[error("{kind} requires role {required} or higher, actor has {actual}")]
    InsufficientRole {
        /// Transaction kind attempted
        kind: TransactionKind,
        /// Minimum role
        required: Role,
        /// Actor's role
        actual: Role,
    },

    /// The actor's own account is not verified.
    #[error("actor {0} is not verified")]
    UnverifiedActor(AccountId),

    /// The target account is not verified.
    #[error("account {0} is not verified")]
    UnverifiedAccount(AccountId),

    /// The actor may only act on its own account for this kind.
    #[error("actor {actor} cannot create {kind} transactions for account {account}")]
    NotAccountOwner {
        /// Transaction kind attempted
        kind: TransactionKind,
        /// Acting identity
        actor: AccountId,
        /// Targeted account
        account: AccountId,
    },

    /// The kind is issued internally and cannot be requested.
    #[error("{0} transactions cannot be requested directly")]
    NotAuthorizable(TransactionKind),
}

/// Role-and-ownership policy consulted before every ledger mutation.
#[derive(Clone, Copy, Debug, Default)]
pub struct AuthorizationGate;

impl AuthorizationGate {
    /// Creates the gate.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Decide whether `actor` may create a `kind` transaction against `target`.
    ///
    /// # Errors
    ///
    /// Returns the [`Denial`] reason when the policy table rejects the request.
    pub fn authorize(
        &self,
        actor: &Actor,
        kind: TransactionKind,
        target: &Account,
    ) -> Result<(), Denial> {
        if kind == TransactionKind::PromotionCredit {
            return Err(Denial::NotAuthorizable(kind));
        }

        if !actor.verified {
            return Err(Denial::UnverifiedActor(actor.id.clone()));
        }

        match kind {
            TransactionKind::Purchase | TransactionKind::Event => {
                Self::require_role(actor, kind, Role::Cashier)?;
                Self::require_verified_target(target)
            }
            TransactionKind::Redemption => {
                if actor.id == target.id {
                    return Ok(());
                }
                Self::require_role(actor, kind, Role::Cashier)?;
                Self::require_verified_target(target)
            }
            TransactionKind::Transfer => {
                if actor.id == target.id {
                    Ok(())
                } else {
                    Err(Denial::NotAccountOwner {
                        kind,
                        actor: actor.id.clone(),
                        account: target.id.clone(),
                    })
                }
            }
            TransactionKind::Adjustment => Self::require_role(actor, kind, Role::Manager),
            TransactionKind::PromotionCredit => Err(Denial::NotAuthorizable(kind)),
        }
    }

    fn require_role(actor: &Actor, kind: TransactionKind, required: Role) -> Result<(), Denial> {
        if actor.role.at_least(required) {
            Ok(())
        } else {
            Err(Denial::InsufficientRole {
                kind,
                required,
                actual: actor.role,
            })
        }
    }

    fn require_verified_target(target: &Account) -> Result<(), Denial> {
        if target.verified {
            Ok(())
        } else {
            Err(Denial::UnverifiedAccount(target.id.clone()))
        }
    }
}

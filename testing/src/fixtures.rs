//! Ledger fixtures.
//!
//! [`LedgerFixtureBuilder`] registers accounts, promotions and events in a fresh
//! [`InMemoryLedgerStore`] and funds opening balances through manager adjustments, so
//! every fixture starts reconciled.

#![allow(clippy::module_name_repetitions)] // LedgerFixture is the natural name

use crate::mocks::{FixedClock, test_clock};
use campus_points_core::{
    Account, AccountId, Actor, EventPool, LedgerError, LedgerStore, Promotion, Role,
};
use campus_points_runtime::{InMemoryLedgerStore, Ledger, RetryPolicy};
use std::sync::Arc;

/// Manager identity used to fund opening balances. It is never registered.
pub const FUNDING_MANAGER: &str = "fixture-manager";

/// A ready ledger over an in-memory store.
pub struct LedgerFixture {
    /// The backing store, for administration calls
    pub store: Arc<InMemoryLedgerStore>,
    /// The ledger under test
    pub ledger: Ledger,
    /// The clock the ledger reads
    pub clock: FixedClock,
    /// The retry policy the ledger uses
    pub retry: RetryPolicy,
}

impl LedgerFixture {
    /// Start building a fixture.
    #[must_use]
    pub fn builder() -> LedgerFixtureBuilder {
        LedgerFixtureBuilder::default()
    }

    /// A second ledger over `store` sharing this fixture's clock and retry policy.
    ///
    /// Used to drive the fixture's data through a decorated store.
    #[must_use]
    pub fn ledger_over(&self, store: Arc<dyn LedgerStore>) -> Ledger {
        Ledger::new(store, Arc::new(self.clock)).with_retry_policy(self.retry.clone())
    }

    /// The actor that funded opening balances.
    #[must_use]
    pub fn funding_manager() -> Actor {
        Actor::new(FUNDING_MANAGER, Role::Manager)
    }
}

/// Builder for [`LedgerFixture`].
pub struct LedgerFixtureBuilder {
    accounts: Vec<(Account, i64)>,
    promotions: Vec<Promotion>,
    events: Vec<EventPool>,
    clock: FixedClock,
    retry: RetryPolicy,
}

impl Default for LedgerFixtureBuilder {
    fn default() -> Self {
        Self {
            accounts: Vec::new(),
            promotions: Vec::new(),
            events: Vec::new(),
            clock: test_clock(),
            retry: RetryPolicy::builder().jitter(false).build(),
        }
    }
}

impl LedgerFixtureBuilder {
    /// A verified regular member with an opening balance.
    #[must_use]
    pub fn member(self, id: &str, balance: i64) -> Self {
        self.account_with_role(id, Role::Regular, balance)
    }

    /// A verified account of any role with an opening balance.
    #[must_use]
    pub fn account_with_role(self, id: &str, role: Role, balance: i64) -> Self {
        let created_at = chrono::DateTime::UNIX_EPOCH;
        let account = Account::new(AccountId::new(id), id, role, created_at).verified();
        self.account(account, balance)
    }

    /// An arbitrary account with an opening balance.
    #[must_use]
    pub fn account(mut self, account: Account, balance: i64) -> Self {
        self.accounts.push((account, balance));
        self
    }

    /// A promotion in the catalog.
    #[must_use]
    pub fn promotion(mut self, promotion: Promotion) -> Self {
        self.promotions.push(promotion);
        self
    }

    /// An event pool, stored with its guest list and published flag as given.
    #[must_use]
    pub fn event(mut self, pool: EventPool) -> Self {
        self.events.push(pool);
        self
    }

    /// Override the clock.
    #[must_use]
    pub const fn clock(mut self, clock: FixedClock) -> Self {
        self.clock = clock;
        self
    }

    /// Override the retry policy.
    #[must_use]
    pub fn retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Register everything and fund opening balances.
    ///
    /// # Errors
    ///
    /// Returns the store or ledger error if registration or funding fails.
    pub async fn build(self) -> Result<LedgerFixture, LedgerError> {
        let store = Arc::new(InMemoryLedgerStore::new());
        for (account, _) in &self.accounts {
            store.register_account(account.clone()).await?;
        }
        for promotion in self.promotions {
            store.put_promotion(promotion).await;
        }
        for pool in self.events {
            store.create_event(pool).await?;
        }

        let ledger = Ledger::new(store.clone(), Arc::new(self.clock)).with_retry_policy(self.retry.clone());
        let manager = LedgerFixture::funding_manager();
        for (account, balance) in &self.accounts {
            if *balance != 0 {
                ledger
                    .record_adjustment(&manager, &account.id, *balance, "Opening balance")
                    .await?;
            }
        }

        Ok(LedgerFixture {
            store,
            ledger,
            clock: self.clock,
            retry: self.retry,
        })
    }
}

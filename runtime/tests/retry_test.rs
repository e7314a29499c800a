//! Conflict retry integration tests.
//!
//! Drives the ledger through a store that makes commits lose optimistic concurrency
//! races, checking transparent recovery and the transient failure surfaced once the
//! retry budget is spent.

#![allow(clippy::unwrap_used)]

use campus_points_core::environment::Clock;
use campus_points_core::store::{StoreFuture, Versioned};
use campus_points_core::{
    Account, AccountId, Actor, CommitBatch, EventId, EventPool, LedgerError, LedgerStore, Money,
    Promotion, PromotionId, PromotionKind, Rate, Role, Transaction, TransactionId,
};
use campus_points_runtime::{InMemoryLedgerStore, RetryPolicy};
use campus_points_testing::{ConflictingStore, LedgerFixture, assert_reconciled, test_clock};
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn id(s: &str) -> AccountId {
    AccountId::new(s)
}

fn quick_retry(max_retries: u32) -> RetryPolicy {
    RetryPolicy::builder()
        .max_retries(max_retries)
        .initial_delay(Duration::from_millis(1))
        .max_delay(Duration::from_millis(2))
        .jitter(false)
        .build()
}

async fn fixture(max_retries: u32) -> LedgerFixture {
    LedgerFixture::builder()
        .member("user0001", 100)
        .member("user0002", 0)
        .retry_policy(quick_retry(max_retries))
        .build()
        .await
        .unwrap()
}

/// Replaces a promotion just before the first commit lands, as an admin editing the
/// catalog while a purchase is in flight would.
struct CatalogEditingStore {
    inner: Arc<InMemoryLedgerStore>,
    edit: Mutex<Option<Promotion>>,
}

impl LedgerStore for CatalogEditingStore {
    fn load_account<'a>(&'a self, id: &'a AccountId) -> StoreFuture<'a, Versioned<Account>> {
        self.inner.load_account(id)
    }

    fn load_event(&self, id: EventId) -> StoreFuture<'_, Versioned<EventPool>> {
        self.inner.load_event(id)
    }

    fn load_promotions(&self) -> StoreFuture<'_, Versioned<Vec<Promotion>>> {
        self.inner.load_promotions()
    }

    fn load_transactions<'a>(&'a self, account: &'a AccountId) -> StoreFuture<'a, Vec<Transaction>> {
        self.inner.load_transactions(account)
    }

    fn load_transaction(&self, id: TransactionId) -> StoreFuture<'_, Transaction> {
        self.inner.load_transaction(id)
    }

    fn load_log(&self) -> StoreFuture<'_, Vec<Transaction>> {
        self.inner.load_log()
    }

    fn commit(&self, batch: CommitBatch) -> StoreFuture<'_, Vec<Transaction>> {
        let edit = self.edit.lock().unwrap().take();
        Box::pin(async move {
            if let Some(promotion) = edit {
                self.inner.put_promotion(promotion).await;
            }
            self.inner.commit(batch).await
        })
    }
}

fn flash_sale(bonus_points: i64, ends_in: chrono::Duration) -> Promotion {
    let now = test_clock().now();
    Promotion {
        id: PromotionId::new(7),
        name: "Flash Sale".to_string(),
        kind: PromotionKind::Automatic,
        starts_at: now - chrono::Duration::days(1),
        ends_at: now + ends_in,
        min_spend: Money::ZERO,
        rate: Rate::ONE,
        bonus_points,
    }
}

#[tokio::test]
async fn catalog_edit_during_purchase_is_recomputed() {
    let fixture = LedgerFixture::builder()
        .member("user0001", 0)
        .promotion(flash_sale(500, chrono::Duration::days(1)))
        .retry_policy(quick_retry(3))
        .build()
        .await
        .unwrap();
    let store = Arc::new(CatalogEditingStore {
        inner: fixture.store.clone(),
        edit: Mutex::new(Some(flash_sale(500, -chrono::Duration::hours(1)))),
    });
    let ledger = fixture.ledger_over(store);

    let record = ledger
        .record_purchase(&Actor::new("cashier01", Role::Cashier), &id("user0001"), Money::from_dollars(10), "")
        .await
        .unwrap();

    // The sale ended before the commit, so only base points are earned.
    assert_eq!(record.points, 10);
    assert!(record.promotion_ids.is_empty());
    assert_eq!(ledger.balance(&id("user0001")).await.unwrap(), 10);
    assert_reconciled(&ledger, &[id("user0001")]).await;
}

#[tokio::test]
async fn conflicts_within_budget_are_invisible() {
    let fixture = fixture(3).await;
    let store = Arc::new(ConflictingStore::new(fixture.store.clone(), 2));
    let ledger = fixture.ledger_over(store.clone());

    let (debit, credit) = ledger
        .record_transfer(&Actor::new("user0001", Role::Regular), &id("user0001"), &id("user0002"), 40, "")
        .await
        .unwrap();

    assert_eq!(debit.points, -40);
    assert_eq!(credit.points, 40);
    assert_eq!(store.commit_attempts(), 3);
    assert_eq!(ledger.balance(&id("user0001")).await.unwrap(), 60);
    assert_reconciled(&ledger, &[id("user0001"), id("user0002")]).await;
}

#[tokio::test]
async fn exhausted_budget_is_transient_and_writes_nothing() {
    let fixture = fixture(2).await;
    let log_before = fixture.ledger.ledger_log().await.unwrap();
    let store = Arc::new(ConflictingStore::always(fixture.store.clone()));
    let ledger = fixture.ledger_over(store.clone());

    let err = ledger
        .record_purchase(&Actor::new("cashier01", Role::Cashier), &id("user0001"), Money::from_dollars(5), "")
        .await
        .unwrap_err();

    assert_eq!(err, LedgerError::TransientFailure { attempts: 3 });
    assert!(err.is_retryable());
    assert_eq!(store.commit_attempts(), 3);
    assert_eq!(ledger.balance(&id("user0001")).await.unwrap(), 100);
    assert_eq!(ledger.ledger_log().await.unwrap(), log_before);
}

#[tokio::test]
async fn no_retry_policy_fails_on_first_conflict() {
    let fixture = fixture(0).await;
    let store = Arc::new(ConflictingStore::new(fixture.store.clone(), 1));
    let ledger = fixture.ledger_over(store.clone());

    let err = ledger
        .record_redemption(&Actor::new("user0001", Role::Regular), &id("user0001"), 10, "")
        .await
        .unwrap_err();
    assert_eq!(err, LedgerError::TransientFailure { attempts: 1 });

    // The caller retries the same request and it goes through.
    ledger
        .record_redemption(&Actor::new("user0001", Role::Regular), &id("user0001"), 10, "")
        .await
        .unwrap();
    assert_eq!(ledger.balance(&id("user0001")).await.unwrap(), 90);
}

#[tokio::test]
async fn business_rejections_are_not_retried() {
    let fixture = fixture(5).await;
    let store = Arc::new(ConflictingStore::new(fixture.store.clone(), 0));
    let ledger = fixture.ledger_over(store.clone());

    let err = ledger
        .record_redemption(&Actor::new("user0002", Role::Regular), &id("user0002"), 10, "")
        .await
        .unwrap_err();

    assert!(matches!(err, LedgerError::InsufficientBalance { .. }));
    assert!(!err.is_retryable());
    assert_eq!(store.commit_attempts(), 0);
}

#[test]
fn default_policy_matches_documented_budget() {
    let policy = RetryPolicy::default();
    assert_eq!(policy.max_retries, 5);
    assert_eq!(policy.initial_delay, Duration::from_millis(2));
    assert_eq!(policy.max_delay, Duration::from_millis(100));
    assert!(RetryPolicy::no_retry().max_retries == 0);
}

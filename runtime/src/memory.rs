//! In-memory arena store.
//!
//! Each account and event pool sits behind its own async mutex, keyed by identity. A
//! commit locks exactly the entities it writes, in the global order defined by
//! [`EntityRef`], validates every version, then applies everything and appends the
//! records to the log before releasing any lock. Operations on disjoint entities never
//! wait on each other apart from the brief log append.
//!
//! The store also carries the administrative surface that registration and the
//! promotion/event admin screens would drive (`register_account`, `put_promotion`,
//! `create_event`, ...). Admin writes bump entity versions so they race correctly with
//! in-flight ledger operations. Catalog edits bump one catalog-wide version, which a
//! purchase commit names, so a bonus is never granted under a promotion that changed
//! after it was read. None of them touch balances or pool counts.

use campus_points_core::store::{CommitBatch, EntityRef, StoreError, StoreFuture, Versioned};
use campus_points_core::{
    Account, AccountId, EventId, EventPool, LedgerStore, Promotion, PromotionId, Role,
    Transaction, TransactionId, Version,
};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

type Slot<T> = Arc<Mutex<Versioned<T>>>;

/// Arena of accounts, event pools, promotions and the append-only transaction log.
#[derive(Default)]
pub struct InMemoryLedgerStore {
    accounts: RwLock<HashMap<AccountId, Slot<Account>>>,
    events: RwLock<HashMap<EventId, Slot<EventPool>>>,
    promotions: RwLock<Versioned<BTreeMap<PromotionId, Promotion>>>,
    log: Mutex<Vec<Transaction>>,
}

impl InMemoryLedgerStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // ===== Registration and administration =====

    /// Register a new account. The balance is forced to zero; points only arrive
    /// through the ledger.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyExists` if the id is taken.
    pub async fn register_account(&self, mut account: Account) -> Result<(), StoreError> {
        let mut accounts = self.accounts.write().await;
        if accounts.contains_key(&account.id) {
            return Err(StoreError::AlreadyExists(EntityRef::Account(account.id)));
        }
        account.balance = 0;
        account.consumed_promotions.clear();
        tracing::debug!(account = %account.id, role = %account.role, "Account registered");
        accounts.insert(
            account.id.clone(),
            Arc::new(Mutex::new(Versioned::new(account, Version::INITIAL))),
        );
        Ok(())
    }

    /// Set the verified flag.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the account does not exist.
    pub async fn set_verified(&self, id: &AccountId, verified: bool) -> Result<(), StoreError> {
        self.update_account(id, |account| account.verified = verified).await
    }

    /// Set the suspicious flag.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the account does not exist.
    pub async fn set_suspicious(&self, id: &AccountId, suspicious: bool) -> Result<(), StoreError> {
        self.update_account(id, |account| account.suspicious = suspicious).await
    }

    /// Change the role.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the account does not exist.
    pub async fn set_role(&self, id: &AccountId, role: Role) -> Result<(), StoreError> {
        self.update_account(id, |account| account.role = role).await
    }

    /// Create or replace a promotion definition.
    pub async fn put_promotion(&self, promotion: Promotion) {
        let mut catalog = self.promotions.write().await;
        catalog.version = catalog.version.next();
        tracing::debug!(
            promotion = %promotion.id,
            kind = ?promotion.kind,
            catalog_version = %catalog.version,
            "Promotion stored"
        );
        catalog.value.insert(promotion.id, promotion);
    }

    /// Create an event pool. The pool starts full: `remaining` is reset to `capacity`,
    /// points only leave it through the ledger.
    ///
    /// # Errors
    ///
    /// Returns `InvalidEntity` if the capacity is negative and `AlreadyExists` if the id
    /// is taken.
    pub async fn create_event(&self, mut pool: EventPool) -> Result<(), StoreError> {
        if pool.capacity < 0 {
            return Err(StoreError::InvalidEntity {
                entity: EntityRef::Event(pool.id),
                reason: format!("capacity {} is negative", pool.capacity),
            });
        }
        pool.remaining = pool.capacity;

        let mut events = self.events.write().await;
        if events.contains_key(&pool.id) {
            return Err(StoreError::AlreadyExists(EntityRef::Event(pool.id)));
        }
        tracing::debug!(event = %pool.id, capacity = pool.capacity, "Event pool created");
        events.insert(pool.id, Arc::new(Mutex::new(Versioned::new(pool, Version::INITIAL))));
        Ok(())
    }

    /// Add an account to an event's guest list.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the event or the account does not exist.
    pub async fn add_guest(&self, event: EventId, guest: &AccountId) -> Result<(), StoreError> {
        if !self.accounts.read().await.contains_key(guest) {
            return Err(StoreError::NotFound(EntityRef::Account(guest.clone())));
        }
        let guest = guest.clone();
        self.update_event(event, move |pool| {
            pool.guests.insert(guest);
        })
        .await
    }

    /// Remove an account from an event's guest list.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the event does not exist.
    pub async fn remove_guest(&self, event: EventId, guest: &AccountId) -> Result<(), StoreError> {
        self.update_event(event, |pool| {
            pool.guests.remove(guest);
        })
        .await
    }

    /// Set the published flag.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the event does not exist.
    pub async fn set_published(&self, event: EventId, published: bool) -> Result<(), StoreError> {
        self.update_event(event, |pool| pool.published = published).await
    }

    /// Every registered account id, sorted.
    pub async fn account_ids(&self) -> Vec<AccountId> {
        let mut ids: Vec<AccountId> = self.accounts.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Every event id, sorted.
    pub async fn event_ids(&self) -> Vec<EventId> {
        let mut ids: Vec<EventId> = self.events.read().await.keys().copied().collect();
        ids.sort();
        ids
    }

    // ===== Internals =====

    async fn account_slot(&self, id: &AccountId) -> Result<Slot<Account>, StoreError> {
        self.accounts
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(EntityRef::Account(id.clone())))
    }

    async fn event_slot(&self, id: EventId) -> Result<Slot<EventPool>, StoreError> {
        self.events
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound(EntityRef::Event(id)))
    }

    async fn update_account<F>(&self, id: &AccountId, update: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut Account),
    {
        let slot = self.account_slot(id).await?;
        let mut guard = slot.lock().await;
        update(&mut guard.value);
        guard.version = guard.version.next();
        Ok(())
    }

    async fn update_event<F>(&self, id: EventId, update: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut EventPool),
    {
        let slot = self.event_slot(id).await?;
        let mut guard = slot.lock().await;
        update(&mut guard.value);
        guard.version = guard.version.next();
        Ok(())
    }

    async fn apply(&self, mut batch: CommitBatch) -> Result<Vec<Transaction>, StoreError> {
        let mut seen = HashSet::new();
        for entity in batch.entities() {
            if !seen.insert(entity.clone()) {
                return Err(StoreError::InvalidBatch(format!("{entity} written twice")));
            }
        }

        // Global lock order: accounts by id, then events by id.
        batch.accounts.sort_by(|a, b| a.id.cmp(&b.id));
        batch.events.sort_by_key(|w| w.id);

        let mut account_guards: Vec<OwnedMutexGuard<Versioned<Account>>> =
            Vec::with_capacity(batch.accounts.len());
        for write in &batch.accounts {
            let slot = self.account_slot(&write.id).await?;
            account_guards.push(slot.lock_owned().await);
        }
        let mut event_guards: Vec<OwnedMutexGuard<Versioned<EventPool>>> =
            Vec::with_capacity(batch.events.len());
        for write in &batch.events {
            let slot = self.event_slot(write.id).await?;
            event_guards.push(slot.lock_owned().await);
        }

        // Validate everything before touching anything.
        for (write, guard) in batch.accounts.iter().zip(&account_guards) {
            if guard.version != write.expected {
                return Err(StoreError::Conflict {
                    entity: EntityRef::Account(write.id.clone()),
                    expected: write.expected,
                    actual: guard.version,
                });
            }
            if let Some(promotion) = write.consume.iter().find(|p| guard.value.has_consumed(**p)) {
                return Err(StoreError::PromotionConsumed {
                    promotion: *promotion,
                    account: write.id.clone(),
                });
            }
        }
        for (write, guard) in batch.events.iter().zip(&event_guards) {
            if guard.version != write.expected {
                return Err(StoreError::Conflict {
                    entity: EntityRef::Event(write.id),
                    expected: write.expected,
                    actual: guard.version,
                });
            }
        }

        // Held until the records are appended so no catalog edit lands mid-commit.
        let catalog = match batch.catalog {
            Some(expected) => {
                let catalog = self.promotions.read().await;
                if catalog.version != expected {
                    return Err(StoreError::Conflict {
                        entity: EntityRef::Catalog,
                        expected,
                        actual: catalog.version,
                    });
                }
                Some(catalog)
            }
            None => None,
        };

        for (write, guard) in batch.accounts.iter().zip(account_guards.iter_mut()) {
            guard.value.balance = write.balance;
            guard.value.consumed_promotions.extend(write.consume.iter().copied());
            guard.version = guard.version.next();
        }
        for (write, guard) in batch.events.iter().zip(event_guards.iter_mut()) {
            guard.value.remaining = write.remaining;
            guard.version = guard.version.next();
        }

        let mut log = self.log.lock().await;
        let mut sealed = Vec::with_capacity(batch.transactions.len());
        for draft in batch.transactions {
            let id = TransactionId::new(log.len() as u64 + 1);
            let txn = draft.into_transaction(id);
            log.push(txn.clone());
            sealed.push(txn);
        }
        drop(catalog);
        Ok(sealed)
    }
}

impl LedgerStore for InMemoryLedgerStore {
    fn load_account<'a>(&'a self, id: &'a AccountId) -> StoreFuture<'a, Versioned<Account>> {
        Box::pin(async move {
            let slot = self.account_slot(id).await?;
            let guard = slot.lock().await;
            Ok(guard.clone())
        })
    }

    fn load_event(&self, id: EventId) -> StoreFuture<'_, Versioned<EventPool>> {
        Box::pin(async move {
            let slot = self.event_slot(id).await?;
            let guard = slot.lock().await;
            Ok(guard.clone())
        })
    }

    fn load_promotions(&self) -> StoreFuture<'_, Versioned<Vec<Promotion>>> {
        Box::pin(async move {
            let catalog = self.promotions.read().await;
            Ok(Versioned::new(catalog.value.values().cloned().collect(), catalog.version))
        })
    }

    fn load_transactions<'a>(&'a self, account: &'a AccountId) -> StoreFuture<'a, Vec<Transaction>> {
        Box::pin(async move {
            Ok(self
                .log
                .lock()
                .await
                .iter()
                .filter(|t| &t.account == account)
                .cloned()
                .collect())
        })
    }

    fn load_transaction(&self, id: TransactionId) -> StoreFuture<'_, Transaction> {
        Box::pin(async move {
            let log = self.log.lock().await;
            usize::try_from(id.value())
                .ok()
                .and_then(|n| n.checked_sub(1))
                .and_then(|index| log.get(index))
                .cloned()
                .ok_or(StoreError::TransactionNotFound(id))
        })
    }

    fn load_log(&self) -> StoreFuture<'_, Vec<Transaction>> {
        Box::pin(async move { Ok(self.log.lock().await.clone()) })
    }

    fn commit(&self, batch: CommitBatch) -> StoreFuture<'_, Vec<Transaction>> {
        Box::pin(self.apply(batch))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use campus_points_core::store::{AccountWrite, EventWrite};
    use campus_points_core::{Actor, Money, PromotionKind, Rate, TransactionDraft, TransactionKind};
    use chrono::{Duration, Utc};

    fn promotion(id: u64, bonus_points: i64) -> Promotion {
        Promotion {
            id: PromotionId::new(id),
            name: format!("Promotion {id}"),
            kind: PromotionKind::Automatic,
            starts_at: Utc::now() - Duration::days(1),
            ends_at: Utc::now() + Duration::days(1),
            min_spend: Money::ZERO,
            rate: Rate::ONE,
            bonus_points,
        }
    }

    async fn store_with(ids: &[&str]) -> InMemoryLedgerStore {
        let store = InMemoryLedgerStore::new();
        for id in ids {
            let account = Account::new(AccountId::new(*id), *id, Role::Regular, Utc::now()).verified();
            store.register_account(account).await.unwrap();
        }
        store
    }

    fn draft(account: &str, points: i64) -> TransactionDraft {
        let actor = Actor::new("manager01", Role::Manager);
        TransactionDraft::new(AccountId::new(account), TransactionKind::Adjustment, points, &actor, Utc::now())
    }

    #[tokio::test]
    async fn registration_forces_zero_balance() {
        let store = InMemoryLedgerStore::new();
        let mut account = Account::new(AccountId::new("user0001"), "Regular User", Role::Regular, Utc::now());
        account.balance = 500;
        store.register_account(account.clone()).await.unwrap();

        let loaded = store.load_account(&account.id).await.unwrap();
        assert_eq!(loaded.value.balance, 0);
        assert_eq!(loaded.version, Version::INITIAL);

        let duplicate = store.register_account(account).await;
        assert!(matches!(duplicate, Err(StoreError::AlreadyExists(_))));
    }

    #[tokio::test]
    async fn commit_applies_and_assigns_sequential_ids() {
        let store = store_with(&["user0001", "user0002"]).await;
        let a = store.load_account(&AccountId::new("user0001")).await.unwrap();
        let b = store.load_account(&AccountId::new("user0002")).await.unwrap();

        let sealed = store
            .commit(
                CommitBatch::new()
                    .account(AccountWrite::new(&a, 10))
                    .account(AccountWrite::new(&b, 20))
                    .transaction(draft("user0001", 10))
                    .transaction(draft("user0002", 20)),
            )
            .await
            .unwrap();

        assert_eq!(sealed[0].id, TransactionId::new(1));
        assert_eq!(sealed[1].id, TransactionId::new(2));
        let reloaded = store.load_account(&AccountId::new("user0002")).await.unwrap();
        assert_eq!(reloaded.value.balance, 20);
        assert_eq!(reloaded.version, Version::new(1));
        assert_eq!(store.load_transaction(TransactionId::new(2)).await.unwrap().points, 20);
    }

    #[tokio::test]
    async fn stale_version_writes_nothing() {
        let store = store_with(&["user0001", "user0002"]).await;
        let a = store.load_account(&AccountId::new("user0001")).await.unwrap();
        let b = store.load_account(&AccountId::new("user0002")).await.unwrap();
        store.set_verified(&b.value.id, false).await.unwrap();

        let result = store
            .commit(
                CommitBatch::new()
                    .account(AccountWrite::new(&a, 10))
                    .account(AccountWrite::new(&b, 20))
                    .transaction(draft("user0001", 10)),
            )
            .await;

        assert!(matches!(result, Err(StoreError::Conflict { .. })));
        assert_eq!(store.load_account(&a.value.id).await.unwrap().value.balance, 0);
        assert!(store.load_log().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn consumed_promotion_is_rejected() {
        let store = store_with(&["user0001"]).await;
        let a = store.load_account(&AccountId::new("user0001")).await.unwrap();
        store
            .commit(CommitBatch::new().account(AccountWrite::new(&a, 0).consuming([PromotionId::new(1)])))
            .await
            .unwrap();

        let a = store.load_account(&AccountId::new("user0001")).await.unwrap();
        let result = store
            .commit(CommitBatch::new().account(AccountWrite::new(&a, 0).consuming([PromotionId::new(1)])))
            .await;
        assert!(matches!(result, Err(StoreError::PromotionConsumed { .. })));
    }

    #[tokio::test]
    async fn duplicate_entity_in_batch_is_invalid() {
        let store = store_with(&["user0001"]).await;
        let a = store.load_account(&AccountId::new("user0001")).await.unwrap();
        let result = store
            .commit(
                CommitBatch::new()
                    .account(AccountWrite::new(&a, 1))
                    .account(AccountWrite::new(&a, 2)),
            )
            .await;
        assert!(matches!(result, Err(StoreError::InvalidBatch(_))));
    }

    #[tokio::test]
    async fn event_admin_and_pool_write() {
        let store = store_with(&["user0001"]).await;
        store.create_event(EventPool::new(EventId::new(1), "Welcome Week Kickoff", 500)).await.unwrap();
        store.add_guest(EventId::new(1), &AccountId::new("user0001")).await.unwrap();
        store.set_published(EventId::new(1), true).await.unwrap();

        let missing = store.add_guest(EventId::new(1), &AccountId::new("nobody")).await;
        assert!(matches!(missing, Err(StoreError::NotFound(EntityRef::Account(_)))));

        let pool = store.load_event(EventId::new(1)).await.unwrap();
        assert!(pool.value.published);
        assert!(pool.value.is_guest(&AccountId::new("user0001")));

        store.commit(CommitBatch::new().event(EventWrite::new(&pool, 450))).await.unwrap();
        let pool = store.load_event(EventId::new(1)).await.unwrap();
        assert_eq!(pool.value.remaining, 450);
        assert_eq!(pool.value.points_awarded(), 50);
    }

    #[tokio::test]
    async fn new_pool_starts_full() {
        let store = InMemoryLedgerStore::new();
        let mut pool = EventPool::new(EventId::new(1), "Welcome Week Kickoff", 10);
        pool.remaining = 500;
        store.create_event(pool).await.unwrap();

        let pool = store.load_event(EventId::new(1)).await.unwrap();
        assert_eq!(pool.value.remaining, 10);
        assert_eq!(pool.value.points_awarded(), 0);
    }

    #[tokio::test]
    async fn negative_capacity_is_rejected() {
        let store = InMemoryLedgerStore::new();
        let result = store
            .create_event(EventPool::new(EventId::new(2), "Study Session", -50))
            .await;

        assert!(matches!(
            result,
            Err(StoreError::InvalidEntity { entity: EntityRef::Event(_), .. })
        ));
        assert!(store.event_ids().await.is_empty());
    }

    #[tokio::test]
    async fn catalog_edits_bump_version() {
        let store = InMemoryLedgerStore::new();
        assert_eq!(store.load_promotions().await.unwrap().version, Version::INITIAL);

        store.put_promotion(promotion(1, 100)).await;
        store.put_promotion(promotion(1, 0)).await;

        let catalog = store.load_promotions().await.unwrap();
        assert_eq!(catalog.version, Version::new(2));
        assert_eq!(catalog.value.len(), 1);
        assert_eq!(catalog.value[0].bonus_points, 0);
    }

    #[tokio::test]
    async fn stale_catalog_writes_nothing() {
        let store = store_with(&["user0001"]).await;
        store.put_promotion(promotion(1, 200)).await;
        let catalog = store.load_promotions().await.unwrap();
        let a = store.load_account(&AccountId::new("user0001")).await.unwrap();

        // The promotion is ended between the read and the commit.
        let mut ended = promotion(1, 200);
        ended.ends_at = Utc::now() - Duration::hours(1);
        store.put_promotion(ended).await;

        let result = store
            .commit(
                CommitBatch::new()
                    .account(AccountWrite::new(&a, 210))
                    .transaction(draft("user0001", 210))
                    .catalog(catalog.version),
            )
            .await;

        assert!(matches!(
            result,
            Err(StoreError::Conflict { entity: EntityRef::Catalog, .. })
        ));
        assert_eq!(store.load_account(&a.value.id).await.unwrap().value.balance, 0);
        assert!(store.load_log().await.unwrap().is_empty());

        let fresh = store.load_promotions().await.unwrap();
        store
            .commit(
                CommitBatch::new()
                    .account(AccountWrite::new(&a, 10))
                    .transaction(draft("user0001", 10))
                    .catalog(fresh.version),
            )
            .await
            .unwrap();
        assert_eq!(store.load_account(&a.value.id).await.unwrap().value.balance, 10);
    }
}

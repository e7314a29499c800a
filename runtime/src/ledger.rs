//! The ledger service.
//!
//! Every balance change passes through [`Ledger`]. Each operation is one
//! read-decide-commit unit:
//!
//! 1. load versioned snapshots of the accounts and event pool involved
//! 2. consult the [`AuthorizationGate`] and, for purchases, the [`RulesEngine`]
//! 3. validate balances, pools and guest lists against the snapshots
//! 4. hand the store one [`CommitBatch`] naming the versions it read
//!
//! If a concurrent writer got there first the store rejects the batch and the unit is
//! re-run from fresh snapshots, up to the retry budget of the [`RetryPolicy`]. Nothing is
//! written by a rejected or abandoned unit.

use crate::metrics::LedgerMetrics;
use crate::retry::{RetryError, RetryPolicy, retry_with_predicate};
use campus_points_core::environment::Clock;
use campus_points_core::store::{AccountWrite, EventWrite};
use campus_points_core::{
    Account, AccountId, Actor, AuthorizationGate, CommitBatch, CorrelationId, EventId, EventPool,
    LedgerError, LedgerStore, Money, RelatedRef, RulesEngine, Transaction, TransactionDraft,
    TransactionId, TransactionKind,
};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

/// Balance versus the sum of an account's recorded deltas.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Reconciliation {
    /// Stored balance
    pub balance: i64,
    /// Sum of the account's transaction deltas
    pub ledger_sum: i64,
    /// Number of transactions owned by the account
    pub transaction_count: usize,
}

impl Reconciliation {
    /// Whether the stored balance matches the log.
    #[must_use]
    pub const fn is_consistent(&self) -> bool {
        self.balance == self.ledger_sum
    }
}

/// The single writer of balances, consumption markers and pool counts.
pub struct Ledger {
    store: Arc<dyn LedgerStore>,
    clock: Arc<dyn Clock>,
    retry: RetryPolicy,
    gate: AuthorizationGate,
    rules: RulesEngine,
}

impl Ledger {
    /// Create a ledger over `store` with the default retry policy.
    #[must_use]
    pub fn new(store: Arc<dyn LedgerStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            retry: RetryPolicy::default(),
            gate: AuthorizationGate::new(),
            rules: RulesEngine::new(),
        }
    }

    /// Replace the conflict retry policy.
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// The retry policy in effect.
    #[must_use]
    pub const fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    // ===== Operations =====

    /// Record a purchase of `amount` on `account`, crediting base points plus every
    /// eligible promotion and consuming any one-time promotions applied.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::InvalidAmount`] if `amount` is negative
    /// - [`LedgerError::Unauthorized`], [`LedgerError::UnverifiedActor`] or
    ///   [`LedgerError::UnverifiedAccount`] if the gate denies
    /// - [`LedgerError::AccountNotFound`] if the account does not exist
    /// - [`LedgerError::TransientFailure`] if commit conflicts outlast the retry budget
    #[tracing::instrument(skip_all, fields(actor = %actor.id, account = %account, amount = %amount))]
    pub async fn record_purchase(
        &self,
        actor: &Actor,
        account: &AccountId,
        amount: Money,
        remark: &str,
    ) -> Result<Transaction, LedgerError> {
        let records = self
            .run(TransactionKind::Purchase, || {
                self.try_purchase(actor, account, amount, remark)
            })
            .await?;
        single(records)
    }

    /// Record a redemption of `points` from `account`.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::InvalidAmount`] if `points` is not positive
    /// - [`LedgerError::InsufficientBalance`] if the balance cannot cover `points`
    /// - gate denials, [`LedgerError::AccountNotFound`] and
    ///   [`LedgerError::TransientFailure`] as for purchases
    #[tracing::instrument(skip_all, fields(actor = %actor.id, account = %account, points = points))]
    pub async fn record_redemption(
        &self,
        actor: &Actor,
        account: &AccountId,
        points: i64,
        remark: &str,
    ) -> Result<Transaction, LedgerError> {
        let records = self
            .run(TransactionKind::Redemption, || {
                self.try_redemption(actor, account, points, remark)
            })
            .await?;
        single(records)
    }

    /// Move `points` from `from` to `to`. Returns the linked `(debit, credit)` pair.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::SelfTransfer`] if `from == to`
    /// - [`LedgerError::InvalidAmount`] if `points` is not positive
    /// - [`LedgerError::Unauthorized`] unless the actor is the sender
    /// - [`LedgerError::InsufficientBalance`] if the sender cannot cover `points`
    /// - [`LedgerError::AccountNotFound`] if either account does not exist
    /// - [`LedgerError::TransientFailure`] if commit conflicts outlast the retry budget
    #[tracing::instrument(skip_all, fields(actor = %actor.id, from = %from, to = %to, points = points))]
    pub async fn record_transfer(
        &self,
        actor: &Actor,
        from: &AccountId,
        to: &AccountId,
        points: i64,
        remark: &str,
    ) -> Result<(Transaction, Transaction), LedgerError> {
        let records = self
            .run(TransactionKind::Transfer, || {
                self.try_transfer(actor, from, to, points, remark)
            })
            .await?;

        let mut records = records.into_iter();
        match (records.next(), records.next(), records.next()) {
            (Some(debit), Some(credit), None) => Ok((debit, credit)),
            _ => Err(LedgerError::Storage(
                "transfer commit did not return a debit/credit pair".to_string(),
            )),
        }
    }

    /// Apply a manager adjustment of `delta` (positive or negative) to `account`.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::InvalidAmount`] if `delta` is zero
    /// - [`LedgerError::Unauthorized`] unless the actor is a manager or superuser
    /// - [`LedgerError::InsufficientBalance`] if the balance would go negative
    /// - [`LedgerError::AccountNotFound`] and [`LedgerError::TransientFailure`] as above
    #[tracing::instrument(skip_all, fields(actor = %actor.id, account = %account, delta = delta))]
    pub async fn record_adjustment(
        &self,
        actor: &Actor,
        account: &AccountId,
        delta: i64,
        remark: &str,
    ) -> Result<Transaction, LedgerError> {
        let records = self
            .run(TransactionKind::Adjustment, || {
                self.try_adjustment(actor, account, delta, remark)
            })
            .await?;
        single(records)
    }

    /// Award `points` from `event`'s pool to `account`.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::InvalidAmount`] if `points` is not positive
    /// - gate denials as for purchases
    /// - [`LedgerError::EventNotPublished`] if the event is not published
    /// - [`LedgerError::NotAGuest`] if `account` is not on the guest list
    /// - [`LedgerError::PoolExhausted`] if the pool cannot cover `points`
    /// - [`LedgerError::EventNotFound`], [`LedgerError::AccountNotFound`] and
    ///   [`LedgerError::TransientFailure`]
    #[tracing::instrument(skip_all, fields(actor = %actor.id, event = %event, account = %account, points = points))]
    pub async fn record_event_award(
        &self,
        actor: &Actor,
        event: EventId,
        account: &AccountId,
        points: i64,
        remark: &str,
    ) -> Result<Transaction, LedgerError> {
        let records = self
            .run(TransactionKind::Event, || {
                self.try_event_award(actor, event, account, points, remark)
            })
            .await?;
        single(records)
    }

    /// Award `points` to every guest of `event` in one commit. Records are returned in
    /// guest id order.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::InvalidAmount`] if `points` is not positive or there are no guests
    /// - [`LedgerError::PoolExhausted`] if the pool cannot cover `points` for every guest
    /// - otherwise as [`Ledger::record_event_award`]
    #[tracing::instrument(skip_all, fields(actor = %actor.id, event = %event, points = points))]
    pub async fn record_event_award_all(
        &self,
        actor: &Actor,
        event: EventId,
        points: i64,
        remark: &str,
    ) -> Result<Vec<Transaction>, LedgerError> {
        self.run(TransactionKind::Event, || {
            self.try_event_award_all(actor, event, points, remark)
        })
        .await
    }

    // ===== Queries =====

    /// Current balance of `account`.
    ///
    /// # Errors
    ///
    /// [`LedgerError::AccountNotFound`] if the account does not exist.
    pub async fn balance(&self, account: &AccountId) -> Result<i64, LedgerError> {
        Ok(self.store.load_account(account).await?.value.balance)
    }

    /// Current state of `account`.
    ///
    /// # Errors
    ///
    /// [`LedgerError::AccountNotFound`] if the account does not exist.
    pub async fn account(&self, account: &AccountId) -> Result<Account, LedgerError> {
        Ok(self.store.load_account(account).await?.value)
    }

    /// Current state of `event`'s pool.
    ///
    /// # Errors
    ///
    /// [`LedgerError::EventNotFound`] if the event does not exist.
    pub async fn event(&self, event: EventId) -> Result<EventPool, LedgerError> {
        Ok(self.store.load_event(event).await?.value)
    }

    /// Every record owned by `account`, oldest first.
    ///
    /// # Errors
    ///
    /// [`LedgerError::AccountNotFound`] if the account does not exist.
    pub async fn transactions_for(&self, account: &AccountId) -> Result<Vec<Transaction>, LedgerError> {
        self.store.load_account(account).await?;
        Ok(self.store.load_transactions(account).await?)
    }

    /// One record by id.
    ///
    /// # Errors
    ///
    /// [`LedgerError::TransactionNotFound`] if there is no such record.
    pub async fn transaction(&self, id: TransactionId) -> Result<Transaction, LedgerError> {
        Ok(self.store.load_transaction(id).await?)
    }

    /// The whole log, oldest first.
    ///
    /// # Errors
    ///
    /// [`LedgerError::Storage`] if the backend fails.
    pub async fn ledger_log(&self) -> Result<Vec<Transaction>, LedgerError> {
        Ok(self.store.load_log().await?)
    }

    /// Compare `account`'s balance with the sum of its recorded deltas.
    ///
    /// The balance and the log are read separately, so the result is only meaningful
    /// while no operation on the account is in flight.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::AccountNotFound`] if the account does not exist
    /// - [`LedgerError::Overflow`] if the sum does not fit
    pub async fn reconcile(&self, account: &AccountId) -> Result<Reconciliation, LedgerError> {
        let balance = self.balance(account).await?;
        let records = self.store.load_transactions(account).await?;
        let ledger_sum = records
            .iter()
            .try_fold(0_i64, |sum, t| sum.checked_add(t.points))
            .ok_or(LedgerError::Overflow)?;
        Ok(Reconciliation {
            balance,
            ledger_sum,
            transaction_count: records.len(),
        })
    }

    // ===== Read-decide-commit units =====

    async fn try_purchase(
        &self,
        actor: &Actor,
        account: &AccountId,
        amount: Money,
        remark: &str,
    ) -> Result<Vec<Transaction>, LedgerError> {
        if amount.is_negative() {
            return Err(LedgerError::InvalidAmount(format!(
                "purchase amount {amount} is negative"
            )));
        }

        let snapshot = self.store.load_account(account).await?;
        self.gate.authorize(actor, TransactionKind::Purchase, &snapshot.value)?;

        let catalog = self.store.load_promotions().await?;
        let bonus = self
            .rules
            .compute_bonus(&snapshot.value, amount, self.clock.now(), &catalog.value)?;

        if let Some(promotion) = bonus
            .consumed
            .iter()
            .find(|p| snapshot.value.has_consumed(**p))
        {
            return Err(LedgerError::PromotionAlreadyConsumed {
                promotion: *promotion,
                account: account.clone(),
            });
        }

        let points = bonus.total()?;
        let balance = snapshot
            .value
            .balance
            .checked_add(points)
            .ok_or(LedgerError::Overflow)?;

        tracing::debug!(
            base = bonus.base,
            promotional = bonus.promotional,
            applied = bonus.applied.len(),
            "Purchase points computed"
        );

        let draft = TransactionDraft::new(
            account.clone(),
            TransactionKind::Purchase,
            points,
            actor,
            self.clock.now(),
        )
        .with_spent(amount)
        .with_promotions(bonus.applied.clone())
        .with_remark(remark);

        let batch = CommitBatch::new()
            .account(AccountWrite::new(&snapshot, balance).consuming(bonus.consumed.iter().copied()))
            .transaction(draft)
            .catalog(catalog.version);
        Ok(self.store.commit(batch).await?)
    }

    async fn try_redemption(
        &self,
        actor: &Actor,
        account: &AccountId,
        points: i64,
        remark: &str,
    ) -> Result<Vec<Transaction>, LedgerError> {
        require_positive(points, "redemption")?;

        let snapshot = self.store.load_account(account).await?;
        self.gate.authorize(actor, TransactionKind::Redemption, &snapshot.value)?;
        let balance = debit(&snapshot.value, points)?;

        let draft = TransactionDraft::new(
            account.clone(),
            TransactionKind::Redemption,
            -points,
            actor,
            self.clock.now(),
        )
        .with_remark(remark);

        let batch = CommitBatch::new()
            .account(AccountWrite::new(&snapshot, balance))
            .transaction(draft);
        Ok(self.store.commit(batch).await?)
    }

    async fn try_transfer(
        &self,
        actor: &Actor,
        from: &AccountId,
        to: &AccountId,
        points: i64,
        remark: &str,
    ) -> Result<Vec<Transaction>, LedgerError> {
        if from == to {
            return Err(LedgerError::SelfTransfer(from.clone()));
        }
        require_positive(points, "transfer")?;

        let sender = self.store.load_account(from).await?;
        self.gate.authorize(actor, TransactionKind::Transfer, &sender.value)?;
        let recipient = self.store.load_account(to).await?;

        let sender_balance = debit(&sender.value, points)?;
        let recipient_balance = recipient
            .value
            .balance
            .checked_add(points)
            .ok_or(LedgerError::Overflow)?;

        let now = self.clock.now();
        let correlation = CorrelationId::new();
        let debit_draft = TransactionDraft::new(from.clone(), TransactionKind::Transfer, -points, actor, now)
            .with_related(RelatedRef::Counterparty(to.clone()))
            .with_correlation(correlation)
            .with_remark(remark);
        let credit_draft = TransactionDraft::new(to.clone(), TransactionKind::Transfer, points, actor, now)
            .with_related(RelatedRef::Counterparty(from.clone()))
            .with_correlation(correlation)
            .with_remark(remark);

        let batch = CommitBatch::new()
            .account(AccountWrite::new(&sender, sender_balance))
            .account(AccountWrite::new(&recipient, recipient_balance))
            .transaction(debit_draft)
            .transaction(credit_draft);
        Ok(self.store.commit(batch).await?)
    }

    async fn try_adjustment(
        &self,
        actor: &Actor,
        account: &AccountId,
        delta: i64,
        remark: &str,
    ) -> Result<Vec<Transaction>, LedgerError> {
        if delta == 0 {
            return Err(LedgerError::InvalidAmount("adjustment delta must be non-zero".to_string()));
        }

        let snapshot = self.store.load_account(account).await?;
        self.gate.authorize(actor, TransactionKind::Adjustment, &snapshot.value)?;

        let balance = snapshot
            .value
            .balance
            .checked_add(delta)
            .ok_or(LedgerError::Overflow)?;
        if balance < 0 {
            return Err(LedgerError::InsufficientBalance {
                account: account.clone(),
                balance: snapshot.value.balance,
                requested: delta.saturating_neg(),
            });
        }

        let draft = TransactionDraft::new(
            account.clone(),
            TransactionKind::Adjustment,
            delta,
            actor,
            self.clock.now(),
        )
        .with_remark(remark);

        let batch = CommitBatch::new()
            .account(AccountWrite::new(&snapshot, balance))
            .transaction(draft);
        Ok(self.store.commit(batch).await?)
    }

    async fn try_event_award(
        &self,
        actor: &Actor,
        event: EventId,
        account: &AccountId,
        points: i64,
        remark: &str,
    ) -> Result<Vec<Transaction>, LedgerError> {
        require_positive(points, "event award")?;

        let pool = self.store.load_event(event).await?;
        let guest = self.store.load_account(account).await?;
        self.gate.authorize(actor, TransactionKind::Event, &guest.value)?;

        if !pool.value.published {
            return Err(LedgerError::EventNotPublished(event));
        }
        if !pool.value.is_guest(account) {
            return Err(LedgerError::NotAGuest {
                event,
                account: account.clone(),
            });
        }
        if !pool.value.can_award(points) {
            return Err(LedgerError::PoolExhausted {
                event,
                remaining: pool.value.remaining,
                requested: points,
            });
        }

        let balance = guest
            .value
            .balance
            .checked_add(points)
            .ok_or(LedgerError::Overflow)?;
        let draft = TransactionDraft::new(account.clone(), TransactionKind::Event, points, actor, self.clock.now())
            .with_related(RelatedRef::Event(event))
            .with_remark(remark);

        let batch = CommitBatch::new()
            .account(AccountWrite::new(&guest, balance))
            .event(EventWrite::new(&pool, pool.value.remaining - points))
            .transaction(draft);
        Ok(self.store.commit(batch).await?)
    }

    async fn try_event_award_all(
        &self,
        actor: &Actor,
        event: EventId,
        points: i64,
        remark: &str,
    ) -> Result<Vec<Transaction>, LedgerError> {
        require_positive(points, "event award")?;

        let pool = self.store.load_event(event).await?;
        if !pool.value.published {
            return Err(LedgerError::EventNotPublished(event));
        }
        if pool.value.guests.is_empty() {
            return Err(LedgerError::InvalidAmount(format!("{event} has no guests")));
        }

        let guest_count = i64::try_from(pool.value.guests.len()).map_err(|_| LedgerError::Overflow)?;
        let total = points.checked_mul(guest_count).ok_or(LedgerError::Overflow)?;
        if !pool.value.can_award(total) {
            return Err(LedgerError::PoolExhausted {
                event,
                remaining: pool.value.remaining,
                requested: total,
            });
        }

        let now = self.clock.now();
        let mut batch = CommitBatch::new().event(EventWrite::new(&pool, pool.value.remaining - total));
        for id in &pool.value.guests {
            let guest = self.store.load_account(id).await?;
            self.gate.authorize(actor, TransactionKind::Event, &guest.value)?;
            let balance = guest
                .value
                .balance
                .checked_add(points)
                .ok_or(LedgerError::Overflow)?;
            batch = batch
                .account(AccountWrite::new(&guest, balance))
                .transaction(
                    TransactionDraft::new(id.clone(), TransactionKind::Event, points, actor, now)
                        .with_related(RelatedRef::Event(event))
                        .with_remark(remark),
                );
        }

        tracing::debug!(guests = guest_count, total, "Awarding every guest");
        Ok(self.store.commit(batch).await?)
    }

    // ===== Retry, metrics and logging around a unit =====

    async fn run<F, Fut>(&self, kind: TransactionKind, unit: F) -> Result<Vec<Transaction>, LedgerError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Vec<Transaction>, LedgerError>>,
    {
        let started = Instant::now();
        let result = retry_with_predicate(&self.retry, unit, |err: &LedgerError| {
            let conflict = matches!(err, LedgerError::PersistenceConflict(_));
            if conflict {
                LedgerMetrics::record_conflict(kind);
            }
            conflict
        })
        .await
        .map_err(|err| match err {
            RetryError::Permanent(err) => err,
            RetryError::Exhausted { attempts, .. } => LedgerError::TransientFailure { attempts },
        });
        LedgerMetrics::record_duration(kind, started.elapsed());

        match &result {
            Ok(records) => {
                for record in records {
                    LedgerMetrics::record_committed(record.kind, record.points);
                    tracing::info!(
                        id = %record.id,
                        kind = %record.kind,
                        account = %record.account,
                        points = record.points,
                        suspicious = record.suspicious,
                        "Transaction recorded"
                    );
                }
            }
            Err(err) => {
                LedgerMetrics::record_rejected(kind, err);
                tracing::warn!(%kind, reason = err.reason(), error = %err, "Operation rejected");
            }
        }
        result
    }
}

fn require_positive(points: i64, what: &str) -> Result<(), LedgerError> {
    if points > 0 {
        Ok(())
    } else {
        Err(LedgerError::InvalidAmount(format!(
            "{what} points must be positive, got {points}"
        )))
    }
}

fn debit(account: &Account, points: i64) -> Result<i64, LedgerError> {
    if !account.can_afford(points) {
        return Err(LedgerError::InsufficientBalance {
            account: account.id.clone(),
            balance: account.balance,
            requested: points,
        });
    }
    Ok(account.balance - points)
}

fn single(records: Vec<Transaction>) -> Result<Transaction, LedgerError> {
    let mut records = records.into_iter();
    match (records.next(), records.next()) {
        (Some(record), None) => Ok(record),
        _ => Err(LedgerError::Storage(
            "commit did not return exactly one record".to_string(),
        )),
    }
}

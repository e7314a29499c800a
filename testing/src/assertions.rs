//! Helper assertions for ledger state.

#![allow(clippy::panic)] // Test assertions
#![allow(clippy::missing_panics_doc)] // Assertions panic on failure

use campus_points_core::{AccountId, EventId, RelatedRef, TransactionKind};
use campus_points_runtime::Ledger;

/// Assert that every account's balance equals the sum of its deltas and is not negative.
pub async fn assert_reconciled(ledger: &Ledger, accounts: &[AccountId]) {
    for account in accounts {
        let report = ledger
            .reconcile(account)
            .await
            .unwrap_or_else(|err| panic!("reconcile {account} failed: {err}"));
        assert!(
            report.is_consistent(),
            "{account}: balance {} != ledger sum {} over {} records",
            report.balance,
            report.ledger_sum,
            report.transaction_count
        );
        assert!(report.balance >= 0, "{account}: negative balance {}", report.balance);
    }
}

/// Assert that `event`'s pool has dropped by exactly the points awarded from it.
pub async fn assert_pool_conserved(ledger: &Ledger, event: EventId) {
    let pool = ledger
        .event(event)
        .await
        .unwrap_or_else(|err| panic!("load {event} failed: {err}"));
    let log = ledger
        .ledger_log()
        .await
        .unwrap_or_else(|err| panic!("load log failed: {err}"));

    let awarded: i64 = log
        .iter()
        .filter(|t| t.kind == TransactionKind::Event && t.related == Some(RelatedRef::Event(event)))
        .map(|t| t.points)
        .sum();

    assert!(pool.remaining >= 0, "{event}: negative remaining {}", pool.remaining);
    assert_eq!(
        pool.points_awarded(),
        awarded,
        "{event}: pool drop does not match awarded points"
    );
}

/// Assert that every transfer record has exactly one partner with the opposite delta.
pub async fn assert_transfers_paired(ledger: &Ledger) {
    let log = ledger
        .ledger_log()
        .await
        .unwrap_or_else(|err| panic!("load log failed: {err}"));

    for record in log.iter().filter(|t| t.kind == TransactionKind::Transfer) {
        let correlation = record
            .correlation
            .unwrap_or_else(|| panic!("transfer {} has no correlation", record.id));
        let partners: Vec<_> = log
            .iter()
            .filter(|t| t.id != record.id && t.correlation == Some(correlation))
            .collect();
        assert_eq!(partners.len(), 1, "transfer {} is not paired", record.id);
        assert_eq!(partners[0].points, -record.points, "transfer {} pair does not net to zero", record.id);
    }
}

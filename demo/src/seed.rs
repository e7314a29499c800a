//! The campus seed data set.
//!
//! Accounts, promotions and events are registered through the store's administration
//! surface. Opening balances and the sample history go through the ledger, so every
//! balance is backed by records.

use campus_points_core::{
    Account, AccountId, Actor, EventId, EventPool, Money, Promotion, PromotionId, PromotionKind,
    Rate, Role,
};
use campus_points_runtime::{InMemoryLedgerStore, Ledger};
use chrono::{DateTime, TimeZone, Utc};

struct SeedUser {
    id: &'static str,
    name: &'static str,
    role: Role,
    verified: bool,
    opening: i64,
}

const USERS: &[SeedUser] = &[
    SeedUser { id: "superadmin", name: "Super Admin", role: Role::Superuser, verified: true, opening: 0 },
    SeedUser { id: "manager01", name: "Manager One", role: Role::Manager, verified: true, opening: 100 },
    SeedUser { id: "cashier01", name: "Cashier One", role: Role::Cashier, verified: true, opening: 250 },
    SeedUser { id: "user0001", name: "Regular User", role: Role::Regular, verified: true, opening: 500 },
    SeedUser { id: "user0002", name: "Alice Johnson", role: Role::Regular, verified: true, opening: 1_200 },
    SeedUser { id: "user0003", name: "Bob Smith", role: Role::Regular, verified: false, opening: 0 },
    SeedUser { id: "user0004", name: "Carol Williams", role: Role::Regular, verified: true, opening: 750 },
];

/// Every seeded account id.
pub fn account_ids() -> Vec<AccountId> {
    USERS.iter().map(|u| AccountId::new(u.id)).collect()
}

fn date(y: i32, m: u32, d: u32) -> anyhow::Result<DateTime<Utc>> {
    Utc.with_ymd_and_hms(y, m, d, 0, 0, 0)
        .single()
        .ok_or_else(|| anyhow::anyhow!("invalid seed date {y}-{m}-{d}"))
}

/// Register accounts, promotions and events.
pub async fn register(store: &InMemoryLedgerStore, now: DateTime<Utc>) -> anyhow::Result<()> {
    for user in USERS {
        let mut account = Account::new(AccountId::new(user.id), user.name, user.role, now);
        account.verified = user.verified;
        store.register_account(account).await?;
    }

    store
        .put_promotion(Promotion {
            id: PromotionId::new(1),
            name: "Welcome Bonus".to_string(),
            kind: PromotionKind::OneTime,
            starts_at: date(2025, 1, 1)?,
            ends_at: date(2025, 12, 31)?,
            min_spend: Money::from_dollars(10),
            rate: Rate::from_hundredths(0),
            bonus_points: 100,
        })
        .await;
    store
        .put_promotion(Promotion {
            id: PromotionId::new(2),
            name: "Double Points Week".to_string(),
            kind: PromotionKind::Automatic,
            starts_at: date(2025, 1, 1)?,
            ends_at: date(2025, 1, 31)?,
            min_spend: Money::ZERO,
            rate: Rate::from_multiplier(2),
            bonus_points: 0,
        })
        .await;
    store
        .put_promotion(Promotion {
            id: PromotionId::new(3),
            name: "Big Spender Bonus".to_string(),
            kind: PromotionKind::Automatic,
            starts_at: date(2025, 1, 1)?,
            ends_at: date(2025, 6, 30)?,
            min_spend: Money::from_dollars(50),
            rate: Rate::ONE,
            bonus_points: 200,
        })
        .await;

    let events: [(u64, &str, i64, bool, &[&str]); 3] = [
        (1, "Welcome Week Kickoff", 500, true, &["user0001", "user0002"]),
        (2, "Tech Talk: AI in 2025", 300, true, &["user0004"]),
        (3, "Study Session: Finals Prep", 150, false, &[]),
    ];
    for (id, name, capacity, published, guests) in events {
        let event = EventId::new(id);
        store.create_event(EventPool::new(event, name, capacity)).await?;
        for guest in guests {
            store.add_guest(event, &AccountId::new(*guest)).await?;
        }
        store.set_published(event, published).await?;
    }

    tracing::info!(accounts = USERS.len(), promotions = 3, events = 3, "Seed entities registered");
    Ok(())
}

/// Fund opening balances with manager adjustments.
pub async fn fund(ledger: &Ledger) -> anyhow::Result<()> {
    let manager = actor(ledger, "manager01").await?;
    for user in USERS.iter().filter(|u| u.opening > 0) {
        ledger
            .record_adjustment(&manager, &AccountId::new(user.id), user.opening, "Opening balance")
            .await?;
    }
    Ok(())
}

/// Replay the sample history.
pub async fn history(ledger: &Ledger) -> anyhow::Result<()> {
    let cashier = actor(ledger, "cashier01").await?;
    let manager = actor(ledger, "manager01").await?;
    let alice = actor(ledger, "user0002").await?;
    let carol = actor(ledger, "user0004").await?;

    let user1 = AccountId::new("user0001");
    let user2 = AccountId::new("user0002");
    let user4 = AccountId::new("user0004");

    ledger
        .record_purchase(&cashier, &user1, Money::from_cents(2550), "Coffee and pastry")
        .await?;
    ledger
        .record_purchase(&cashier, &user1, Money::from_cents(1500), "Lunch")
        .await?;
    ledger
        .record_purchase(&cashier, &user2, Money::from_cents(5500), "Big Spender")
        .await?;
    ledger
        .record_redemption(&carol, &user4, 200, "Coffee voucher")
        .await?;
    ledger
        .record_event_award(&manager, EventId::new(1), &user1, 50, "Welcome Week attendance")
        .await?;
    ledger
        .record_transfer(&alice, &user2, &user1, 100, "Thanks for lunch")
        .await?;
    ledger
        .record_adjustment(&manager, &user4, 50, "Customer service credit")
        .await?;
    Ok(())
}

/// Requests the ledger must refuse.
pub async fn refused(ledger: &Ledger) -> anyhow::Result<Vec<String>> {
    let cashier = actor(ledger, "cashier01").await?;
    let manager = actor(ledger, "manager01").await?;
    let regular = actor(ledger, "user0001").await?;
    let bob = AccountId::new("user0003");
    let user1 = AccountId::new("user0001");

    let attempts = [
        (
            "purchase for an unverified member",
            ledger
                .record_purchase(&cashier, &bob, Money::from_dollars(20), "")
                .await
                .map(|_| ()),
        ),
        (
            "adjustment by a regular member",
            ledger
                .record_adjustment(&regular, &user1, 1_000, "Self-service bonus")
                .await
                .map(|_| ()),
        ),
        (
            "award from an unpublished event",
            ledger
                .record_event_award(&manager, EventId::new(3), &user1, 10, "")
                .await
                .map(|_| ()),
        ),
        (
            "transfer to self",
            ledger
                .record_transfer(&regular, &user1, &user1, 10, "")
                .await
                .map(|(_, _)| ()),
        ),
    ];

    let mut reasons = Vec::with_capacity(attempts.len());
    for (request, outcome) in attempts {
        match outcome {
            Ok(()) => anyhow::bail!("expected the ledger to refuse the {request}, but it was accepted"),
            Err(err) => reasons.push(format!("{request}: {err}")),
        }
    }
    Ok(reasons)
}

async fn actor(ledger: &Ledger, id: &str) -> anyhow::Result<Actor> {
    Ok(Actor::from(&ledger.account(&AccountId::new(id)).await?))
}

//! PostgreSQL integration tests
//!
//! These tests use a shared PostgreSQL container for efficiency.
//! Run with:
//!
//! ```bash
//! cargo test -p market-store --test postgres_integration -- --test-threads=1
//! ```

use std::sync::Arc;

use common::{
    CartItem, Event, EventId, Money, Party, Role, Ticket, TicketStatus, Transaction,
    TransactionKind, TxHash, User, WalletAddress,
};
use market_store::{
    ChangeSet, LedgerQuery, MarketStore, MarketStoreExt, PostgresMarketStore, StoreError,
    TicketQuery, UserQuery,
};
use sqlx::PgPool;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

/// Global shared container
static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();

            sqlx::raw_sql(include_str!(
                "../../../migrations/001_create_market_tables.sql"
            ))
            .execute(&temp_pool)
            .await
            .unwrap();

            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Get a fresh store with its own pool and cleared tables
async fn get_test_store() -> PostgresMarketStore {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query("TRUNCATE TABLE cart_items, transactions, tickets, events, users")
        .execute(&pool)
        .await
        .unwrap();

    PostgresMarketStore::new(pool)
}

fn user(name: &str, role: Role, balance_cents: i64) -> User {
    let mut user = User::new(name, "hash", role, None);
    user.balance = Money::from_cents(balance_cents);
    user
}

fn event_by(creator: &User) -> Event {
    Event {
        id: EventId::new(),
        creator: creator.wallet.clone(),
        name: "Summer Fest".to_string(),
        symbol: "SUMR".to_string(),
        date: "2026-07-01".to_string(),
        wholesale_price: Money::from_units(50),
        max_resale_price: Money::from_units(80),
        created_at: chrono::Utc::now(),
    }
}

/// One organizer, one event with `supply` available tickets.
async fn seeded(store: &PostgresMarketStore, supply: u32) -> (User, Event, Vec<Ticket>) {
    let organizer = user("organizer", Role::Organizer, 0);
    let event = event_by(&organizer);
    let tickets: Vec<Ticket> = (1..=supply)
        .map(|serial| {
            Ticket::mint(event.id, serial, organizer.wallet.clone(), event.wholesale_price)
        })
        .collect();

    let mut changes = ChangeSet::new();
    changes
        .insert_user(organizer.clone())
        .insert_event(event.clone())
        .insert_tickets(tickets.clone())
        .record(Transaction::new(
            TxHash::generate(),
            TransactionKind::Mint,
            Party::System,
            Party::Wallet(organizer.wallet.clone()),
            Money::zero(),
        ));
    store.commit(changes).await.unwrap();

    (organizer, event, tickets)
}

#[tokio::test]
async fn insert_and_lookup_user() {
    let store = get_test_store().await;
    let alice = user("alice", Role::Customer, 1_000);

    let mut changes = ChangeSet::new();
    changes.insert_user(alice.clone());
    store.commit(changes).await.unwrap();

    let by_id = store.require_user(alice.id).await.unwrap();
    assert_eq!(by_id.username, "alice");
    assert_eq!(by_id.balance, Money::from_cents(1_000));
    assert_eq!(by_id.role, Role::Customer);

    let by_name = store.find_user_by_username("alice").await.unwrap().unwrap();
    assert_eq!(by_name.id, alice.id);

    let by_wallet = store.find_user_by_wallet(&alice.wallet).await.unwrap().unwrap();
    assert_eq!(by_wallet.id, alice.id);

    assert!(store.find_user_by_username("nobody").await.unwrap().is_none());
}

#[tokio::test]
async fn duplicate_username_is_rejected() {
    let store = get_test_store().await;

    let mut first = ChangeSet::new();
    first.insert_user(user("alice", Role::Customer, 0));
    store.commit(first).await.unwrap();

    let mut second = ChangeSet::new();
    second.insert_user(user("alice", Role::Customer, 0));
    let result = store.commit(second).await;

    assert!(matches!(result, Err(StoreError::ConstraintViolation(_))));
}

#[tokio::test]
async fn staff_listing_filters_by_role_and_parent() {
    let store = get_test_store().await;
    let organizer = user("org", Role::Organizer, 0);
    let reseller = User::new("shop", "hash", Role::Reseller, Some(organizer.wallet.clone()));

    let mut changes = ChangeSet::new();
    changes
        .insert_user(organizer.clone())
        .insert_user(reseller.clone())
        .insert_user(user("carol", Role::Customer, 0));
    store.commit(changes).await.unwrap();

    let resellers = store
        .list_users(
            UserQuery::new()
                .role(Role::Reseller)
                .parent(organizer.wallet.clone()),
        )
        .await
        .unwrap();
    assert_eq!(resellers.len(), 1);
    assert_eq!(resellers[0].id, reseller.id);

    assert!(!store.has_admin().await.unwrap());
}

#[tokio::test]
async fn overdraft_rolls_back_whole_commit() {
    let store = get_test_store().await;
    let (organizer, _, tickets) = seeded(&store, 1).await;
    let buyer = user("buyer", Role::Customer, 1_000);
    let mut changes = ChangeSet::new();
    changes.insert_user(buyer.clone());
    store.commit(changes).await.unwrap();

    let mut ticket = tickets[0].clone();
    ticket.transfer_to(buyer.wallet.clone());

    let mut changes = ChangeSet::new();
    changes
        .update_ticket(ticket)
        .debit(buyer.id, Money::from_units(50))
        .credit(organizer.id, Money::from_units(50));
    let result = store.commit(changes).await;

    assert!(matches!(
        result,
        Err(StoreError::InsufficientBalance { user_id }) if user_id == buyer.id
    ));

    // Nothing moved
    let stored = store.get_ticket(tickets[0].id).await.unwrap().unwrap();
    assert_eq!(stored.owner, organizer.wallet);
    assert_eq!(stored.status, TicketStatus::Available);
    let organizer = store.require_user(organizer.id).await.unwrap();
    assert_eq!(organizer.balance, Money::zero());
}

#[tokio::test]
async fn stale_ticket_version_conflicts() {
    let store = get_test_store().await;
    let (organizer, _, tickets) = seeded(&store, 1).await;
    let buyer = user("buyer", Role::Customer, 100_000);
    let mut changes = ChangeSet::new();
    changes.insert_user(buyer.clone());
    store.commit(changes).await.unwrap();

    let mut first = tickets[0].clone();
    first.list_at(Money::from_units(60));
    let mut changes = ChangeSet::new();
    changes.update_ticket(first);
    store.commit(changes).await.unwrap();

    // Still carries the version read before the listing
    let mut stale = tickets[0].clone();
    stale.transfer_to(buyer.wallet.clone());
    let mut changes = ChangeSet::new();
    changes
        .update_ticket(stale)
        .debit(buyer.id, Money::from_units(50))
        .credit(organizer.id, Money::from_units(50));
    let result = store.commit(changes).await;

    assert!(matches!(result, Err(StoreError::ConcurrencyConflict { .. })));
    let buyer = store.require_user(buyer.id).await.unwrap();
    assert_eq!(buyer.balance, Money::from_cents(100_000));
}

#[tokio::test]
async fn ticket_queries_filter_and_order() {
    let store = get_test_store().await;
    let (organizer, event, tickets) = seeded(&store, 5).await;

    let mut listed = tickets[3].clone();
    listed.list_at(Money::from_units(70));
    let mut changes = ChangeSet::new();
    changes.update_ticket(listed);
    store.commit(changes).await.unwrap();

    let available = store
        .list_tickets(
            TicketQuery::owned_by(organizer.wallet.clone())
                .event(event.id)
                .status(TicketStatus::Available)
                .limit(3),
        )
        .await
        .unwrap();
    let serials: Vec<u32> = available.iter().map(|t| t.serial).collect();
    assert_eq!(serials, vec![1, 2, 3]);

    let at_seventy = store
        .list_tickets(
            TicketQuery::for_event(event.id)
                .for_sale()
                .price(Money::from_units(70)),
        )
        .await
        .unwrap();
    assert_eq!(at_seventy.len(), 1);
    assert_eq!(at_seventy[0].serial, 4);

    let total = store
        .count_tickets(TicketQuery::for_event(event.id).for_sale())
        .await
        .unwrap();
    assert_eq!(total, 5);
}

#[tokio::test]
async fn ledger_reads_newest_first() {
    let store = get_test_store().await;
    let (organizer, _, _) = seeded(&store, 1).await;

    for cents in [100, 200, 300] {
        let mut changes = ChangeSet::new();
        changes
            .credit(organizer.id, Money::from_cents(cents))
            .record(Transaction::new(
                TxHash::generate(),
                TransactionKind::TopUp,
                Party::Bank,
                Party::Wallet(organizer.wallet.clone()),
                Money::from_cents(cents),
            ));
        store.commit(changes).await.unwrap();
    }

    let top_ups = store
        .list_transactions(LedgerQuery::new().kind(TransactionKind::TopUp))
        .await
        .unwrap();
    let amounts: Vec<i64> = top_ups.iter().map(|t| t.amount.cents()).collect();
    assert_eq!(amounts, vec![300, 200, 100]);

    let latest = store.list_transactions(LedgerQuery::latest(2)).await.unwrap();
    assert_eq!(latest.len(), 2);

    let mine = store
        .list_transactions(LedgerQuery::new().involving(organizer.wallet.clone()))
        .await
        .unwrap();
    assert_eq!(mine.len(), 4);
    assert_eq!(mine[3].kind, TransactionKind::Mint);
    assert_eq!(mine[3].from, Party::System);

    let organizer = store.require_user(organizer.id).await.unwrap();
    assert_eq!(organizer.balance, Money::from_cents(600));
}

#[tokio::test]
async fn ledger_rejects_unknown_wallet() {
    let store = get_test_store().await;

    let mut changes = ChangeSet::new();
    changes.record(Transaction::new(
        TxHash::generate(),
        TransactionKind::TopUp,
        Party::Bank,
        Party::Wallet(WalletAddress::generate()),
        Money::from_cents(100),
    ));

    let result = store.commit(changes).await;
    assert!(matches!(result, Err(StoreError::ConstraintViolation(_))));
    assert!(store.list_transactions(LedgerQuery::new()).await.unwrap().is_empty());
}

#[tokio::test]
async fn cart_lines_are_versioned_and_unique() {
    let store = get_test_store().await;
    let (organizer, event, _) = seeded(&store, 1).await;
    let buyer = user("buyer", Role::Customer, 0);
    let mut changes = ChangeSet::new();
    changes.insert_user(buyer.clone());
    store.commit(changes).await.unwrap();

    let line = CartItem::new(
        buyer.id,
        event.id,
        organizer.wallet.clone(),
        2,
        Money::from_units(50),
    );
    let mut changes = ChangeSet::new();
    changes.insert_cart_item(line.clone());
    store.commit(changes).await.unwrap();

    // A second line for the same event, seller and price
    let twin = CartItem::new(
        buyer.id,
        event.id,
        organizer.wallet.clone(),
        1,
        Money::from_units(50),
    );
    let mut changes = ChangeSet::new();
    changes.insert_cart_item(twin);
    let result = store.commit(changes).await;
    assert!(matches!(
        result,
        Err(StoreError::ConcurrencyConflict { entity: "cart item", .. })
    ));

    let mut changes = ChangeSet::new();
    changes.update_cart_item(CartItem { quantity: 5, ..line.clone() });
    store.commit(changes).await.unwrap();

    let mut changes = ChangeSet::new();
    changes.update_cart_item(CartItem { quantity: 7, ..line.clone() });
    let stale = store.commit(changes).await;
    assert!(matches!(stale, Err(StoreError::ConcurrencyConflict { .. })));

    let cart = store.list_cart(buyer.id).await.unwrap();
    assert_eq!(cart.len(), 1);
    assert_eq!(cart[0].quantity, 5);
    assert_eq!(cart[0].version, 2);

    let mut changes = ChangeSet::new();
    changes.clear_cart(buyer.id);
    store.commit(changes).await.unwrap();
    assert!(store.list_cart(buyer.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn double_ticket_update_is_rejected() {
    let store = get_test_store().await;
    let (organizer, _, tickets) = seeded(&store, 1).await;
    let buyer = user("buyer", Role::Customer, 100_000);
    let mut changes = ChangeSet::new();
    changes.insert_user(buyer.clone());
    store.commit(changes).await.unwrap();

    let mut sold = tickets[0].clone();
    sold.transfer_to(buyer.wallet.clone());
    let mut changes = ChangeSet::new();
    changes
        .update_ticket(sold.clone())
        .update_ticket(sold)
        .debit(buyer.id, Money::from_units(100))
        .credit(organizer.id, Money::from_units(100));
    let result = store.commit(changes).await;

    assert!(matches!(result, Err(StoreError::ConstraintViolation(_))));
    let buyer = store.require_user(buyer.id).await.unwrap();
    assert_eq!(buyer.balance, Money::from_cents(100_000));
}

#[tokio::test]
async fn balance_overflow_is_a_constraint_violation() {
    let store = get_test_store().await;
    let rich = user("rich", Role::Customer, i64::MAX);
    let mut changes = ChangeSet::new();
    changes.insert_user(rich.clone());
    store.commit(changes).await.unwrap();

    let mut changes = ChangeSet::new();
    changes.credit(rich.id, Money::from_cents(1));
    let result = store.commit(changes).await;

    assert!(matches!(result, Err(StoreError::ConstraintViolation(_))));
    let rich = store.require_user(rich.id).await.unwrap();
    assert_eq!(rich.balance, Money::from_cents(i64::MAX));
}

#[tokio::test]
async fn delete_user_only_without_history() {
    let store = get_test_store().await;
    let (organizer, _, _) = seeded(&store, 1).await;
    let idle = user("idle", Role::Customer, 0);
    let mut changes = ChangeSet::new();
    changes.insert_user(idle.clone());
    store.commit(changes).await.unwrap();

    store.delete_user(idle.id).await.unwrap();
    assert!(store.get_user(idle.id).await.unwrap().is_none());

    let result = store.delete_user(organizer.id).await;
    assert!(matches!(result, Err(StoreError::ConstraintViolation(_))));

    let missing = store.delete_user(idle.id).await;
    assert!(matches!(missing, Err(StoreError::NotFound { .. })));
}

#[tokio::test]
async fn profile_update_bumps_version() {
    let store = get_test_store().await;
    let alice = user("alice", Role::Customer, 500);
    let mut changes = ChangeSet::new();
    changes.insert_user(alice.clone());
    store.commit(changes).await.unwrap();

    let mut disabled = alice.clone();
    disabled.active = false;
    // Balance is ignored by profile updates
    disabled.balance = Money::from_cents(999_999);
    let mut changes = ChangeSet::new();
    changes.update_user(disabled.clone());
    store.commit(changes).await.unwrap();

    let stored = store.require_user(alice.id).await.unwrap();
    assert!(!stored.active);
    assert_eq!(stored.balance, Money::from_cents(500));
    assert_eq!(stored.version, alice.version + 1);

    let mut changes = ChangeSet::new();
    changes.update_user(disabled);
    let result = store.commit(changes).await;
    assert!(matches!(result, Err(StoreError::ConcurrencyConflict { .. })));
}

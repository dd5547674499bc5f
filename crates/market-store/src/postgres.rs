use async_trait::async_trait;
use common::{
    CartItem, CartItemId, Event, EventId, Money, Ticket, TicketId, Transaction, TransactionId,
    TxHash, User, UserId, WalletAddress,
};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, Row};
use uuid::Uuid;

use crate::{
    ChangeSet, LedgerQuery, Result, StoreError, TicketQuery, UserQuery, store::MarketStore,
};

const USER_COLUMNS: &str = "id, username, password_hash, wallet_address, balance_cents, role, \
     parent_address, is_active, version, created_at";
const EVENT_COLUMNS: &str = "id, creator_address, name, symbol, date, wholesale_price_cents, \
     max_resale_price_cents, created_at";
const TICKET_COLUMNS: &str = "id, event_id, serial, owner_address, status, price_cents, version";
const TRANSACTION_COLUMNS: &str = "id, tx_hash, ticket_id, memo, from_address, to_address, \
     amount_cents, kind, created_at";
const CART_COLUMNS: &str =
    "id, user_id, event_id, reseller_address, quantity, unit_price_cents, version";

type PgTx<'c> = sqlx::Transaction<'c, Postgres>;

/// PostgreSQL-backed market store implementation.
#[derive(Clone)]
pub struct PostgresMarketStore {
    pool: PgPool,
}

fn decode<T, E: std::fmt::Display>(result: std::result::Result<T, E>) -> Result<T> {
    result.map_err(|e| StoreError::Decode(e.to_string()))
}

fn to_i32(value: u32, what: &str) -> Result<i32> {
    i32::try_from(value)
        .map_err(|_| StoreError::ConstraintViolation(format!("{what} {value} is out of range")))
}

/// SQLSTATE for "numeric value out of range", raised on BIGINT overflow.
const NUMERIC_OUT_OF_RANGE: &str = "22003";

/// Maps constraint failures reported by Postgres onto `ConstraintViolation`.
fn map_write_error(e: sqlx::Error) -> StoreError {
    use sqlx::error::ErrorKind;

    if let sqlx::Error::Database(ref db_err) = e
        && (matches!(
            db_err.kind(),
            ErrorKind::UniqueViolation
                | ErrorKind::ForeignKeyViolation
                | ErrorKind::CheckViolation
                | ErrorKind::NotNullViolation
        ) || db_err.code().as_deref() == Some(NUMERIC_OUT_OF_RANGE))
    {
        return StoreError::ConstraintViolation(db_err.message().to_string());
    }
    StoreError::Database(e)
}

impl PostgresMarketStore {
    /// Creates a new PostgreSQL market store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects a pool to `database_url`.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    fn row_to_user(row: PgRow) -> Result<User> {
        let wallet: String = row.try_get("wallet_address")?;
        let role: String = row.try_get("role")?;
        let parent: Option<String> = row.try_get("parent_address")?;

        Ok(User {
            id: UserId::from_uuid(row.try_get::<Uuid, _>("id")?),
            username: row.try_get("username")?,
            password_hash: row.try_get("password_hash")?,
            wallet: decode(wallet.parse())?,
            balance: Money::from_cents(row.try_get("balance_cents")?),
            role: decode(role.parse())?,
            parent: decode(parent.map(|p| p.parse()).transpose())?,
            active: row.try_get("is_active")?,
            version: row.try_get("version")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn row_to_event(row: PgRow) -> Result<Event> {
        let creator: String = row.try_get("creator_address")?;

        Ok(Event {
            id: EventId::from_uuid(row.try_get::<Uuid, _>("id")?),
            creator: decode(creator.parse())?,
            name: row.try_get("name")?,
            symbol: row.try_get("symbol")?,
            date: row.try_get("date")?,
            wholesale_price: Money::from_cents(row.try_get("wholesale_price_cents")?),
            max_resale_price: Money::from_cents(row.try_get("max_resale_price_cents")?),
            created_at: row.try_get("created_at")?,
        })
    }

    fn row_to_ticket(row: PgRow) -> Result<Ticket> {
        let owner: String = row.try_get("owner_address")?;
        let status: String = row.try_get("status")?;
        let serial: i32 = row.try_get("serial")?;
        let price: Option<i64> = row.try_get("price_cents")?;

        Ok(Ticket {
            id: TicketId::from_uuid(row.try_get::<Uuid, _>("id")?),
            event_id: EventId::from_uuid(row.try_get::<Uuid, _>("event_id")?),
            serial: decode(u32::try_from(serial))?,
            owner: decode(owner.parse())?,
            status: decode(status.parse())?,
            price: price.map(Money::from_cents),
            version: row.try_get("version")?,
        })
    }

    fn row_to_transaction(row: PgRow) -> Result<Transaction> {
        let from: String = row.try_get("from_address")?;
        let to: String = row.try_get("to_address")?;
        let kind: String = row.try_get("kind")?;
        let tx_hash: String = row.try_get("tx_hash")?;

        Ok(Transaction {
            id: TransactionId::from_uuid(row.try_get::<Uuid, _>("id")?),
            tx_hash: TxHash::from_stored(tx_hash),
            ticket_id: row
                .try_get::<Option<Uuid>, _>("ticket_id")?
                .map(TicketId::from_uuid),
            memo: row.try_get("memo")?,
            from: decode(from.parse())?,
            to: decode(to.parse())?,
            amount: Money::from_cents(row.try_get("amount_cents")?),
            kind: decode(kind.parse())?,
            timestamp: row.try_get("created_at")?,
        })
    }

    fn row_to_cart_item(row: PgRow) -> Result<CartItem> {
        let reseller: String = row.try_get("reseller_address")?;
        let quantity: i32 = row.try_get("quantity")?;

        Ok(CartItem {
            id: CartItemId::from_uuid(row.try_get::<Uuid, _>("id")?),
            user_id: UserId::from_uuid(row.try_get::<Uuid, _>("user_id")?),
            event_id: EventId::from_uuid(row.try_get::<Uuid, _>("event_id")?),
            reseller: decode(reseller.parse())?,
            quantity: decode(u32::try_from(quantity))?,
            unit_price: Money::from_cents(row.try_get("unit_price_cents")?),
            version: row.try_get("version")?,
        })
    }

    /// Explains why a versioned update touched no rows.
    async fn stale_or_missing(
        tx: &mut PgTx<'_>,
        table: &'static str,
        entity: &'static str,
        id: Uuid,
        expected: i64,
    ) -> StoreError {
        let sql = format!("SELECT EXISTS(SELECT 1 FROM {table} WHERE id = $1)");
        match sqlx::query_scalar::<_, bool>(&sql)
            .bind(id)
            .fetch_one(&mut **tx)
            .await
        {
            Ok(true) => StoreError::ConcurrencyConflict {
                entity,
                id: id.to_string(),
                expected,
            },
            Ok(false) => StoreError::NotFound {
                entity,
                id: id.to_string(),
            },
            Err(e) => StoreError::Database(e),
        }
    }

    async fn wallet_exists(tx: &mut PgTx<'_>, wallet: &WalletAddress) -> Result<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM users WHERE wallet_address = $1)",
        )
        .bind(wallet.as_str())
        .fetch_one(&mut **tx)
        .await?;
        Ok(exists)
    }
}

#[async_trait]
impl MarketStore for PostgresMarketStore {
    async fn commit(&self, changes: ChangeSet) -> Result<()> {
        if let Some(id) = changes.repeated_ticket_update() {
            return Err(StoreError::ConstraintViolation(format!(
                "ticket {id} is updated twice in one commit"
            )));
        }

        let mut tx = self.pool.begin().await?;

        for user in &changes.new_users {
            sqlx::query(
                r#"
                INSERT INTO users (id, username, password_hash, wallet_address, balance_cents, role, parent_address, is_active, version, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                "#,
            )
            .bind(user.id.as_uuid())
            .bind(&user.username)
            .bind(&user.password_hash)
            .bind(user.wallet.as_str())
            .bind(user.balance.cents())
            .bind(user.role.as_str())
            .bind(user.parent.as_ref().map(WalletAddress::as_str))
            .bind(user.active)
            .bind(user.version)
            .bind(user.created_at)
            .execute(&mut *tx)
            .await
            .map_err(map_write_error)?;
        }

        for user in &changes.user_updates {
            let result = sqlx::query(
                r#"
                UPDATE users SET password_hash = $2, is_active = $3, version = version + 1
                WHERE id = $1 AND version = $4
                "#,
            )
            .bind(user.id.as_uuid())
            .bind(&user.password_hash)
            .bind(user.active)
            .bind(user.version)
            .execute(&mut *tx)
            .await
            .map_err(map_write_error)?;

            if result.rows_affected() == 0 {
                return Err(
                    Self::stale_or_missing(&mut tx, "users", "user", user.id.as_uuid(), user.version)
                        .await,
                );
            }
        }

        // BTreeMap order keeps row locks in a consistent order across commits
        for (&user_id, delta) in &changes.balance_changes {
            let result = sqlx::query(
                "UPDATE users SET balance_cents = balance_cents + $2 WHERE id = $1",
            )
            .bind(user_id.as_uuid())
            .bind(delta.cents())
            .execute(&mut *tx)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(ref db_err)
                    if db_err.constraint() == Some("non_negative_balance") =>
                {
                    StoreError::InsufficientBalance { user_id }
                }
                other => map_write_error(other),
            })?;

            if result.rows_affected() == 0 {
                return Err(StoreError::NotFound {
                    entity: "user",
                    id: user_id.to_string(),
                });
            }
        }

        for event in &changes.new_events {
            sqlx::query(
                r#"
                INSERT INTO events (id, creator_address, name, symbol, date, wholesale_price_cents, max_resale_price_cents, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(event.id.as_uuid())
            .bind(event.creator.as_str())
            .bind(&event.name)
            .bind(&event.symbol)
            .bind(&event.date)
            .bind(event.wholesale_price.cents())
            .bind(event.max_resale_price.cents())
            .bind(event.created_at)
            .execute(&mut *tx)
            .await
            .map_err(map_write_error)?;
        }

        for ticket in &changes.new_tickets {
            sqlx::query(
                r#"
                INSERT INTO tickets (id, event_id, serial, owner_address, status, price_cents, version)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(ticket.id.as_uuid())
            .bind(ticket.event_id.as_uuid())
            .bind(to_i32(ticket.serial, "ticket serial")?)
            .bind(ticket.owner.as_str())
            .bind(ticket.status.as_str())
            .bind(ticket.price.map(|p| p.cents()))
            .bind(ticket.version)
            .execute(&mut *tx)
            .await
            .map_err(map_write_error)?;
        }

        let mut ticket_updates: Vec<&Ticket> = changes.ticket_updates.iter().collect();
        ticket_updates.sort_by_key(|t| t.id);
        for ticket in ticket_updates {
            let result = sqlx::query(
                r#"
                UPDATE tickets SET owner_address = $2, status = $3, price_cents = $4, version = version + 1
                WHERE id = $1 AND version = $5
                "#,
            )
            .bind(ticket.id.as_uuid())
            .bind(ticket.owner.as_str())
            .bind(ticket.status.as_str())
            .bind(ticket.price.map(|p| p.cents()))
            .bind(ticket.version)
            .execute(&mut *tx)
            .await
            .map_err(map_write_error)?;

            if result.rows_affected() == 0 {
                return Err(Self::stale_or_missing(
                    &mut tx,
                    "tickets",
                    "ticket",
                    ticket.id.as_uuid(),
                    ticket.version,
                )
                .await);
            }
        }

        for entry in &changes.transactions {
            for party in [&entry.from, &entry.to] {
                if let Some(wallet) = party.wallet()
                    && !Self::wallet_exists(&mut tx, wallet).await?
                {
                    return Err(StoreError::ConstraintViolation(format!(
                        "ledger party {wallet} does not exist"
                    )));
                }
            }

            sqlx::query(
                r#"
                INSERT INTO transactions (id, tx_hash, ticket_id, memo, from_address, to_address, amount_cents, kind, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                "#,
            )
            .bind(entry.id.as_uuid())
            .bind(entry.tx_hash.as_str())
            .bind(entry.ticket_id.map(|id| id.as_uuid()))
            .bind(entry.memo.as_deref())
            .bind(entry.from.to_string())
            .bind(entry.to.to_string())
            .bind(entry.amount.cents())
            .bind(entry.kind.as_str())
            .bind(entry.timestamp)
            .execute(&mut *tx)
            .await
            .map_err(map_write_error)?;
        }

        for item in &changes.new_cart_items {
            sqlx::query(
                r#"
                INSERT INTO cart_items (id, user_id, event_id, reseller_address, quantity, unit_price_cents, version)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(item.id.as_uuid())
            .bind(item.user_id.as_uuid())
            .bind(item.event_id.as_uuid())
            .bind(item.reseller.as_str())
            .bind(to_i32(item.quantity, "cart quantity")?)
            .bind(item.unit_price.cents())
            .bind(item.version)
            .execute(&mut *tx)
            .await
            .map_err(|e| match e {
                // Another request opened the same line first
                sqlx::Error::Database(ref db_err)
                    if db_err.constraint() == Some("unique_cart_line") =>
                {
                    StoreError::ConcurrencyConflict {
                        entity: "cart item",
                        id: item.id.to_string(),
                        expected: 0,
                    }
                }
                other => map_write_error(other),
            })?;
        }

        for item in &changes.cart_updates {
            let result = sqlx::query(
                r#"
                UPDATE cart_items SET quantity = $3, version = version + 1
                WHERE id = $1 AND user_id = $2 AND version = $4
                "#,
            )
            .bind(item.id.as_uuid())
            .bind(item.user_id.as_uuid())
            .bind(to_i32(item.quantity, "cart quantity")?)
            .bind(item.version)
            .execute(&mut *tx)
            .await
            .map_err(map_write_error)?;

            if result.rows_affected() == 0 {
                return Err(StoreError::ConcurrencyConflict {
                    entity: "cart item",
                    id: item.id.to_string(),
                    expected: item.version,
                });
            }
        }

        for (user_id, item_id) in &changes.cart_removals {
            sqlx::query("DELETE FROM cart_items WHERE id = $1 AND user_id = $2")
                .bind(item_id.as_uuid())
                .bind(user_id.as_uuid())
                .execute(&mut *tx)
                .await?;
        }

        for user_id in &changes.cart_clears {
            sqlx::query("DELETE FROM cart_items WHERE user_id = $1")
                .bind(user_id.as_uuid())
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        metrics::counter!("market_store_commits_total", "backend" => "postgres").increment(1);
        Ok(())
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.map(Self::row_to_user).transpose()
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE username = $1");
        let row = sqlx::query(&sql)
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Self::row_to_user).transpose()
    }

    async fn find_user_by_wallet(&self, wallet: &WalletAddress) -> Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE wallet_address = $1");
        let row = sqlx::query(&sql)
            .bind(wallet.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.map(Self::row_to_user).transpose()
    }

    async fn list_users(&self, query: UserQuery) -> Result<Vec<User>> {
        let sql = format!(
            r#"
            SELECT {USER_COLUMNS} FROM users
            WHERE ($1::TEXT IS NULL OR role = $1) AND ($2::TEXT IS NULL OR parent_address = $2)
            ORDER BY created_at ASC, username ASC
            "#
        );
        let rows = sqlx::query(&sql)
            .bind(query.role.map(|r| r.as_str()))
            .bind(query.parent.map(String::from))
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(Self::row_to_user).collect()
    }

    async fn delete_user(&self, id: UserId) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let wallet: Option<String> =
            sqlx::query_scalar("SELECT wallet_address FROM users WHERE id = $1")
                .bind(id.as_uuid())
                .fetch_optional(&mut *tx)
                .await?;
        let wallet = wallet.ok_or_else(|| StoreError::NotFound {
            entity: "user",
            id: id.to_string(),
        })?;

        let in_ledger: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM transactions WHERE from_address = $1 OR to_address = $1)",
        )
        .bind(&wallet)
        .fetch_one(&mut *tx)
        .await?;
        if in_ledger {
            return Err(StoreError::ConstraintViolation(format!(
                "user {id} has ledger history"
            )));
        }

        // Tickets, events, staff and cart listings reference the wallet by foreign key
        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(map_write_error)?;

        tx.commit().await?;
        Ok(())
    }

    async fn get_event(&self, id: EventId) -> Result<Option<Event>> {
        let sql = format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.map(Self::row_to_event).transpose()
    }

    async fn list_events(&self, creator: Option<WalletAddress>) -> Result<Vec<Event>> {
        let sql = format!(
            r#"
            SELECT {EVENT_COLUMNS} FROM events
            WHERE ($1::TEXT IS NULL OR creator_address = $1)
            ORDER BY created_at ASC, id ASC
            "#
        );
        let rows = sqlx::query(&sql)
            .bind(creator.map(String::from))
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(Self::row_to_event).collect()
    }

    async fn get_ticket(&self, id: TicketId) -> Result<Option<Ticket>> {
        let sql = format!("SELECT {TICKET_COLUMNS} FROM tickets WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.map(Self::row_to_ticket).transpose()
    }

    async fn list_tickets(&self, query: TicketQuery) -> Result<Vec<Ticket>> {
        let mut sql = format!("SELECT {TICKET_COLUMNS} FROM tickets WHERE 1=1");
        let mut param_count = 0;

        // Build dynamic query
        if query.owner.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND owner_address = ${param_count}"));
        }
        if query.event_id.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND event_id = ${param_count}"));
        }
        if query.statuses.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND status = ANY(${param_count})"));
        }
        if query.price.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND price_cents = ${param_count}"));
        }

        sql.push_str(" ORDER BY event_id ASC, serial ASC");

        if query.limit.is_some() {
            param_count += 1;
            sql.push_str(&format!(" LIMIT ${param_count}"));
        }

        let mut sqlx_query = sqlx::query(&sql);

        if let Some(owner) = query.owner {
            sqlx_query = sqlx_query.bind(String::from(owner));
        }
        if let Some(event_id) = query.event_id {
            sqlx_query = sqlx_query.bind(event_id.as_uuid());
        }
        if let Some(statuses) = query.statuses {
            let labels: Vec<String> = statuses.iter().map(|s| s.as_str().to_string()).collect();
            sqlx_query = sqlx_query.bind(labels);
        }
        if let Some(price) = query.price {
            sqlx_query = sqlx_query.bind(price.cents());
        }
        if let Some(limit) = query.limit {
            sqlx_query = sqlx_query.bind(limit as i64);
        }

        let rows = sqlx_query.fetch_all(&self.pool).await?;
        rows.into_iter().map(Self::row_to_ticket).collect()
    }

    async fn list_transactions(&self, query: LedgerQuery) -> Result<Vec<Transaction>> {
        let mut sql = format!("SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE 1=1");
        let mut param_count = 0;

        if query.involving.is_some() {
            param_count += 1;
            sql.push_str(&format!(
                " AND (from_address = ${param_count} OR to_address = ${param_count})"
            ));
        }
        if query.received_by.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND to_address = ${param_count}"));
        }
        if query.kind.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND kind = ${param_count}"));
        }

        sql.push_str(" ORDER BY created_at DESC, seq DESC");

        if query.limit.is_some() {
            param_count += 1;
            sql.push_str(&format!(" LIMIT ${param_count}"));
        }

        let mut sqlx_query = sqlx::query(&sql);

        if let Some(wallet) = query.involving {
            sqlx_query = sqlx_query.bind(String::from(wallet));
        }
        if let Some(wallet) = query.received_by {
            sqlx_query = sqlx_query.bind(String::from(wallet));
        }
        if let Some(kind) = query.kind {
            sqlx_query = sqlx_query.bind(kind.as_str());
        }
        if let Some(limit) = query.limit {
            sqlx_query = sqlx_query.bind(limit as i64);
        }

        let rows = sqlx_query.fetch_all(&self.pool).await?;
        rows.into_iter().map(Self::row_to_transaction).collect()
    }

    async fn list_cart(&self, user_id: UserId) -> Result<Vec<CartItem>> {
        let sql = format!("SELECT {CART_COLUMNS} FROM cart_items WHERE user_id = $1 ORDER BY seq ASC");
        let rows = sqlx::query(&sql)
            .bind(user_id.as_uuid())
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(Self::row_to_cart_item).collect()
    }
}

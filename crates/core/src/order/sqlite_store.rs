//! SQLite-backed order store implementation.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use rust_decimal::Decimal;
use tokio::sync::broadcast;

use super::{
    Actor, ChangeKind, CreateOrderRequest, FileRef, Order, OrderChange, OrderError, OrderFilter,
    OrderStatus, OrderStore, StatusChange,
};

/// Default capacity of the change notification channel.
pub const DEFAULT_CHANGE_CAPACITY: usize = 256;

const SELECT_COLUMNS: &str =
    "id, owner_id, shop_id, status, total_pages, total_price, files, created_at, updated_at";

/// Raw column values of one `orders` row.
struct OrderRow {
    id: String,
    owner_id: String,
    shop_id: String,
    status: String,
    total_pages: u32,
    total_price: String,
    files: String,
    created_at: String,
    updated_at: String,
}

impl OrderRow {
    fn read(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            owner_id: row.get(1)?,
            shop_id: row.get(2)?,
            status: row.get(3)?,
            total_pages: row.get(4)?,
            total_price: row.get(5)?,
            files: row.get(6)?,
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
        })
    }

    fn into_order(self) -> Result<Order, OrderError> {
        let status: OrderStatus = self
            .status
            .parse()
            .map_err(|e| OrderError::Database(format!("Corrupt row {}: {}", self.id, e)))?;
        let total_price: Decimal = self.total_price.parse().map_err(|e| {
            OrderError::Database(format!("Corrupt price in row {}: {}", self.id, e))
        })?;
        let files: Vec<FileRef> = serde_json::from_str(&self.files).map_err(|e| {
            OrderError::Database(format!("Corrupt files in row {}: {}", self.id, e))
        })?;

        Ok(Order {
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
            id: self.id,
            owner_id: self.owner_id,
            shop_id: self.shop_id,
            status,
            total_pages: self.total_pages,
            total_price,
            files,
        })
    }
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, OrderError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| OrderError::Database(format!("Invalid timestamp {}: {}", value, e)))
}

/// Fixed-width so that lexical order equals chronological order.
fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Current time at the precision the store persists.
fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

fn db_err(e: rusqlite::Error) -> OrderError {
    OrderError::Database(e.to_string())
}

/// SQLite-backed order store.
///
/// All writes go through one connection mutex; change notifications are
/// published before the lock is released so subscribers see commit order.
pub struct SqliteOrderStore {
    conn: Mutex<Connection>,
    changes: broadcast::Sender<OrderChange>,
}

impl SqliteOrderStore {
    /// Create a new SQLite order store, creating the database file and tables if needed.
    pub fn new(path: &Path) -> Result<Self, OrderError> {
        let conn = Connection::open(path).map_err(db_err)?;
        Self::from_connection(conn)
    }

    /// Create an in-memory SQLite order store (useful for testing).
    pub fn in_memory() -> Result<Self, OrderError> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, OrderError> {
        Self::initialize_schema(&conn)?;
        let (changes, _) = broadcast::channel(DEFAULT_CHANGE_CAPACITY);
        Ok(Self {
            conn: Mutex::new(conn),
            changes,
        })
    }

    /// Replace the change channel with one of the given capacity.
    ///
    /// Call before handing the store to any subscriber.
    pub fn with_change_capacity(mut self, capacity: usize) -> Self {
        let (changes, _) = broadcast::channel(capacity.max(1));
        self.changes = changes;
        self
    }

    fn initialize_schema(conn: &Connection) -> Result<(), OrderError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS orders (
                id TEXT PRIMARY KEY,
                owner_id TEXT NOT NULL,
                shop_id TEXT NOT NULL,
                status TEXT NOT NULL,
                total_pages INTEGER NOT NULL,
                total_price TEXT NOT NULL,
                files TEXT NOT NULL DEFAULT '[]',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_orders_owner_id ON orders(owner_id);
            CREATE INDEX IF NOT EXISTS idx_orders_shop_id ON orders(shop_id);
            CREATE INDEX IF NOT EXISTS idx_orders_created_at ON orders(created_at DESC);
            "#,
        )
        .map_err(db_err)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, OrderError> {
        self.conn
            .lock()
            .map_err(|_| OrderError::Database("connection lock poisoned".to_string()))
    }

    fn publish(&self, order: &Order, kind: ChangeKind) {
        // No receivers is not an error: nobody is watching.
        let _ = self.changes.send(OrderChange::of(order, kind));
    }

    fn fetch(conn: &Connection, id: &str) -> Result<Option<Order>, OrderError> {
        let sql = format!("SELECT {} FROM orders WHERE id = ?", SELECT_COLUMNS);
        conn.query_row(&sql, params![id], OrderRow::read)
            .optional()
            .map_err(db_err)?
            .map(OrderRow::into_order)
            .transpose()
    }

    fn fetch_existing(conn: &Connection, id: &str) -> Result<Order, OrderError> {
        Self::fetch(conn, id)?.ok_or_else(|| OrderError::NotFound(id.to_string()))
    }

    fn build_where_clause(filter: &OrderFilter) -> (String, Vec<Box<dyn rusqlite::ToSql>>) {
        let mut conditions = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(ref owner_id) = filter.owner_id {
            conditions.push("owner_id = ?");
            params.push(Box::new(owner_id.clone()));
        }

        if let Some(ref shop_id) = filter.shop_id {
            conditions.push("shop_id = ?");
            params.push(Box::new(shop_id.clone()));
        }

        if let Some(status) = filter.status {
            conditions.push("status = ?");
            params.push(Box::new(status.as_str()));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        (where_clause, params)
    }
}

impl OrderStore for SqliteOrderStore {
    fn create(&self, request: CreateOrderRequest) -> Result<Order, OrderError> {
        request.validate()?;

        let created_at = now();
        let order = Order {
            id: uuid::Uuid::new_v4().to_string(),
            owner_id: request.owner_id,
            shop_id: request.shop_id,
            status: OrderStatus::Pending,
            total_pages: request.total_pages,
            total_price: request.total_price,
            files: Vec::new(),
            created_at,
            updated_at: created_at,
        };

        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO orders (id, owner_id, shop_id, status, total_pages, total_price, files, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, '[]', ?, ?)",
            params![
                order.id,
                order.owner_id,
                order.shop_id,
                order.status.as_str(),
                order.total_pages,
                order.total_price.to_string(),
                format_timestamp(&order.created_at),
                format_timestamp(&order.updated_at),
            ],
        )
        .map_err(db_err)?;

        self.publish(&order, ChangeKind::Created);
        Ok(order)
    }

    fn get(&self, id: &str) -> Result<Option<Order>, OrderError> {
        let conn = self.lock()?;
        Self::fetch(&conn, id)
    }

    fn list(&self, filter: &OrderFilter) -> Result<Vec<Order>, OrderError> {
        let conn = self.lock()?;

        let (where_clause, params) = Self::build_where_clause(filter);

        let sql = format!(
            "SELECT {} FROM orders {} ORDER BY created_at DESC, rowid DESC LIMIT ? OFFSET ?",
            SELECT_COLUMNS, where_clause
        );

        let mut stmt = conn.prepare(&sql).map_err(db_err)?;

        let mut all_params: Vec<Box<dyn rusqlite::ToSql>> = params;
        all_params.push(Box::new(filter.limit));
        all_params.push(Box::new(filter.offset));

        let param_refs: Vec<&dyn rusqlite::ToSql> = all_params.iter().map(|p| p.as_ref()).collect();

        let rows = stmt
            .query_map(param_refs.as_slice(), OrderRow::read)
            .map_err(db_err)?;

        let mut orders = Vec::new();
        for row_result in rows {
            orders.push(row_result.map_err(db_err)?.into_order()?);
        }

        Ok(orders)
    }

    fn count(&self, filter: &OrderFilter) -> Result<i64, OrderError> {
        let conn = self.lock()?;

        let (where_clause, params) = Self::build_where_clause(filter);
        let sql = format!("SELECT COUNT(*) FROM orders {}", where_clause);
        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        conn.query_row(&sql, param_refs.as_slice(), |row| row.get(0))
            .map_err(db_err)
    }

    fn attach_files(&self, id: &str, files: Vec<FileRef>) -> Result<Order, OrderError> {
        if id.trim().is_empty() {
            return Err(OrderError::Validation("order id is required".to_string()));
        }
        if files.is_empty() {
            return Err(OrderError::Validation(
                "at least one file is required".to_string(),
            ));
        }

        let conn = self.lock()?;
        let current = Self::fetch_existing(&conn, id)?;
        if current.has_files() {
            return Err(OrderError::FilesAlreadyAttached(id.to_string()));
        }

        let files_json =
            serde_json::to_string(&files).map_err(|e| OrderError::Database(e.to_string()))?;
        conn.execute(
            "UPDATE orders SET files = ? WHERE id = ?",
            params![files_json, id],
        )
        .map_err(db_err)?;

        let order = Order { files, ..current };
        self.publish(&order, ChangeKind::Updated);
        Ok(order)
    }

    fn update_status(
        &self,
        id: &str,
        new_status: OrderStatus,
        actor: Actor,
    ) -> Result<StatusChange, OrderError> {
        let conn = self.lock()?;
        let current = Self::fetch_existing(&conn, id)?;

        let status = current
            .status
            .transition(new_status, actor)
            .map_err(|source| OrderError::IllegalTransition {
                order_id: id.to_string(),
                source,
            })?;

        let updated_at = now();
        conn.execute(
            "UPDATE orders SET status = ?, updated_at = ? WHERE id = ?",
            params![status.as_str(), format_timestamp(&updated_at), id],
        )
        .map_err(db_err)?;

        let previous = current.status;
        let order = Order {
            status,
            updated_at,
            ..current
        };
        self.publish(&order, ChangeKind::Updated);

        Ok(StatusChange { previous, order })
    }

    fn delete(&self, id: &str) -> Result<Order, OrderError> {
        let conn = self.lock()?;
        let order = Self::fetch_existing(&conn, id)?;

        conn.execute("DELETE FROM orders WHERE id = ?", params![id])
            .map_err(db_err)?;

        self.publish(&order, ChangeKind::Removed);
        Ok(order)
    }

    fn subscribe(&self) -> broadcast::Receiver<OrderChange> {
        self.changes.subscribe()
    }
}

//! Postgres-backed transaction store.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError | Scenario |
//! |------------|----------------------|------------|----------|
//! | Database (check violation) | `23514` | `Storage` | Row rejected by a CHECK constraint |
//! | Database (foreign key violation) | `23503` | `Storage` | Item insert referencing a missing header |
//! | Database (other) | Any other | `Storage` | Other database errors |
//! | PoolClosed | N/A | `Storage` | Connection pool was closed |
//! | Other | N/A | `Storage` | Network errors, connection failures, decoding |
//!
//! `InsufficientStock` is never derived from a database error: it is reported
//! when the conditional stock decrement matches no row.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool, Row};
use tracing::{Span, field, instrument};

use tillpoint_core::{ProductId, TransactionId, TransactionItemId};
use tillpoint_sales::{NewTransaction, Transaction, TransactionItem};

use super::query::{ListQuery, Page};
use super::{StoreError, TransactionStore};

const HEADER_COLUMNS: &str =
    "t.id, t.transaction_date, t.total_amount, t.created_at, t.updated_at, t.deleted_at";

const ITEM_COLUMNS: &str =
    "id, transaction_id, product_id, product_name, price, quantity, subtotal, created_at, updated_at";

/// Live rows matching an optional `$1` ILIKE pattern on id, total or any
/// item's product name.
const LIST_FILTER: &str = r#"
    t.deleted_at IS NULL
    AND (
        $1::text IS NULL
        OR t.id::text ILIKE $1
        OR t.total_amount::text ILIKE $1
        OR EXISTS (
            SELECT 1 FROM transaction_items i
            WHERE i.transaction_id = t.id AND i.product_name ILIKE $1
        )
    )
"#;

/// Postgres transaction store.
///
/// ## Atomic create
///
/// `create()` opens one database transaction and, for every item in caller
/// order, inserts the item row and then runs
///
/// ```sql
/// UPDATE products SET stock = stock - $qty WHERE id = $id AND stock >= $qty
/// ```
///
/// The guard and the write are a single statement, so Postgres row locking
/// serializes competing decrements on the same product. A decrement that
/// matches no row rolls the whole unit of work back.
#[derive(Debug, Clone)]
pub struct PostgresTransactionStore {
    pool: Arc<PgPool>,
}

impl PostgresTransactionStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub fn from_shared(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    async fn load_items(
        &self,
        transaction_ids: &[i64],
    ) -> Result<HashMap<TransactionId, Vec<TransactionItem>>, StoreError> {
        let mut by_transaction: HashMap<TransactionId, Vec<TransactionItem>> = HashMap::new();
        if transaction_ids.is_empty() {
            return Ok(by_transaction);
        }

        let rows = sqlx::query(&format!(
            "SELECT {ITEM_COLUMNS} FROM transaction_items \
             WHERE transaction_id = ANY($1) ORDER BY transaction_id, id"
        ))
        .bind(transaction_ids)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_items", e))?;

        for row in rows {
            let item: TransactionItem = ItemRow::from_row(&row)
                .map_err(|e| StoreError::Storage(format!("failed to decode item row: {e}")))?
                .into();
            by_transaction.entry(item.transaction_id).or_default().push(item);
        }
        Ok(by_transaction)
    }
}

#[async_trait::async_trait]
impl TransactionStore for PostgresTransactionStore {
    #[instrument(
        skip(self, transaction),
        fields(
            operation = field::Empty,
            item_count = transaction.items().len(),
            transaction_id = field::Empty
        ),
        err
    )]
    async fn create(&self, transaction: NewTransaction) -> Result<Transaction, StoreError> {
        let span = Span::current();
        span.record("operation", "create_transaction");

        let now = Utc::now();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let row = sqlx::query(
            r#"
            INSERT INTO transactions (transaction_date, total_amount, created_at, updated_at)
            VALUES ($1, $2, $3, $3)
            RETURNING id, transaction_date, total_amount, created_at, updated_at, deleted_at
            "#,
        )
        .bind(transaction.transaction_date())
        .bind(transaction.total_amount())
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert_transaction", e))?;

        let header = HeaderRow::from_row(&row)
            .map_err(|e| StoreError::Storage(format!("failed to decode transaction row: {e}")))?;
        span.record("transaction_id", header.id);

        let mut items = Vec::with_capacity(transaction.items().len());
        for item in transaction.items() {
            let row = sqlx::query(&format!(
                "INSERT INTO transaction_items \
                 (transaction_id, product_id, product_name, price, quantity, subtotal, created_at, updated_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $7) \
                 RETURNING {ITEM_COLUMNS}"
            ))
            .bind(header.id)
            .bind(item.product_id.get())
            .bind(&item.product_name)
            .bind(item.price)
            .bind(item.quantity)
            .bind(item.subtotal)
            .bind(now)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("insert_item", e))?;

            let stored: TransactionItem = ItemRow::from_row(&row)
                .map_err(|e| StoreError::Storage(format!("failed to decode item row: {e}")))?
                .into();
            items.push(stored);

            let decremented = sqlx::query(
                r#"
                UPDATE products
                SET stock = stock - $1, updated_at = $2
                WHERE id = $3 AND stock >= $1
                "#,
            )
            .bind(item.quantity)
            .bind(now)
            .bind(item.product_id.get())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("decrement_stock", e))?;

            if decremented.rows_affected() == 0 {
                tx.rollback()
                    .await
                    .map_err(|e| map_sqlx_error("rollback", e))?;
                tracing::info!(
                    product_id = %item.product_id,
                    requested = item.quantity,
                    "conditional stock decrement matched no row; rolled back"
                );
                return Err(StoreError::InsufficientStock(item.product_id));
            }
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit", e))?;

        Ok(header.into_transaction(items))
    }

    #[instrument(skip(self), fields(operation = field::Empty, transaction_id = %id), err)]
    async fn get(&self, id: TransactionId) -> Result<Option<Transaction>, StoreError> {
        Span::current().record("operation", "get_transaction");

        let row = sqlx::query(&format!(
            "SELECT {HEADER_COLUMNS} FROM transactions t WHERE t.id = $1 AND t.deleted_at IS NULL"
        ))
        .bind(id.get())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_transaction", e))?;

        let Some(row) = row else {
            return Ok(None);
        };
        let header = HeaderRow::from_row(&row)
            .map_err(|e| StoreError::Storage(format!("failed to decode transaction row: {e}")))?;

        let mut items = self.load_items(&[header.id]).await?;
        let items = items.remove(&id).unwrap_or_default();
        Ok(Some(header.into_transaction(items)))
    }

    #[instrument(
        skip(self, query),
        fields(
            operation = field::Empty,
            page = query.page,
            limit = query.limit,
            sort_by = query.sort_by.column(),
            total = field::Empty
        ),
        err
    )]
    async fn list(&self, query: &ListQuery) -> Result<Page<Transaction>, StoreError> {
        let span = Span::current();
        span.record("operation", "list_transactions");

        let pattern = query.like_pattern();

        let total: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM transactions t WHERE {LIST_FILTER}"
        ))
        .bind(pattern.as_deref())
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("count_transactions", e))?;
        span.record("total", total);

        // Column and direction come from enums, never from caller text.
        let direction = query.order.keyword();
        let rows = sqlx::query(&format!(
            "SELECT {HEADER_COLUMNS} FROM transactions t WHERE {LIST_FILTER} \
             ORDER BY t.{column} {direction}, t.id {direction} \
             LIMIT $2 OFFSET $3",
            column = query.sort_by.column(),
        ))
        .bind(pattern.as_deref())
        .bind(i64::from(query.limit))
        .bind(i64::try_from(query.offset()).unwrap_or(i64::MAX))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_transactions", e))?;

        let mut headers = Vec::with_capacity(rows.len());
        for row in rows {
            headers.push(HeaderRow::from_row(&row).map_err(|e| {
                StoreError::Storage(format!("failed to decode transaction row: {e}"))
            })?);
        }

        let ids: Vec<i64> = headers.iter().map(|h| h.id).collect();
        let mut items = self.load_items(&ids).await?;

        let transactions = headers
            .into_iter()
            .map(|h| {
                let own = items.remove(&TransactionId::new(h.id)).unwrap_or_default();
                h.into_transaction(own)
            })
            .collect();

        Ok(Page {
            items: transactions,
            page: query.page,
            limit: query.limit,
            total: u64::try_from(total).unwrap_or(0),
        })
    }

    #[instrument(skip(self), fields(operation = field::Empty, transaction_id = %id), err)]
    async fn soft_delete(&self, id: TransactionId) -> Result<(), StoreError> {
        Span::current().record("operation", "soft_delete_transaction");

        let result = sqlx::query(
            r#"
            UPDATE transactions
            SET deleted_at = $1, updated_at = $1
            WHERE id = $2 AND deleted_at IS NULL
            "#,
        )
        .bind(Utc::now())
        .bind(id.get())
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("soft_delete_transaction", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("ping", e))?;
        Ok(())
    }
}

/// Map a sqlx error to `StoreError`, tagging the failing operation.
pub(crate) fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23514") => StoreError::Storage(format!("check constraint violated: {msg}")),
                Some("23503") => StoreError::Storage(format!("foreign key violated: {msg}")),
                _ => StoreError::Storage(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            StoreError::Storage(format!("connection pool closed in {}", operation))
        }
        sqlx::Error::PoolTimedOut => {
            StoreError::Storage(format!("timed out acquiring a connection in {}", operation))
        }
        _ => StoreError::Storage(format!("sqlx error in {}: {}", operation, err)),
    }
}

// SQLx row types

#[derive(Debug)]
struct HeaderRow {
    id: i64,
    transaction_date: DateTime<Utc>,
    total_amount: Decimal,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for HeaderRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(HeaderRow {
            id: row.try_get("id")?,
            transaction_date: row.try_get("transaction_date")?,
            total_amount: row.try_get("total_amount")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            deleted_at: row.try_get("deleted_at")?,
        })
    }
}

impl HeaderRow {
    fn into_transaction(self, items: Vec<TransactionItem>) -> Transaction {
        Transaction {
            id: TransactionId::new(self.id),
            transaction_date: self.transaction_date,
            total_amount: self.total_amount,
            items,
            created_at: self.created_at,
            updated_at: self.updated_at,
            deleted_at: self.deleted_at,
        }
    }
}

#[derive(Debug)]
struct ItemRow {
    id: i64,
    transaction_id: i64,
    product_id: i64,
    product_name: String,
    price: Decimal,
    quantity: i32,
    subtotal: Decimal,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for ItemRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(ItemRow {
            id: row.try_get("id")?,
            transaction_id: row.try_get("transaction_id")?,
            product_id: row.try_get("product_id")?,
            product_name: row.try_get("product_name")?,
            price: row.try_get("price")?,
            quantity: row.try_get("quantity")?,
            subtotal: row.try_get("subtotal")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl From<ItemRow> for TransactionItem {
    fn from(row: ItemRow) -> Self {
        TransactionItem {
            id: TransactionItemId::new(row.id),
            transaction_id: TransactionId::new(row.transaction_id),
            product_id: ProductId::new(row.product_id),
            product_name: row.product_name,
            price: row.price,
            quantity: row.quantity,
            subtotal: row.subtotal,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

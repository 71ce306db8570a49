//! Postgres-backed transactional store.
//!
//! A session owns one `sqlx::Transaction`. The transaction lives behind an
//! async mutex, so operations issued concurrently on one session are
//! serialised on that connection instead of interleaving on the wire.
//!
//! ## Error Mapping
//!
//! SQLx errors are mapped to `StoreError` as follows:
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError | Scenario |
//! |------------|----------------------|------------|----------|
//! | Database (unique violation) | `23505` | `Conflict` | Concurrent insert of the same key |
//! | Database (serialization failure) | `40001` | `Conflict` | Concurrent transactions touched the same rows |
//! | Database (deadlock detected) | `40P01` | `Conflict` | Two transactions waited on each other |
//! | Database (not-null / check violation) | `23502` / `23514` | `Validation` | Record breaks its schema |
//! | Database (other) | Any other | `Database` | Other database errors |
//! | PoolClosed / PoolTimedOut / Io / Tls | N/A | `Connection` | Database unreachable |
//! | Other | N/A | `Database` | Decode errors, protocol errors, etc. |

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use tokio::sync::Mutex;
use tracing::instrument;
use uuid::Uuid;

use txduel_catalog::{Price, Product};
use txduel_core::{PriceId, ProductId};

use super::r#trait::{Collection, Database, StoreError, TransactionSession, UpdateResult};

const CREATE_PRODUCTS: &str = r#"
    CREATE TABLE IF NOT EXISTS products (
        id UUID PRIMARY KEY,
        name TEXT NOT NULL CHECK (btrim(name) <> ''),
        deleted BOOLEAN NOT NULL DEFAULT FALSE,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
"#;

const CREATE_PRICES: &str = r#"
    CREATE TABLE IF NOT EXISTS prices (
        id UUID PRIMARY KEY,
        name TEXT NOT NULL CHECK (btrim(name) <> ''),
        amount DOUBLE PRECISION NOT NULL,
        deleted BOOLEAN NOT NULL DEFAULT FALSE,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
"#;

/// Postgres-backed database handle.
///
/// Cheap to clone; clones share the same connection pool.
#[derive(Debug, Clone)]
pub struct PostgresDatabase {
    pool: Arc<PgPool>,
}

impl PostgresDatabase {
    pub fn new(pool: PgPool) -> Self {
        Self { pool: Arc::new(pool) }
    }

    /// Connect to `database_url`. Failure here is fatal to a run.
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPool::connect(database_url)
            .await
            .map_err(|e| StoreError::Connection(format!("could not connect to postgres: {e}")))?;
        Ok(Self::new(pool))
    }

    /// Create the catalog tables if they are missing.
    #[instrument(skip(self), err)]
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        for ddl in [CREATE_PRODUCTS, CREATE_PRICES] {
            sqlx::query(ddl)
                .execute(&*self.pool)
                .await
                .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        }
        Ok(())
    }

    pub async fn insert_product(&self, product: &Product) -> Result<(), StoreError> {
        use txduel_core::{Entity, SoftDelete};

        sqlx::query(
            r#"
            INSERT INTO products (id, name, deleted, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(product.id().as_uuid())
        .bind(product.name())
        .bind(product.is_deleted())
        .bind(product.created_at())
        .bind(product.updated_at())
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_product", e))?;
        Ok(())
    }

    pub async fn insert_price(&self, price: &Price) -> Result<(), StoreError> {
        use txduel_core::{Entity, SoftDelete};

        sqlx::query(
            r#"
            INSERT INTO prices (id, name, amount, deleted, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(price.id().as_uuid())
        .bind(price.name())
        .bind(price.amount())
        .bind(price.is_deleted())
        .bind(price.created_at())
        .bind(price.updated_at())
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_price", e))?;
        Ok(())
    }

    /// Committed products, oldest first.
    pub async fn products(&self) -> Result<Vec<Product>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, name, deleted, created_at, updated_at FROM products ORDER BY created_at, id",
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_products", e))?;

        rows.iter().map(product_from_row).collect()
    }

    /// Committed prices, oldest first.
    pub async fn prices(&self) -> Result<Vec<Price>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, name, amount, deleted, created_at, updated_at FROM prices ORDER BY created_at, id",
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_prices", e))?;

        rows.iter().map(price_from_row).collect()
    }
}

fn read_column<'r, T>(row: &'r PgRow, column: &str) -> Result<T, StoreError>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get(column)
        .map_err(|e| StoreError::Database(format!("failed to read {column}: {e}")))
}

fn product_from_row(row: &PgRow) -> Result<Product, StoreError> {
    let id: Uuid = read_column(row, "id")?;
    let created_at: DateTime<Utc> = read_column(row, "created_at")?;
    let updated_at: DateTime<Utc> = read_column(row, "updated_at")?;
    Ok(Product::restore(
        ProductId::from_uuid(id),
        read_column(row, "name")?,
        read_column(row, "deleted")?,
        created_at,
        updated_at,
    )?)
}

fn price_from_row(row: &PgRow) -> Result<Price, StoreError> {
    let id: Uuid = read_column(row, "id")?;
    let created_at: DateTime<Utc> = read_column(row, "created_at")?;
    let updated_at: DateTime<Utc> = read_column(row, "updated_at")?;
    Ok(Price::restore(
        PriceId::from_uuid(id),
        read_column(row, "name")?,
        read_column(row, "amount")?,
        read_column(row, "deleted")?,
        created_at,
        updated_at,
    )?)
}

#[async_trait::async_trait]
impl Database for PostgresDatabase {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    #[instrument(skip(self), err)]
    async fn start_session(&self) -> Result<Box<dyn TransactionSession>, StoreError> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        Ok(Box::new(PostgresSession {
            tx: Mutex::new(Some(tx)),
        }))
    }
}

/// One open transaction. Dropping it without commit rolls back.
pub struct PostgresSession {
    tx: Mutex<Option<Transaction<'static, Postgres>>>,
}

fn soft_delete_statement(collection: Collection) -> &'static str {
    match collection {
        Collection::Products => "UPDATE products SET deleted = TRUE, updated_at = NOW()",
        Collection::Prices => "UPDATE prices SET deleted = TRUE, updated_at = NOW()",
    }
}

#[async_trait::async_trait]
impl TransactionSession for PostgresSession {
    #[instrument(skip(self), err)]
    async fn soft_delete_all(&self, collection: Collection) -> Result<UpdateResult, StoreError> {
        let mut guard = self.tx.lock().await;
        let tx = guard.as_mut().ok_or(StoreError::SessionClosed)?;

        let done = sqlx::query(soft_delete_statement(collection))
            .execute(&mut **tx)
            .await
            .map_err(|e| map_sqlx_error("soft_delete_all", e))?;

        Ok(UpdateResult::acknowledged(done.rows_affected()))
    }

    #[instrument(skip(self), err)]
    async fn commit(&self) -> Result<(), StoreError> {
        let tx = self.tx.lock().await.take().ok_or(StoreError::SessionClosed)?;
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }

    #[instrument(skip(self), err)]
    async fn abort(&self) -> Result<(), StoreError> {
        let tx = self.tx.lock().await.take().ok_or(StoreError::SessionClosed)?;
        tx.rollback()
            .await
            .map_err(|e| map_sqlx_error("rollback", e))
    }
}

/// Map SQLx errors to StoreError.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());

            match db_err.code().as_deref() {
                // unique violation, serialization failure, deadlock
                Some("23505") | Some("40001") | Some("40P01") => StoreError::Conflict(msg),
                // not-null / check violation
                Some("23502") | Some("23514") => StoreError::Validation(msg),
                _ => StoreError::Database(msg),
            }
        }
        sqlx::Error::PoolClosed => StoreError::Connection(format!("connection pool closed in {operation}")),
        sqlx::Error::PoolTimedOut => StoreError::Connection(format!("connection pool timed out in {operation}")),
        sqlx::Error::Io(e) => StoreError::Connection(format!("io error in {operation}: {e}")),
        sqlx::Error::Tls(e) => StoreError::Connection(format!("tls error in {operation}: {e}")),
        _ => StoreError::Database(format!("sqlx error in {}: {}", operation, err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statements_target_their_own_table() {
        assert!(soft_delete_statement(Collection::Products).starts_with("UPDATE products"));
        assert!(soft_delete_statement(Collection::Prices).starts_with("UPDATE prices"));
    }

    #[test]
    fn pool_errors_map_to_connection_failures() {
        match map_sqlx_error("begin_transaction", sqlx::Error::PoolTimedOut) {
            StoreError::Connection(msg) => assert!(msg.contains("begin_transaction")),
            other => panic!("Expected Connection error, got {other:?}"),
        }
    }

    #[test]
    fn row_not_found_maps_to_database_error() {
        assert!(matches!(
            map_sqlx_error("load_products", sqlx::Error::RowNotFound),
            StoreError::Database(_)
        ));
    }
}

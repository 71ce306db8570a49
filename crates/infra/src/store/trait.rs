use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Collections the harness mutates.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    Products,
    Prices,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Products => "products",
            Collection::Prices => "prices",
        }
    }
}

impl core::fmt::Display for Collection {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Acknowledgement of a bulk update.
///
/// Soft delete always bumps `updated_at`, so every matched record counts as
/// modified, including records that were already deleted.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateResult {
    pub acknowledged: bool,
    pub matched_count: u64,
    pub modified_count: u64,
}

impl UpdateResult {
    pub fn acknowledged(count: u64) -> Self {
        Self {
            acknowledged: true,
            matched_count: count,
            modified_count: count,
        }
    }
}

/// Store operation error.
///
/// These are **infrastructure errors** (connectivity, transaction and session
/// failures). Strategies turn them into failed outcomes; only
/// `Connection` errors raised while connecting are fatal to a run.
///
/// ## Error Categories
///
/// - **Connection**: the database could not be reached
/// - **Validation**: a stored record violates its schema
/// - **Conflict**: write conflict or serialization failure at commit
/// - **SessionBusy**: an operation overlapped another on the same session
/// - **SessionClosed**: the session was already committed or aborted
/// - **Database**: any other driver-level failure
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("write conflict: {0}")]
    Conflict(String),

    #[error("session busy: {0}")]
    SessionBusy(String),

    #[error("session already ended")]
    SessionClosed,

    #[error("database error: {0}")]
    Database(String),
}

impl From<txduel_core::DomainError> for StoreError {
    fn from(err: txduel_core::DomainError) -> Self {
        StoreError::Validation(err.to_string())
    }
}

/// A shared, read-only handle to the database.
///
/// One handle is created per process and passed to every strategy. It hands
/// out transaction sessions; it never mutates records itself.
#[async_trait::async_trait]
pub trait Database: Send + Sync {
    /// Short backend name for logs.
    fn backend(&self) -> &'static str;

    /// Open a session with a transaction already started on it.
    async fn start_session(&self) -> Result<Box<dyn TransactionSession>, StoreError>;
}

/// A transaction-scoped session.
///
/// Operations take `&self` so that several can be in flight on one session at
/// once. Whether the backend tolerates that is exactly what the harness
/// measures.
///
/// ## Lifecycle
///
/// `commit` or `abort` ends the session. Any further call (including a second
/// `commit`/`abort`) fails with `StoreError::SessionClosed`. Dropping a session
/// that was never ended discards its staged writes.
#[async_trait::async_trait]
pub trait TransactionSession: Send + Sync {
    /// Mark every record in `collection` deleted.
    async fn soft_delete_all(&self, collection: Collection) -> Result<UpdateResult, StoreError>;

    /// Make all writes of this session visible atomically.
    async fn commit(&self) -> Result<(), StoreError>;

    /// Discard all writes of this session.
    async fn abort(&self) -> Result<(), StoreError>;
}

#[async_trait::async_trait]
impl<D> Database for Arc<D>
where
    D: Database + ?Sized,
{
    fn backend(&self) -> &'static str {
        (**self).backend()
    }

    async fn start_session(&self) -> Result<Box<dyn TransactionSession>, StoreError> {
        (**self).start_session().await
    }
}

//! Transactional store boundary.
//!
//! This module defines the session-oriented interface the update strategies
//! run against, plus the two backends: an in-memory store for tests/dev and
//! a Postgres store for real runs.

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

use std::sync::Arc;

pub use in_memory::InMemoryDatabase;
pub use postgres::PostgresDatabase;
pub use r#trait::{Collection, Database, StoreError, TransactionSession, UpdateResult};

use crate::config::StoreBackend;

/// Establish the process-wide database handle for `backend`.
///
/// Postgres connections also ensure the catalog tables exist. The in-memory
/// backend comes pre-seeded so the bulk updates have records to match.
pub async fn connect(backend: &StoreBackend) -> Result<Arc<dyn Database>, StoreError> {
    match backend {
        StoreBackend::Postgres { database_url } => {
            let db = PostgresDatabase::connect(database_url).await?;
            db.ensure_schema().await?;
            tracing::info!(backend = "postgres", "database connected");
            Ok(Arc::new(db))
        }
        StoreBackend::InMemory { exclusive_sessions } => {
            let mut db = InMemoryDatabase::with_demo_catalog();
            if *exclusive_sessions {
                db = db.with_exclusive_sessions();
            }
            tracing::info!(
                backend = "in_memory",
                exclusive_sessions = *exclusive_sessions,
                "database connected"
            );
            Ok(Arc::new(db))
        }
    }
}

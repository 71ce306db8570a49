//! Infrastructure layer: configuration and the transactional store backends.

pub mod config;
pub mod store;

pub use config::{ConfigError, HarnessConfig, StoreBackend, DEFAULT_TRIALS};
pub use store::{
    connect, Collection, Database, InMemoryDatabase, PostgresDatabase, StoreError, TransactionSession,
    UpdateResult,
};

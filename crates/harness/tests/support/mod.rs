//! Test doubles shared by the harness integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use txduel_catalog::{Price, Product};
use txduel_harness::{Strategy, StrategyName, StrategyOutcome, UpdatePair};
use txduel_infra::{Collection, Database, InMemoryDatabase, StoreError, TransactionSession, UpdateResult};

fn empty_pair() -> UpdatePair {
    UpdatePair {
        product: UpdateResult::acknowledged(0),
        price: UpdateResult::acknowledged(0),
    }
}

/// Counts how often it was executed.
#[derive(Default)]
pub struct Calls(AtomicU32);

impl Calls {
    fn bump(&self) -> u32 {
        self.0.fetch_add(1, Ordering::SeqCst)
    }

    pub fn get(&self) -> u32 {
        self.0.load(Ordering::SeqCst)
    }
}

pub struct AlwaysSucceeds {
    pub name: StrategyName,
    pub calls: Calls,
}

impl AlwaysSucceeds {
    pub fn new(name: StrategyName) -> Self {
        Self {
            name,
            calls: Calls::default(),
        }
    }
}

#[async_trait::async_trait]
impl Strategy for AlwaysSucceeds {
    fn name(&self) -> StrategyName {
        self.name
    }

    async fn execute(&self) -> StrategyOutcome {
        self.calls.bump();
        StrategyOutcome::committed(self.name, empty_pair())
    }
}

pub struct AlwaysFails {
    pub calls: Calls,
}

impl AlwaysFails {
    pub fn new() -> Self {
        Self {
            calls: Calls::default(),
        }
    }
}

#[async_trait::async_trait]
impl Strategy for AlwaysFails {
    fn name(&self) -> StrategyName {
        StrategyName::Concurrent
    }

    async fn execute(&self) -> StrategyOutcome {
        self.calls.bump();
        StrategyOutcome::aborted(self.name(), "forced failure")
    }
}

/// Succeeds on the 1st, 3rd, 5th... call and fails on the others.
pub struct Alternating {
    pub calls: Calls,
}

impl Alternating {
    pub fn new() -> Self {
        Self {
            calls: Calls::default(),
        }
    }
}

#[async_trait::async_trait]
impl Strategy for Alternating {
    fn name(&self) -> StrategyName {
        StrategyName::Sequential
    }

    async fn execute(&self) -> StrategyOutcome {
        if self.calls.bump() % 2 == 0 {
            StrategyOutcome::committed(self.name(), empty_pair())
        } else {
            StrategyOutcome::aborted(self.name(), "odd call")
        }
    }
}

/// A database that can never open a session.
pub struct UnreachableDatabase;

#[async_trait::async_trait]
impl Database for UnreachableDatabase {
    fn backend(&self) -> &'static str {
        "unreachable"
    }

    async fn start_session(&self) -> Result<Box<dyn TransactionSession>, StoreError> {
        Err(StoreError::Connection("connection refused".to_string()))
    }
}

/// Wraps an in-memory database and records the order in which bulk updates
/// start on its sessions.
#[derive(Clone)]
pub struct RecordingDatabase {
    pub inner: InMemoryDatabase,
    pub log: Arc<Mutex<Vec<Collection>>>,
}

impl RecordingDatabase {
    pub fn new(inner: InMemoryDatabase) -> Self {
        Self {
            inner,
            log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn updates(&self) -> Vec<Collection> {
        self.log.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Database for RecordingDatabase {
    fn backend(&self) -> &'static str {
        "recording"
    }

    async fn start_session(&self) -> Result<Box<dyn TransactionSession>, StoreError> {
        let inner = self.inner.start_session().await?;
        Ok(Box::new(RecordingSession {
            inner,
            log: self.log.clone(),
        }))
    }
}

struct RecordingSession {
    inner: Box<dyn TransactionSession>,
    log: Arc<Mutex<Vec<Collection>>>,
}

#[async_trait::async_trait]
impl TransactionSession for RecordingSession {
    async fn soft_delete_all(&self, collection: Collection) -> Result<UpdateResult, StoreError> {
        self.log.lock().unwrap().push(collection);
        self.inner.soft_delete_all(collection).await
    }

    async fn commit(&self) -> Result<(), StoreError> {
        self.inner.commit().await
    }

    async fn abort(&self) -> Result<(), StoreError> {
        self.inner.abort().await
    }
}

/// Wraps an in-memory database; every session fails its commit with a
/// write conflict after the updates went through.
#[derive(Clone)]
pub struct FailingCommitDatabase {
    pub inner: InMemoryDatabase,
}

#[async_trait::async_trait]
impl Database for FailingCommitDatabase {
    fn backend(&self) -> &'static str {
        "failing_commit"
    }

    async fn start_session(&self) -> Result<Box<dyn TransactionSession>, StoreError> {
        let inner = self.inner.start_session().await?;
        Ok(Box::new(FailingCommitSession { inner }))
    }
}

struct FailingCommitSession {
    inner: Box<dyn TransactionSession>,
}

#[async_trait::async_trait]
impl TransactionSession for FailingCommitSession {
    async fn soft_delete_all(&self, collection: Collection) -> Result<UpdateResult, StoreError> {
        self.inner.soft_delete_all(collection).await
    }

    async fn commit(&self) -> Result<(), StoreError> {
        // The failed commit ends the transaction, like a real driver would.
        self.inner.abort().await?;
        Err(StoreError::Conflict("boom".to_string()))
    }

    async fn abort(&self) -> Result<(), StoreError> {
        self.inner.abort().await
    }
}

/// Wraps an in-memory database; just before each commit another writer adds
/// a product and a price, so the commit hits a revision conflict.
#[derive(Clone)]
pub struct RacingWriterDatabase {
    pub inner: InMemoryDatabase,
}

#[async_trait::async_trait]
impl Database for RacingWriterDatabase {
    fn backend(&self) -> &'static str {
        "racing_writer"
    }

    async fn start_session(&self) -> Result<Box<dyn TransactionSession>, StoreError> {
        let session = self.inner.start_session().await?;
        Ok(Box::new(RacingWriterSession {
            db: self.inner.clone(),
            inner: session,
        }))
    }
}

struct RacingWriterSession {
    db: InMemoryDatabase,
    inner: Box<dyn TransactionSession>,
}

#[async_trait::async_trait]
impl TransactionSession for RacingWriterSession {
    async fn soft_delete_all(&self, collection: Collection) -> Result<UpdateResult, StoreError> {
        self.inner.soft_delete_all(collection).await
    }

    async fn commit(&self) -> Result<(), StoreError> {
        let now = chrono::Utc::now();
        self.db.insert_product(Product::new("Late Arrival", now)?)?;
        self.db.insert_price(Price::new("Late Arrival retail", 12.0, now)?)?;
        self.inner.commit().await
    }

    async fn abort(&self) -> Result<(), StoreError> {
        self.inner.abort().await
    }
}

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use txduel_catalog::{Price, Product};
use txduel_core::SoftDelete;

use super::r#trait::{Collection, Database, StoreError, TransactionSession, UpdateResult};

#[derive(Debug, Default)]
struct Tables {
    products: Vec<Product>,
    prices: Vec<Price>,
    revisions: HashMap<Collection, u64>,
}

impl Tables {
    fn revision(&self, collection: Collection) -> u64 {
        self.revisions.get(&collection).copied().unwrap_or(0)
    }

    fn bump(&mut self, collection: Collection) {
        *self.revisions.entry(collection).or_insert(0) += 1;
    }
}

#[derive(Debug, Default)]
struct Shared {
    tables: RwLock<Tables>,
    faults: RwLock<HashSet<Collection>>,
}

fn poisoned<T>(_: T) -> StoreError {
    StoreError::Database("lock poisoned".to_string())
}

impl Shared {
    fn stage<T: Clone>(
        &self,
        collection: Collection,
        rows: impl FnOnce(&Tables) -> &Vec<T>,
    ) -> Result<Staging<T>, StoreError> {
        let tables = self.tables.read().map_err(poisoned)?;
        Ok(Staging {
            base_revision: tables.revision(collection),
            rows: rows(&tables).clone(),
        })
    }

    fn fails(&self, collection: Collection) -> Result<bool, StoreError> {
        Ok(self.faults.read().map_err(poisoned)?.contains(&collection))
    }
}

/// In-memory transactional store.
///
/// Intended for tests/dev. Each session stages private copies of the
/// collections it touches; commit publishes them, abort drops them. A
/// per-collection revision counter turns lost updates into commit-time
/// conflicts.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDatabase {
    shared: Arc<Shared>,
    exclusive_sessions: bool,
}

impl InMemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seeded(products: Vec<Product>, prices: Vec<Price>) -> Self {
        let db = Self::new();
        if let Ok(mut tables) = db.shared.tables.write() {
            tables.products = products;
            tables.prices = prices;
        }
        db
    }

    /// A small catalog so bulk updates have something to match.
    pub fn with_demo_catalog() -> Self {
        let now = Utc::now();
        let items = [("Espresso Machine", 499.0), ("Burr Grinder", 189.5), ("Milk Frother", 39.99)];

        let products = items
            .iter()
            .filter_map(|(name, _)| Product::new(*name, now).ok())
            .collect();
        let prices = items
            .iter()
            .filter_map(|(name, amount)| Price::new(format!("{name} retail"), *amount, now).ok())
            .collect();

        Self::seeded(products, prices)
    }

    /// Reject operations that overlap another in-flight operation on the same
    /// session, the way drivers with single-operation sessions behave.
    pub fn with_exclusive_sessions(mut self) -> Self {
        self.exclusive_sessions = true;
        self
    }

    /// Make every subsequent bulk update of `collection` fail.
    pub fn fail_updates_on(&self, collection: Collection) -> Result<(), StoreError> {
        self.shared.faults.write().map_err(poisoned)?.insert(collection);
        Ok(())
    }

    pub fn clear_faults(&self) -> Result<(), StoreError> {
        self.shared.faults.write().map_err(poisoned)?.clear();
        Ok(())
    }

    pub fn insert_product(&self, product: Product) -> Result<(), StoreError> {
        let mut tables = self.shared.tables.write().map_err(poisoned)?;
        tables.products.push(product);
        tables.bump(Collection::Products);
        Ok(())
    }

    pub fn insert_price(&self, price: Price) -> Result<(), StoreError> {
        let mut tables = self.shared.tables.write().map_err(poisoned)?;
        tables.prices.push(price);
        tables.bump(Collection::Prices);
        Ok(())
    }

    /// Committed products (what any new session would see).
    pub fn products(&self) -> Result<Vec<Product>, StoreError> {
        Ok(self.shared.tables.read().map_err(poisoned)?.products.clone())
    }

    /// Committed prices.
    pub fn prices(&self) -> Result<Vec<Price>, StoreError> {
        Ok(self.shared.tables.read().map_err(poisoned)?.prices.clone())
    }
}

#[async_trait::async_trait]
impl Database for InMemoryDatabase {
    fn backend(&self) -> &'static str {
        "in_memory"
    }

    async fn start_session(&self) -> Result<Box<dyn TransactionSession>, StoreError> {
        Ok(Box::new(InMemorySession {
            shared: self.shared.clone(),
            exclusive: self.exclusive_sessions,
            in_flight: AtomicUsize::new(0),
            state: Mutex::new(Some(Staged::default())),
        }))
    }
}

#[derive(Debug)]
struct Staging<T> {
    base_revision: u64,
    rows: Vec<T>,
}

#[derive(Debug, Default)]
struct Staged {
    products: Option<Staging<Product>>,
    prices: Option<Staging<Price>>,
}

/// Decrements the in-flight counter when an operation finishes (or bails).
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Debug)]
pub struct InMemorySession {
    shared: Arc<Shared>,
    exclusive: bool,
    in_flight: AtomicUsize,
    /// `None` once committed or aborted.
    state: Mutex<Option<Staged>>,
}

impl InMemorySession {
    fn enter(&self, collection: Collection) -> Result<InFlight<'_>, StoreError> {
        let previous = self.in_flight.fetch_add(1, Ordering::SeqCst);
        let guard = InFlight(&self.in_flight);
        if self.exclusive && previous > 0 {
            return Err(StoreError::SessionBusy(format!(
                "update on {collection} overlapped {previous} in-flight operation(s) on the same session"
            )));
        }
        Ok(guard)
    }
}

fn mark_all<T: SoftDelete>(rows: &mut [T], at: DateTime<Utc>) -> u64 {
    for row in rows.iter_mut() {
        row.mark_deleted(at);
    }
    rows.len() as u64
}

fn stage_and_mark<T, F>(slot: &mut Option<Staging<T>>, load: F, at: DateTime<Utc>) -> Result<u64, StoreError>
where
    T: SoftDelete,
    F: FnOnce() -> Result<Staging<T>, StoreError>,
{
    if slot.is_none() {
        *slot = Some(load()?);
    }
    Ok(slot.as_mut().map(|s| mark_all(&mut s.rows, at)).unwrap_or(0))
}

fn check_revision(tables: &Tables, collection: Collection, base_revision: u64) -> Result<(), StoreError> {
    let current = tables.revision(collection);
    if current != base_revision {
        return Err(StoreError::Conflict(format!(
            "{collection} changed since the transaction read it (revision {base_revision} -> {current})"
        )));
    }
    Ok(())
}

#[async_trait::async_trait]
impl TransactionSession for InMemorySession {
    async fn soft_delete_all(&self, collection: Collection) -> Result<UpdateResult, StoreError> {
        let _in_flight = self.enter(collection)?;

        // Round trip: give overlapping operations a chance to run.
        tokio::task::yield_now().await;

        if self.shared.fails(collection)? {
            return Err(StoreError::Database(format!("injected failure updating {collection}")));
        }

        let mut state = self.state.lock().await;
        let staged = state.as_mut().ok_or(StoreError::SessionClosed)?;
        let now = Utc::now();

        let count = match collection {
            Collection::Products => stage_and_mark(
                &mut staged.products,
                || self.shared.stage(collection, |t| &t.products),
                now,
            )?,
            Collection::Prices => stage_and_mark(
                &mut staged.prices,
                || self.shared.stage(collection, |t| &t.prices),
                now,
            )?,
        };

        tracing::debug!(collection = %collection, count, "staged soft delete");
        Ok(UpdateResult::acknowledged(count))
    }

    async fn commit(&self) -> Result<(), StoreError> {
        let staged = self.state.lock().await.take().ok_or(StoreError::SessionClosed)?;
        let mut tables = self.shared.tables.write().map_err(poisoned)?;

        // Validate every collection before publishing any of them.
        if let Some(s) = &staged.products {
            check_revision(&tables, Collection::Products, s.base_revision)?;
        }
        if let Some(s) = &staged.prices {
            check_revision(&tables, Collection::Prices, s.base_revision)?;
        }

        if let Some(s) = staged.products {
            tables.products = s.rows;
            tables.bump(Collection::Products);
        }
        if let Some(s) = staged.prices {
            tables.prices = s.rows;
            tables.bump(Collection::Prices);
        }
        Ok(())
    }

    async fn abort(&self) -> Result<(), StoreError> {
        self.state
            .lock()
            .await
            .take()
            .map(|_| ())
            .ok_or(StoreError::SessionClosed)
    }
}

//! Transactional update strategies.
//!
//! Both strategies soft-delete every product and every price inside one
//! transaction session. They differ only in how the two bulk updates are
//! issued:
//!
//! - [`ConcurrentUpdate`]: both updates in flight at once on the shared
//!   session, joined before commit.
//! - [`SequentialUpdate`]: prices first, then products, each awaited before
//!   the next starts.
//!
//! A strategy never returns an error. Any store failure aborts the
//! transaction and comes back as a failed [`StrategyOutcome`].

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use txduel_infra::{Collection, Database, StoreError, TransactionSession, UpdateResult};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyName {
    Concurrent,
    Sequential,
}

impl StrategyName {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyName::Concurrent => "concurrent",
            StrategyName::Sequential => "sequential",
        }
    }
}

impl core::fmt::Display for StrategyName {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Results of the two bulk updates of a committed transaction.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdatePair {
    pub product: UpdateResult,
    pub price: UpdateResult,
}

/// Either the committed update results or the reason the transaction was
/// aborted. Serialized inline as a `data` or `message` field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum OutcomePayload {
    Committed { data: UpdatePair },
    Aborted { message: String },
}

/// Outcome of one strategy invocation.
///
/// Serializes as
/// `{"success":true,"strategyName":"concurrent","data":{...}}` or
/// `{"success":false,"strategyName":"concurrent","message":"..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategyOutcome {
    success: bool,
    strategy_name: StrategyName,
    #[serde(flatten)]
    payload: OutcomePayload,
}

impl StrategyOutcome {
    pub fn committed(strategy_name: StrategyName, data: UpdatePair) -> Self {
        Self {
            success: true,
            strategy_name,
            payload: OutcomePayload::Committed { data },
        }
    }

    pub fn aborted(strategy_name: StrategyName, message: impl Into<String>) -> Self {
        Self {
            success: false,
            strategy_name,
            payload: OutcomePayload::Aborted {
                message: message.into(),
            },
        }
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn strategy_name(&self) -> StrategyName {
        self.strategy_name
    }

    pub fn payload(&self) -> &OutcomePayload {
        &self.payload
    }

    /// Abort reason, if the transaction did not commit.
    pub fn message(&self) -> Option<&str> {
        match &self.payload {
            OutcomePayload::Aborted { message } => Some(message),
            OutcomePayload::Committed { .. } => None,
        }
    }
}

/// One way of running the two-collection update.
#[async_trait::async_trait]
pub trait Strategy: Send + Sync {
    fn name(&self) -> StrategyName;

    /// Run one full transaction (open, update, commit or abort).
    async fn execute(&self) -> StrategyOutcome;
}

/// Issues both bulk updates concurrently on one session.
pub struct ConcurrentUpdate {
    db: Arc<dyn Database>,
}

impl ConcurrentUpdate {
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self { db }
    }
}

#[async_trait::async_trait]
impl Strategy for ConcurrentUpdate {
    fn name(&self) -> StrategyName {
        StrategyName::Concurrent
    }

    async fn execute(&self) -> StrategyOutcome {
        let session = match self.db.start_session().await {
            Ok(session) => session,
            Err(err) => return StrategyOutcome::aborted(self.name(), err.to_string()),
        };

        let updates = concurrent_updates(session.as_ref()).await;
        settle(self.name(), session, updates).await
    }
}

/// Issues the price update, then the product update, on one session.
pub struct SequentialUpdate {
    db: Arc<dyn Database>,
}

impl SequentialUpdate {
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self { db }
    }
}

#[async_trait::async_trait]
impl Strategy for SequentialUpdate {
    fn name(&self) -> StrategyName {
        StrategyName::Sequential
    }

    async fn execute(&self) -> StrategyOutcome {
        let session = match self.db.start_session().await {
            Ok(session) => session,
            Err(err) => return StrategyOutcome::aborted(self.name(), err.to_string()),
        };

        let updates = sequential_updates(session.as_ref()).await;
        settle(self.name(), session, updates).await
    }
}

async fn concurrent_updates(session: &dyn TransactionSession) -> Result<UpdatePair, StoreError> {
    // Both must finish before we look at either result.
    let (product, price) = tokio::join!(
        session.soft_delete_all(Collection::Products),
        session.soft_delete_all(Collection::Prices)
    );

    Ok(UpdatePair {
        product: product?,
        price: price?,
    })
}

async fn sequential_updates(session: &dyn TransactionSession) -> Result<UpdatePair, StoreError> {
    let price = session.soft_delete_all(Collection::Prices).await?;
    let product = session.soft_delete_all(Collection::Products).await?;

    Ok(UpdatePair { product, price })
}

/// Commit on success, abort on failure. The session is dropped on return.
async fn settle(
    name: StrategyName,
    session: Box<dyn TransactionSession>,
    updates: Result<UpdatePair, StoreError>,
) -> StrategyOutcome {
    let committed = match updates {
        Ok(data) => session.commit().await.map(|()| data),
        Err(err) => Err(err),
    };

    match committed {
        Ok(data) => StrategyOutcome::committed(name, data),
        Err(err) => {
            release(name, session.as_ref()).await;
            StrategyOutcome::aborted(name, err.to_string())
        }
    }
}

async fn release(name: StrategyName, session: &dyn TransactionSession) {
    match session.abort().await {
        // A failed commit has already ended the session.
        Ok(()) | Err(StoreError::SessionClosed) => {}
        Err(err) => tracing::warn!(strategy = %name, error = %err, "abort failed; session released anyway"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn pair(count: u64) -> UpdatePair {
        UpdatePair {
            product: UpdateResult::acknowledged(count),
            price: UpdateResult::acknowledged(count),
        }
    }

    #[test]
    fn committed_outcome_serializes_with_data() {
        let outcome = StrategyOutcome::committed(StrategyName::Concurrent, pair(2));
        let value = serde_json::to_value(&outcome).unwrap();

        assert_eq!(value["success"], json!(true));
        assert_eq!(value["strategyName"], json!("concurrent"));
        assert_eq!(value["data"]["product"]["matchedCount"], json!(2));
        assert!(value.get("message").is_none());
    }

    #[test]
    fn aborted_outcome_serializes_with_message() {
        let outcome = StrategyOutcome::aborted(StrategyName::Sequential, "write conflict: boom");
        let value = serde_json::to_value(&outcome).unwrap();

        assert_eq!(
            value,
            json!({
                "success": false,
                "strategyName": "sequential",
                "message": "write conflict: boom"
            })
        );
        assert_eq!(outcome.message(), Some("write conflict: boom"));
        assert!(!outcome.is_success());
    }
}

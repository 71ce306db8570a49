//! Run controller: connect, run both strategies, aggregate the tallies.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use txduel_infra::{ConfigError, Database, HarnessConfig, StoreError};

use crate::runner::{run_trials, TrialTally};
use crate::strategy::{ConcurrentUpdate, SequentialUpdate, Strategy};

/// Errors that end a run. Strategy failures never show up here.
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("could not connect to the database: {0}")]
    Connect(#[from] StoreError),
}

/// Side-by-side tallies of one comparison run.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub total_test: u32,
    pub without_concurrency_data: TrialTally,
    pub with_concurrency_data: TrialTally,
}

/// Run `sequential` then `concurrent`, `times` trials each.
pub async fn compare(sequential: &dyn Strategy, concurrent: &dyn Strategy, times: u32) -> RunReport {
    let without_concurrency_data = run_trials(sequential, times).await;
    info!(strategy = %sequential.name(), success = without_concurrency_data.success, error = without_concurrency_data.error, "trials complete");

    let with_concurrency_data = run_trials(concurrent, times).await;
    info!(strategy = %concurrent.name(), success = with_concurrency_data.success, error = with_concurrency_data.error, "trials complete");

    RunReport {
        total_test: times,
        without_concurrency_data,
        with_concurrency_data,
    }
}

/// Compare the two real strategies against an already connected database.
pub async fn run_comparison(db: Arc<dyn Database>, times: u32) -> RunReport {
    let sequential = SequentialUpdate::new(db.clone());
    let concurrent = ConcurrentUpdate::new(db);
    compare(&sequential, &concurrent, times).await
}

/// Load configuration from the environment and any `.env` file.
pub fn load_config() -> Result<HarnessConfig, HarnessError> {
    Ok(HarnessConfig::from_env()?)
}

/// Full run: connect (fatal on failure), then compare.
pub async fn run(config: &HarnessConfig) -> Result<RunReport, HarnessError> {
    let db = txduel_infra::connect(&config.backend).await?;
    info!(backend = db.backend(), trials = config.trials, "starting comparison");
    Ok(run_comparison(db, config.trials).await)
}

//! `txduel-harness` — compares concurrent and sequential multi-collection
//! updates inside one transaction.
//!
//! Flow: connect → sequential trials → concurrent trials → report.

pub mod report;
pub mod runner;
pub mod strategy;

pub use report::{compare, load_config, run, run_comparison, HarnessError, RunReport};
pub use runner::{run_trials, TrialTally};
pub use strategy::{
    ConcurrentUpdate, OutcomePayload, SequentialUpdate, Strategy, StrategyName, StrategyOutcome, UpdatePair,
};

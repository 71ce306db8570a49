//! Trial runner: repeat one strategy and tally outcomes.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::strategy::Strategy;

/// Success/failure counts for one strategy.
///
/// `success + error` always equals the number of trials run.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialTally {
    pub success: u32,
    pub error: u32,
}

impl TrialTally {
    pub fn total(&self) -> u32 {
        self.success + self.error
    }

    fn record(&mut self, success: bool) {
        if success {
            self.success += 1;
        } else {
            self.error += 1;
        }
    }
}

/// Run `strategy` `times` times, one after another.
///
/// Each trial finishes (commit or abort included) before the next starts.
/// Every outcome is logged with its trial index and `success` flag. The
/// `outcome` field holds the serialized outcome as a JSON string, so JSON log
/// output carries it escaped.
pub async fn run_trials<S>(strategy: &S, times: u32) -> TrialTally
where
    S: Strategy + ?Sized,
{
    let mut tally = TrialTally::default();

    for trial in 0..times {
        let outcome = strategy.execute().await;

        match serde_json::to_string(&outcome) {
            Ok(json) => info!(
                trial,
                strategy = %strategy.name(),
                success = outcome.is_success(),
                outcome = %json,
                "trial finished"
            ),
            Err(err) => warn!(trial, strategy = %strategy.name(), error = %err, "trial outcome not serializable"),
        }

        tally.record(outcome.is_success());
    }

    tally
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::{StrategyName, StrategyOutcome, UpdatePair};
    use txduel_infra::UpdateResult;
    use std::io;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};

    /// Fails every `fail_every`-th call (1-based); 0 never fails.
    struct CountingStrategy {
        calls: AtomicU32,
        fail_every: u32,
    }

    impl CountingStrategy {
        fn new(fail_every: u32) -> Self {
            Self {
                calls: AtomicU32::new(0),
                fail_every,
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl Strategy for CountingStrategy {
        fn name(&self) -> StrategyName {
            StrategyName::Sequential
        }

        async fn execute(&self) -> StrategyOutcome {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail_every != 0 && call % self.fail_every == 0 {
                StrategyOutcome::aborted(self.name(), format!("call {call} failed"))
            } else {
                StrategyOutcome::committed(
                    self.name(),
                    UpdatePair {
                        product: UpdateResult::acknowledged(0),
                        price: UpdateResult::acknowledged(0),
                    },
                )
            }
        }
    }

    #[tokio::test]
    async fn zero_trials_never_invoke_the_strategy() {
        let strategy = CountingStrategy::new(0);
        let tally = run_trials(&strategy, 0).await;

        assert_eq!(tally, TrialTally { success: 0, error: 0 });
        assert_eq!(strategy.calls(), 0);
    }

    #[tokio::test]
    async fn counts_always_sum_to_times() {
        for times in 0..=9 {
            let strategy = CountingStrategy::new(3);
            let tally = run_trials(&strategy, times).await;

            assert_eq!(tally.total(), times);
            assert_eq!(tally.error, times / 3);
            assert_eq!(strategy.calls(), times);
        }
    }

    #[derive(Clone, Default)]
    struct CapturedLines(Arc<Mutex<Vec<u8>>>);

    impl io::Write for CapturedLines {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn each_trial_logs_its_outcome_as_json() {
        let captured = CapturedLines::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .json()
            .with_writer(move || writer.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        run_trials(&CountingStrategy::new(2), 2).await;

        let bytes = captured.0.lock().unwrap().clone();
        let lines: Vec<serde_json::Value> = String::from_utf8(bytes)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);

        for (trial, line) in lines.iter().enumerate() {
            let fields = &line["fields"];
            assert_eq!(fields["trial"], serde_json::json!(trial));
            assert_eq!(fields["success"], serde_json::json!(trial == 0));

            let outcome: serde_json::Value = serde_json::from_str(fields["outcome"].as_str().unwrap()).unwrap();
            assert_eq!(outcome["success"], fields["success"]);
            assert_eq!(outcome["strategyName"], serde_json::json!("sequential"));
        }
    }
}

//! Shared provider contract and import loop.
//!
//! The two hosted providers differ only in transport; the aggregation loop
//! and statistics are identical, so both implement [`CiHistorySource`] and
//! share [`import_history`].

use crate::log_extract::extract_outcomes;
use crate::model::{CiAggregate, CiTestRun};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tracing::{debug, info};

/// Hard cap on executions fetched per import session (API quota bound).
pub const MAX_RUNS_PER_IMPORT: usize = 20;

/// Provider-neutral reference to one pipeline/workflow execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRef {
    pub run_id: String,
    pub run_number: u64,
    pub commit_sha: String,
    pub branch: String,
    pub created_at: DateTime<Utc>,
}

/// Transport seam for one CI provider.
#[async_trait]
pub trait CiHistorySource {
    /// Provider name for logging.
    fn name(&self) -> &'static str;

    /// List recent executions for a ref within the lookback window,
    /// newest first. Network errors surface as an empty list.
    async fn list_runs(&self, lookback_days: i64, git_ref: &str) -> Vec<RunRef>;

    /// Fetch the log text for one execution. `None` when logs are
    /// unavailable; the run is then skipped silently.
    async fn fetch_log(&self, run: &RunRef) -> Option<String>;
}

/// Import historical outcomes into per-test aggregates.
///
/// Sequential blocking calls, capped at [`MAX_RUNS_PER_IMPORT`] executions.
pub async fn import_history<S: CiHistorySource + ?Sized>(
    source: &S,
    lookback_days: i64,
    git_ref: &str,
) -> HashMap<String, CiAggregate> {
    info!(
        provider = source.name(),
        lookback_days,
        git_ref,
        "Importing CI history"
    );

    let runs = source.list_runs(lookback_days, git_ref).await;
    info!(provider = source.name(), runs = runs.len(), "Found executions");

    let mut results: HashMap<String, CiAggregate> = HashMap::new();

    for run in runs.iter().take(MAX_RUNS_PER_IMPORT) {
        let Some(logs) = source.fetch_log(run).await else {
            debug!(run_id = %run.run_id, "No logs for execution; skipping");
            continue;
        };

        let outcomes = extract_outcomes(&logs);
        debug!(run_id = %run.run_id, tests = outcomes.len(), "Extracted outcomes");

        for outcome in outcomes {
            let aggregate = results
                .entry(outcome.test_name.clone())
                .or_insert_with(|| CiAggregate::new(&outcome.test_name));

            aggregate.record(CiTestRun {
                test_name: outcome.test_name,
                status: outcome.status,
                run_id: run.run_id.clone(),
                run_number: run.run_number,
                commit_sha: run.commit_sha.clone(),
                branch: run.branch.clone(),
                timestamp: run.created_at,
            });
        }
    }

    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use flakefinder_core::TestStatus;

    /// In-memory provider: one canned log per run.
    struct FakeSource {
        runs: Vec<RunRef>,
        logs: HashMap<String, String>,
    }

    #[async_trait]
    impl CiHistorySource for FakeSource {
        fn name(&self) -> &'static str {
            "fake"
        }

        async fn list_runs(&self, _lookback_days: i64, _git_ref: &str) -> Vec<RunRef> {
            self.runs.clone()
        }

        async fn fetch_log(&self, run: &RunRef) -> Option<String> {
            self.logs.get(&run.run_id).cloned()
        }
    }

    fn run_ref(id: &str, number: u64) -> RunRef {
        RunRef {
            run_id: id.to_string(),
            run_number: number,
            commit_sha: format!("sha-{id}"),
            branch: "main".to_string(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_import_aggregates_across_runs() {
        let mut logs = HashMap::new();
        logs.insert(
            "1".to_string(),
            "tests/t.py::test_a PASSED\ntests/t.py::test_b PASSED\n".to_string(),
        );
        logs.insert(
            "2".to_string(),
            "tests/t.py::test_a FAILED\ntests/t.py::test_b PASSED\n".to_string(),
        );
        let source = FakeSource {
            runs: vec![run_ref("1", 1), run_ref("2", 2)],
            logs,
        };

        let results = import_history(&source, 30, "main").await;
        assert_eq!(results.len(), 2);

        let a = &results["test_a"];
        assert_eq!(a.total_runs(), 2);
        assert!(a.is_flaky());
        assert_eq!(a.runs[0].commit_sha, "sha-1");
        assert_eq!(a.runs[1].status, TestStatus::Failed);

        assert!(!results["test_b"].is_flaky());
    }

    #[tokio::test]
    async fn test_missing_logs_skipped_silently() {
        let mut logs = HashMap::new();
        logs.insert("2".to_string(), "tests/t.py::test_a PASSED\n".to_string());
        let source = FakeSource {
            runs: vec![run_ref("1", 1), run_ref("2", 2)],
            logs,
        };

        let results = import_history(&source, 30, "main").await;
        assert_eq!(results["test_a"].total_runs(), 1);
    }

    #[tokio::test]
    async fn test_import_caps_run_count() {
        let runs: Vec<RunRef> = (0..50).map(|i| run_ref(&i.to_string(), i)).collect();
        let logs: HashMap<String, String> = runs
            .iter()
            .map(|r| (r.run_id.clone(), "tests/t.py::test_a PASSED\n".to_string()))
            .collect();
        let source = FakeSource { runs, logs };

        let results = import_history(&source, 30, "main").await;
        assert_eq!(
            results["test_a"].total_runs() as usize,
            MAX_RUNS_PER_IMPORT
        );
    }

    #[tokio::test]
    async fn test_empty_run_list() {
        let source = FakeSource {
            runs: Vec::new(),
            logs: HashMap::new(),
        };
        let results = import_history(&source, 30, "main").await;
        assert!(results.is_empty());
    }
}

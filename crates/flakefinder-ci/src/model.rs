//! CI aggregate model.
//!
//! Mirrors the local detector's aggregates but carries provenance for each
//! observed execution. Score and flakiness share the exact formulas with
//! the local path because both embed [`OutcomeHistory`].

use chrono::{DateTime, Utc};
use flakefinder_core::{OutcomeHistory, TestStatus};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// One test execution observed in CI history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CiTestRun {
    pub test_name: String,
    pub status: TestStatus,

    /// Provider-side run/pipeline identifier.
    pub run_id: String,
    pub run_number: u64,
    pub commit_sha: String,
    pub branch: String,
    pub timestamp: DateTime<Utc>,
}

/// Accumulated CI history for one test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CiAggregate {
    pub test_name: String,

    /// Shared outcome statistics (same contract as the local detector).
    pub history: OutcomeHistory,

    /// Provenance for every recorded run.
    pub runs: Vec<CiTestRun>,

    /// Branches this test was observed on.
    pub branches: BTreeSet<String>,
}

impl CiAggregate {
    pub fn new(test_name: &str) -> Self {
        Self {
            test_name: test_name.to_string(),
            history: OutcomeHistory::new(),
            runs: Vec::new(),
            branches: BTreeSet::new(),
        }
    }

    /// Record one observed execution with its provenance.
    pub fn record(&mut self, run: CiTestRun) {
        self.history.record(run.status);
        self.branches.insert(run.branch.clone());
        self.runs.push(run);
    }

    pub fn total_runs(&self) -> u32 {
        self.history.total()
    }

    pub fn flakiness_score(&self) -> f64 {
        self.history.flakiness_score()
    }

    pub fn is_flaky(&self) -> bool {
        self.history.is_flaky()
    }

    /// Fraction of runs that failed or errored.
    pub fn failure_rate(&self) -> f64 {
        let total = self.history.total();
        if total == 0 {
            return 0.0;
        }
        (self.history.fail_count + self.history.error_count) as f64 / total as f64
    }
}

/// Filter imported history down to flaky tests with enough observations,
/// sorted by descending flakiness score.
pub fn flaky_tests(
    results: &HashMap<String, CiAggregate>,
    min_runs: u32,
) -> Vec<&CiAggregate> {
    let mut flaky: Vec<&CiAggregate> = results
        .values()
        .filter(|t| t.total_runs() >= min_runs && t.is_flaky())
        .collect();
    flaky.sort_by(|a, b| {
        b.flakiness_score()
            .partial_cmp(&a.flakiness_score())
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    flaky
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(name: &str, status: TestStatus, branch: &str) -> CiTestRun {
        CiTestRun {
            test_name: name.to_string(),
            status,
            run_id: "101".to_string(),
            run_number: 7,
            commit_sha: "abc123".to_string(),
            branch: branch.to_string(),
            timestamp: Utc::now(),
        }
    }

    fn aggregate(name: &str, statuses: &[TestStatus]) -> CiAggregate {
        let mut agg = CiAggregate::new(name);
        for s in statuses {
            agg.record(run(name, *s, "main"));
        }
        agg
    }

    #[test]
    fn test_record_tracks_history_and_provenance() {
        let mut agg = CiAggregate::new("test_login");
        agg.record(run("test_login", TestStatus::Passed, "main"));
        agg.record(run("test_login", TestStatus::Failed, "develop"));

        assert_eq!(agg.total_runs(), 2);
        assert_eq!(agg.runs.len(), 2);
        assert!(agg.is_flaky());
        assert_eq!(agg.branches.len(), 2);
    }

    #[test]
    fn test_failure_rate() {
        use flakefinder_core::TestStatus::*;
        let agg = aggregate("t", &[Passed, Failed, Error, Passed]);
        assert!((agg.failure_rate() - 0.5).abs() < f64::EPSILON);
        assert_eq!(CiAggregate::new("empty").failure_rate(), 0.0);
    }

    #[test]
    fn test_score_matches_local_formula() {
        use flakefinder_core::TestStatus::*;
        let agg = aggregate("t", &[Passed, Failed, Passed, Failed]);
        assert!((agg.flakiness_score() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_flaky_filter_enforces_min_runs() {
        use flakefinder_core::TestStatus::*;
        let mut results = HashMap::new();
        results.insert(
            "t_short".to_string(),
            aggregate("t_short", &[Passed, Failed]),
        );
        results.insert(
            "t_long".to_string(),
            aggregate("t_long", &[Passed, Failed, Passed]),
        );
        results.insert(
            "t_stable".to_string(),
            aggregate("t_stable", &[Passed, Passed, Passed, Passed]),
        );

        let flaky = flaky_tests(&results, 3);
        assert_eq!(flaky.len(), 1);
        assert_eq!(flaky[0].test_name, "t_long");
    }

    #[test]
    fn test_flaky_filter_sorted_descending() {
        use flakefinder_core::TestStatus::*;
        let mut results = HashMap::new();
        // 1/4 failures -> 0.5
        results.insert(
            "t_mild".to_string(),
            aggregate("t_mild", &[Passed, Passed, Passed, Failed]),
        );
        // 2/4 failures -> 1.0
        results.insert(
            "t_wild".to_string(),
            aggregate("t_wild", &[Passed, Failed, Passed, Failed]),
        );

        let flaky = flaky_tests(&results, 3);
        assert_eq!(flaky[0].test_name, "t_wild");
        assert_eq!(flaky[1].test_name, "t_mild");
    }
}

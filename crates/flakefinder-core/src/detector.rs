//! Multi-run executor: drives the external pytest runner N times and feeds
//! decoded report entries into per-test aggregates.

use crate::aggregate::TestAggregate;
use crate::error::{DetectError, Result};
use crate::outcome::RunOutcome;
use crate::report::decode_report;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tempfile::TempDir;
use tokio::process::Command;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Detection session configuration.
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    /// Test file or directory handed to the runner.
    pub test_path: PathBuf,

    /// Number of sequential runs.
    pub runs: u32,

    /// Surface per-run diagnostics.
    pub verbose: bool,
}

impl DetectorConfig {
    pub fn new(test_path: impl Into<PathBuf>, runs: u32) -> Self {
        Self {
            test_path: test_path.into(),
            runs,
            verbose: false,
        }
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

/// Main detection engine.
///
/// State is scoped to one session: aggregates and the temporary report
/// directory are discarded when the detector is dropped.
pub struct FlakyDetector {
    config: DetectorConfig,
    results: HashMap<String, TestAggregate>,
    report_dir: TempDir,
}

impl FlakyDetector {
    pub fn new(config: DetectorConfig) -> Result<Self> {
        if !config.test_path.exists() {
            return Err(DetectError::TestPathMissing(config.test_path.clone()));
        }

        let report_dir =
            TempDir::new().map_err(|e| DetectError::TempDir(e.to_string()))?;

        Ok(Self {
            config,
            results: HashMap::new(),
            report_dir,
        })
    }

    /// Execute the configured number of runs sequentially.
    ///
    /// Each run must complete (including its report write) before the next
    /// begins. A run whose report is missing or malformed contributes zero
    /// outcomes and the session continues.
    pub async fn run_detection(&mut self) -> Result<()> {
        info!(
            runs = self.config.runs,
            path = %self.config.test_path.display(),
            "Starting detection session"
        );

        for run_num in 1..=self.config.runs {
            let outcomes = self.execute_single_run().await?;

            if self.config.verbose {
                info!(run = run_num, tests = outcomes.len(), "Run complete");
            }

            self.ingest(outcomes);
        }

        Ok(())
    }

    /// Invoke the runner once and decode its report.
    async fn execute_single_run(&self) -> Result<Vec<RunOutcome>> {
        let report_file = self
            .report_dir
            .path()
            .join(format!("report_{}.json", Uuid::new_v4()));

        let output = Command::new("pytest")
            .arg(&self.config.test_path)
            .arg("--json-report")
            .arg(format!("--json-report-file={}", report_file.display()))
            .args(["-v", "--tb=short", "-q", "--disable-warnings"])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        debug!(exit = ?output.status.code(), "Runner exited");

        // A failing suite still writes a report; only a missing or
        // malformed report drops the run from aggregation.
        let json = match tokio::fs::read_to_string(&report_file).await {
            Ok(json) => json,
            Err(e) => {
                if self.config.verbose {
                    warn!(error = %e, "Could not read report; dropping run");
                }
                return Ok(Vec::new());
            }
        };

        match decode_report(&json) {
            Ok(outcomes) => Ok(outcomes),
            Err(e) => {
                if self.config.verbose {
                    warn!(error = %e, "Malformed report; dropping run");
                }
                Ok(Vec::new())
            }
        }
    }

    /// Fold one run's outcomes into the aggregates.
    fn ingest(&mut self, outcomes: Vec<RunOutcome>) {
        for outcome in outcomes {
            let aggregate = self
                .results
                .entry(outcome.test_id.clone())
                .or_insert_with(|| TestAggregate::new(&outcome.test_id));

            aggregate.history.record(outcome.status);
            if outcome.status.is_failure() {
                aggregate.error_messages.push(outcome.error_text);
            }
        }
    }

    /// All aggregates keyed by test identifier.
    pub fn results(&self) -> &HashMap<String, TestAggregate> {
        &self.results
    }

    /// Flaky aggregates sorted by descending flakiness score.
    pub fn flaky_tests(&self) -> Vec<&TestAggregate> {
        let mut flaky: Vec<&TestAggregate> = self
            .results
            .values()
            .filter(|t| t.is_flaky())
            .collect();
        flaky.sort_by(|a, b| {
            b.flakiness_score()
                .partial_cmp(&a.flakiness_score())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        flaky
    }

    /// Non-flaky aggregates.
    pub fn stable_tests(&self) -> Vec<&TestAggregate> {
        self.results.values().filter(|t| !t.is_flaky()).collect()
    }

}

/// Resolve a test file from an aggregate against the runner's working
/// directory.
pub fn resolve_test_file(runner_cwd: &Path, test_file: &str) -> PathBuf {
    runner_cwd.join(test_file)
}

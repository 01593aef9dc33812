//! Flakefinder CI - flaky test detection over historical CI executions
//!
//! Mines pipeline/workflow history from hosted CI providers and feeds the
//! extracted per-test outcomes through the same aggregation model the local
//! detector uses:
//! - GitHub Actions workflow runs and combined logs
//! - GitLab CI pipelines, jobs, and job traces

pub mod error;
pub mod github;
pub mod gitlab;
pub mod log_extract;
pub mod model;
pub mod provider;

// Re-export key types
pub use error::{CiImportError, Result};
pub use github::GitHubActions;
pub use gitlab::GitLabCi;
pub use log_extract::{extract_outcomes, LogOutcome};
pub use model::{flaky_tests, CiAggregate, CiTestRun};
pub use provider::{import_history, CiHistorySource, RunRef, MAX_RUNS_PER_IMPORT};

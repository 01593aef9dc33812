//! Per-execution test outcome model.

use serde::{Deserialize, Serialize};

/// Result status of one test execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestStatus {
    Passed,
    Failed,
    Skipped,
    Error,
}

impl TestStatus {
    /// Parse a pytest outcome keyword. Unknown keywords are treated as
    /// errors so they still count against the test.
    pub fn from_keyword(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "passed" => TestStatus::Passed,
            "failed" => TestStatus::Failed,
            "skipped" => TestStatus::Skipped,
            _ => TestStatus::Error,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TestStatus::Passed => "passed",
            TestStatus::Failed => "failed",
            TestStatus::Skipped => "skipped",
            TestStatus::Error => "error",
        }
    }

    /// Whether this status counts as a failure for pattern purposes
    /// (errors collapse into failures).
    pub fn is_failure(&self) -> bool {
        matches!(self, TestStatus::Failed | TestStatus::Error)
    }
}

/// Single test execution result, as decoded from one runner report entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunOutcome {
    /// Full test identifier in `file::function` form.
    pub test_id: String,

    /// Outcome of this execution.
    pub status: TestStatus,

    /// Wall-clock duration in seconds.
    pub duration_secs: f64,

    /// Truncated failure text; empty for passing/skipped runs.
    pub error_text: String,
}

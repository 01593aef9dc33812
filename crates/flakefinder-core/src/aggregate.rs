//! Outcome aggregation and flakiness statistics.
//!
//! `OutcomeHistory` is the single statistical contract shared by the local
//! detector and the CI history importers: both accumulate statuses through
//! it and derive score/pattern from it, so the two paths can never drift.

use crate::outcome::TestStatus;
use serde::{Deserialize, Serialize};

/// Shape of a flaky test's failure sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePattern {
    Stable,
    InitiallyFailing,
    InitiallyPassing,
    RarelyFailing,
    RarelyPassing,
    Intermittent,
}

impl FailurePattern {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailurePattern::Stable => "stable",
            FailurePattern::InitiallyFailing => "initially_failing",
            FailurePattern::InitiallyPassing => "initially_passing",
            FailurePattern::RarelyFailing => "rarely_failing",
            FailurePattern::RarelyPassing => "rarely_passing",
            FailurePattern::Intermittent => "intermittent",
        }
    }
}

/// Ordered outcome sequence plus running counters for one test.
///
/// Insertion order is run order and is never reordered or truncated.
/// Invariant: the four counters always sum to `outcomes.len()`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutcomeHistory {
    /// Statuses in run order.
    pub outcomes: Vec<TestStatus>,

    pub pass_count: u32,
    pub fail_count: u32,
    pub error_count: u32,
    pub skip_count: u32,
}

impl OutcomeHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one outcome and bump the matching counter.
    pub fn record(&mut self, status: TestStatus) {
        self.outcomes.push(status);
        match status {
            TestStatus::Passed => self.pass_count += 1,
            TestStatus::Failed => self.fail_count += 1,
            TestStatus::Error => self.error_count += 1,
            TestStatus::Skipped => self.skip_count += 1,
        }
    }

    /// Total recorded outcomes.
    pub fn total(&self) -> u32 {
        self.outcomes.len() as u32
    }

    /// Flakiness score in `[0, 1]`.
    ///
    /// `2 * min(pass_ratio, fail_ratio)` over all recorded outcomes (skips
    /// count toward the denominator). Peaks at 1.0 on an even pass/fail
    /// split and falls to 0.0 when either side is absent, so a test that
    /// fails once in a hundred runs scores near zero.
    pub fn flakiness_score(&self) -> f64 {
        let total = self.outcomes.len();
        if total == 0 {
            return 0.0;
        }

        let pass_ratio = self.pass_count as f64 / total as f64;
        let fail_ratio = self.fail_count as f64 / total as f64;

        pass_ratio.min(fail_ratio) * 2.0
    }

    /// A test is flaky if it both passed and failed/errored at least once.
    pub fn is_flaky(&self) -> bool {
        self.pass_count > 0 && (self.fail_count > 0 || self.error_count > 0)
    }

    /// Classify the failure shape of the sequence.
    ///
    /// Rules are evaluated in order over the P/F sequence; the mapping is
    /// total, so every non-pass outcome (errors and skips included) is an
    /// F. The first match wins. Non-flaky tests short-circuit to `Stable`.
    pub fn failure_pattern(&self) -> FailurePattern {
        if !self.is_flaky() {
            return FailurePattern::Stable;
        }

        let passes = self
            .outcomes
            .iter()
            .filter(|o| **o == TestStatus::Passed)
            .count();
        let failures = self.outcomes.len() - passes;
        let starts_passing = self
            .outcomes
            .first()
            .map(|o| *o == TestStatus::Passed)
            .unwrap_or(false);
        let starts_failing = !starts_passing && !self.outcomes.is_empty();

        if starts_failing && passes > 0 {
            FailurePattern::InitiallyFailing
        } else if starts_passing && failures > 0 {
            FailurePattern::InitiallyPassing
        } else if failures < 3 {
            FailurePattern::RarelyFailing
        } else if passes < 3 {
            FailurePattern::RarelyPassing
        } else {
            FailurePattern::Intermittent
        }
    }
}

/// Accumulated outcome history for one test across a detection session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestAggregate {
    /// Full test identifier (`file::function`, possibly with a class segment).
    pub test_id: String,

    /// Source file portion of the identifier.
    pub test_file: String,

    /// Function name portion of the identifier.
    pub test_function: String,

    /// Shared outcome statistics.
    pub history: OutcomeHistory,

    /// Truncated failure texts, one per failed/errored run.
    pub error_messages: Vec<String>,
}

impl TestAggregate {
    /// Create an empty aggregate, splitting the identifier on `::`.
    pub fn new(test_id: &str) -> Self {
        let test_file = test_id.split("::").next().unwrap_or("unknown").to_string();
        let test_function = test_id
            .rsplit("::")
            .next()
            .unwrap_or("unknown")
            .to_string();

        Self {
            test_id: test_id.to_string(),
            test_file,
            test_function,
            history: OutcomeHistory::new(),
            error_messages: Vec::new(),
        }
    }

    pub fn flakiness_score(&self) -> f64 {
        self.history.flakiness_score()
    }

    pub fn is_flaky(&self) -> bool {
        self.history.is_flaky()
    }

    pub fn failure_pattern(&self) -> FailurePattern {
        self.history.failure_pattern()
    }
}

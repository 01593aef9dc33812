//! Flakefinder Core Library
//!
//! Detection engine for flaky tests:
//! - runs a pytest target repeatedly and aggregates per-test outcome history
//! - scores flakiness and tags failure patterns
//! - classifies likely root causes from test source text
//! - maps causes to ranked repair suggestions

pub mod aggregate;
pub mod classify;
pub mod detector;
pub mod error;
pub mod outcome;
pub mod report;
pub mod span;
pub mod suggest;
pub mod telemetry;

pub use aggregate::{FailurePattern, OutcomeHistory, TestAggregate};
pub use classify::{Evidence, FlakinessKind, RootCause, RootCauseClassifier};
pub use detector::{DetectorConfig, FlakyDetector};
pub use error::{DetectError, Result};
pub use outcome::{RunOutcome, TestStatus};
pub use report::{decode_report, PytestReport};
pub use span::{PythonSpanResolver, SourceSpan, SpanError, SpanResolver};
pub use suggest::{suggest_repairs, RepairSuggestion};
pub use telemetry::init_tracing;

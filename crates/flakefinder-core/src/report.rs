//! Decoding of the pytest-json-report document.
//!
//! The runner is treated as a black box that writes a JSON report with a
//! `tests` array; only the fields the engine consumes are modelled here.

use crate::outcome::{RunOutcome, TestStatus};
use serde::Deserialize;

/// Failure text is truncated to this many characters before aggregation.
pub const ERROR_TEXT_LIMIT: usize = 200;

/// Top-level report document.
#[derive(Debug, Clone, Deserialize)]
pub struct PytestReport {
    #[serde(default)]
    pub tests: Vec<ReportEntry>,
}

/// One test entry in the report.
#[derive(Debug, Clone, Deserialize)]
pub struct ReportEntry {
    pub nodeid: String,
    pub outcome: String,
    #[serde(default)]
    pub duration: f64,
    #[serde(default)]
    pub call: Option<CallPhase>,
}

/// The `call` phase of a test entry; carries the failure representation.
#[derive(Debug, Clone, Deserialize)]
pub struct CallPhase {
    #[serde(default)]
    pub longrepr: Option<String>,
}

/// Truncate to a bounded prefix without splitting a UTF-8 character.
fn truncate_chars(s: &str, limit: usize) -> String {
    s.chars().take(limit).collect()
}

/// Decode a report document into per-test outcomes.
///
/// Failure text is taken from `call.longrepr` for failed/errored tests and
/// truncated to [`ERROR_TEXT_LIMIT`] characters.
pub fn decode_report(json: &str) -> serde_json::Result<Vec<RunOutcome>> {
    let report: PytestReport = serde_json::from_str(json)?;

    let outcomes = report
        .tests
        .into_iter()
        .map(|entry| {
            let status = TestStatus::from_keyword(&entry.outcome);
            let error_text = if status.is_failure() {
                entry
                    .call
                    .and_then(|c| c.longrepr)
                    .map(|r| truncate_chars(&r, ERROR_TEXT_LIMIT))
                    .unwrap_or_default()
            } else {
                String::new()
            };

            RunOutcome {
                test_id: entry.nodeid,
                status,
                duration_secs: entry.duration,
                error_text,
            }
        })
        .collect();

    Ok(outcomes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_minimal_report() {
        let json = r#"{
            "tests": [
                {"nodeid": "tests/test_app.py::test_ok", "outcome": "passed", "duration": 0.01},
                {"nodeid": "tests/test_app.py::test_bad", "outcome": "failed",
                 "duration": 0.02, "call": {"longrepr": "AssertionError: boom"}}
            ]
        }"#;

        let outcomes = decode_report(json).expect("decode failed");
        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0].status, TestStatus::Passed);
        assert_eq!(outcomes[0].error_text, "");
        assert_eq!(outcomes[1].status, TestStatus::Failed);
        assert_eq!(outcomes[1].error_text, "AssertionError: boom");
    }

    #[test]
    fn test_decode_missing_tests_array() {
        let outcomes = decode_report("{}").expect("decode failed");
        assert!(outcomes.is_empty());
    }

    #[test]
    fn test_decode_malformed_report_errors() {
        assert!(decode_report("not json").is_err());
    }

    #[test]
    fn test_error_text_truncated() {
        let long = "x".repeat(500);
        let json = format!(
            r#"{{"tests": [{{"nodeid": "t.py::t", "outcome": "error",
                "call": {{"longrepr": "{long}"}}}}]}}"#
        );

        let outcomes = decode_report(&json).expect("decode failed");
        assert_eq!(outcomes[0].error_text.len(), ERROR_TEXT_LIMIT);
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        let s = "é".repeat(300);
        let t = truncate_chars(&s, ERROR_TEXT_LIMIT);
        assert_eq!(t.chars().count(), ERROR_TEXT_LIMIT);
    }
}

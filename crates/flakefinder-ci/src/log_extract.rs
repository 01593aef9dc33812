//! Extraction of structured test outcomes from free-form CI log text.

use flakefinder_core::TestStatus;

const STATUS_KEYWORDS: &[&str] = &["PASSED", "FAILED", "SKIPPED", "ERROR"];

/// One outcome line extracted from a CI log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogOutcome {
    /// Full `file::function` identifier.
    pub test_id: String,

    /// Final `::`-separated segment of the identifier.
    pub test_name: String,

    pub status: TestStatus,
}

/// Scan log text for pytest-style outcome lines.
///
/// A line is a candidate when its first whitespace-delimited token contains
/// `::` and the line carries one of the PASSED/FAILED/SKIPPED/ERROR
/// keywords; the token after the identifier is the status. Everything else
/// is ignored.
pub fn extract_outcomes(logs: &str) -> Vec<LogOutcome> {
    let mut outcomes = Vec::new();

    for line in logs.lines() {
        if !line.contains("::") || !STATUS_KEYWORDS.iter().any(|k| line.contains(k)) {
            continue;
        }

        let mut parts = line.split_whitespace();
        let (Some(test_id), Some(status)) = (parts.next(), parts.next()) else {
            continue;
        };
        if !test_id.contains("::") {
            continue;
        }

        let test_name = test_id.rsplit("::").next().unwrap_or(test_id);

        outcomes.push(LogOutcome {
            test_id: test_id.to_string(),
            test_name: test_name.to_string(),
            status: TestStatus::from_keyword(status),
        });
    }

    outcomes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_outcome_lines() {
        let logs = "\
collecting ...
tests/test_app.py::test_login PASSED                    [ 50%]
tests/test_app.py::test_flaky FAILED                    [100%]
=== 1 failed, 1 passed in 0.12s ===
";
        let outcomes = extract_outcomes(logs);
        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0].test_id, "tests/test_app.py::test_login");
        assert_eq!(outcomes[0].test_name, "test_login");
        assert_eq!(outcomes[0].status, TestStatus::Passed);
        assert_eq!(outcomes[1].status, TestStatus::Failed);
    }

    #[test]
    fn test_class_segment_dropped_from_name() {
        let logs = "tests/test_app.py::TestAuth::test_session SKIPPED\n";
        let outcomes = extract_outcomes(logs);
        assert_eq!(outcomes[0].test_name, "test_session");
        assert_eq!(
            outcomes[0].test_id,
            "tests/test_app.py::TestAuth::test_session"
        );
    }

    #[test]
    fn test_ignores_unrelated_lines() {
        let logs = "\
Downloading artifacts...
ERROR: something unrelated happened
PASSED the build gate
tests/test_app.py::test_ok
";
        // No line has both a `::` identifier token and a trailing status.
        assert!(extract_outcomes(logs).is_empty());
    }

    #[test]
    fn test_error_status_extracted() {
        let logs = "tests/test_db.py::test_conn ERROR\n";
        let outcomes = extract_outcomes(logs);
        assert_eq!(outcomes[0].status, TestStatus::Error);
    }

    #[test]
    fn test_empty_log() {
        assert!(extract_outcomes("").is_empty());
    }
}

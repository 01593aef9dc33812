//! Source span resolution.
//!
//! Locating a named test function's exact source text is kept behind the
//! [`SpanResolver`] trait so the classifier stays language-agnostic; the
//! shipped implementation understands Python function blocks.

use regex::Regex;
use std::path::Path;
use thiserror::Error;

/// Extracted source text for one function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSpan {
    /// Function source, one physical line per entry boundary.
    pub text: String,

    /// 1-based line number of the first line of the span.
    pub start_line: usize,
}

#[derive(Error, Debug)]
pub enum SpanError {
    #[error("Could not read source file: {0}")]
    Unreadable(#[from] std::io::Error),

    #[error("Function not found in source: {0}")]
    FunctionNotFound(String),
}

/// Resolves a `(file, function)` pair to its source text and start line.
pub trait SpanResolver {
    fn resolve(&self, file: &Path, function: &str) -> Result<SourceSpan, SpanError>;
}

/// Indentation-based resolver for Python test files.
///
/// Finds the `def`/`async def` line for the named function and slices the
/// block of lines indented deeper than it. Decorator lines above the `def`
/// are not part of the span.
#[derive(Debug, Default)]
pub struct PythonSpanResolver;

impl PythonSpanResolver {
    pub fn new() -> Self {
        Self
    }

    fn indent_width(line: &str) -> usize {
        line.len() - line.trim_start().len()
    }
}

impl SpanResolver for PythonSpanResolver {
    fn resolve(&self, file: &Path, function: &str) -> Result<SourceSpan, SpanError> {
        let source = std::fs::read_to_string(file)?;
        let lines: Vec<&str> = source.lines().collect();

        let def_re = Regex::new(&format!(
            r"^\s*(?:async\s+)?def\s+{}\s*\(",
            regex::escape(function)
        ))
        .expect("def pattern is valid");

        let def_idx = lines
            .iter()
            .position(|line| def_re.is_match(line))
            .ok_or_else(|| SpanError::FunctionNotFound(function.to_string()))?;

        let def_indent = Self::indent_width(lines[def_idx]);

        // The block ends at the first non-blank line indented at or above
        // the def line. Trailing blank lines are trimmed.
        let mut end_idx = lines.len();
        for (i, line) in lines.iter().enumerate().skip(def_idx + 1) {
            if !line.trim().is_empty() && Self::indent_width(line) <= def_indent {
                end_idx = i;
                break;
            }
        }
        while end_idx > def_idx + 1 && lines[end_idx - 1].trim().is_empty() {
            end_idx -= 1;
        }

        Ok(SourceSpan {
            text: lines[def_idx..end_idx].join("\n"),
            start_line: def_idx + 1,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn fixture(content: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().expect("tempfile");
        f.write_all(content.as_bytes()).expect("write");
        f
    }

    const SOURCE: &str = "\
import random


def helper():
    return 1


def test_lucky():
    value = random.randint(1, 10)
    assert value > 2


class TestThings:
    def test_nested(self):
        assert helper() == 1
";

    #[test]
    fn test_resolves_top_level_function() {
        let f = fixture(SOURCE);
        let span = PythonSpanResolver::new()
            .resolve(f.path(), "test_lucky")
            .expect("resolve");

        assert_eq!(span.start_line, 8);
        assert!(span.text.starts_with("def test_lucky():"));
        assert!(span.text.contains("random.randint"));
        assert!(!span.text.contains("class TestThings"));
    }

    #[test]
    fn test_resolves_method_in_class() {
        let f = fixture(SOURCE);
        let span = PythonSpanResolver::new()
            .resolve(f.path(), "test_nested")
            .expect("resolve");

        assert!(span.text.contains("def test_nested(self):"));
        assert!(span.text.contains("helper() == 1"));
    }

    #[test]
    fn test_resolves_async_def() {
        let f = fixture("async def test_io():\n    await fetch()\n");
        let span = PythonSpanResolver::new()
            .resolve(f.path(), "test_io")
            .expect("resolve");
        assert_eq!(span.start_line, 1);
        assert!(span.text.contains("await fetch()"));
    }

    #[test]
    fn test_function_not_found() {
        let f = fixture(SOURCE);
        let err = PythonSpanResolver::new()
            .resolve(f.path(), "test_absent")
            .unwrap_err();
        assert!(matches!(err, SpanError::FunctionNotFound(_)));
    }

    #[test]
    fn test_unreadable_file() {
        let err = PythonSpanResolver::new()
            .resolve(Path::new("/nonexistent/test_x.py"), "test_a")
            .unwrap_err();
        assert!(matches!(err, SpanError::Unreadable(_)));
    }
}

//! Heuristic root-cause classification over test source text.
//!
//! Line-level token matching, deliberately not a semantic analysis: an
//! unrelated `read(` call will be attributed to the external-dependency
//! category. Confidence per category is fixed regardless of how many lines
//! matched.

use crate::span::{SourceSpan, SpanError, SpanResolver};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Closed set of flakiness cause categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlakinessKind {
    TimeDependent,
    RandomDependent,
    Concurrency,
    UnorderedCollection,
    ExternalDependency,
    FloatingPoint,
    GlobalState,
    Unknown,
}

impl FlakinessKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlakinessKind::TimeDependent => "time_dependent",
            FlakinessKind::RandomDependent => "random_dependent",
            FlakinessKind::Concurrency => "concurrency",
            FlakinessKind::UnorderedCollection => "unordered_collection",
            FlakinessKind::ExternalDependency => "external_dependency",
            FlakinessKind::FloatingPoint => "floating_point",
            FlakinessKind::GlobalState => "global_state",
            FlakinessKind::Unknown => "unknown",
        }
    }
}

/// One matched source line backing a cause.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evidence {
    /// 1-based line number within the analyzed file.
    pub line: usize,

    /// Trimmed text of the matched line.
    pub snippet: String,
}

/// Identified root cause of flakiness.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RootCause {
    pub kind: FlakinessKind,
    pub description: String,
    pub evidence: Vec<Evidence>,
    /// Fixed per-category confidence in `[0, 1]`.
    pub confidence: f64,
}

const TIME_PATTERNS: &[&str] = &[
    r"\bdatetime\.now\(\)",
    r"\btime\.time\(\)",
    r"\btime\.sleep\(",
    r"\btimestamp\b",
    r"\btoday\(\)",
    r"\butcnow\(\)",
];

const RANDOM_PATTERNS: &[&str] = &[
    r"\brandom\.",
    r"\buuid\.uuid4\(\)",
    r"\bgenerate_uuid\(",
    r"\bgenerate_user_id\(",
    r"\bshuffle\(",
    r"\bshuffle_list\(",
    r"\bchoice\(",
    r"\brandint\(",
    r"\brandrange\(",
    r"\buuid4\(",
];

const CONCURRENCY_PATTERNS: &[&str] = &[
    r"\bthreading\.",
    r"\bThread\(",
    r"\basyncio\.",
    r"\basync def\b",
    r"\bawait\b",
    r"\bmultiprocessing\.",
    r"\bPool\(",
];

const ORDER_PATTERNS: &[&str] = &[
    r"\bset\(",
    r"\bdict\.keys\(\)",
    r"\bdict\.values\(\)",
    r"\bdict\.items\(\)",
    r"\.json\(\)",
];

const EXTERNAL_PATTERNS: &[&str] = &[
    r"\brequests\.",
    r"\bhttp",
    r"\burl",
    r"\bapi",
    r"\bsocket\.",
    r"\bopen\(",
    r"\.read\(",
    r"\.write\(",
];

const FLOAT_PATTERNS: &[&str] = &[
    r"assert.*==.*\d+\.\d+",
    r"assertEqual.*\d+\.\d+",
];

const GLOBAL_STATE_PATTERNS: &[&str] = &[
    r"\bglobal\b",
    r"\b__class__\.",
    r"\bsys\.",
    r"\bos\.environ",
];

struct Category {
    kind: FlakinessKind,
    description: &'static str,
    confidence: f64,
    patterns: Vec<Regex>,
}

/// Classifier with pre-compiled per-category indicator patterns.
pub struct RootCauseClassifier {
    categories: Vec<Category>,
}

impl Default for RootCauseClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl RootCauseClassifier {
    pub fn new() -> Self {
        let compile = |patterns: &[&str]| -> Vec<Regex> {
            patterns
                .iter()
                .map(|p| Regex::new(p).expect("indicator pattern is valid"))
                .collect()
        };

        // Category order is fixed; result ordering follows it.
        let categories = vec![
            Category {
                kind: FlakinessKind::TimeDependent,
                description: "Test uses current time/date which changes between runs",
                confidence: 0.9,
                patterns: compile(TIME_PATTERNS),
            },
            Category {
                kind: FlakinessKind::RandomDependent,
                description: "Test uses random values without setting seed",
                confidence: 0.95,
                patterns: compile(RANDOM_PATTERNS),
            },
            Category {
                kind: FlakinessKind::Concurrency,
                description: "Test involves threading/async code with potential race conditions",
                confidence: 0.8,
                patterns: compile(CONCURRENCY_PATTERNS),
            },
            Category {
                kind: FlakinessKind::UnorderedCollection,
                description: "Test relies on ordering of sets/dicts which is not guaranteed",
                confidence: 0.7,
                patterns: compile(ORDER_PATTERNS),
            },
            Category {
                kind: FlakinessKind::ExternalDependency,
                description: "Test depends on external resources (network, filesystem, etc.)",
                confidence: 0.6,
                patterns: compile(EXTERNAL_PATTERNS),
            },
            Category {
                kind: FlakinessKind::FloatingPoint,
                description: "Test uses exact floating point comparison which may fail due to rounding",
                confidence: 0.85,
                patterns: compile(FLOAT_PATTERNS),
            },
            Category {
                kind: FlakinessKind::GlobalState,
                description: "Test modifies global state which may affect other tests",
                confidence: 0.75,
                patterns: compile(GLOBAL_STATE_PATTERNS),
            },
        ];

        Self { categories }
    }

    /// Classify a resolved source span.
    ///
    /// Categories are checked independently; a span can yield several
    /// causes. Each line contributes at most one evidence entry per
    /// category (first matching token wins). Always returns at least one
    /// cause: `Unknown` at 0.1 when nothing matches.
    pub fn classify(&self, span: &SourceSpan) -> Vec<RootCause> {
        let lines: Vec<&str> = span.text.lines().collect();
        let mut causes = Vec::new();

        for category in &self.categories {
            let mut evidence = Vec::new();

            for (i, line) in lines.iter().enumerate() {
                if category.patterns.iter().any(|p| p.is_match(line)) {
                    evidence.push(Evidence {
                        line: span.start_line + i,
                        snippet: line.trim().to_string(),
                    });
                }
            }

            if !evidence.is_empty() {
                causes.push(RootCause {
                    kind: category.kind,
                    description: category.description.to_string(),
                    evidence,
                    confidence: category.confidence,
                });
            }
        }

        if causes.is_empty() {
            causes.push(unknown_cause(
                "No obvious flakiness pattern detected",
                0.1,
            ));
        }

        causes
    }

    /// Resolve a function's span and classify it.
    ///
    /// Resolution failures degrade to an `Unknown` cause instead of
    /// propagating: 0.0 when the function cannot be located, 0.1 when the
    /// file cannot be read.
    pub fn classify_function(
        &self,
        resolver: &dyn SpanResolver,
        file: &Path,
        function: &str,
    ) -> Vec<RootCause> {
        match resolver.resolve(file, function) {
            Ok(span) => self.classify(&span),
            Err(SpanError::FunctionNotFound(_)) => {
                vec![unknown_cause("Could not locate test function in source", 0.0)]
            }
            Err(SpanError::Unreadable(_)) => {
                vec![unknown_cause("Could not read test source file", 0.1)]
            }
        }
    }
}

fn unknown_cause(description: &str, confidence: f64) -> RootCause {
    RootCause {
        kind: FlakinessKind::Unknown,
        description: description.to_string(),
        evidence: Vec::new(),
        confidence,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(text: &str) -> SourceSpan {
        SourceSpan {
            text: text.to_string(),
            start_line: 10,
        }
    }

    #[test]
    fn test_time_and_concurrency_detected_together() {
        let s = span(
            "def test_mixed():\n    now = datetime.now()\n    t = Thread(target=work)\n    t.start()",
        );
        let causes = RootCauseClassifier::new().classify(&s);

        assert!(causes.len() >= 2);
        let time = causes
            .iter()
            .find(|c| c.kind == FlakinessKind::TimeDependent)
            .expect("time cause");
        assert_eq!(time.confidence, 0.9);
        assert_eq!(time.evidence.len(), 1);
        assert_eq!(time.evidence[0].line, 11);

        let conc = causes
            .iter()
            .find(|c| c.kind == FlakinessKind::Concurrency)
            .expect("concurrency cause");
        assert_eq!(conc.confidence, 0.8);
        assert!(!conc.evidence.is_empty());
    }

    #[test]
    fn test_result_preserves_category_order() {
        let s = span(
            "def test_x():\n    random.seed()\n    now = time.time()\n",
        );
        let causes = RootCauseClassifier::new().classify(&s);
        // Time is checked before random even though random appears first.
        assert_eq!(causes[0].kind, FlakinessKind::TimeDependent);
        assert_eq!(causes[1].kind, FlakinessKind::RandomDependent);
    }

    #[test]
    fn test_one_evidence_per_line_per_category() {
        // Two random tokens on one line still yield one evidence entry.
        let s = span("    x = random.choice(shuffle(items))");
        let causes = RootCauseClassifier::new().classify(&s);
        let random = causes
            .iter()
            .find(|c| c.kind == FlakinessKind::RandomDependent)
            .expect("random cause");
        assert_eq!(random.evidence.len(), 1);
    }

    #[test]
    fn test_float_equality_assertion() {
        let s = span("    assert total == 0.3");
        let causes = RootCauseClassifier::new().classify(&s);
        let float = causes
            .iter()
            .find(|c| c.kind == FlakinessKind::FloatingPoint)
            .expect("float cause");
        assert_eq!(float.confidence, 0.85);
    }

    #[test]
    fn test_global_state_detected() {
        let s = span("    os.environ['MODE'] = 'test'");
        let causes = RootCauseClassifier::new().classify(&s);
        assert!(causes
            .iter()
            .any(|c| c.kind == FlakinessKind::GlobalState));
    }

    #[test]
    fn test_no_match_yields_unknown() {
        let s = span("def test_plain():\n    assert 1 + 1 == 2");
        let causes = RootCauseClassifier::new().classify(&s);
        assert_eq!(causes.len(), 1);
        assert_eq!(causes[0].kind, FlakinessKind::Unknown);
        assert_eq!(causes[0].confidence, 0.1);
        assert!(causes[0].evidence.is_empty());
    }

    #[test]
    fn test_evidence_lines_within_span() {
        let s = span("def test_t():\n    a = 1\n    b = time.time()");
        let causes = RootCauseClassifier::new().classify(&s);
        let time = &causes[0];
        for ev in &time.evidence {
            assert!(ev.line >= 10 && ev.line < 13);
        }
    }

    #[test]
    fn test_unresolvable_function_degrades() {
        use crate::span::PythonSpanResolver;
        let classifier = RootCauseClassifier::new();

        let causes = classifier.classify_function(
            &PythonSpanResolver::new(),
            Path::new("/nonexistent/test_x.py"),
            "test_a",
        );
        assert_eq!(causes.len(), 1);
        assert_eq!(causes[0].kind, FlakinessKind::Unknown);
        assert_eq!(causes[0].confidence, 0.1);
    }

    #[test]
    fn test_function_not_found_degrades_to_zero_confidence() {
        use crate::span::PythonSpanResolver;
        use std::io::Write;

        let mut f = tempfile::NamedTempFile::new().expect("tempfile");
        f.write_all(b"def other():\n    pass\n").expect("write");

        let causes = RootCauseClassifier::new().classify_function(
            &PythonSpanResolver::new(),
            f.path(),
            "test_absent",
        );
        assert_eq!(causes.len(), 1);
        assert_eq!(causes[0].kind, FlakinessKind::Unknown);
        assert_eq!(causes[0].confidence, 0.0);
        assert!(causes[0].evidence.is_empty());
    }
}

//! Repair suggestion catalog and cause-to-suggestion mapping.
//!
//! The catalog is process-wide, read-only configuration: built once on
//! first access and never written afterwards.

use crate::classify::{FlakinessKind, RootCause};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::OnceLock;

/// A suggested fix for a flaky test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepairSuggestion {
    /// Unique key; duplicates across causes are collapsed on it.
    pub title: String,

    pub description: String,

    /// Illustrative code snippet for the fix.
    pub example: String,

    /// 1 = most urgent, 3 = least.
    pub priority: u8,
}

impl RepairSuggestion {
    fn new(title: &str, description: &str, example: &str, priority: u8) -> Self {
        Self {
            title: title.to_string(),
            description: description.to_string(),
            example: example.to_string(),
            priority,
        }
    }
}

/// Fixed, ordered suggestion templates for one category.
fn build_catalog() -> Vec<(FlakinessKind, Vec<RepairSuggestion>)> {
    vec![
        (
            FlakinessKind::TimeDependent,
            vec![
                RepairSuggestion::new(
                    "Freeze the clock during the test",
                    "Use freezegun to pin datetime.now() for the whole test",
                    "from freezegun import freeze_time\n\n@freeze_time(\"2024-01-15 12:00:00\")\ndef test_something():\n    result = my_function()\n    assert result.date == datetime(2024, 1, 15)",
                    1,
                ),
                RepairSuggestion::new(
                    "Inject time as a parameter",
                    "Pass the current time into the code under test instead of reading the wall clock inside it",
                    "def process(current_time=None):\n    if current_time is None:\n        current_time = datetime.now()\n    return current_time.hour > 12\n\ndef test_process():\n    assert process(datetime(2024, 1, 15, 14, 0))",
                    1,
                ),
            ],
        ),
        (
            FlakinessKind::RandomDependent,
            vec![
                RepairSuggestion::new(
                    "Set the random seed before the test",
                    "Fix the seed so the sequence of random values is deterministic",
                    "import random\n\ndef test_something():\n    random.seed(42)\n    result = my_random_function()\n    assert result == expected_value",
                    1,
                ),
                RepairSuggestion::new(
                    "Generate random data in a seeded fixture",
                    "Move randomness into a pytest fixture with a fixed seed",
                    "@pytest.fixture\ndef random_data():\n    random.seed(42)\n    return [random.randint(1, 100) for _ in range(10)]",
                    1,
                ),
                RepairSuggestion::new(
                    "Mock the random module",
                    "Patch random calls to return predetermined values",
                    "from unittest.mock import patch\n\ndef test_something():\n    with patch('random.randint', return_value=42):\n        assert my_function() == expected",
                    2,
                ),
            ],
        ),
        (
            FlakinessKind::Concurrency,
            vec![
                RepairSuggestion::new(
                    "Add proper synchronization",
                    "Guard shared state with locks or events instead of relying on timing",
                    "lock = threading.Lock()\n\ndef worker():\n    with lock:\n        results.append(do_work())",
                    1,
                ),
                RepairSuggestion::new(
                    "Use pytest-asyncio for async tests",
                    "Run async tests under pytest-asyncio rather than ad-hoc event loops",
                    "@pytest.mark.asyncio\nasync def test_async_function():\n    result = await my_async_function()\n    assert result == expected",
                    1,
                ),
                RepairSuggestion::new(
                    "Add explicit timeouts",
                    "Bound async operations with asyncio.wait_for so hangs fail fast",
                    "result = await asyncio.wait_for(my_async_function(), timeout=5.0)",
                    2,
                ),
            ],
        ),
        (
            FlakinessKind::UnorderedCollection,
            vec![
                RepairSuggestion::new(
                    "Sort collections before comparison",
                    "Compare sorted lists instead of relying on set/dict iteration order",
                    "assert sorted(result) == [1, 2, 3]\nassert sorted(result.items()) == sorted(expected.items())",
                    1,
                ),
                RepairSuggestion::new(
                    "Use order-preserving collections",
                    "Replace sets/dicts with lists of tuples where order matters",
                    "data = [('a', 1), ('b', 2)]",
                    1,
                ),
            ],
        ),
        (
            FlakinessKind::ExternalDependency,
            vec![
                RepairSuggestion::new(
                    "Mock external dependencies",
                    "Replace real network/filesystem calls with mocks",
                    "with patch('requests.get', return_value=mock_response):\n    result = my_function_that_calls_api()",
                    1,
                ),
                RepairSuggestion::new(
                    "Create test files in tmp_path fixtures",
                    "Use pytest's tmp_path to isolate filesystem access",
                    "@pytest.fixture\ndef test_file(tmp_path):\n    file = tmp_path / 'test.txt'\n    file.write_text('test content')\n    return file",
                    1,
                ),
                RepairSuggestion::new(
                    "Stub HTTP with the responses library",
                    "Register canned HTTP responses instead of hitting real endpoints",
                    "@responses.activate\ndef test_api():\n    responses.add(responses.GET, 'https://api.example.com/data', json={'status': 'ok'})",
                    2,
                ),
            ],
        ),
        (
            FlakinessKind::FloatingPoint,
            vec![
                RepairSuggestion::new(
                    "Use pytest.approx for float comparison",
                    "Compare floats with tolerance instead of exact equality",
                    "assert result == pytest.approx(0.3)\nassert result == pytest.approx(0.3, abs=1e-6)",
                    1,
                ),
                RepairSuggestion::new(
                    "Use math.isclose()",
                    "Apply relative/absolute tolerance to float equality",
                    "assert math.isclose(a, b, rel_tol=1e-9, abs_tol=1e-9)",
                    1,
                ),
            ],
        ),
        (
            FlakinessKind::GlobalState,
            vec![
                RepairSuggestion::new(
                    "Reset global state in fixtures",
                    "Save and restore process-wide state around each test",
                    "@pytest.fixture(autouse=True)\ndef reset_global_state():\n    original = MyClass.global_var\n    yield\n    MyClass.global_var = original",
                    1,
                ),
                RepairSuggestion::new(
                    "Patch environment variables with monkeypatch",
                    "Let pytest restore the environment automatically after the test",
                    "def test_with_env_var(monkeypatch):\n    monkeypatch.setenv('MY_VAR', 'test_value')\n    assert my_function() == expected",
                    1,
                ),
                RepairSuggestion::new(
                    "Use dependency injection",
                    "Pass configuration as parameters instead of reading globals",
                    "def process(config=None):\n    config = config or {'debug': False}\n    ...",
                    2,
                ),
            ],
        ),
    ]
}

fn catalog() -> &'static [(FlakinessKind, Vec<RepairSuggestion>)] {
    static CATALOG: OnceLock<Vec<(FlakinessKind, Vec<RepairSuggestion>)>> = OnceLock::new();
    CATALOG.get_or_init(build_catalog)
}

/// Suggestion templates for one category; empty for `Unknown`.
pub fn suggestions_for(kind: FlakinessKind) -> &'static [RepairSuggestion] {
    catalog()
        .iter()
        .find(|(k, _)| *k == kind)
        .map(|(_, s)| s.as_slice())
        .unwrap_or(&[])
}

/// Map identified causes to a deduplicated, priority-ordered suggestion list.
///
/// Suggestions are appended per cause in input order, deduplicated by title
/// (first occurrence wins) and stable-sorted ascending by priority.
pub fn suggest_repairs(causes: &[RootCause]) -> Vec<RepairSuggestion> {
    let mut seen = HashSet::new();
    let mut suggestions: Vec<RepairSuggestion> = Vec::new();

    for cause in causes {
        for suggestion in suggestions_for(cause.kind) {
            if seen.insert(suggestion.title.clone()) {
                suggestions.push(suggestion.clone());
            }
        }
    }

    suggestions.sort_by_key(|s| s.priority);
    suggestions
}

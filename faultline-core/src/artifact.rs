//! Coverage-and-outcome artifact schema
//!
//! This is the JSON document handed over by the coverage producer. It follows the
//! per-test context layout of line coverage tools:
//!
//! ```json
//! {
//!   "files": {
//!     "src/calc.py": {
//!       "executed_lines": [1, 2, 5],
//!       "missing_lines": [7],
//!       "summary": { "covered_lines": 3 },
//!       "contexts": { "5": ["tests/test_calc.py::test_div|run"] }
//!     }
//!   },
//!   "tests": { "passed": [], "failed": ["tests/test_calc.py::test_div"], "skipped": [] }
//! }
//! ```
//!
//! Outcomes can alternatively be supplied as a `test_outcomes` name -> label map.
//! Unknown top-level keys (`meta`, `totals`, ...) are tolerated.

use crate::error::SpectrumError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Phase suffixes appended to context labels by the coverage producer
const CONTEXT_PHASES: &[&str] = &["run", "setup", "teardown"];

/// Root of the coverage-and-outcome artifact
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CoverageArtifact {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,

    #[serde(default)]
    pub files: BTreeMap<String, FileCoverage>,

    /// Outcome lists, as merged in by the test runner
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tests: Option<TestLists>,

    /// Outcome map (test name -> "passed" | "failed" | "skipped" | "error")
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub test_outcomes: BTreeMap<String, String>,

    /// Optional per-test wall time in seconds
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub test_durations: BTreeMap<String, f64>,
}

/// Coverage evidence for one source file
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FileCoverage {
    #[serde(default)]
    pub executed_lines: Vec<i64>,

    #[serde(default)]
    pub missing_lines: Vec<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<Value>,

    /// Line number (as a string key) -> context labels that executed it
    #[serde(default)]
    pub contexts: BTreeMap<String, Vec<String>>,

    /// Any other producer-specific fields, passed through untouched
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Test names grouped by outcome
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TestLists {
    #[serde(default)]
    pub passed: Vec<String>,
    #[serde(default)]
    pub failed: Vec<String>,
    #[serde(default)]
    pub skipped: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub error: Vec<String>,
}

impl CoverageArtifact {
    /// Decode an artifact from JSON text
    pub fn from_json(json: &str) -> Result<Self, SpectrumError> {
        serde_json::from_str(json).map_err(|e| SpectrumError::Json(e.to_string()))
    }

    /// Keep only the files whose path satisfies `keep`
    pub fn retain_files<F>(&mut self, mut keep: F)
    where
        F: FnMut(&str) -> bool,
    {
        self.files.retain(|path, _| keep(path));
    }
}

/// Extract the test name from a context label
///
/// Returns `None` for the empty (default) context. A trailing `|run`, `|setup`
/// or `|teardown` phase marker is removed.
pub fn context_test_name(label: &str) -> Option<&str> {
    let label = label.trim();
    let name = match label.rsplit_once('|') {
        Some((name, phase)) if CONTEXT_PHASES.contains(&phase) => name,
        _ => label,
    };
    (!name.is_empty()).then_some(name)
}

//! Spectrum model: which tests executed which code elements
//!
//! Global invariants enforced:
//! - Every test referenced by a coverage entry has a known outcome
//! - Code elements are unique by (file, line); file non-empty, line >= 1
//! - Coverage has set semantics (a test covers an element or it does not)
//! - Iteration order is explicit: elements by (file, line), tests by name

use crate::artifact::{context_test_name, CoverageArtifact};
use crate::error::SpectrumError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Test outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Passed,
    Failed,
    Skipped,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Passed => "passed",
            Outcome::Failed => "failed",
            Outcome::Skipped => "skipped",
        }
    }

    /// Parse an outcome label; `error` counts as a failure
    pub fn from_label(label: &str) -> Option<Outcome> {
        match label.trim().to_ascii_lowercase().as_str() {
            "passed" | "pass" => Some(Outcome::Passed),
            "failed" | "fail" | "error" => Some(Outcome::Failed),
            "skipped" | "skip" => Some(Outcome::Skipped),
            _ => None,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A coverable line of code
///
/// Ordering is (file, line) ascending, which is also the ranking tie-break.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CodeElement {
    pub file: String,
    pub line: u32,
}

impl CodeElement {
    /// Build a validated element
    pub fn new(file: &str, line: i64) -> Result<Self, SpectrumError> {
        if file.trim().is_empty() {
            return Err(SpectrumError::EmptyFilePath);
        }
        let line = u32::try_from(line)
            .ok()
            .filter(|l| *l >= 1)
            .ok_or_else(|| SpectrumError::InvalidLineNumber {
                file: file.to_string(),
                line,
            })?;
        Ok(CodeElement {
            file: file.to_string(),
            line,
        })
    }
}

impl fmt::Display for CodeElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// A single executed test
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    pub name: String,
    pub outcome: Outcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
}

/// Test counts by outcome
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeSummary {
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl OutcomeSummary {
    pub fn total(&self) -> usize {
        self.passed + self.failed + self.skipped
    }
}

/// Validated, read-only coverage spectrum
///
/// Tests are stored sorted by name; coverage entries refer to tests by their
/// index into [`Spectrum::tests`].
#[derive(Debug, Clone, PartialEq)]
pub struct Spectrum {
    tests: Vec<TestCase>,
    coverage: BTreeMap<CodeElement, BTreeSet<usize>>,
    files: BTreeSet<String>,
}

impl Spectrum {
    /// Validate an artifact into a spectrum
    pub fn from_artifact(artifact: &CoverageArtifact) -> Result<Self, SpectrumError> {
        let mut builder = SpectrumBuilder::new();

        if let Some(lists) = &artifact.tests {
            let groups = [
                (&lists.passed, Outcome::Passed),
                (&lists.failed, Outcome::Failed),
                (&lists.error, Outcome::Failed),
                (&lists.skipped, Outcome::Skipped),
            ];
            for (names, outcome) in groups {
                for name in names {
                    builder.test(name, outcome);
                }
            }
        }

        for (name, label) in &artifact.test_outcomes {
            let outcome =
                Outcome::from_label(label).ok_or_else(|| SpectrumError::InvalidOutcome {
                    test: name.clone(),
                    label: label.clone(),
                })?;
            builder.test(name, outcome);
        }

        for (name, secs) in &artifact.test_durations {
            builder.duration(name, *secs);
        }

        for (path, file) in &artifact.files {
            builder.file(path);
            for &line in file.executed_lines.iter().chain(&file.missing_lines) {
                builder.line(path, line);
            }
            for (key, labels) in &file.contexts {
                let line: i64 = key
                    .trim()
                    .parse()
                    .map_err(|_| SpectrumError::InvalidLineKey {
                        file: path.clone(),
                        key: key.clone(),
                    })?;
                builder.line(path, line);
                for test in labels.iter().filter_map(|l| context_test_name(l)) {
                    builder.cover(path, line, test);
                }
            }
        }

        builder.build()
    }

    pub fn tests(&self) -> &[TestCase] {
        &self.tests
    }

    /// Index of a test by name
    pub fn test_index(&self, name: &str) -> Option<usize> {
        self.tests
            .binary_search_by(|t| t.name.as_str().cmp(name))
            .ok()
    }

    /// Elements with the indices of the tests covering them, in (file, line) order
    pub fn elements(&self) -> impl Iterator<Item = (&CodeElement, &BTreeSet<usize>)> {
        self.coverage.iter()
    }

    /// Tests covering one element (`None` if the element is not part of the spectrum)
    pub fn covering_tests<'a>(
        &'a self,
        element: &CodeElement,
    ) -> Option<impl Iterator<Item = &'a TestCase> + 'a> {
        self.coverage
            .get(element)
            .map(|ids| ids.iter().map(move |&id| &self.tests[id]))
    }

    pub fn element_count(&self) -> usize {
        self.coverage.len()
    }

    /// Elements covered by at least one test
    pub fn covered_element_count(&self) -> usize {
        self.coverage.values().filter(|ids| !ids.is_empty()).count()
    }

    /// All files in the spectrum, including files without any element
    pub fn files(&self) -> impl Iterator<Item = &str> {
        self.files.iter().map(String::as_str)
    }

    pub fn outcome_summary(&self) -> OutcomeSummary {
        let mut summary = OutcomeSummary::default();
        for test in &self.tests {
            match test.outcome {
                Outcome::Passed => summary.passed += 1,
                Outcome::Failed => summary.failed += 1,
                Outcome::Skipped => summary.skipped += 1,
            }
        }
        summary
    }
}

/// Incremental construction of a [`Spectrum`]
///
/// Inputs are recorded as given and validated together in [`SpectrumBuilder::build`],
/// so the order of `test` and `cover` calls does not matter.
#[derive(Debug, Clone, Default)]
pub struct SpectrumBuilder {
    outcomes: Vec<(String, Outcome)>,
    durations: BTreeMap<String, f64>,
    files: Vec<String>,
    declared: Vec<(String, i64)>,
    covered: Vec<(String, i64, String)>,
}

impl SpectrumBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn test(&mut self, name: &str, outcome: Outcome) -> &mut Self {
        self.outcomes.push((name.to_string(), outcome));
        self
    }

    pub fn duration(&mut self, name: &str, seconds: f64) -> &mut Self {
        self.durations.insert(name.to_string(), seconds);
        self
    }

    /// Declare a file even if it ends up with no elements
    pub fn file(&mut self, path: &str) -> &mut Self {
        self.files.push(path.to_string());
        self
    }

    /// Declare a line, covered or not
    pub fn line(&mut self, path: &str, line: i64) -> &mut Self {
        self.declared.push((path.to_string(), line));
        self
    }

    /// Record that `test` executed `path:line`
    pub fn cover(&mut self, path: &str, line: i64, test: &str) -> &mut Self {
        self.covered
            .push((path.to_string(), line, test.to_string()));
        self
    }

    pub fn build(&self) -> Result<Spectrum, SpectrumError> {
        let mut outcomes: BTreeMap<&str, Outcome> = BTreeMap::new();
        for (name, outcome) in &self.outcomes {
            if name.trim().is_empty() {
                return Err(SpectrumError::EmptyTestName);
            }
            if let Some(&first) = outcomes.get(name.as_str()) {
                if first != *outcome {
                    return Err(SpectrumError::ConflictingOutcome {
                        test: name.clone(),
                        first,
                        second: *outcome,
                    });
                }
            }
            outcomes.insert(name.as_str(), *outcome);
        }

        let tests: Vec<TestCase> = outcomes
            .iter()
            .map(|(name, outcome)| TestCase {
                name: name.to_string(),
                outcome: *outcome,
                duration: self.durations.get(*name).copied(),
            })
            .collect();

        let mut files = BTreeSet::new();
        for path in &self.files {
            if path.trim().is_empty() {
                return Err(SpectrumError::EmptyFilePath);
            }
            files.insert(path.clone());
        }

        let mut coverage: BTreeMap<CodeElement, BTreeSet<usize>> = BTreeMap::new();
        for (path, line) in &self.declared {
            let element = CodeElement::new(path, *line)?;
            files.insert(element.file.clone());
            coverage.entry(element).or_default();
        }

        for (path, line, test) in &self.covered {
            let element = CodeElement::new(path, *line)?;
            let id = tests
                .binary_search_by(|t| t.name.as_str().cmp(test))
                .map_err(|_| SpectrumError::UnknownTest {
                    file: element.file.clone(),
                    line: element.line,
                    test: test.clone(),
                })?;
            files.insert(element.file.clone());
            coverage.entry(element).or_default().insert(id);
        }

        Ok(Spectrum {
            tests,
            coverage,
            files,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::{FileCoverage, TestLists};

    fn element(file: &str, line: u32) -> CodeElement {
        CodeElement {
            file: file.to_string(),
            line,
        }
    }

    #[test]
    fn test_outcome_labels() {
        assert_eq!(Outcome::from_label("PASSED"), Some(Outcome::Passed));
        assert_eq!(Outcome::from_label("error"), Some(Outcome::Failed));
        assert_eq!(Outcome::from_label("skipped"), Some(Outcome::Skipped));
        assert_eq!(Outcome::from_label("xfail"), None);
    }

    #[test]
    fn test_code_element_validation() {
        assert!(CodeElement::new("a.py", 1).is_ok());
        assert_eq!(
            CodeElement::new("", 3).unwrap_err(),
            SpectrumError::EmptyFilePath
        );
        assert_eq!(
            CodeElement::new("a.py", 0).unwrap_err(),
            SpectrumError::InvalidLineNumber {
                file: "a.py".into(),
                line: 0
            }
        );
        assert!(CodeElement::new("a.py", -4).is_err());
        assert_eq!(
            CodeElement::new("  ", 3).unwrap_err(),
            SpectrumError::EmptyFilePath
        );
    }

    #[test]
    fn test_builder_rejects_blank_file_path() {
        let err = SpectrumBuilder::new().file(" \t").build().unwrap_err();
        assert_eq!(err, SpectrumError::EmptyFilePath);

        let mut artifact = CoverageArtifact::default();
        artifact.files.insert("   ".into(), FileCoverage::default());
        assert_eq!(
            Spectrum::from_artifact(&artifact).unwrap_err(),
            SpectrumError::EmptyFilePath
        );
    }

    #[test]
    fn test_code_element_order_is_file_then_line() {
        let mut elements = vec![element("b.py", 1), element("a.py", 10), element("a.py", 2)];
        elements.sort();
        assert_eq!(
            elements,
            vec![element("a.py", 2), element("a.py", 10), element("b.py", 1)]
        );
    }

    #[test]
    fn test_builder_set_semantics() {
        let spectrum = SpectrumBuilder::new()
            .test("t1", Outcome::Failed)
            .cover("a.py", 3, "t1")
            .cover("a.py", 3, "t1")
            .build()
            .unwrap();
        let covering: Vec<_> = spectrum
            .covering_tests(&element("a.py", 3))
            .unwrap()
            .collect();
        assert_eq!(covering.len(), 1);
        assert_eq!(covering[0].name, "t1");
    }

    #[test]
    fn test_builder_rejects_dangling_test() {
        let err = SpectrumBuilder::new()
            .test("t1", Outcome::Passed)
            .cover("a.py", 7, "ghost")
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            SpectrumError::UnknownTest {
                file: "a.py".into(),
                line: 7,
                test: "ghost".into()
            }
        );
    }

    #[test]
    fn test_builder_rejects_conflicting_outcomes() {
        let err = SpectrumBuilder::new()
            .test("t1", Outcome::Passed)
            .test("t1", Outcome::Failed)
            .build()
            .unwrap_err();
        assert!(matches!(err, SpectrumError::ConflictingOutcome { .. }));
    }

    #[test]
    fn test_builder_accepts_repeated_identical_outcome() {
        let spectrum = SpectrumBuilder::new()
            .test("t1", Outcome::Failed)
            .test("t1", Outcome::Failed)
            .build()
            .unwrap();
        assert_eq!(spectrum.tests().len(), 1);
    }

    #[test]
    fn test_uncovered_lines_are_kept() {
        let spectrum = SpectrumBuilder::new()
            .test("t1", Outcome::Passed)
            .line("a.py", 9)
            .build()
            .unwrap();
        assert_eq!(spectrum.element_count(), 1);
        assert_eq!(spectrum.covered_element_count(), 0);
    }

    #[test]
    fn test_outcome_summary_counts_skipped() {
        let spectrum = SpectrumBuilder::new()
            .test("a", Outcome::Passed)
            .test("b", Outcome::Failed)
            .test("c", Outcome::Skipped)
            .build()
            .unwrap();
        let summary = spectrum.outcome_summary();
        assert_eq!((summary.passed, summary.failed, summary.skipped), (1, 1, 1));
        assert_eq!(summary.total(), 3);
    }

    #[test]
    fn test_from_artifact_contexts_and_lists() {
        let mut artifact = CoverageArtifact::default();
        let mut file = FileCoverage {
            executed_lines: vec![1, 2],
            missing_lines: vec![5],
            ..Default::default()
        };
        file.contexts
            .insert("1".into(), vec!["".into(), "t::pass|run".into()]);
        file.contexts
            .insert("2".into(), vec!["t::fail|run".into(), "t::err|setup".into()]);
        artifact.files.insert("src/m.py".into(), file);
        artifact.tests = Some(TestLists {
            passed: vec!["t::pass".into()],
            failed: vec!["t::fail".into()],
            skipped: vec![],
            error: vec!["t::err".into()],
        });

        let spectrum = Spectrum::from_artifact(&artifact).unwrap();
        assert_eq!(spectrum.element_count(), 3);
        assert_eq!(spectrum.outcome_summary().failed, 2);

        let line2: Vec<_> = spectrum
            .covering_tests(&element("src/m.py", 2))
            .unwrap()
            .map(|t| t.name.as_str())
            .collect();
        assert_eq!(line2, vec!["t::err", "t::fail"]);
        assert_eq!(
            spectrum
                .covering_tests(&element("src/m.py", 5))
                .unwrap()
                .count(),
            0
        );
    }

    #[test]
    fn test_from_artifact_outcome_map() {
        let mut artifact = CoverageArtifact::default();
        artifact
            .test_outcomes
            .insert("t1".into(), "FAILED".into());
        artifact.test_durations.insert("t1".into(), 0.25);
        let spectrum = Spectrum::from_artifact(&artifact).unwrap();
        assert_eq!(spectrum.tests()[0].outcome, Outcome::Failed);
        assert_eq!(spectrum.tests()[0].duration, Some(0.25));
    }

    #[test]
    fn test_from_artifact_lists_and_map_agree() {
        let mut artifact = CoverageArtifact::default();
        artifact.tests = Some(TestLists {
            passed: vec!["t::ok".into()],
            failed: vec![],
            skipped: vec![],
            error: vec!["t::boom".into()],
        });
        artifact.test_outcomes.insert("t::ok".into(), "passed".into());
        artifact.test_outcomes.insert("t::boom".into(), "failed".into());
        artifact.test_outcomes.insert("t::extra".into(), "skipped".into());

        let spectrum = Spectrum::from_artifact(&artifact).unwrap();
        assert_eq!(spectrum.tests().len(), 3);
        let summary = spectrum.outcome_summary();
        assert_eq!((summary.passed, summary.failed, summary.skipped), (1, 1, 1));
    }

    #[test]
    fn test_from_artifact_lists_and_map_conflict() {
        let mut artifact = CoverageArtifact::default();
        artifact.tests = Some(TestLists {
            passed: vec!["t::flip".into()],
            ..Default::default()
        });
        artifact.test_outcomes.insert("t::flip".into(), "failed".into());

        assert_eq!(
            Spectrum::from_artifact(&artifact).unwrap_err(),
            SpectrumError::ConflictingOutcome {
                test: "t::flip".into(),
                first: Outcome::Passed,
                second: Outcome::Failed,
            }
        );
    }

    #[test]
    fn test_from_artifact_rejects_bad_line_key() {
        let mut artifact = CoverageArtifact::default();
        let mut file = FileCoverage::default();
        file.contexts.insert("twelve".into(), vec![]);
        artifact.files.insert("a.py".into(), file);
        assert_eq!(
            Spectrum::from_artifact(&artifact).unwrap_err(),
            SpectrumError::InvalidLineKey {
                file: "a.py".into(),
                key: "twelve".into()
            }
        );
    }

    #[test]
    fn test_from_artifact_rejects_unknown_outcome_label() {
        let mut artifact = CoverageArtifact::default();
        artifact.test_outcomes.insert("t1".into(), "flaky".into());
        assert!(matches!(
            Spectrum::from_artifact(&artifact).unwrap_err(),
            SpectrumError::InvalidOutcome { .. }
        ));
    }

    #[test]
    fn test_files_without_elements_are_listed() {
        let mut artifact = CoverageArtifact::default();
        artifact
            .files
            .insert("empty.py".into(), FileCoverage::default());
        let spectrum = Spectrum::from_artifact(&artifact).unwrap();
        assert_eq!(spectrum.files().collect::<Vec<_>>(), vec!["empty.py"]);
        assert_eq!(spectrum.element_count(), 0);
    }

    #[test]
    fn test_test_index_lookup() {
        let spectrum = SpectrumBuilder::new()
            .test("b", Outcome::Passed)
            .test("a", Outcome::Failed)
            .build()
            .unwrap();
        assert_eq!(spectrum.test_index("a"), Some(0));
        assert_eq!(spectrum.test_index("b"), Some(1));
        assert_eq!(spectrum.test_index("c"), None);
    }
}

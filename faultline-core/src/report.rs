//! Report assembly, ranking and rendering
//!
//! Global invariants enforced:
//! - Deterministic output ordering (BTreeMap keyed by path, formula, line)
//! - Byte-for-byte identical output across runs for identical input
//! - Ranking: score descending, then file ascending, then line ascending
//! - No formula logic here; scores come from the calculator unchanged

use crate::artifact::{CoverageArtifact, FileCoverage};
use crate::calculator::ScoreMap;
use crate::error::FormulaError;
use crate::params::SbflParameters;
use crate::spectrum::Spectrum;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

pub const REPORT_SCHEMA_VERSION: u32 = 1;

/// Run-level values supplied by the caller (the core never reads the clock)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportContext {
    pub tool_version: String,
    /// Unix timestamp in seconds
    pub timestamp: i64,
}

/// Fault localization report for one calculation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Report {
    pub schema_version: u32,
    pub meta: ReportMeta,
    pub totals: ReportTotals,
    pub files: BTreeMap<String, FileReport>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct ReportMeta {
    pub tool_version: String,
    pub timestamp: i64,
    /// Formulas applied, in selection order
    pub formulas: Vec<String>,
    pub files_analyzed: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReportTotals {
    pub tests: TestTotals,
    pub analysis: AnalysisTotals,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TestTotals {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct AnalysisTotals {
    pub elements_analyzed: usize,
    pub formulas_calculated: usize,
    pub scores_computed: usize,
    /// Share of elements covered by at least one test, in percent
    pub coverage_percentage: f64,
}

/// Per-file results
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FileReport {
    /// formula -> line -> score
    pub suspiciousness: BTreeMap<String, BTreeMap<u32, f64>>,
    /// line -> spectrum counts
    pub parameters: BTreeMap<u32, SbflParameters>,
    /// Original coverage evidence, passed through for traceability
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coverage_data: Option<FileCoverage>,
}

/// One row of a flat ranking
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RankedElement {
    pub rank: usize,
    pub file: String,
    pub line: u32,
    pub score: f64,
}

/// Ranking filters
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RankingOptions {
    /// Keep at most this many rows
    pub limit: Option<usize>,
    /// Drop rows scoring below this value
    pub min_score: Option<f64>,
}

/// Merge spectrum metadata, scores and the original coverage evidence into a report
pub fn assemble_report(
    spectrum: &Spectrum,
    scores: &ScoreMap,
    artifact: Option<&CoverageArtifact>,
    context: &ReportContext,
) -> Report {
    let mut files: BTreeMap<String, FileReport> = spectrum
        .files()
        .map(|path| {
            let suspiciousness = scores
                .formulas
                .iter()
                .map(|name| (name.clone(), BTreeMap::new()))
                .collect();
            let coverage_data = artifact.and_then(|a| a.files.get(path)).cloned();
            let report = FileReport {
                suspiciousness,
                parameters: BTreeMap::new(),
                coverage_data,
            };
            (path.to_string(), report)
        })
        .collect();

    for entry in &scores.elements {
        let file = files.entry(entry.element.file.clone()).or_default();
        file.parameters.insert(entry.element.line, entry.parameters);
        for (name, score) in &entry.scores {
            file.suspiciousness
                .entry(name.clone())
                .or_default()
                .insert(entry.element.line, *score);
        }
    }

    let summary = spectrum.outcome_summary();
    let elements = spectrum.element_count();
    let coverage_percentage = if elements == 0 {
        0.0
    } else {
        spectrum.covered_element_count() as f64 / elements as f64 * 100.0
    };

    info!(
        files = files.len(),
        elements,
        formulas = scores.formulas.len(),
        "report assembled"
    );

    Report {
        schema_version: REPORT_SCHEMA_VERSION,
        meta: ReportMeta {
            tool_version: context.tool_version.clone(),
            timestamp: context.timestamp,
            formulas: scores.formulas.clone(),
            files_analyzed: files.len(),
        },
        totals: ReportTotals {
            tests: TestTotals {
                total: summary.total(),
                passed: summary.passed,
                failed: summary.failed,
                skipped: summary.skipped,
            },
            analysis: AnalysisTotals {
                elements_analyzed: elements,
                formulas_calculated: scores.formulas.len(),
                scores_computed: scores.elements.iter().map(|e| e.scores.len()).sum(),
                coverage_percentage,
            },
        },
        files,
    }
}

impl Report {
    /// Canonical name of a formula applied in this report (case-insensitive lookup)
    pub fn formula_name(&self, formula: &str) -> Result<&str, FormulaError> {
        let wanted = formula.trim().to_ascii_lowercase();
        self.meta
            .formulas
            .iter()
            .find(|name| **name == wanted)
            .map(String::as_str)
            .ok_or_else(|| FormulaError::Unknown {
                name: formula.to_string(),
                available: self.meta.formulas.join(", "),
            })
    }

    /// Full ranking for one formula
    pub fn ranking(&self, formula: &str) -> Result<Vec<RankedElement>, FormulaError> {
        self.ranking_with(formula, &RankingOptions::default())
    }

    /// Ranking for one formula with threshold and top-N filters
    ///
    /// Ranks are assigned over the full ordering before filtering.
    pub fn ranking_with(
        &self,
        formula: &str,
        options: &RankingOptions,
    ) -> Result<Vec<RankedElement>, FormulaError> {
        let name = self.formula_name(formula)?;
        let entries: Vec<RankedElement> = self
            .files
            .iter()
            .filter_map(|(file, report)| report.suspiciousness.get(name).map(|s| (file, s)))
            .flat_map(|(file, lines)| {
                lines.iter().map(move |(line, score)| RankedElement {
                    rank: 0,
                    file: file.clone(),
                    line: *line,
                    score: *score,
                })
            })
            .collect();

        let ranked = sort_ranking(entries)
            .into_iter()
            .filter(|r| match options.min_score {
                Some(min) => r.score >= min,
                None => true,
            });

        Ok(match options.limit {
            Some(limit) => ranked.take(limit).collect(),
            None => ranked.collect(),
        })
    }

    /// All scores of one element, keyed by formula (empty if none were applied)
    pub fn element_scores(&self, file: &str, line: u32) -> BTreeMap<String, f64> {
        self.files
            .get(file)
            .map(|report| {
                report
                    .suspiciousness
                    .iter()
                    .filter_map(|(name, lines)| lines.get(&line).map(|s| (name.clone(), *s)))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

/// Sort ranking rows deterministically and number them from 1
pub fn sort_ranking(mut entries: Vec<RankedElement>) -> Vec<RankedElement> {
    entries.sort_by(|a, b| {
        // 1. Score descending
        b.score
            .total_cmp(&a.score)
            // 2. File path ascending
            .then_with(|| a.file.cmp(&b.file))
            // 3. Line number ascending
            .then_with(|| a.line.cmp(&b.line))
    });
    for (i, entry) in entries.iter_mut().enumerate() {
        entry.rank = i + 1;
    }
    entries
}

/// Render a ranking as fixed-width text
pub fn render_text(formula: &str, ranking: &[RankedElement]) -> String {
    let mut output = String::new();
    output.push_str(&format!("Formula: {}\n", formula));
    output.push_str(&format!(
        "{:<6} {:<10} {:<40} {}\n",
        "RANK", "SCORE", "FILE", "LINE"
    ));
    for row in ranking {
        output.push_str(&format!(
            "{:<6} {:<10} {:<40} {}\n",
            row.rank,
            format!("{:.4}", row.score),
            truncate_or_pad(&row.file, 40),
            row.line
        ));
    }
    output
}

/// Render a ranking as pretty JSON
pub fn render_ranking_json(ranking: &[RankedElement]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(ranking)
}

/// Render a report as pretty JSON
pub fn render_json(report: &Report) -> serde_json::Result<String> {
    report.to_json()
}

/// Keep the tail of long paths, pad short ones
fn truncate_or_pad(s: &str, width: usize) -> String {
    let len = s.chars().count();
    if len > width {
        let tail: String = s.chars().skip(len - width.saturating_sub(3)).collect();
        format!("...{}", tail)
    } else {
        format!("{:<width$}", s, width = width)
    }
}

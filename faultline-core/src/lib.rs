//! Faultline core library - spectrum-based fault localization

#![deny(warnings)]

// Global invariants enforced in this crate:
// - Every stage is a pure function of its input
// - No global mutable state; formula registries are caller-owned
// - No clocks, file system or network access in the computational core
// - Deterministic iteration order must be explicit
// - Identical input yields byte-for-byte identical output

pub mod artifact;
pub mod calculator;
pub mod config;
pub mod error;
pub mod formula;
pub mod params;
pub mod report;
pub mod spectrum;

pub use artifact::CoverageArtifact;
pub use calculator::{CalculatorOptions, ScoreMap, SuspiciousnessCalculator};
pub use config::ResolvedConfig;
pub use error::{FormulaError, LocalizeError, SpectrumError};
pub use formula::{Formula, FormulaRegistry};
pub use params::SbflParameters;
pub use report::{render_json, render_text, Report, ReportContext};
pub use spectrum::{CodeElement, Outcome, Spectrum};

use tracing::info;

/// Options for a full localization run
pub struct LocalizeOptions<'a> {
    /// Formulas to apply, in report order; empty is valid
    pub formulas: &'a [String],
    pub context: ReportContext,
}

/// Run the whole pipeline: validate the artifact, score every element, assemble the report
///
/// Formula names are resolved first and the spectrum is validated second, so both
/// configuration and input errors surface before any score is computed. Files
/// rejected by the config's include/exclude patterns are dropped before validation.
pub fn localize(
    artifact: &CoverageArtifact,
    config: &ResolvedConfig,
    options: LocalizeOptions<'_>,
) -> Result<Report, LocalizeError> {
    let selection = config.registry.resolve(options.formulas)?;

    let mut artifact = artifact.clone();
    let before = artifact.files.len();
    artifact.retain_files(|path| config.should_include(path));
    if artifact.files.len() != before {
        info!(
            kept = artifact.files.len(),
            dropped = before - artifact.files.len(),
            "files filtered by include/exclude patterns"
        );
    }

    let spectrum = Spectrum::from_artifact(&artifact)?;
    info!(
        files = spectrum.files().count(),
        elements = spectrum.element_count(),
        tests = spectrum.tests().len(),
        "spectrum loaded"
    );

    let calculator = SuspiciousnessCalculator::new(&config.registry).with_options(CalculatorOptions {
        parallel: config.parallel,
    });
    let scores = calculator.calculate_selection(&spectrum, &selection);

    Ok(report::assemble_report(
        &spectrum,
        &scores,
        Some(&artifact),
        &options.context,
    ))
}

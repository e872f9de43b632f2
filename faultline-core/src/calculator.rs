//! Suspiciousness calculation
//!
//! Two phases: parameters are derived once per element, then every selected
//! formula is applied to that single tuple. Formula names are resolved before
//! any element is touched.
//!
//! Global invariants enforced:
//! - Parallel and sequential evaluation produce identical score maps
//! - Element order is (file, line); formula order is selection order

use crate::error::FormulaError;
use crate::formula::{FormulaRegistry, FormulaSelection};
use crate::params::{parameters_for, OutcomeTotals, SbflParameters};
use crate::spectrum::{CodeElement, Spectrum};
use rayon::prelude::*;
use std::collections::BTreeSet;
use tracing::{debug, info};

/// Scores of one element
#[derive(Debug, Clone, PartialEq)]
pub struct ElementScores {
    pub element: CodeElement,
    pub parameters: SbflParameters,
    /// (formula name, score) in selection order; empty when no formula was selected
    pub scores: Vec<(String, f64)>,
}

impl ElementScores {
    pub fn score(&self, formula: &str) -> Option<f64> {
        let wanted = formula.trim().to_ascii_lowercase();
        self.scores
            .iter()
            .find(|(name, _)| *name == wanted)
            .map(|(_, score)| *score)
    }
}

/// Element -> formula -> score, for one calculation pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoreMap {
    pub formulas: Vec<String>,
    pub elements: Vec<ElementScores>,
}

impl ScoreMap {
    pub fn get(&self, element: &CodeElement) -> Option<&ElementScores> {
        self.elements
            .binary_search_by(|e| e.element.cmp(element))
            .ok()
            .map(|i| &self.elements[i])
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CalculatorOptions {
    /// Evaluate elements on the rayon thread pool
    pub parallel: bool,
}

/// Applies registry formulas across a spectrum
pub struct SuspiciousnessCalculator<'r> {
    registry: &'r FormulaRegistry,
    options: CalculatorOptions,
}

impl<'r> SuspiciousnessCalculator<'r> {
    pub fn new(registry: &'r FormulaRegistry) -> Self {
        SuspiciousnessCalculator {
            registry,
            options: CalculatorOptions::default(),
        }
    }

    pub fn with_options(mut self, options: CalculatorOptions) -> Self {
        self.options = options;
        self
    }

    /// Resolve `formula_names` and score every element
    pub fn calculate<S: AsRef<str>>(
        &self,
        spectrum: &Spectrum,
        formula_names: &[S],
    ) -> Result<ScoreMap, FormulaError> {
        let selection = self.registry.resolve(formula_names)?;
        Ok(self.calculate_selection(spectrum, &selection))
    }

    /// Score every element with an already-resolved selection
    pub fn calculate_selection(&self, spectrum: &Spectrum, selection: &FormulaSelection) -> ScoreMap {
        let totals = OutcomeTotals::of(spectrum);
        let names = selection.names();
        let entries: Vec<(&CodeElement, &BTreeSet<usize>)> = spectrum.elements().collect();

        let score_one = |(element, covering): &(&CodeElement, &BTreeSet<usize>)| {
            let parameters = parameters_for(spectrum, totals, covering);
            let scores = selection
                .formulas()
                .iter()
                .zip(&names)
                .map(|(formula, name)| (name.clone(), formula.calculate(&parameters)))
                .collect();
            ElementScores {
                element: (*element).clone(),
                parameters,
                scores,
            }
        };

        let elements: Vec<ElementScores> = if self.options.parallel {
            entries.par_iter().map(score_one).collect()
        } else {
            entries.iter().map(score_one).collect()
        };

        let degenerate = elements
            .iter()
            .filter(|e| e.parameters.n_cf > 0 && e.scores.iter().any(|(_, s)| *s == 0.0))
            .count();
        if degenerate > 0 {
            debug!(
                elements = degenerate,
                "zero-denominator scores resolved to 0.0 for failing-covered elements"
            );
        }
        info!(
            elements = elements.len(),
            formulas = names.len(),
            failed = totals.failed,
            passed = totals.passed,
            "suspiciousness calculated"
        );

        ScoreMap {
            formulas: names,
            elements,
        }
    }
}

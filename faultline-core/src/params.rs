//! SBFL parameter extraction
//!
//! Reduces each element's spectrum to the four counts every formula consumes.
//!
//! Global invariants enforced:
//! - n_cf + n_nf == failed tests, n_cp + n_np == passed tests, for every element
//! - Skipped tests count towards neither total
//! - Per-element work is proportional to that element's coverage entries

use crate::spectrum::{CodeElement, Outcome, Spectrum};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Spectrum counts for one element
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SbflParameters {
    /// Failed tests covering the element
    pub n_cf: u64,
    /// Failed tests not covering the element
    pub n_nf: u64,
    /// Passed tests covering the element
    pub n_cp: u64,
    /// Passed tests not covering the element
    pub n_np: u64,
}

impl SbflParameters {
    pub fn new(n_cf: u64, n_nf: u64, n_cp: u64, n_np: u64) -> Self {
        SbflParameters {
            n_cf,
            n_nf,
            n_cp,
            n_np,
        }
    }

    pub fn total_failed(&self) -> u64 {
        self.n_cf + self.n_nf
    }

    pub fn total_passed(&self) -> u64 {
        self.n_cp + self.n_np
    }

    /// Non-skipped tests covering the element
    pub fn covering(&self) -> u64 {
        self.n_cf + self.n_cp
    }
}

/// Failed/passed totals, computed once per spectrum
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutcomeTotals {
    pub failed: u64,
    pub passed: u64,
}

impl OutcomeTotals {
    pub fn of(spectrum: &Spectrum) -> Self {
        let mut totals = OutcomeTotals::default();
        for test in spectrum.tests() {
            match test.outcome {
                Outcome::Failed => totals.failed += 1,
                Outcome::Passed => totals.passed += 1,
                Outcome::Skipped => {}
            }
        }
        totals
    }
}

/// Parameters for one element, given the indices of its covering tests
pub(crate) fn parameters_for(
    spectrum: &Spectrum,
    totals: OutcomeTotals,
    covering: &BTreeSet<usize>,
) -> SbflParameters {
    let tests = spectrum.tests();
    let (mut n_cf, mut n_cp) = (0u64, 0u64);
    for &id in covering {
        match tests[id].outcome {
            Outcome::Failed => n_cf += 1,
            Outcome::Passed => n_cp += 1,
            Outcome::Skipped => {}
        }
    }
    SbflParameters {
        n_cf,
        n_nf: totals.failed - n_cf,
        n_cp,
        n_np: totals.passed - n_cp,
    }
}

/// Parameters for every element of the spectrum, in (file, line) order
///
/// Elements nobody covered are included with n_cf = n_cp = 0.
pub fn extract_parameters(spectrum: &Spectrum) -> Vec<(&CodeElement, SbflParameters)> {
    let totals = OutcomeTotals::of(spectrum);
    spectrum
        .elements()
        .map(|(element, covering)| (element, parameters_for(spectrum, totals, covering)))
        .collect()
}

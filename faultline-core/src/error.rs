//! Typed errors surfaced by the localization engine
//!
//! Input problems (`SpectrumError`) and configuration problems (`FormulaError`)
//! are both detected before any score is computed.

use crate::spectrum::Outcome;
use thiserror::Error;

/// A coverage-and-outcome artifact that cannot be turned into a spectrum
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SpectrumError {
    #[error("malformed coverage artifact: {0}")]
    Json(String),

    #[error("coverage artifact contains a file with an empty path")]
    EmptyFilePath,

    #[error("{file}: line key {key:?} is not an integer")]
    InvalidLineKey { file: String, key: String },

    #[error("{file}: line number must be >= 1 (got {line})")]
    InvalidLineNumber { file: String, line: i64 },

    #[error("test name must not be empty")]
    EmptyTestName,

    #[error("test {test:?} has unknown outcome {label:?}")]
    InvalidOutcome { test: String, label: String },

    #[error("test {test:?} is recorded as both {first} and {second}")]
    ConflictingOutcome {
        test: String,
        first: Outcome,
        second: Outcome,
    },

    #[error("{file}:{line} is covered by test {test:?}, which has no recorded outcome")]
    UnknownTest {
        file: String,
        line: u32,
        test: String,
    },
}

/// Formula lookup or registration failure
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FormulaError {
    #[error("unknown formula {name:?} (available: {available})")]
    Unknown { name: String, available: String },

    #[error(
        "D-star exponent must be between 1 and {max} (got {0})",
        max = crate::formula::MAX_DSTAR_EXPONENT
    )]
    InvalidExponent(u32),

    #[error("formula {0:?} is already registered")]
    Duplicate(String),
}

/// Any failure of a full localization run
#[derive(Debug, Error)]
pub enum LocalizeError {
    #[error(transparent)]
    Spectrum(#[from] SpectrumError),

    #[error(transparent)]
    Formula(#[from] FormulaError),
}

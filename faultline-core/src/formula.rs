//! Suspiciousness formulas and the formula registry
//!
//! Every formula is a total, pure function of [`SbflParameters`].
//!
//! Numeric policy:
//! - A zero denominator yields 0.0 (never NaN or infinity)
//! - A square root of a non-positive radicand yields 0.0
//! - n_cf == 0 yields 0.0 for every formula
//! - Every score is finite; D-star results are clamped to `f64::MAX`
//! - D-star carries its exponent as construction state, so each exponent is
//!   its own registry entry (`dstar2`, `dstar3`, ...)

use crate::error::FormulaError;
use crate::params::SbflParameters;

/// Exponents of the D-star instances every default registry carries
pub const DEFAULT_DSTAR_EXPONENTS: &[u32] = &[2, 3];

/// Largest D-star exponent a registry accepts
pub const MAX_DSTAR_EXPONENT: u32 = 16;

/// Formula selection used when the caller does not name any
pub const DEFAULT_FORMULAS: &[&str] = &["ochiai", "tarantula", "jaccard", "dstar2"];

/// A suspiciousness formula
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Formula {
    Ochiai,
    Tarantula,
    Jaccard,
    /// D-star with exponent k >= 1
    DStar(u32),
    Kulczynski2,
    RussellRao,
    SorensenDice,
    Sbi,
}

impl Formula {
    /// Registry name (lowercase)
    pub fn name(&self) -> String {
        match self {
            Formula::Ochiai => "ochiai".to_string(),
            Formula::Tarantula => "tarantula".to_string(),
            Formula::Jaccard => "jaccard".to_string(),
            Formula::DStar(k) => format!("dstar{}", k),
            Formula::Kulczynski2 => "kulczynski2".to_string(),
            Formula::RussellRao => "russellrao".to_string(),
            Formula::SorensenDice => "sorensendice".to_string(),
            Formula::Sbi => "sbi".to_string(),
        }
    }

    /// Whether scores are confined to [0, 1]
    pub fn is_bounded(&self) -> bool {
        !matches!(self, Formula::DStar(_))
    }

    /// Score one element
    pub fn calculate(&self, p: &SbflParameters) -> f64 {
        if p.n_cf == 0 {
            return 0.0;
        }
        let n_cf = p.n_cf as f64;
        let n_nf = p.n_nf as f64;
        let n_cp = p.n_cp as f64;
        let n_np = p.n_np as f64;

        match self {
            Formula::Ochiai => {
                let radicand = (n_cf + n_nf) * (n_cf + n_cp);
                if radicand <= 0.0 {
                    0.0
                } else {
                    n_cf / radicand.sqrt()
                }
            }
            Formula::Tarantula => {
                let fr = ratio(n_cf, n_cf + n_nf);
                let pr = ratio(n_cp, n_cp + n_np);
                ratio(fr, fr + pr)
            }
            Formula::Jaccard => ratio(n_cf, n_cf + n_nf + n_cp),
            Formula::DStar(k) => {
                let exponent = i32::try_from(*k).unwrap_or(i32::MAX);
                ratio(n_cf.powi(exponent), n_cp + n_nf).min(f64::MAX)
            }
            Formula::Kulczynski2 => 0.5 * (ratio(n_cf, n_cf + n_nf) + ratio(n_cf, n_cf + n_cp)),
            Formula::RussellRao => ratio(n_cf, n_cf + n_nf + n_cp + n_np),
            Formula::SorensenDice => ratio(2.0 * n_cf, 2.0 * n_cf + n_nf + n_cp),
            Formula::Sbi => ratio(n_cf, n_cf + n_cp),
        }
    }
}

/// Division with the zero-denominator policy applied
fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

/// Caller-owned set of formulas, looked up by case-insensitive name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormulaRegistry {
    formulas: Vec<Formula>,
}

impl Default for FormulaRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl FormulaRegistry {
    /// Registry with no formulas
    pub fn empty() -> Self {
        FormulaRegistry {
            formulas: Vec::new(),
        }
    }

    /// Registry with all built-in formulas
    pub fn with_defaults() -> Self {
        let mut formulas = vec![Formula::Ochiai, Formula::Tarantula, Formula::Jaccard];
        formulas.extend(DEFAULT_DSTAR_EXPONENTS.iter().map(|&k| Formula::DStar(k)));
        formulas.extend([
            Formula::Kulczynski2,
            Formula::RussellRao,
            Formula::SorensenDice,
            Formula::Sbi,
        ]);
        FormulaRegistry { formulas }
    }

    /// Add a formula under its own name
    pub fn register(&mut self, formula: Formula) -> Result<(), FormulaError> {
        if let Formula::DStar(k) = formula {
            if !(1..=MAX_DSTAR_EXPONENT).contains(&k) {
                return Err(FormulaError::InvalidExponent(k));
            }
        }
        let name = formula.name();
        if self.get(&name).is_some() {
            return Err(FormulaError::Duplicate(name));
        }
        self.formulas.push(formula);
        Ok(())
    }

    /// Make sure a D-star instance with exponent `k` is registered
    pub fn ensure_dstar(&mut self, k: u32) -> Result<(), FormulaError> {
        match self.register(Formula::DStar(k)) {
            Err(FormulaError::Duplicate(_)) => Ok(()),
            other => other,
        }
    }

    pub fn get(&self, name: &str) -> Option<Formula> {
        let wanted = name.trim().to_ascii_lowercase();
        self.formulas.iter().copied().find(|f| f.name() == wanted)
    }

    /// Registered names in registration order
    pub fn names(&self) -> Vec<String> {
        self.formulas.iter().map(Formula::name).collect()
    }

    pub fn len(&self) -> usize {
        self.formulas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.formulas.is_empty()
    }

    /// Resolve a requested list of names into a selection
    ///
    /// Duplicates collapse onto their first occurrence; order is preserved. Any
    /// unknown name fails the whole resolution.
    pub fn resolve<S: AsRef<str>>(&self, names: &[S]) -> Result<FormulaSelection, FormulaError> {
        let mut formulas: Vec<Formula> = Vec::with_capacity(names.len());
        for name in names {
            let name = name.as_ref();
            let formula = self.get(name).ok_or_else(|| FormulaError::Unknown {
                name: name.to_string(),
                available: self.names().join(", "),
            })?;
            if !formulas.contains(&formula) {
                formulas.push(formula);
            }
        }
        Ok(FormulaSelection { formulas })
    }
}

/// Ordered, duplicate-free list of formulas for one calculation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormulaSelection {
    formulas: Vec<Formula>,
}

impl FormulaSelection {
    pub fn formulas(&self) -> &[Formula] {
        &self.formulas
    }

    pub fn names(&self) -> Vec<String> {
        self.formulas.iter().map(Formula::name).collect()
    }

    pub fn len(&self) -> usize {
        self.formulas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.formulas.is_empty()
    }
}

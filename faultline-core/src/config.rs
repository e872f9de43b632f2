//! Configuration file support for Faultline
//!
//! Loads run configuration from JSON files.
//!
//! Search order:
//! 1. Explicit path (--config CLI flag)
//! 2. `.faultlinerc.json` in the working directory
//! 3. `faultline.config.json` in the working directory
//!
//! All fields are optional. CLI flags take precedence over config file values.

use crate::formula::{FormulaRegistry, DEFAULT_FORMULAS};
use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Faultline configuration loaded from a JSON config file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FaultlineConfig {
    /// Formulas to apply when none are given on the command line
    #[serde(default)]
    pub formulas: Option<Vec<String>>,

    /// Extra D-star exponents to register as `dstar<k>`
    #[serde(default)]
    pub dstar_exponents: Vec<u32>,

    /// Glob patterns for files to include (default: all files in the artifact)
    #[serde(default)]
    pub include: Vec<String>,

    /// Glob patterns for files to exclude
    #[serde(default)]
    pub exclude: Vec<String>,

    /// Maximum number of ranked rows to show
    #[serde(default)]
    pub top: Option<usize>,

    /// Minimum score for ranked rows
    #[serde(default)]
    pub min_score: Option<f64>,

    /// Score elements on a thread pool
    #[serde(default)]
    pub parallel: Option<bool>,
}

/// Resolved configuration with compiled patterns and a built registry
#[derive(Debug)]
pub struct ResolvedConfig {
    /// Compiled include patterns (None means include all)
    pub include: Option<GlobSet>,
    /// Compiled exclude patterns (None means exclude nothing)
    pub exclude: Option<GlobSet>,
    /// Registry holding the built-in formulas plus configured D-star instances
    pub registry: FormulaRegistry,
    /// Default formula selection, canonical names
    pub formulas: Vec<String>,
    pub top_n: Option<usize>,
    pub min_score: Option<f64>,
    pub parallel: bool,
    /// Path the config was loaded from (None if defaults)
    pub config_path: Option<PathBuf>,
}

impl FaultlineConfig {
    /// Build the formula registry this configuration describes
    pub fn registry(&self) -> Result<FormulaRegistry> {
        let mut registry = FormulaRegistry::with_defaults();
        for &k in &self.dstar_exponents {
            registry
                .ensure_dstar(k)
                .with_context(|| format!("invalid dstar_exponents entry: {}", k))?;
        }
        Ok(registry)
    }

    /// Validate the configuration for logical errors
    pub fn validate(&self) -> Result<()> {
        let registry = self.registry()?;

        if let Some(ref formulas) = self.formulas {
            registry
                .resolve(formulas)
                .context("invalid formulas entry")?;
        }

        if let Some(min) = self.min_score {
            if !min.is_finite() || min < 0.0 {
                anyhow::bail!("min_score must be a non-negative number (got {})", min);
            }
        }

        if self.top == Some(0) {
            anyhow::bail!("top must be at least 1");
        }

        for pattern in &self.include {
            Glob::new(pattern).with_context(|| format!("invalid include pattern: {}", pattern))?;
        }
        for pattern in &self.exclude {
            Glob::new(pattern).with_context(|| format!("invalid exclude pattern: {}", pattern))?;
        }

        Ok(())
    }

    /// Resolve config into compiled form ready for use
    pub fn resolve(&self) -> Result<ResolvedConfig> {
        self.validate()?;

        let registry = self.registry()?;
        let formulas = match &self.formulas {
            Some(names) => registry.resolve(names)?.names(),
            None => registry.resolve(DEFAULT_FORMULAS)?.names(),
        };

        Ok(ResolvedConfig {
            include: compile_globs(&self.include)?,
            exclude: compile_globs(&self.exclude)?,
            registry,
            formulas,
            top_n: self.top,
            min_score: self.min_score,
            parallel: self.parallel.unwrap_or(false),
            config_path: None,
        })
    }
}

fn compile_globs(patterns: &[String]) -> Result<Option<GlobSet>> {
    if patterns.is_empty() {
        return Ok(None);
    }
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(Some(builder.build()?))
}

impl ResolvedConfig {
    /// Check if a file path should be analyzed based on include/exclude patterns
    pub fn should_include(&self, path: &str) -> bool {
        if let Some(ref exclude) = self.exclude {
            if exclude.is_match(path) {
                return false;
            }
        }

        if let Some(ref include) = self.include {
            return include.is_match(path);
        }

        true
    }

    /// Build a ResolvedConfig with all defaults (no config file)
    pub fn defaults() -> Result<Self> {
        FaultlineConfig::default().resolve()
    }
}

/// Discover and load a config file from a directory
///
/// Search order:
/// 1. `.faultlinerc.json`
/// 2. `faultline.config.json`
///
/// Returns `None` if no config file is found (use defaults).
pub fn discover_config(dir: &Path) -> Result<Option<(FaultlineConfig, PathBuf)>> {
    for name in [".faultlinerc.json", "faultline.config.json"] {
        let path = dir.join(name);
        if path.exists() {
            let config = load_config_file(&path)?;
            return Ok(Some((config, path)));
        }
    }
    Ok(None)
}

/// Load config from an explicit file path
pub fn load_config_file(path: &Path) -> Result<FaultlineConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;

    let config: FaultlineConfig = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse config file: {}", path.display()))?;

    config
        .validate()
        .with_context(|| format!("invalid config in: {}", path.display()))?;

    Ok(config)
}

/// Load and resolve config
///
/// If `config_path` is provided, loads from that file.
/// Otherwise, discovers config in `dir`.
/// Returns default config if nothing is found.
pub fn load_and_resolve(dir: &Path, config_path: Option<&Path>) -> Result<ResolvedConfig> {
    let (config, source_path) = if let Some(path) = config_path {
        let config = load_config_file(path)?;
        (config, Some(path.to_path_buf()))
    } else {
        match discover_config(dir)? {
            Some((config, path)) => (config, Some(path)),
            None => (FaultlineConfig::default(), None),
        }
    };

    let mut resolved = config.resolve()?;
    resolved.config_path = source_path;
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_default_config_is_valid() {
        let config = FaultlineConfig::default();
        config.validate().expect("default config should be valid");
        let resolved = config.resolve().expect("default config should resolve");
        assert!(resolved.include.is_none());
        assert!(resolved.exclude.is_none());
        assert_eq!(resolved.formulas, vec!["ochiai", "tarantula", "jaccard", "dstar2"]);
        assert!(!resolved.parallel);
        assert!(resolved.should_include("src/anything.py"));
    }

    #[test]
    fn test_parse_full_config() {
        let json = r#"{
            "formulas": ["Ochiai", "dstar4", "ochiai"],
            "dstar_exponents": [4],
            "include": ["src/**"],
            "exclude": ["src/vendor/**"],
            "top": 10,
            "min_score": 0.25,
            "parallel": true
        }"#;
        let config: FaultlineConfig = serde_json::from_str(json).unwrap();
        let resolved = config.resolve().unwrap();
        assert_eq!(resolved.formulas, vec!["ochiai", "dstar4"]);
        assert!(resolved.registry.get("dstar4").is_some());
        assert_eq!(resolved.top_n, Some(10));
        assert_eq!(resolved.min_score, Some(0.25));
        assert!(resolved.parallel);
    }

    #[test]
    fn test_reject_unknown_fields() {
        let json = r#"{"formula": ["ochiai"]}"#;
        assert!(serde_json::from_str::<FaultlineConfig>(json).is_err());
    }

    #[test]
    fn test_reject_unknown_formula() {
        let config = FaultlineConfig {
            formulas: Some(vec!["foo".into()]),
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(format!("{:#}", err).contains("foo"));
    }

    #[test]
    fn test_dstar_formula_requires_exponent_entry() {
        let config = FaultlineConfig {
            formulas: Some(vec!["dstar7".into()]),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_reject_zero_dstar_exponent() {
        let config = FaultlineConfig {
            dstar_exponents: vec![0],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_reject_oversized_dstar_exponent() {
        let config = FaultlineConfig {
            dstar_exponents: vec![1100],
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(format!("{:#}", err).contains("1100"));
        assert!(config.resolve().is_err());
    }

    #[test]
    fn test_reject_negative_min_score() {
        let config = FaultlineConfig {
            min_score: Some(-0.1),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_reject_zero_top() {
        let config = FaultlineConfig {
            top: Some(0),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_reject_invalid_glob_pattern() {
        let config = FaultlineConfig {
            include: vec!["src/[".into()],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_formula_list_is_valid() {
        let config = FaultlineConfig {
            formulas: Some(vec![]),
            ..Default::default()
        };
        let resolved = config.resolve().unwrap();
        assert!(resolved.formulas.is_empty());
    }

    #[test]
    fn test_should_include_custom_patterns() {
        let config = FaultlineConfig {
            include: vec!["src/**/*.py".into()],
            exclude: vec!["**/generated/**".into()],
            ..Default::default()
        };
        let resolved = config.resolve().unwrap();
        assert!(resolved.should_include("src/pkg/calc.py"));
        assert!(!resolved.should_include("src/generated/model.py"));
        assert!(!resolved.should_include("tests/test_calc.py"));
    }

    #[test]
    fn test_discover_faultlinerc() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join(".faultlinerc.json");
        fs::write(&config_path, r#"{"min_score": 0.5}"#).unwrap();

        let (config, path) = discover_config(dir.path()).unwrap().unwrap();
        assert_eq!(config.min_score, Some(0.5));
        assert_eq!(path, config_path);
    }

    #[test]
    fn test_discover_priority_order() {
        let dir = tempfile::tempdir().unwrap();

        // Both present - .faultlinerc.json should win
        fs::write(dir.path().join(".faultlinerc.json"), r#"{"top": 1}"#).unwrap();
        fs::write(dir.path().join("faultline.config.json"), r#"{"top": 2}"#).unwrap();

        let (config, _) = discover_config(dir.path()).unwrap().unwrap();
        assert_eq!(config.top, Some(1), ".faultlinerc.json should take priority");
    }

    #[test]
    fn test_discover_config_json() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("faultline.config.json"), r#"{"top": 3}"#).unwrap();
        let (config, _) = discover_config(dir.path()).unwrap().unwrap();
        assert_eq!(config.top, Some(3));
    }

    #[test]
    fn test_no_config_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(discover_config(dir.path()).unwrap().is_none());
    }

    #[test]
    fn test_load_and_resolve_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let resolved = load_and_resolve(dir.path(), None).unwrap();
        assert!(resolved.config_path.is_none());
        assert_eq!(resolved.formulas.len(), 4);
    }

    #[test]
    fn test_load_and_resolve_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("custom.json");
        fs::write(&config_path, r#"{"formulas": ["sbi"]}"#).unwrap();

        let resolved = load_and_resolve(dir.path(), Some(&config_path)).unwrap();
        assert_eq!(resolved.formulas, vec!["sbi"]);
        assert_eq!(resolved.config_path, Some(config_path));
    }

    #[test]
    fn test_load_config_file_reports_path_on_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("broken.json");
        fs::write(&config_path, "{").unwrap();
        let err = load_config_file(&config_path).unwrap_err();
        assert!(err.to_string().contains("broken.json"));
    }
}

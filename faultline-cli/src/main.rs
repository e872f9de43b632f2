//! Faultline CLI - rank code lines by suspiciousness from coverage spectra

#![deny(warnings)]

// Global invariants enforced:
// - Deterministic output ordering
// - Identical input yields byte-for-byte identical output (apart from the timestamp)
// - Logs go to stderr; stdout carries results only

use anyhow::Context;
use clap::{Parser, Subcommand};
use faultline_core::config::{self, ResolvedConfig};
use faultline_core::report::{render_ranking_json, RankingOptions};
use faultline_core::{localize, render_json, render_text, CoverageArtifact, LocalizeOptions};
use faultline_core::{Report, ReportContext};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "faultline")]
#[command(about = "Spectrum-based fault localization: rank code lines by suspiciousness")]
#[command(version = env!("FAULTLINE_VERSION"))]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug); RUST_LOG overrides
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute suspiciousness scores from a coverage-and-outcome artifact
    Calculate {
        /// Path to the coverage artifact (JSON)
        #[arg(long)]
        input: PathBuf,

        /// Path to write the report (JSON)
        #[arg(long)]
        output: PathBuf,

        /// Formula to apply (repeatable; overrides config file)
        #[arg(long = "formula", short = 'f')]
        formulas: Vec<String>,

        /// Path to config file (default: auto-discover)
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Print a ranking from an existing report
    Rank {
        /// Path to a report produced by `calculate`
        #[arg(long)]
        report: PathBuf,

        /// Formula to rank by (default: first formula in the report)
        #[arg(long, short = 'f')]
        formula: Option<String>,

        /// Output format
        #[arg(long, default_value = "text")]
        format: OutputFormat,

        /// Show only top N results (overrides config file)
        #[arg(long)]
        top: Option<usize>,

        /// Minimum score threshold (overrides config file)
        #[arg(long)]
        min_score: Option<f64>,

        /// Path to config file (default: auto-discover)
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// List registered formulas
    Formulas {
        /// Path to config file (default: auto-discover)
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Validate or show configuration
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Validate a config file without running analysis
    Validate {
        /// Path to config file (default: auto-discover from current directory)
        #[arg(long)]
        path: Option<PathBuf>,
    },
    /// Show the resolved configuration (merged defaults + config file)
    Show {
        /// Path to config file (default: auto-discover from current directory)
        #[arg(long)]
        path: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Calculate {
            input,
            output,
            formulas,
            config: config_path,
        } => {
            let resolved = load_config(config_path.as_deref())?;
            calculate(&input, &output, formulas, &resolved)?;
        }
        Commands::Rank {
            report,
            formula,
            format,
            top,
            min_score,
            config: config_path,
        } => {
            let resolved = load_config(config_path.as_deref())?;
            let options = RankingOptions {
                limit: top.or(resolved.top_n),
                min_score: min_score.or(resolved.min_score),
            };
            if let Some(min) = options.min_score {
                if !min.is_finite() || min < 0.0 {
                    anyhow::bail!("--min-score must be a non-negative number (got {})", min);
                }
            }
            rank(&report, formula.as_deref(), format, &options)?;
        }
        Commands::Formulas {
            config: config_path,
        } => {
            let resolved = load_config(config_path.as_deref())?;
            for name in resolved.registry.names() {
                let marker = if resolved.formulas.contains(&name) {
                    " (default)"
                } else {
                    ""
                };
                println!("{}{}", name, marker);
            }
        }
        Commands::Config { action } => handle_config(action)?,
    }

    Ok(())
}

/// Install the stderr tracing subscriber
fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn load_config(config_path: Option<&Path>) -> anyhow::Result<ResolvedConfig> {
    let cwd = std::env::current_dir()?;
    let resolved = config::load_and_resolve(&cwd, config_path)
        .context("failed to load configuration")?;
    if let Some(path) = &resolved.config_path {
        eprintln!("Using config: {}", path.display());
    }
    Ok(resolved)
}

fn calculate(
    input: &Path,
    output: &Path,
    formulas: Vec<String>,
    resolved: &ResolvedConfig,
) -> anyhow::Result<()> {
    if input.as_os_str().is_empty() {
        anyhow::bail!("--input must not be empty");
    }
    if output.as_os_str().is_empty() {
        anyhow::bail!("--output must not be empty");
    }

    // CLI formulas override config file values
    let formulas = if formulas.is_empty() {
        resolved.formulas.clone()
    } else {
        formulas
    };

    // Fail on unknown formulas before touching the input
    resolved
        .registry
        .resolve(&formulas)
        .context("invalid --formula")?;

    info!(input = %input.display(), formulas = formulas.len(), "loading coverage artifact");
    let content = std::fs::read_to_string(input)
        .with_context(|| format!("failed to read coverage artifact: {}", input.display()))?;
    let artifact = CoverageArtifact::from_json(&content)
        .with_context(|| format!("invalid coverage artifact: {}", input.display()))?;

    let context = ReportContext {
        tool_version: env!("FAULTLINE_VERSION").to_string(),
        timestamp: unix_timestamp(),
    };
    let report = localize(
        &artifact,
        resolved,
        LocalizeOptions {
            formulas: &formulas,
            context,
        },
    )
    .with_context(|| format!("failed to analyze {}", input.display()))?;

    let json = render_json(&report).context("failed to serialize report")?;
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory: {}", parent.display()))?;
    }
    std::fs::write(output, json)
        .with_context(|| format!("failed to write report: {}", output.display()))?;

    println!(
        "Analyzed {} elements in {} files with {} formula(s): {}",
        report.totals.analysis.elements_analyzed,
        report.meta.files_analyzed,
        report.meta.formulas.len(),
        report.meta.formulas.join(", ")
    );
    println!(
        "Tests: {} total, {} passed, {} failed, {} skipped",
        report.totals.tests.total,
        report.totals.tests.passed,
        report.totals.tests.failed,
        report.totals.tests.skipped
    );
    println!("Report written to: {}", output.display());
    Ok(())
}

fn rank(
    report_path: &Path,
    formula: Option<&str>,
    format: OutputFormat,
    options: &RankingOptions,
) -> anyhow::Result<()> {
    let content = std::fs::read_to_string(report_path)
        .with_context(|| format!("failed to read report: {}", report_path.display()))?;
    let report = Report::from_json(&content)
        .with_context(|| format!("failed to parse report: {}", report_path.display()))?;

    let formula = match formula {
        Some(f) => report.formula_name(f)?.to_string(),
        None => report
            .meta
            .formulas
            .first()
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("report contains no formula scores to rank"))?,
    };

    let ranking = report.ranking_with(&formula, options)?;
    match format {
        OutputFormat::Text => print!("{}", render_text(&formula, &ranking)),
        OutputFormat::Json => println!("{}", render_ranking_json(&ranking)?),
    }
    Ok(())
}

fn handle_config(action: ConfigAction) -> anyhow::Result<()> {
    match action {
        ConfigAction::Validate { path } => {
            let cwd = std::env::current_dir()?;
            match path {
                Some(p) => {
                    config::load_config_file(&p)?;
                    println!("Config valid: {}", p.display());
                }
                None => match config::discover_config(&cwd)? {
                    Some((_, p)) => println!("Config valid: {}", p.display()),
                    None => println!("No config file found; using defaults"),
                },
            }
        }
        ConfigAction::Show { path } => {
            let resolved = load_config(path.as_deref())?;
            let shown = serde_json::json!({
                "config_path": resolved.config_path.as_ref().map(|p| p.display().to_string()),
                "formulas": resolved.formulas,
                "registered_formulas": resolved.registry.names(),
                "top": resolved.top_n,
                "min_score": resolved.min_score,
                "parallel": resolved.parallel,
                "has_include_patterns": resolved.include.is_some(),
                "has_exclude_patterns": resolved.exclude.is_some(),
            });
            println!("{}", serde_json::to_string_pretty(&shown)?);
        }
    }
    Ok(())
}

fn unix_timestamp() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

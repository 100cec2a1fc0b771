//! Survival analysis of tissue-fraction biomarkers from the command line.

use std::fs::{self, File};
use std::io::{self, IsTerminal};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use tissue_survival::{
    logging::{init_logging, LogConfig, LogFormat},
    cohort::describe,
    report::{summary_table, summary_text, write_curves_csv, write_forest_csv, write_summary_csv},
    run_analysis, AnalysisConfig, CohortTable,
};
use tracing::info;

#[derive(Parser)]
#[command(
    name = "tissue-survival",
    version,
    about = "Cox regression, Kaplan-Meier curves and log-rank tests for tissue-fraction biomarkers"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Adjust log verbosity (-v for info, -vv for debug, -q for errors only).
    #[command(flatten)]
    verbosity: Verbosity<WarnLevel>,

    /// Log output format.
    #[arg(long = "log-format", value_enum, default_value = "pretty", global = true)]
    log_format: LogFormatArg,
}

#[derive(Subcommand)]
enum Command {
    /// Run the survival analysis on a joined cohort CSV.
    Analyze(AnalyzeArgs),

    /// Summarise cohort columns (count, mean, std, quartiles).
    Describe(DescribeArgs),

    /// Print the default configuration as JSON.
    DefaultConfig,
}

#[derive(Parser)]
struct AnalyzeArgs {
    /// Cohort CSV: one row per patient, clinical columns plus tissue fractions.
    #[arg(value_name = "COHORT_CSV")]
    cohort: PathBuf,

    /// JSON configuration (column roles, duration divisor, model settings).
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Column holding the patient identifier.
    #[arg(long = "id-column", default_value = "PATIENT")]
    id_column: String,

    /// Directory for cox_summary.csv and km_curves.csv.
    #[arg(long = "out-dir", value_name = "DIR")]
    out_dir: Option<PathBuf>,
}

#[derive(Parser)]
struct DescribeArgs {
    /// Cohort CSV: one row per patient.
    #[arg(value_name = "COHORT_CSV")]
    cohort: PathBuf,

    /// Columns to summarise.
    #[arg(
        long,
        value_delimiter = ',',
        default_values_t = vec!["str_fraction".to_string(), "mus_fraction".to_string(), "tum_fraction".to_string()]
    )]
    columns: Vec<String>,

    /// Column holding the patient identifier.
    #[arg(long = "id-column", default_value = "PATIENT")]
    id_column: String,

    /// Also write the summary as CSV.
    #[arg(long, value_name = "FILE")]
    out: Option<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormatArg {
    Pretty,
    Compact,
}

fn main() {
    let cli = Cli::parse();
    let log_config = LogConfig {
        level_filter: cli.verbosity.tracing_level_filter(),
        use_env_filter: !cli.verbosity.is_present(),
        format: match cli.log_format {
            LogFormatArg::Pretty => LogFormat::Pretty,
            LogFormatArg::Compact => LogFormat::Compact,
        },
        with_ansi: io::stderr().is_terminal(),
    };
    if let Err(error) = init_logging(&log_config) {
        eprintln!("error: failed to initialize logging: {error}");
        std::process::exit(1);
    }

    let outcome = match cli.command {
        Command::Analyze(args) => analyze(&args),
        Command::Describe(args) => describe_cohort(&args),
        Command::DefaultConfig => print_default_config(),
    };
    if let Err(error) = outcome {
        eprintln!("error: {error:#}");
        std::process::exit(1);
    }
}

fn analyze(args: &AnalyzeArgs) -> Result<()> {
    let config = match &args.config {
        Some(path) => AnalysisConfig::from_path(path)
            .with_context(|| format!("reading config {}", path.display()))?,
        None => AnalysisConfig::default(),
    };

    let cohort = CohortTable::from_path(&args.cohort, &args.id_column)
        .with_context(|| format!("loading cohort {}", args.cohort.display()))?;
    let report = run_analysis(&cohort, &config).context("survival analysis failed")?;

    println!("{}", summary_text(&report));

    if let Some(dir) = &args.out_dir {
        fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;

        let forest_path = dir.join("cox_summary.csv");
        write_forest_csv(&report.model, File::create(&forest_path)?)
            .with_context(|| format!("writing {}", forest_path.display()))?;

        let curves_path = dir.join("km_curves.csv");
        write_curves_csv(&report.comparison.curves, File::create(&curves_path)?)
            .with_context(|| format!("writing {}", curves_path.display()))?;

        let summary_path = dir.join("fraction_summary.csv");
        write_summary_csv(&report.score_summaries, File::create(&summary_path)?)
            .with_context(|| format!("writing {}", summary_path.display()))?;

        info!(dir = %dir.display(), "tables written");
    }
    Ok(())
}

fn describe_cohort(args: &DescribeArgs) -> Result<()> {
    let cohort = CohortTable::from_path(&args.cohort, &args.id_column)
        .with_context(|| format!("loading cohort {}", args.cohort.display()))?;
    let summaries = describe(&cohort, &args.columns).context("summarising columns")?;

    print!("{}", summary_table(&summaries));
    if let Some(path) = &args.out {
        write_summary_csv(&summaries, File::create(path)?)
            .with_context(|| format!("writing {}", path.display()))?;
    }
    Ok(())
}

fn print_default_config() -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&AnalysisConfig::default())?);
    Ok(())
}

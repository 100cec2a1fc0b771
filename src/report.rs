//! Numeric hand-off to whatever draws the forest plot and the survival curves.

use std::fmt::Write as _;
use std::io::Write;

use serde::Serialize;
use crate::{
    analysis::{AnalysisReport, StratifiedCurves},
    cohort::ColumnSummary,
    error::Result,
    model::FittedModel,
};

/// one forest-plot row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForestRow {
    pub covariate: String,
    pub coefficient: f64,
    pub standard_error: f64,
    pub hazard_ratio: f64,
    pub ci_lower: f64,
    pub ci_upper: f64,
    pub p_value: f64,
}

/// one curve point tagged with its stratum
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CurveRow<'a> {
    pub stratum: &'a str,
    pub time: f64,
    pub survival: f64,
    pub ci_lower: f64,
    pub ci_upper: f64,
    pub at_risk: usize,
    pub events: usize,
    pub censored: usize,
}

pub fn forest_rows(model: &FittedModel) -> Vec<ForestRow> {
    model
        .coefficients
        .iter()
        .map(|c| ForestRow {
            covariate: c.name.clone(),
            coefficient: c.coefficient,
            standard_error: c.standard_error,
            hazard_ratio: c.hazard_ratio,
            ci_lower: c.ci_lower,
            ci_upper: c.ci_upper,
            p_value: c.p_value,
        })
        .collect()
}

pub fn write_forest_csv<W: Write>(model: &FittedModel, writer: W) -> Result<()> {
    let mut out = csv::Writer::from_writer(writer);
    for row in forest_rows(model) {
        out.serialize(row)?;
    }
    out.flush()?;
    Ok(())
}

/// both strata in one table, high first
pub fn write_curves_csv<W: Write>(curves: &StratifiedCurves, writer: W) -> Result<()> {
    let mut out = csv::Writer::from_writer(writer);
    for curve in [&curves.high, &curves.low] {
        for p in &curve.points {
            out.serialize(CurveRow {
                stratum: &curve.label,
                time: p.time,
                survival: p.survival,
                ci_lower: p.ci_lower,
                ci_upper: p.ci_upper,
                at_risk: p.at_risk,
                events: p.events,
                censored: p.censored,
            })?;
        }
    }
    out.flush()?;
    Ok(())
}

/// one row per summarised column
pub fn write_summary_csv<W: Write>(summaries: &[ColumnSummary], writer: W) -> Result<()> {
    let mut out = csv::Writer::from_writer(writer);
    for summary in summaries {
        out.serialize(summary)?;
    }
    out.flush()?;
    Ok(())
}

/// fixed-width table of column summaries
pub fn summary_table(summaries: &[ColumnSummary]) -> String {
    let mut text = String::new();
    let _ = writeln!(
        text,
        "{:<16} {:>6} {:>8} {:>8} {:>8} {:>8} {:>8} {:>8} {:>8}",
        "column", "count", "mean", "std", "min", "25%", "50%", "75%", "max"
    );
    for s in summaries {
        let _ = writeln!(
            text,
            "{:<16} {:>6} {:>8.4} {:>8.4} {:>8.4} {:>8.4} {:>8.4} {:>8.4} {:>8.4}",
            s.column, s.count, s.mean, s.std, s.min, s.q25, s.median, s.q75, s.max
        );
    }
    text
}

/// plain-text summary of a run
pub fn summary_text(report: &AnalysisReport) -> String {
    let mut text = String::new();
    let table = &report.table;

    let _ = writeln!(
        text,
        "patients analysed: {} ({} excluded for missing values)",
        table.patient_ids().len(),
        table.exclusions().len()
    );
    for (score, median) in table.medians() {
        let _ = writeln!(text, "median {score}: {median:.4}");
    }
    let _ = writeln!(text);
    if !report.score_summaries.is_empty() {
        let _ = writeln!(text, "tissue fractions");
        let _ = writeln!(text, "{}", summary_table(&report.score_summaries));
    }
    let _ = writeln!(text, "{}", report.model);
    let _ = writeln!(text);

    let curves = &report.comparison.curves;
    let lr = &report.comparison.log_rank;
    let name = curves.covariate.strip_suffix("_binary").unwrap_or(&curves.covariate);
    let _ = writeln!(text, "survival by {name} (most significant covariate)");
    for curve in [&curves.high, &curves.low] {
        let median = curve
            .median_survival()
            .map_or_else(|| "not reached".to_string(), |m| format!("{m:.1}"));
        let _ = writeln!(
            text,
            "  {:<5} n = {:>4}, events = {:>4}, median survival = {median}",
            curve.label,
            curve.n_observations(),
            curve.n_events()
        );
    }
    let _ = write!(
        text,
        "log-rank chi-square = {:.3}, p = {:.3e}",
        lr.statistic, lr.p_value
    );
    text
}

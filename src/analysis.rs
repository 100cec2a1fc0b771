//! The full run: prepare the cohort, fit Cox, pick the most significant covariate and
//! compare its high and low strata with Kaplan–Meier curves and a log-rank test.

use tracing::{info, info_span};
use crate::{
    cohort::{describe, CohortTable, ColumnSummary},
    config::AnalysisConfig,
    error::{Result, SurvivalError},
    kaplan_meier::{KaplanMeier, SurvivalCurve},
    logrank::{log_rank_test, Group, LogRankResult},
    model::{CoefficientSummary, FittedModel},
    prepare::{prepare, AnalysisTable},
};

pub const HIGH_LABEL: &str = "high";
pub const LOW_LABEL: &str = "low";

/// the two curves of one binary covariate, plotted together
#[derive(Debug, Clone, PartialEq)]
pub struct StratifiedCurves {
    pub covariate: String,
    pub high: SurvivalCurve, // covariate == 1
    pub low: SurvivalCurve,  // covariate == 0
}

#[derive(Debug, Clone)]
pub struct StratumComparison {
    pub curves: StratifiedCurves,
    pub log_rank: LogRankResult,
}

#[derive(Debug, Clone)]
pub struct AnalysisReport {
    pub score_summaries: Vec<ColumnSummary>, // raw scores over the whole cohort
    pub table: AnalysisTable,
    pub model: FittedModel,
    pub selected: CoefficientSummary,
    pub comparison: StratumComparison,
}

/// split the table on a 0/1 covariate and compare the halves
pub fn compare_strata(table: &AnalysisTable, covariate: &str, km: &KaplanMeier) -> Result<StratumComparison> {
    let context = format!("covariate {covariate}");
    let data = table.data();

    let high = data.subset(&table.rows_where(covariate, 1.0)?)?;
    let low = data.subset(&table.rows_where(covariate, 0.0)?)?;
    info!(
        covariate,
        high = high.n_samples(),
        low = low.n_samples(),
        "stratifying"
    );

    let curves = StratifiedCurves {
        covariate: covariate.to_string(),
        high: km
            .fit_data(HIGH_LABEL, &high)
            .map_err(|e| e.with_context(&context))?,
        low: km
            .fit_data(LOW_LABEL, &low)
            .map_err(|e| e.with_context(&context))?,
    };

    let log_rank = log_rank_test(
        Group::new(HIGH_LABEL, high.times(), high.events()),
        Group::new(LOW_LABEL, low.times(), low.events()),
    )
    .map_err(|e| e.with_context(&context))?;

    Ok(StratumComparison { curves, log_rank })
}

pub fn run_analysis(cohort: &CohortTable, config: &AnalysisConfig) -> Result<AnalysisReport> {
    let _span = info_span!("analysis", patients = cohort.n_rows()).entered();

    let table = prepare(cohort, &config.prepare)?;
    let score_summaries = describe(cohort, &config.prepare.score_columns)?;
    let model = config.cox_model().fit(table.data())?;

    let selected = model
        .most_significant()
        .cloned()
        .ok_or_else(|| SurvivalError::insufficient_data("model has no covariates"))?;
    info!(
        covariate = %selected.name,
        p_value = selected.p_value,
        hazard_ratio = selected.hazard_ratio,
        "most significant covariate"
    );

    let comparison = compare_strata(&table, &selected.name, &config.kaplan_meier())?;
    info!(
        chi_square = comparison.log_rank.statistic,
        p_value = comparison.log_rank.p_value,
        "log-rank test"
    );

    Ok(AnalysisReport {
        score_summaries,
        table,
        model,
        selected,
        comparison,
    })
}

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use crate::{
    cohort::CohortTable,
    data::SurvivalData,
    error::{Result, SurvivalError},
};

/// days per month, the unit conversion of the TCGA clinical tables
pub const DAYS_PER_MONTH: f64 = 30.44;

/// which cohort columns play which role
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrepareConfig {
    pub duration_column: String,
    pub event_column: String,
    pub score_columns: Vec<String>,       // continuous, binarized at the cohort median
    pub categorical_columns: Vec<String>, // passed through unchanged
    pub duration_divisor: f64,            // raw duration / divisor = analysis time unit
    pub drop_incomplete: bool,            // false turns the first incomplete row into an error
}

impl Default for PrepareConfig {
    fn default() -> Self {
        Self {
            duration_column: "DSS.time".into(),
            event_column: "DSS".into(),
            score_columns: vec!["str_fraction".into(), "mus_fraction".into(), "tum_fraction".into()],
            categorical_columns: vec!["MSI".into()],
            duration_divisor: DAYS_PER_MONTH,
            drop_incomplete: true,
        }
    }
}

impl PrepareConfig {
    pub fn with_duration_divisor(mut self, divisor: f64) -> Self {
        self.duration_divisor = divisor;
        self
    }

    pub fn with_score_columns(mut self, columns: Vec<String>) -> Self {
        self.score_columns = columns;
        self
    }

    pub fn with_categorical_columns(mut self, columns: Vec<String>) -> Self {
        self.categorical_columns = columns;
        self
    }
}

/// name of the derived column for a score
pub fn binary_name(score: &str) -> String {
    format!("{score}_binary")
}

/// median over the present values; None when nothing is present
pub fn median(values: &[Option<f64>]) -> Option<f64> {
    let mut present: Vec<f64> = values.iter().flatten().copied().collect();
    if present.is_empty() {
        return None;
    }
    present.sort_by(f64::total_cmp);
    let mid = present.len() / 2;
    Some(if present.len() % 2 == 0 {
        (present[mid - 1] + present[mid]) / 2.0
    } else {
        present[mid]
    })
}

/// 1 above the median (strictly), 0 otherwise, missing stays missing
pub fn binarize(values: &[Option<f64>], threshold: f64) -> Vec<Option<f64>> {
    values
        .iter()
        .map(|v| v.map(|x| if x > threshold { 1.0 } else { 0.0 }))
        .collect()
}

/// a row left out of the analysis and why
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exclusion {
    pub patient: String,
    pub missing: Vec<String>,
}

/// complete rows ready for regression; built once per cohort, never mutated
#[derive(Debug, Clone)]
pub struct AnalysisTable {
    data: SurvivalData,
    patient_ids: Vec<String>,
    medians: Vec<(String, f64)>,
    exclusions: Vec<Exclusion>,
}

impl AnalysisTable {
    pub fn data(&self) -> &SurvivalData {
        &self.data
    }

    pub fn patient_ids(&self) -> &[String] {
        &self.patient_ids
    }

    /// cohort median used for each score column
    pub fn medians(&self) -> &[(String, f64)] {
        &self.medians
    }

    pub fn exclusions(&self) -> &[Exclusion] {
        &self.exclusions
    }

    pub fn covariate_names(&self) -> &[String] {
        self.data.feature_names()
    }

    /// row indices whose `covariate` equals `value`
    pub fn rows_where(&self, covariate: &str, value: f64) -> Result<Vec<usize>> {
        let column = self
            .data
            .column(covariate)
            .ok_or_else(|| SurvivalError::invalid_parameter("covariate", covariate))?;
        Ok(column
            .iter()
            .enumerate()
            .filter(|&(_, &x)| x == value)
            .map(|(i, _)| i)
            .collect())
    }
}

/// build the analysis table from the current cohort.
///
/// Medians are taken over each score column's present values before incomplete rows
/// are dropped, so re-running on a different cohort re-derives every threshold.
pub fn prepare(cohort: &CohortTable, config: &PrepareConfig) -> Result<AnalysisTable> {
    if !(config.duration_divisor > 0.0) || !config.duration_divisor.is_finite() {
        return Err(SurvivalError::invalid_parameter(
            "duration_divisor",
            config.duration_divisor.to_string(),
        ));
    }

    let durations = cohort.column_values(&config.duration_column)?;
    let events = cohort.column_values(&config.event_column)?;

    let mut names = Vec::new();
    let mut covariates: Vec<Vec<Option<f64>>> = Vec::new();
    let mut medians = Vec::new();

    for score in &config.score_columns {
        let values = cohort.column_values(score)?;
        let threshold = median(&values).ok_or_else(|| {
            SurvivalError::insufficient_data(format!("score {score} has no values"))
        })?;
        info!(score = %score, median = threshold, "binarizing at cohort median");
        medians.push((score.clone(), threshold));
        names.push(binary_name(score));
        covariates.push(binarize(&values, threshold));
    }
    for column in &config.categorical_columns {
        names.push(column.clone());
        covariates.push(cohort.column_values(column)?);
    }

    let mut times = Vec::new();
    let mut flags = Vec::new();
    let mut kept_ids = Vec::new();
    let mut kept_values: Vec<f64> = Vec::new();
    let mut exclusions = Vec::new();

    for (i, row) in cohort.rows().iter().enumerate() {
        let row_values: Option<Vec<f64>> = covariates.iter().map(|c| c[i]).collect();
        let (Some(duration), Some(event), Some(row_values)) = (durations[i], events[i], row_values) else {
            let missing = missing_columns(config, &names, &covariates, durations[i], events[i], i);
            if !config.drop_incomplete {
                return Err(SurvivalError::missing_data(&row.id, missing.join(", ")));
            }
            exclusions.push(Exclusion {
                patient: row.id.clone(),
                missing,
            });
            continue;
        };

        if duration < 0.0 {
            return Err(SurvivalError::invalid_survival_data(format!(
                "patient {}: negative duration {duration}",
                row.id
            )));
        }
        let event = match event {
            e if e == 0.0 => false,
            e if e == 1.0 => true,
            other => {
                return Err(SurvivalError::invalid_survival_data(format!(
                    "patient {}: event indicator {other} is not 0/1",
                    row.id
                )))
            }
        };

        times.push(duration / config.duration_divisor);
        flags.push(event);
        kept_ids.push(row.id.clone());
        kept_values.extend(row_values);
    }

    if !exclusions.is_empty() {
        warn!(
            excluded = exclusions.len(),
            kept = kept_ids.len(),
            "dropped rows with missing values"
        );
    }

    let n = kept_ids.len();
    let matrix = Array2::from_shape_vec((n, names.len()), kept_values)
        .map_err(|e| SurvivalError::invalid_dimensions(e.to_string()))?;
    let data = SurvivalData::with_feature_names(times, flags, matrix, names)?;

    if data.n_events() == 0 {
        return Err(SurvivalError::insufficient_data("no observed events in the analysis table"));
    }
    let distinct = data.event_times().len();
    if distinct < 2 {
        return Err(SurvivalError::insufficient_data(format!(
            "{distinct} distinct event time(s), need at least 2"
        )));
    }

    info!(
        patients = n,
        events = data.n_events(),
        covariates = data.n_features(),
        "analysis table ready"
    );
    Ok(AnalysisTable {
        data,
        patient_ids: kept_ids,
        medians,
        exclusions,
    })
}

/// names of the columns row `i` lacks
fn missing_columns(
    config: &PrepareConfig,
    names: &[String],
    covariates: &[Vec<Option<f64>>],
    duration: Option<f64>,
    event: Option<f64>,
    i: usize,
) -> Vec<String> {
    let mut missing = Vec::new();
    if duration.is_none() {
        missing.push(config.duration_column.clone());
    }
    if event.is_none() {
        missing.push(config.event_column.clone());
    }
    missing.extend(
        names
            .iter()
            .zip(covariates)
            .filter(|(_, column)| column[i].is_none())
            .map(|(name, _)| name.clone()),
    );
    missing
}

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use crate::error::{Result, SurvivalError};

/// subjects sharing one observed time
#[derive(Debug, Clone, PartialEq)]
pub struct TimeGroup {
    pub time: f64,
    pub members: Vec<usize>, // everyone observed (event or censored) at `time`
    pub events: Vec<usize>,  // the subset of members whose event was observed
}

/// survival data - times, events, and named covariates
#[derive(Debug, Clone)]
pub struct SurvivalData {
    times: Array1<f64>,         // time to event/censoring
    events: Array1<bool>,       // true = event, false = censored
    covariates: Array2<f64>,    // n_samples x n_features
    feature_names: Vec<String>, // one label per covariate column
    time_groups: Vec<TimeGroup>, // precomputed, ascending by time
}

impl SurvivalData {
    /// make new survival data from raw vecs/arrays, covariates get names x0, x1, ...
    pub fn new(times: Vec<f64>, events: Vec<bool>, covariates: Array2<f64>) -> Result<Self> {
        let names = (0..covariates.ncols()).map(|j| format!("x{j}")).collect();
        Self::with_feature_names(times, events, covariates, names)
    }

    pub fn with_feature_names(
        times: Vec<f64>,
        events: Vec<bool>,
        covariates: Array2<f64>,
        feature_names: Vec<String>,
    ) -> Result<Self> {
        let n_samples = times.len();

        if events.len() != n_samples {
            return Err(SurvivalError::invalid_dimensions(format!(
                "times len ({}) != events len ({})",
                n_samples,
                events.len()
            )));
        }

        if covariates.nrows() != n_samples {
            return Err(SurvivalError::invalid_dimensions(format!(
                "covariates rows ({}) != n_samples ({})",
                covariates.nrows(),
                n_samples
            )));
        }

        if feature_names.len() != covariates.ncols() {
            return Err(SurvivalError::invalid_dimensions(format!(
                "{} feature names for {} covariate columns",
                feature_names.len(),
                covariates.ncols()
            )));
        }

        if times.iter().any(|&t| t < 0.0 || !t.is_finite()) {
            return Err(SurvivalError::invalid_survival_data(
                "survival times must be non-negative & finite",
            ));
        }

        if covariates.iter().any(|x| !x.is_finite()) {
            return Err(SurvivalError::invalid_survival_data(
                "covariates must be finite",
            ));
        }

        let times = Array1::from(times);
        let events = Array1::from(events);
        let time_groups = group_by_time(times.view(), events.view());

        Ok(Self {
            times,
            events,
            covariates,
            feature_names,
            time_groups,
        })
    }

    /// how many patients
    pub fn n_samples(&self) -> usize {
        self.times.len()
    }

    /// how many covariates per patient
    pub fn n_features(&self) -> usize {
        self.covariates.ncols()
    }

    /// how many observed events
    pub fn n_events(&self) -> usize {
        self.events.iter().filter(|&&e| e).count()
    }

    pub fn times(&self) -> ArrayView1<'_, f64> {
        self.times.view()
    }

    pub fn events(&self) -> ArrayView1<'_, bool> {
        self.events.view()
    }

    pub fn covariates(&self) -> ArrayView2<'_, f64> {
        self.covariates.view()
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// column index of a named covariate
    pub fn feature_index(&self, name: &str) -> Option<usize> {
        self.feature_names.iter().position(|n| n == name)
    }

    /// one covariate column by name
    pub fn column(&self, name: &str) -> Option<ArrayView1<'_, f64>> {
        self.feature_index(name)
            .map(|j| self.covariates.column(j))
    }

    /// distinct observed times with their members, ascending
    pub fn time_groups(&self) -> &[TimeGroup] {
        &self.time_groups
    }

    /// unique event times in order
    pub fn event_times(&self) -> Vec<f64> {
        self.time_groups
            .iter()
            .filter(|g| !g.events.is_empty())
            .map(|g| g.time)
            .collect()
    }

    /// grab a subset of patients by indices
    pub fn subset(&self, indices: &[usize]) -> Result<Self> {
        if indices.iter().any(|&i| i >= self.n_samples()) {
            return Err(SurvivalError::invalid_dimensions("subset index out of bounds"));
        }

        let times: Vec<f64> = indices.iter().map(|&i| self.times[i]).collect();
        let events: Vec<bool> = indices.iter().map(|&i| self.events[i]).collect();
        let covariates = self.covariates.select(Axis(0), indices);

        Self::with_feature_names(times, events, covariates, self.feature_names.clone())
    }

    /// column means, used to centre covariates before fitting
    pub fn covariate_means(&self) -> Array1<f64> {
        self.covariates
            .mean_axis(Axis(0))
            .unwrap_or_else(|| Array1::zeros(self.n_features()))
    }
}

fn group_by_time(times: ArrayView1<f64>, events: ArrayView1<bool>) -> Vec<TimeGroup> {
    let mut order: Vec<usize> = (0..times.len()).collect();
    order.sort_by(|&a, &b| times[a].total_cmp(&times[b]));

    let mut groups: Vec<TimeGroup> = Vec::new();
    for i in order {
        let t = times[i];
        match groups.last_mut() {
            Some(group) if group.time == t => group.members.push(i),
            _ => groups.push(TimeGroup {
                time: t,
                members: vec![i],
                events: Vec::new(),
            }),
        }
        if events[i] {
            if let Some(group) = groups.last_mut() {
                group.events.push(i);
            }
        }
    }
    groups
}

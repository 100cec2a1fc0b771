use ndarray::ArrayView1;
use statrs::distribution::{ChiSquared, ContinuousCDF};
use crate::error::{Result, SurvivalError};

/// two-sample log-rank test result
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LogRankResult {
    pub statistic: f64, // chi-square, 1 df
    pub p_value: f64,
    pub degrees_of_freedom: usize,
    pub observed: [f64; 2],
    pub expected: [f64; 2],
    pub variance: f64,
}

/// one group's durations and event flags
#[derive(Debug, Clone, Copy)]
pub struct Group<'a> {
    pub label: &'a str,
    pub times: ArrayView1<'a, f64>,
    pub events: ArrayView1<'a, bool>,
}

impl<'a> Group<'a> {
    pub fn new(label: &'a str, times: ArrayView1<'a, f64>, events: ArrayView1<'a, bool>) -> Self {
        Self { label, times, events }
    }

    fn validate(&self) -> Result<()> {
        if self.times.len() != self.events.len() {
            return Err(SurvivalError::invalid_dimensions(format!(
                "group {}: times len ({}) != events len ({})",
                self.label,
                self.times.len(),
                self.events.len()
            )));
        }
        if self.times.is_empty() {
            return Err(SurvivalError::insufficient_data(format!(
                "group {} is empty",
                self.label
            )));
        }
        if !self.events.iter().any(|&e| e) {
            return Err(SurvivalError::insufficient_data(format!(
                "group {} has no events",
                self.label
            )));
        }
        if self.times.iter().any(|&t| t < 0.0 || !t.is_finite()) {
            return Err(SurvivalError::invalid_survival_data(format!(
                "group {}: survival times must be non-negative & finite",
                self.label
            )));
        }
        Ok(())
    }
}

/// log-rank test of equal hazards between two groups.
///
/// At every pooled event time the events in the first group are compared with their
/// hypergeometric expectation; the squared summed difference over the summed variance
/// is referred to chi-square with one degree of freedom.
pub fn log_rank_test(first: Group<'_>, second: Group<'_>) -> Result<LogRankResult> {
    first.validate()?;
    second.validate()?;

    // (time, group, event), sorted by time
    let mut pooled: Vec<(f64, usize, bool)> = Vec::with_capacity(first.times.len() + second.times.len());
    pool(&mut pooled, 0, first.times, first.events);
    pool(&mut pooled, 1, second.times, second.events);
    pooled.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut at_risk = [first.times.len() as f64, second.times.len() as f64];
    let mut observed = [0.0; 2];
    let mut expected = [0.0; 2];
    let mut variance = 0.0;

    let mut i = 0;
    while i < pooled.len() {
        let time = pooled[i].0;
        let mut deaths = [0.0; 2];
        let mut leaving = [0.0; 2];
        while i < pooled.len() && pooled[i].0 == time {
            let (_, g, event) = pooled[i];
            if event {
                deaths[g] += 1.0;
            }
            leaving[g] += 1.0;
            i += 1;
        }

        let d = deaths[0] + deaths[1];
        let n = at_risk[0] + at_risk[1];
        if d > 0.0 {
            let share = at_risk[0] / n;
            observed[0] += deaths[0];
            observed[1] += deaths[1];
            expected[0] += d * share;
            expected[1] += d * (1.0 - share);
            if n > 1.0 {
                variance += d * share * (1.0 - share) * (n - d) / (n - 1.0);
            }
        }

        at_risk[0] -= leaving[0];
        at_risk[1] -= leaving[1];
    }

    if !(variance > 0.0) {
        return Err(SurvivalError::insufficient_data(format!(
            "log-rank variance is zero between {} and {}",
            first.label, second.label
        )));
    }

    let diff = observed[0] - expected[0];
    let statistic = diff * diff / variance;
    let chi2 = ChiSquared::new(1.0).map_err(|e| SurvivalError::numerical_error(e.to_string()))?;

    Ok(LogRankResult {
        statistic,
        p_value: chi2.sf(statistic).clamp(0.0, 1.0),
        degrees_of_freedom: 1,
        observed,
        expected,
        variance,
    })
}

fn pool(pooled: &mut Vec<(f64, usize, bool)>, group: usize, times: ArrayView1<f64>, events: ArrayView1<bool>) {
    pooled.extend(times.iter().zip(events.iter()).map(|(&t, &e)| (t, group, e)));
}

//! Kaplan–Meier product-limit estimator with Greenwood confidence bounds.

use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};
use crate::{
    data::SurvivalData,
    error::{Result, SurvivalError},
};

/// how the Greenwood variance is turned into a confidence band
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceTransform {
    /// exp(-exp(log(-log S) ± z·σ)), always inside (0, 1)
    #[default]
    LogLog,
    /// S ± z·S·σ, clipped to [0, 1]
    Linear,
}

/// one step of the curve
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CurvePoint {
    pub time: f64,
    pub survival: f64,
    pub ci_lower: f64,
    pub ci_upper: f64,
    pub at_risk: usize,  // at risk just before `time`
    pub events: usize,
    pub censored: usize,
}

/// survival curve of one stratum
#[derive(Debug, Clone, PartialEq)]
pub struct SurvivalCurve {
    pub label: String,
    /// origin point (0, 1) followed by one point per distinct observed time
    pub points: Vec<CurvePoint>,
}

impl SurvivalCurve {
    /// step-function value: survival of the last point at or before `t`
    pub fn survival_at(&self, t: f64) -> f64 {
        self.points
            .iter()
            .take_while(|p| p.time <= t)
            .last()
            .map_or(1.0, |p| p.survival)
    }

    /// first time the curve reaches 0.5 or below, None if it never does
    pub fn median_survival(&self) -> Option<f64> {
        self.points.iter().find(|p| p.survival <= 0.5).map(|p| p.time)
    }

    pub fn n_observations(&self) -> usize {
        self.points.iter().map(|p| p.events + p.censored).sum()
    }

    pub fn n_events(&self) -> usize {
        self.points.iter().map(|p| p.events).sum()
    }
}

/// Kaplan–Meier estimator; holds only settings, so one instance can fit any number of strata
#[derive(Debug, Clone)]
pub struct KaplanMeier {
    alpha: f64,
    transform: ConfidenceTransform,
}

impl Default for KaplanMeier {
    fn default() -> Self {
        Self {
            alpha: 0.05,
            transform: ConfidenceTransform::LogLog,
        }
    }
}

impl KaplanMeier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn with_transform(mut self, transform: ConfidenceTransform) -> Self {
        self.transform = transform;
        self
    }

    pub fn fit_data(&self, label: impl Into<String>, data: &SurvivalData) -> Result<SurvivalCurve> {
        self.fit(label, data.times(), data.events())
    }

    pub fn fit(
        &self,
        label: impl Into<String>,
        times: ArrayView1<f64>,
        events: ArrayView1<bool>,
    ) -> Result<SurvivalCurve> {
        let label = label.into();
        if times.len() != events.len() {
            return Err(SurvivalError::invalid_dimensions(format!(
                "times len ({}) != events len ({})",
                times.len(),
                events.len()
            )));
        }
        if times.is_empty() {
            return Err(SurvivalError::insufficient_data(format!(
                "stratum {label} has no observations"
            )));
        }
        if times.iter().any(|&t| t < 0.0 || !t.is_finite()) {
            return Err(SurvivalError::invalid_survival_data(
                "survival times must be non-negative & finite",
            ));
        }
        if !(self.alpha > 0.0 && self.alpha < 1.0) {
            return Err(SurvivalError::invalid_parameter("alpha", self.alpha.to_string()));
        }

        let z = Normal::new(0.0, 1.0)
            .map_err(|e| SurvivalError::numerical_error(e.to_string()))?
            .inverse_cdf(1.0 - self.alpha / 2.0);

        let mut order: Vec<usize> = (0..times.len()).collect();
        order.sort_by(|&a, &b| times[a].total_cmp(&times[b]));

        let mut points = vec![CurvePoint {
            time: 0.0,
            survival: 1.0,
            ci_lower: 1.0,
            ci_upper: 1.0,
            at_risk: times.len(),
            events: 0,
            censored: 0,
        }];

        let mut at_risk = times.len();
        let mut survival = 1.0;
        let mut greenwood = 0.0; // running sum of d / (n (n - d))

        let mut i = 0;
        while i < order.len() {
            let time = times[order[i]];
            let mut deaths = 0;
            let mut censored = 0;
            while i < order.len() && times[order[i]] == time {
                if events[order[i]] {
                    deaths += 1;
                } else {
                    censored += 1;
                }
                i += 1;
            }

            if deaths > 0 {
                let (n, d) = (at_risk as f64, deaths as f64);
                survival *= 1.0 - d / n;
                if deaths < at_risk {
                    greenwood += d / (n * (n - d));
                }
            }

            let (ci_lower, ci_upper) = self.bounds(survival, greenwood, z);
            points.push(CurvePoint {
                time,
                survival,
                ci_lower,
                ci_upper,
                at_risk,
                events: deaths,
                censored,
            });

            at_risk -= deaths + censored;
        }

        Ok(SurvivalCurve { label, points })
    }

    fn bounds(&self, survival: f64, greenwood: f64, z: f64) -> (f64, f64) {
        if survival >= 1.0 {
            return (1.0, 1.0);
        }
        if survival <= 0.0 {
            return (0.0, 0.0);
        }

        let (lower, upper) = match self.transform {
            ConfidenceTransform::LogLog => {
                let log_s = survival.ln();
                let sigma = greenwood.sqrt() / log_s.abs();
                let center = (-log_s).ln();
                (
                    (-(center + z * sigma).exp()).exp(),
                    (-(center - z * sigma).exp()).exp(),
                )
            }
            ConfidenceTransform::Linear => {
                let se = survival * greenwood.sqrt();
                (survival - z * se, survival + z * se)
            }
        };
        (lower.clamp(0.0, 1.0), upper.clamp(0.0, 1.0))
    }
}

use std::fmt;

use ndarray::{Array1, Array2, ArrayView2};
use statrs::distribution::{ChiSquared, ContinuousCDF, Normal};
use tracing::info;
use crate::{
    data::SurvivalData,
    error::{Result, SurvivalError},
    metrics::harrell_c_index,
    optimization::{CoxOptimizer, OptimizationConfig},
};

/// cox proportional hazards model, efron ties, newton-raphson
#[derive(Debug, Clone)]
pub struct CoxModel {
    l2_penalty: f64,     // ridge penalty, 0 = plain partial likelihood
    max_iterations: usize,
    tolerance: f64,      // on the score norm
    alpha: f64,          // 1 - confidence level of the reported intervals
}

impl Default for CoxModel {
    fn default() -> Self {
        let defaults = OptimizationConfig::default();
        Self {
            l2_penalty: defaults.l2_penalty,
            max_iterations: defaults.max_iterations,
            tolerance: defaults.tolerance,
            alpha: 0.05,
        }
    }
}

impl CoxModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// ridge penalty on the coefficients
    pub fn with_l2_penalty(mut self, penalty: f64) -> Self {
        self.l2_penalty = penalty.max(0.0);
        self
    }

    /// max newton steps before giving up
    pub fn with_max_iterations(mut self, max_iter: usize) -> Self {
        self.max_iterations = max_iter;
        self
    }

    pub fn with_tolerance(mut self, tol: f64) -> Self {
        self.tolerance = tol;
        self
    }

    /// 0.05 gives 95% intervals
    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    /// fit the model - pure, the same data always gives the same FittedModel
    pub fn fit(&self, data: &SurvivalData) -> Result<FittedModel> {
        if !(self.alpha > 0.0 && self.alpha < 1.0) {
            return Err(SurvivalError::invalid_parameter("alpha", self.alpha.to_string()));
        }

        let optimizer = CoxOptimizer::new(OptimizationConfig {
            l2_penalty: self.l2_penalty,
            max_iterations: self.max_iterations,
            tolerance: self.tolerance,
            ..OptimizationConfig::default()
        });
        let fit = optimizer.optimize(data)?;

        let normal = Normal::new(0.0, 1.0)
            .map_err(|e| SurvivalError::numerical_error(e.to_string()))?;
        let z_crit = normal.inverse_cdf(1.0 - self.alpha / 2.0);

        let mut coefficients = Vec::with_capacity(data.n_features());
        for (j, name) in data.feature_names().iter().enumerate() {
            let coef = fit.coefficients[j];
            let variance = fit.covariance[[j, j]];
            if !(variance > 0.0) || !variance.is_finite() {
                return Err(SurvivalError::singular_information(format!(
                    "non-positive variance for {name}"
                )));
            }
            let se = variance.sqrt();
            let z = coef / se;
            coefficients.push(CoefficientSummary {
                name: name.clone(),
                coefficient: coef,
                standard_error: se,
                hazard_ratio: coef.exp(),
                ci_lower: (coef - z_crit * se).exp(),
                ci_upper: (coef + z_crit * se).exp(),
                z,
                p_value: 2.0 * normal.sf(z.abs()),
            });
        }

        let risk_scores = data.covariates().dot(&fit.coefficients);
        let concordance = harrell_c_index(risk_scores.view(), data.times(), data.events()).ok();

        let lr_statistic = (2.0 * (fit.log_likelihood - fit.null_log_likelihood)).max(0.0);
        let df = data.n_features();
        let chi2 = ChiSquared::new(df as f64)
            .map_err(|e| SurvivalError::numerical_error(e.to_string()))?;

        let model = FittedModel {
            coefficients,
            covariance: fit.covariance,
            log_likelihood: fit.log_likelihood,
            null_log_likelihood: fit.null_log_likelihood,
            likelihood_ratio: LikelihoodRatioTest {
                statistic: lr_statistic,
                degrees_of_freedom: df,
                p_value: chi2.sf(lr_statistic),
            },
            concordance,
            iterations: fit.iterations,
            n_observations: data.n_samples(),
            n_events: data.n_events(),
            alpha: self.alpha,
        };

        info!(
            covariates = df,
            observations = model.n_observations,
            events = model.n_events,
            iterations = model.iterations,
            log_likelihood = model.log_likelihood,
            "cox model fitted"
        );
        Ok(model)
    }
}

/// one row of the fitted model - what a forest plot draws
#[derive(Debug, Clone, PartialEq)]
pub struct CoefficientSummary {
    pub name: String,
    pub coefficient: f64,
    pub standard_error: f64,
    pub hazard_ratio: f64, // exp(coefficient)
    pub ci_lower: f64,     // exp(coef - z * se)
    pub ci_upper: f64,     // exp(coef + z * se)
    pub z: f64,
    pub p_value: f64,      // two-sided wald
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LikelihoodRatioTest {
    pub statistic: f64,
    pub degrees_of_freedom: usize,
    pub p_value: f64,
}

/// what the model learned; read-only once produced
#[derive(Debug, Clone)]
pub struct FittedModel {
    pub coefficients: Vec<CoefficientSummary>,
    pub covariance: Array2<f64>,
    pub log_likelihood: f64,
    pub null_log_likelihood: f64,
    pub likelihood_ratio: LikelihoodRatioTest,
    pub concordance: Option<f64>,
    pub iterations: usize,
    pub n_observations: usize,
    pub n_events: usize,
    pub alpha: f64,
}

impl FittedModel {
    pub fn coefficient(&self, name: &str) -> Option<&CoefficientSummary> {
        self.coefficients.iter().find(|c| c.name == name)
    }

    pub fn beta(&self) -> Array1<f64> {
        self.coefficients.iter().map(|c| c.coefficient).collect()
    }

    /// linear predictors x.beta for new patients
    pub fn predict(&self, covariates: ArrayView2<f64>) -> Result<Array1<f64>> {
        let beta = self.beta();
        if covariates.ncols() != beta.len() {
            return Err(SurvivalError::invalid_dimensions(format!(
                "feature count mismatch: expected {}, got {}",
                beta.len(),
                covariates.ncols()
            )));
        }
        Ok(covariates.dot(&beta))
    }

    /// partial hazards exp(x.beta)
    pub fn predict_hazard_ratios(&self, covariates: ArrayView2<f64>) -> Result<Array1<f64>> {
        Ok(self.predict(covariates)?.mapv(f64::exp))
    }

    /// partial AIC: -2 ll + 2 k
    pub fn aic_partial(&self) -> f64 {
        2.0 * self.coefficients.len() as f64 - 2.0 * self.log_likelihood
    }

    /// the covariate with the smallest p-value.
    ///
    /// Equal p-values go to the larger |hazard ratio - 1|; if that ties as well the
    /// earlier covariate wins.
    pub fn most_significant(&self) -> Option<&CoefficientSummary> {
        let mut best: Option<&CoefficientSummary> = None;
        for candidate in &self.coefficients {
            best = match best {
                None => Some(candidate),
                Some(current) => {
                    let better = candidate.p_value < current.p_value
                        || (candidate.p_value == current.p_value
                            && (candidate.hazard_ratio - 1.0).abs()
                                > (current.hazard_ratio - 1.0).abs());
                    Some(if better { candidate } else { current })
                }
            };
        }
        best
    }
}

impl fmt::Display for FittedModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = 100.0 * (1.0 - self.alpha);
        writeln!(f, "cox proportional hazards model (efron ties)")?;
        writeln!(
            f,
            "observations = {}, events = {}, iterations = {}",
            self.n_observations, self.n_events, self.iterations
        )?;
        writeln!(f, "log-likelihood = {:.4}", self.log_likelihood)?;
        writeln!(f)?;
        writeln!(
            f,
            "{:<24} {:>10} {:>10} {:>10} {:>10} {:>10} {:>10}",
            "covariate",
            "coef",
            "exp(coef)",
            "se(coef)",
            format!("lower {level:.0}%"),
            format!("upper {level:.0}%"),
            "p"
        )?;
        writeln!(f, "{:-<90}", "")?;
        for c in &self.coefficients {
            writeln!(
                f,
                "{:<24} {:>10.4} {:>10.4} {:>10.4} {:>10.4} {:>10.4} {:>10.3e}",
                c.name, c.coefficient, c.hazard_ratio, c.standard_error, c.ci_lower, c.ci_upper, c.p_value
            )?;
        }
        writeln!(f)?;
        if let Some(c) = self.concordance {
            writeln!(f, "concordance = {c:.3}")?;
        }
        writeln!(f, "partial AIC = {:.3}", self.aic_partial())?;
        write!(
            f,
            "likelihood ratio test = {:.3} on {} df, p = {:.3e}",
            self.likelihood_ratio.statistic,
            self.likelihood_ratio.degrees_of_freedom,
            self.likelihood_ratio.p_value
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::Array2;

    fn create_test_data() -> SurvivalData {
        let times = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0];
        let events = vec![true, false, true, true, false, true, true, false];
        let covariates = Array2::from_shape_vec((8, 2), vec![
            1.0, 0.5,
            0.0, -0.5,
            1.0, 0.0,
            0.0, 1.0,
            0.0, -1.0,
            1.0, 0.5,
            0.0, -0.5,
            0.0, 0.0,
        ]).unwrap();

        SurvivalData::with_feature_names(
            times,
            events,
            covariates,
            vec!["str_fraction_binary".into(), "MSI".into()],
        )
        .unwrap()
    }

    fn summary(name: &str, hazard_ratio: f64, p_value: f64) -> CoefficientSummary {
        CoefficientSummary {
            name: name.into(),
            coefficient: hazard_ratio.ln(),
            standard_error: 0.5,
            hazard_ratio,
            ci_lower: hazard_ratio * 0.5,
            ci_upper: hazard_ratio * 2.0,
            z: 0.0,
            p_value,
        }
    }

    fn model_with(coefficients: Vec<CoefficientSummary>) -> FittedModel {
        let k = coefficients.len();
        FittedModel {
            coefficients,
            covariance: Array2::eye(k),
            log_likelihood: -10.0,
            null_log_likelihood: -11.0,
            likelihood_ratio: LikelihoodRatioTest {
                statistic: 2.0,
                degrees_of_freedom: k,
                p_value: 0.3,
            },
            concordance: None,
            iterations: 3,
            n_observations: 10,
            n_events: 5,
            alpha: 0.05,
        }
    }

    #[test]
    fn test_model_creation() {
        let model = CoxModel::new()
            .with_l2_penalty(0.05)
            .with_max_iterations(500)
            .with_alpha(0.1);

        assert_eq!(model.l2_penalty, 0.05);
        assert_eq!(model.max_iterations, 500);
        assert_eq!(model.alpha, 0.1);
        assert_eq!(CoxModel::new().with_l2_penalty(-1.0).l2_penalty, 0.0);
    }

    #[test]
    fn test_fitted_summary_is_consistent() {
        let data = create_test_data();
        let model = CoxModel::new().fit(&data).unwrap();

        assert_eq!(model.coefficients.len(), 2);
        assert_eq!(model.n_events, 5);
        for c in &model.coefficients {
            assert_relative_eq!(c.hazard_ratio, c.coefficient.exp(), epsilon = 1e-12);
            assert!(c.hazard_ratio > 0.0);
            assert!(c.ci_lower <= c.hazard_ratio && c.hazard_ratio <= c.ci_upper);
            assert!((0.0..=1.0).contains(&c.p_value));
            assert_relative_eq!(
                c.ci_upper.ln() - c.coefficient,
                1.959_963_984_540_054 * c.standard_error,
                epsilon = 1e-9
            );
        }
        assert!(model.likelihood_ratio.statistic >= 0.0);
        assert!(model.coefficient("MSI").is_some());
    }

    #[test]
    fn test_refit_is_deterministic() {
        let data = create_test_data();
        let model = CoxModel::new();
        let first = model.fit(&data).unwrap();
        let second = model.fit(&data).unwrap();
        assert_eq!(first.coefficients, second.coefficients);
        assert_eq!(first.log_likelihood, second.log_likelihood);
    }

    #[test]
    fn test_bad_alpha_rejected() {
        let data = create_test_data();
        assert!(CoxModel::new().with_alpha(1.5).fit(&data).is_err());
    }

    #[test]
    fn test_prediction_dimension_mismatch() {
        let data = create_test_data();
        let model = CoxModel::new().fit(&data).unwrap();

        let wrong_covariates = Array2::zeros((5, 3));
        assert!(model.predict(wrong_covariates.view()).is_err());

        let ratios = model.predict_hazard_ratios(data.covariates()).unwrap();
        let scores = model.predict(data.covariates()).unwrap();
        for (r, s) in ratios.iter().zip(scores.iter()) {
            assert_relative_eq!(*r, s.exp(), epsilon = 1e-12);
        }
    }

    #[test]
    fn test_most_significant_picks_min_p() {
        let model = model_with(vec![
            summary("a", 1.5, 0.20),
            summary("b", 0.9, 0.01),
            summary("c", 3.0, 0.04),
        ]);
        assert_eq!(model.most_significant().unwrap().name, "b");
    }

    #[test]
    fn test_most_significant_tie_prefers_larger_effect() {
        // 0.4 is further from 1 than 1.5
        let model = model_with(vec![
            summary("a", 1.5, 0.03),
            summary("b", 0.4, 0.03),
            summary("c", 1.1, 0.50),
        ]);
        assert_eq!(model.most_significant().unwrap().name, "b");
    }

    #[test]
    fn test_most_significant_full_tie_keeps_first() {
        let model = model_with(vec![summary("a", 2.0, 0.03), summary("b", 2.0, 0.03)]);
        assert_eq!(model.most_significant().unwrap().name, "a");
        assert!(model_with(vec![]).most_significant().is_none());
    }

    #[test]
    fn test_display_lists_every_covariate() {
        let data = create_test_data();
        let text = CoxModel::new().fit(&data).unwrap().to_string();
        assert!(text.contains("str_fraction_binary"));
        assert!(text.contains("MSI"));
        assert!(text.contains("lower 95%"));
    }
}

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use tracing::debug;
use crate::{
    data::{SurvivalData, TimeGroup},
    error::{Result, SurvivalError},
};

/// pivots smaller than this (relative to the largest diagonal entry) count as zero
const PIVOT_EPSILON: f64 = 1e-10;

/// information that shrank by this factor since beta = 0 means the coefficient ran off to infinity
const SEPARATION_RATIO: f64 = 1e-6;

/// Configuration for Newton-Raphson on the Efron partial likelihood
#[derive(Debug, Clone)]
pub struct OptimizationConfig {
    pub l2_penalty: f64,
    pub max_iterations: usize,
    pub tolerance: f64,         // on the euclidean norm of the score vector
    pub max_step_halvings: usize,
}

impl Default for OptimizationConfig {
    fn default() -> Self {
        Self {
            l2_penalty: 0.0,
            max_iterations: 100,
            tolerance: 1e-9,
            max_step_halvings: 20,
        }
    }
}

/// log partial likelihood with its first and second derivatives
#[derive(Debug, Clone)]
pub struct PartialLikelihood {
    pub log_likelihood: f64,
    pub score: Array1<f64>,       // gradient
    pub information: Array2<f64>, // negative hessian
}

/// raw output of a converged fit
#[derive(Debug, Clone)]
pub struct CoxFit {
    pub coefficients: Array1<f64>,
    pub covariance: Array2<f64>, // inverse information at the optimum
    pub log_likelihood: f64,
    pub null_log_likelihood: f64,
    pub iterations: usize,
}

/// Cox proportional hazards optimizer, Efron ties
#[derive(Debug, Clone)]
pub struct CoxOptimizer {
    config: OptimizationConfig,
}

impl CoxOptimizer {
    pub fn new(config: OptimizationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &OptimizationConfig {
        &self.config
    }

    /// Efron log partial likelihood, score and information at `beta` on the raw covariates
    pub fn evaluate(&self, data: &SurvivalData, beta: ArrayView1<f64>) -> Result<PartialLikelihood> {
        if beta.len() != data.n_features() {
            return Err(SurvivalError::invalid_dimensions(format!(
                "beta has {} entries for {} covariates",
                beta.len(),
                data.n_features()
            )));
        }
        efron(data.covariates(), data.time_groups(), beta)
    }

    /// Newton-Raphson from beta = 0 until the score norm drops below tolerance
    pub fn optimize(&self, data: &SurvivalData) -> Result<CoxFit> {
        let n_features = data.n_features();
        if n_features == 0 {
            return Err(SurvivalError::invalid_parameter("covariates", "none"));
        }
        if data.n_events() == 0 {
            return Err(SurvivalError::insufficient_data("no observed events to fit"));
        }
        if self.config.max_iterations == 0 {
            return Err(SurvivalError::invalid_parameter("max_iterations", "0"));
        }

        // centring leaves beta and the likelihood unchanged but keeps exp() tame
        let centred = &data.covariates() - &data.covariate_means().insert_axis(Axis(0));
        let groups = data.time_groups();

        let mut beta = Array1::zeros(n_features);
        let mut current = self.penalize(efron(centred.view(), groups, beta.view())?, &beta);
        let null_log_likelihood = current.log_likelihood;
        let null_information_diag = current.information.diag().to_owned();

        for iteration in 0..self.config.max_iterations {
            let score_norm = current.score.dot(&current.score).sqrt();
            debug!(
                iteration,
                log_likelihood = current.log_likelihood,
                score_norm,
                "newton-raphson step"
            );

            if score_norm < self.config.tolerance {
                check_separation(&current.information, &null_information_diag, data.feature_names())?;
                let covariance = invert(&current.information)
                    .map_err(|e| e.with_context("at the optimum"))?;
                let log_likelihood =
                    current.log_likelihood + 0.5 * self.config.l2_penalty * beta.dot(&beta);
                return Ok(CoxFit {
                    coefficients: beta,
                    covariance,
                    log_likelihood,
                    null_log_likelihood,
                    iterations: iteration,
                });
            }

            let inverse = invert(&current.information)?;
            let step = inverse.dot(&current.score);

            // halve the step until the likelihood stops going down
            let mut scale = 1.0;
            let mut halvings = 0;
            loop {
                let candidate = &beta + &(scale * &step);
                let evaluated = self.penalize(efron(centred.view(), groups, candidate.view())?, &candidate);
                if evaluated.log_likelihood >= current.log_likelihood - 1e-12
                    || halvings >= self.config.max_step_halvings
                {
                    beta = candidate;
                    current = evaluated;
                    break;
                }
                scale *= 0.5;
                halvings += 1;
            }
        }

        Err(SurvivalError::Convergence {
            iterations: self.config.max_iterations,
            score_norm: current.score.dot(&current.score).sqrt(),
            context: format!(
                "covariates {} on {} patients",
                data.feature_names().join(", "),
                data.n_samples()
            ),
        })
    }

    /// ridge term: -lambda/2 |beta|^2
    fn penalize(&self, mut pl: PartialLikelihood, beta: &Array1<f64>) -> PartialLikelihood {
        let lambda = self.config.l2_penalty;
        if lambda > 0.0 {
            pl.log_likelihood -= 0.5 * lambda * beta.dot(beta);
            pl.score.scaled_add(-lambda, beta);
            for j in 0..beta.len() {
                pl.information[[j, j]] += lambda;
            }
        }
        pl
    }
}

/// sweep the time groups from latest to earliest so risk-set sums accumulate in one pass
fn efron(x: ArrayView2<f64>, groups: &[TimeGroup], beta: ArrayView1<f64>) -> Result<PartialLikelihood> {
    let p = x.ncols();
    let eta = x.dot(&beta);
    let shift = eta.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let shift = if shift.is_finite() { shift } else { 0.0 };

    let mut loglik = 0.0;
    let mut score = Array1::zeros(p);
    let mut information = Array2::zeros((p, p));

    // risk-set sums
    let mut s0 = 0.0;
    let mut s1 = Array1::<f64>::zeros(p);
    let mut s2 = Array2::<f64>::zeros((p, p));

    for group in groups.iter().rev() {
        for &i in &group.members {
            let r = (eta[i] - shift).exp();
            s0 += r;
            s1.scaled_add(r, &x.row(i));
            add_outer(&mut s2, r, x.row(i));
        }

        let d = group.events.len();
        if d == 0 {
            continue;
        }

        // tied-event sums
        let mut t0 = 0.0;
        let mut t1 = Array1::<f64>::zeros(p);
        let mut t2 = Array2::<f64>::zeros((p, p));
        for &i in &group.events {
            let r = (eta[i] - shift).exp();
            t0 += r;
            t1.scaled_add(r, &x.row(i));
            add_outer(&mut t2, r, x.row(i));
            loglik += eta[i];
            score += &x.row(i);
        }

        for l in 0..d {
            let a = l as f64 / d as f64;
            let phi0 = s0 - a * t0;
            if !(phi0 > 0.0) || !phi0.is_finite() {
                return Err(SurvivalError::numerical_error(format!(
                    "risk set weight {phi0} at time {}",
                    group.time
                )));
            }
            let phi1 = &s1 - &(a * &t1);
            let phi2 = &s2 - &(a * &t2);
            let mean = &phi1 / phi0;

            loglik -= phi0.ln() + shift;
            score -= &mean;
            information += &(&phi2 / phi0);
            add_outer(&mut information, -1.0, mean.view());
        }
    }

    Ok(PartialLikelihood {
        log_likelihood: loglik,
        score,
        information,
    })
}

fn add_outer(target: &mut Array2<f64>, weight: f64, v: ArrayView1<f64>) {
    let n = v.len();
    for j in 0..n {
        for k in 0..n {
            target[[j, k]] += weight * v[j] * v[k];
        }
    }
}

fn check_separation(information: &Array2<f64>, null_diag: &Array1<f64>, names: &[String]) -> Result<()> {
    for (j, &initial) in null_diag.iter().enumerate() {
        if initial > 0.0 && information[[j, j]] < SEPARATION_RATIO * initial {
            let name = names.get(j).map(String::as_str).unwrap_or("?");
            return Err(SurvivalError::singular_information(format!(
                "information for {name} collapsed, covariate separates the events"
            )));
        }
    }
    Ok(())
}

/// Gauss-Jordan inverse with partial pivoting
pub fn invert(a: &Array2<f64>) -> Result<Array2<f64>> {
    let n = a.nrows();
    if n != a.ncols() {
        return Err(SurvivalError::invalid_dimensions("matrix isn't square"));
    }

    let scale = (0..n).map(|i| a[[i, i]].abs()).fold(0.0, f64::max);
    if !(scale > 0.0) || !scale.is_finite() {
        return Err(SurvivalError::singular_information("zero information on the diagonal"));
    }

    let mut work = a.clone();
    let mut inverse = Array2::eye(n);

    for i in 0..n {
        // find pivot
        let mut max_row = i;
        for k in i + 1..n {
            if work[[k, i]].abs() > work[[max_row, i]].abs() {
                max_row = k;
            }
        }

        if work[[max_row, i]].abs() <= PIVOT_EPSILON * scale {
            return Err(SurvivalError::singular_information(format!(
                "pivot {i} vanished, covariates are collinear"
            )));
        }

        if max_row != i {
            for j in 0..n {
                work.swap([i, j], [max_row, j]);
                inverse.swap([i, j], [max_row, j]);
            }
        }

        let pivot = work[[i, i]];
        for j in 0..n {
            work[[i, j]] /= pivot;
            inverse[[i, j]] /= pivot;
        }

        for k in 0..n {
            if k == i {
                continue;
            }
            let factor = work[[k, i]];
            if factor == 0.0 {
                continue;
            }
            for j in 0..n {
                work[[k, j]] -= factor * work[[i, j]];
                inverse[[k, j]] -= factor * inverse[[i, j]];
            }
        }
    }

    Ok(inverse)
}

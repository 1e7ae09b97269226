//! Elastic-net penalized logistic regression (lasso when alpha = 1)
//!
//! Penalized IRLS: each outer step builds the quadratic approximation of the
//! binomial log-likelihood, the inner loop minimises it by cyclic coordinate
//! descent with soft-thresholding. Columns are standardized internally and
//! the intercept is never penalized. Coefficients are reported on the
//! original scale.
//!
//! Objective: `-loglik / n + lambda * ((1 - alpha) / 2 * ||b||² + alpha * ||b||₁)`

use faer::Mat;
use tracing::{debug, warn};

use super::{sigmoid, validate_training, FitError, Hyperparameters, FittedModel};

const MAX_OUTER: usize = 100;
const MAX_INNER: usize = 1000;
const INNER_TOLERANCE: f64 = 1e-7;
const OUTER_TOLERANCE: f64 = 1e-6;
const PROB_EPS: f64 = 1e-5;

/// Alpha floor used when deriving lambda_max for (near) ridge fits
const MIN_ALPHA_FOR_PATH: f64 = 1e-3;

#[derive(Debug, Clone)]
pub struct PenalizedLogistic {
    pub alpha: f64,
    pub lambda: f64,
    pub intercept: f64,
    pub coefficients: Vec<f64>,
    pub converged: bool,
}

impl PenalizedLogistic {
    pub fn fit(x: &Mat<f64>, y: &[u8], alpha: f64, lambda: f64) -> Result<Self, FitError> {
        validate_training(x, y)?;
        check_penalty(alpha, lambda)?;
        let data = Standardized::new(x);
        let mut state = State::null(y, data.p);
        Ok(data.solve(y, alpha, lambda, &mut state))
    }

    /// Fit a descending lambda path with warm starts. Results follow the
    /// order of `lambdas`.
    pub fn fit_path(x: &Mat<f64>, y: &[u8], alpha: f64, lambdas: &[f64]) -> Result<Vec<Self>, FitError> {
        validate_training(x, y)?;
        for &lambda in lambdas {
            check_penalty(alpha, lambda)?;
        }

        let data = Standardized::new(x);
        let mut order: Vec<usize> = (0..lambdas.len()).collect();
        order.sort_by(|&a, &b| lambdas[b].partial_cmp(&lambdas[a]).unwrap_or(std::cmp::Ordering::Equal));

        let mut state = State::null(y, data.p);
        let mut fitted: Vec<Option<Self>> = vec![None; lambdas.len()];
        for idx in order {
            fitted[idx] = Some(data.solve(y, alpha, lambdas[idx], &mut state));
        }

        Ok(fitted.into_iter().flatten().collect())
    }

    pub fn predict_proba(&self, x: &Mat<f64>) -> Vec<f64> {
        (0..x.nrows())
            .map(|i| {
                let eta = self.intercept
                    + self
                        .coefficients
                        .iter()
                        .enumerate()
                        .filter(|(_, b)| **b != 0.0)
                        .map(|(j, b)| b * x[(i, j)])
                        .sum::<f64>();
                sigmoid(eta)
            })
            .collect()
    }

    /// Number of non-zero coefficients
    pub fn nonzero(&self) -> usize {
        self.coefficients.iter().filter(|b| **b != 0.0).count()
    }
}

fn check_penalty(alpha: f64, lambda: f64) -> Result<(), FitError> {
    if !(0.0..=1.0).contains(&alpha) || lambda < 0.0 || !lambda.is_finite() {
        return Err(FitError::InvalidHyperparameters(format!(
            "alpha={} lambda={}",
            alpha, lambda
        )));
    }
    Ok(())
}

/// Largest useful lambda followed by `count` log-spaced values down to
/// `min_ratio * lambda_max`. At `lambda_max` every coefficient is zero.
pub fn lambda_path(x: &Mat<f64>, y: &[u8], alpha: f64, count: usize, min_ratio: f64) -> Vec<f64> {
    if count == 0 || y.is_empty() {
        return Vec::new();
    }

    let data = Standardized::new(x);
    let n = y.len() as f64;
    let ybar = y.iter().map(|&v| f64::from(v)).sum::<f64>() / n;

    let max_gradient = (0..data.p)
        .filter(|&j| data.sds[j] > 0.0)
        .map(|j| {
            let g: f64 = (0..data.n)
                .map(|i| data.xs[(i, j)] * (f64::from(y[i]) - ybar))
                .sum();
            g.abs() / n
        })
        .fold(0.0f64, f64::max);

    let lambda_max = max_gradient / alpha.max(MIN_ALPHA_FOR_PATH);
    if lambda_max <= 0.0 {
        return vec![0.0];
    }
    if count == 1 {
        return vec![lambda_max];
    }

    let log_max = lambda_max.ln();
    let log_min = (lambda_max * min_ratio).ln();
    (0..count)
        .map(|k| (log_max + (log_min - log_max) * k as f64 / (count - 1) as f64).exp())
        .collect()
}

/// Fit penalized candidates, grouping lambdas that share an alpha into one
/// warm-started path
pub(super) fn fit_candidates(
    x: &Mat<f64>,
    y: &[u8],
    candidates: &[Hyperparameters],
) -> Vec<Result<FittedModel, FitError>> {
    let mut results: Vec<Option<Result<FittedModel, FitError>>> = vec![None; candidates.len()];

    let mut alphas: Vec<f64> = candidates
        .iter()
        .filter_map(|hp| match hp {
            Hyperparameters::Penalized { alpha, .. } => Some(*alpha),
            _ => None,
        })
        .collect();
    alphas.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    alphas.dedup();

    for alpha in alphas {
        let members: Vec<(usize, f64)> = candidates
            .iter()
            .enumerate()
            .filter_map(|(idx, hp)| match hp {
                Hyperparameters::Penalized { alpha: a, lambda } if *a == alpha => Some((idx, *lambda)),
                _ => None,
            })
            .collect();
        let lambdas: Vec<f64> = members.iter().map(|(_, l)| *l).collect();

        match PenalizedLogistic::fit_path(x, y, alpha, &lambdas) {
            Ok(models) => {
                for ((idx, _), model) in members.iter().zip(models) {
                    results[*idx] = Some(Ok(FittedModel::Penalized(model)));
                }
            }
            Err(e) => {
                for (idx, _) in &members {
                    results[*idx] = Some(Err(e.clone()));
                }
            }
        }
    }

    results
        .into_iter()
        .zip(candidates)
        .map(|(r, hp)| r.unwrap_or_else(|| Err(FitError::InvalidHyperparameters(hp.to_string()))))
        .collect()
}

/// Standardized copy of the design matrix
struct Standardized {
    xs: Mat<f64>,
    means: Vec<f64>,
    sds: Vec<f64>,
    n: usize,
    p: usize,
}

impl Standardized {
    fn new(x: &Mat<f64>) -> Self {
        let n = x.nrows();
        let p = x.ncols();
        let nf = n.max(1) as f64;

        let means: Vec<f64> = (0..p)
            .map(|j| (0..n).map(|i| x[(i, j)]).sum::<f64>() / nf)
            .collect();
        let sds: Vec<f64> = (0..p)
            .map(|j| {
                let var = (0..n).map(|i| (x[(i, j)] - means[j]).powi(2)).sum::<f64>() / nf;
                let sd = var.sqrt();
                if sd > 1e-12 {
                    sd
                } else {
                    0.0
                }
            })
            .collect();

        let xs = Mat::from_fn(n, p, |i, j| {
            if sds[j] > 0.0 {
                (x[(i, j)] - means[j]) / sds[j]
            } else {
                0.0
            }
        });

        Self { xs, means, sds, n, p }
    }

    /// Penalized IRLS from `state`, leaving the solution in `state` for the
    /// next (smaller) lambda
    fn solve(&self, y: &[u8], alpha: f64, lambda: f64, state: &mut State) -> PenalizedLogistic {
        let nf = self.n as f64;
        let l1 = lambda * alpha;
        let l2 = lambda * (1.0 - alpha);
        let active: Vec<usize> = (0..self.p).filter(|&j| self.sds[j] > 0.0).collect();

        let mut eta = vec![0.0; self.n];
        let mut w = vec![0.0; self.n];
        let mut r = vec![0.0; self.n];
        let mut converged = false;

        for outer in 0..MAX_OUTER {
            let previous = state.beta.clone();
            let previous_b0 = state.b0;

            for i in 0..self.n {
                eta[i] = state.b0 + active.iter().map(|&j| self.xs[(i, j)] * state.beta[j]).sum::<f64>();
                let mu = sigmoid(eta[i]).clamp(PROB_EPS, 1.0 - PROB_EPS);
                w[i] = mu * (1.0 - mu);
                // weighted working residual w * (z - eta)
                r[i] = f64::from(y[i]) - mu;
            }

            let curvature: Vec<f64> = (0..self.p)
                .map(|j| {
                    if self.sds[j] > 0.0 {
                        (0..self.n).map(|i| w[i] * self.xs[(i, j)].powi(2)).sum::<f64>() / nf
                    } else {
                        0.0
                    }
                })
                .collect();
            let total_w: f64 = w.iter().sum();

            for _ in 0..MAX_INNER {
                let mut max_change = 0.0f64;

                for &j in &active {
                    let old = state.beta[j];
                    let gradient = (0..self.n).map(|i| self.xs[(i, j)] * r[i]).sum::<f64>() / nf;
                    let u = gradient + curvature[j] * old;
                    let new = soft_threshold(u, l1) / (curvature[j] + l2);

                    if new != old {
                        let delta = new - old;
                        for i in 0..self.n {
                            r[i] -= w[i] * self.xs[(i, j)] * delta;
                        }
                        state.beta[j] = new;
                        max_change = max_change.max(curvature[j] * delta * delta);
                    }
                }

                let delta0 = r.iter().sum::<f64>() / total_w;
                if delta0 != 0.0 {
                    state.b0 += delta0;
                    for i in 0..self.n {
                        r[i] -= w[i] * delta0;
                    }
                    max_change = max_change.max(total_w / nf * delta0 * delta0);
                }

                if max_change < INNER_TOLERANCE {
                    break;
                }
            }

            let shift = state
                .beta
                .iter()
                .zip(&previous)
                .map(|(a, b)| (a - b).abs())
                .fold((state.b0 - previous_b0).abs(), f64::max);
            if shift < OUTER_TOLERANCE {
                converged = true;
                debug!(outer, lambda, alpha, "penalized logistic converged");
                break;
            }
        }

        if !converged {
            warn!(lambda, alpha, "penalized logistic did not converge within {} outer iterations", MAX_OUTER);
        }

        let coefficients: Vec<f64> = (0..self.p)
            .map(|j| {
                if self.sds[j] > 0.0 {
                    state.beta[j] / self.sds[j]
                } else {
                    0.0
                }
            })
            .collect();
        let intercept = state.b0
            - coefficients
                .iter()
                .zip(&self.means)
                .map(|(b, m)| b * m)
                .sum::<f64>();

        PenalizedLogistic {
            alpha,
            lambda,
            intercept,
            coefficients,
            converged,
        }
    }
}

/// Coefficients on the standardized scale
struct State {
    b0: f64,
    beta: Vec<f64>,
}

impl State {
    /// Intercept-only model
    fn null(y: &[u8], p: usize) -> Self {
        let ybar = y.iter().map(|&v| f64::from(v)).sum::<f64>() / y.len().max(1) as f64;
        let ybar = ybar.clamp(PROB_EPS, 1.0 - PROB_EPS);
        Self {
            b0: (ybar / (1.0 - ybar)).ln(),
            beta: vec![0.0; p],
        }
    }
}

#[inline]
fn soft_threshold(value: f64, threshold: f64) -> f64 {
    if value > threshold {
        value - threshold
    } else if value < -threshold {
        value + threshold
    } else {
        0.0
    }
}

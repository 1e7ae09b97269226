//! Unpenalized logistic regression fitted by iteratively reweighted least
//! squares.

use faer::prelude::*;
use faer::{Mat, Side};
use tracing::warn;

use super::{sigmoid, validate_training, FitError};

/// Maximum IRLS iterations
const MAX_ITER: usize = 25;

/// Relative deviance change at which IRLS stops
const DEVIANCE_TOLERANCE: f64 = 1e-8;

/// Probabilities are kept this far away from 0 and 1
const PROB_EPS: f64 = 1e-10;

/// Diagonal jitter keeping X'WX factorizable when a level is rare
const RIDGE: f64 = 1e-8;

#[derive(Debug, Clone)]
pub struct LogisticRegression {
    pub intercept: f64,
    pub coefficients: Vec<f64>,
    pub iterations: usize,
    pub converged: bool,
    pub deviance: f64,
}

fn binomial_deviance(y: &[u8], mu: &[f64]) -> f64 {
    -2.0 * y
        .iter()
        .zip(mu)
        .map(|(&yi, &m)| if yi == 1 { m.ln() } else { (1.0 - m).ln() })
        .sum::<f64>()
}

impl LogisticRegression {
    pub fn fit(x: &Mat<f64>, y: &[u8]) -> Result<Self, FitError> {
        validate_training(x, y)?;

        let n = x.nrows();
        let p = x.ncols() + 1;
        let design = Mat::from_fn(n, p, |i, j| if j == 0 { 1.0 } else { x[(i, j - 1)] });

        // Same starting point as the classic glm initialisation
        let mut mu: Vec<f64> = y.iter().map(|&v| (f64::from(v) + 0.5) / 2.0).collect();
        let mut eta: Vec<f64> = mu.iter().map(|&m| (m / (1.0 - m)).ln()).collect();
        let mut deviance = binomial_deviance(y, &mu);
        let mut beta = Mat::<f64>::zeros(p, 1);
        let mut converged = false;
        let mut iterations = 0;

        for iter in 1..=MAX_ITER {
            iterations = iter;

            let w: Vec<f64> = mu.iter().map(|&m| (m * (1.0 - m)).max(PROB_EPS)).collect();
            let z: Vec<f64> = (0..n)
                .map(|i| eta[i] + (f64::from(y[i]) - mu[i]) / w[i])
                .collect();

            let weighted = Mat::from_fn(n, p, |i, j| design[(i, j)] * w[i]);
            let mut xtwx = design.transpose() * &weighted;
            for j in 0..p {
                xtwx[(j, j)] += RIDGE;
            }
            let wz = Mat::from_fn(n, 1, |i, _| w[i] * z[i]);
            let xtwz = design.transpose() * &wz;

            let llt = xtwx.cholesky(Side::Lower).map_err(|_| FitError::Singular)?;
            beta = llt.solve(&xtwz);

            let fitted = &design * &beta;
            for i in 0..n {
                eta[i] = fitted[(i, 0)];
                mu[i] = sigmoid(eta[i]).clamp(PROB_EPS, 1.0 - PROB_EPS);
            }

            let new_deviance = binomial_deviance(y, &mu);
            let change = (new_deviance - deviance).abs() / (new_deviance.abs() + 0.1);
            deviance = new_deviance;
            if change < DEVIANCE_TOLERANCE {
                converged = true;
                break;
            }
        }

        if !converged {
            warn!(
                iterations,
                deviance, "logistic regression did not converge; fitted probabilities may be 0 or 1"
            );
        }

        Ok(Self {
            intercept: beta[(0, 0)],
            coefficients: (1..p).map(|j| beta[(j, 0)]).collect(),
            iterations,
            converged,
            deviance,
        })
    }

    pub fn predict_proba(&self, x: &Mat<f64>) -> Vec<f64> {
        (0..x.nrows())
            .map(|i| {
                let eta = self.intercept
                    + self
                        .coefficients
                        .iter()
                        .enumerate()
                        .map(|(j, b)| b * x[(i, j)])
                        .sum::<f64>();
                sigmoid(eta)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recovers_known_log_odds() {
        // Group x=0: 1 event out of 4 (log-odds -ln 3); group x=1: 3 of 4 (ln 3)
        let xs = [0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0];
        let y = [1u8, 0, 0, 0, 1, 1, 1, 0];
        let x = Mat::from_fn(8, 1, |i, _| xs[i]);

        let model = LogisticRegression::fit(&x, &y).unwrap();
        assert!(model.converged);
        assert!((model.intercept + 3f64.ln()).abs() < 1e-4);
        assert!((model.coefficients[0] - 2.0 * 3f64.ln()).abs() < 1e-4);

        let probs = model.predict_proba(&x);
        assert!((probs[0] - 0.25).abs() < 1e-4);
        assert!((probs[7] - 0.75).abs() < 1e-4);
    }

    #[test]
    fn test_separable_data_still_predicts() {
        let xs = [0.0, 0.0, 0.0, 1.0, 1.0, 1.0];
        let y = [0u8, 0, 0, 1, 1, 1];
        let x = Mat::from_fn(6, 1, |i, _| xs[i]);

        let model = LogisticRegression::fit(&x, &y).unwrap();
        let probs = model.predict_proba(&x);
        assert!(probs[..3].iter().all(|&p| p < 0.01));
        assert!(probs[3..].iter().all(|&p| p > 0.99));
    }
}

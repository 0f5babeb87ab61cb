//! Platt scaling (sigmoid calibration)

use crate::error::{Result, ScreeningError};
use serde::{Deserialize, Serialize};

/// Platt scaling calibrator
///
/// Fits `P(y=1|f) = 1 / (1 + exp(-(a*f + b)))` where `f` is an SVM decision
/// value, by Newton's method on the regularized targets of Platt (1999).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlattScaling {
    /// Slope parameter A
    a: Option<f64>,
    /// Intercept parameter B
    b: Option<f64>,
    /// Maximum iterations
    max_iter: usize,
    /// Convergence tolerance
    tol: f64,
}

impl PlattScaling {
    /// Create new Platt scaling calibrator
    pub fn new() -> Self {
        Self {
            a: None,
            b: None,
            max_iter: 100,
            tol: 1e-7,
        }
    }

    /// Set maximum iterations
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Get fitted parameters
    pub fn parameters(&self) -> Option<(f64, f64)> {
        match (self.a, self.b) {
            (Some(a), Some(b)) => Some((a, b)),
            _ => None,
        }
    }

    fn sigmoid(x: f64) -> f64 {
        if x >= 0.0 {
            1.0 / (1.0 + (-x).exp())
        } else {
            let e = x.exp();
            e / (1.0 + e)
        }
    }

    /// Fit on decision values and their binary outcomes
    pub fn fit(&mut self, scores: &[f64], positive: &[bool]) -> Result<()> {
        let n = scores.len();
        if n != positive.len() {
            return Err(ScreeningError::InvalidInput(
                "scores and labels must have same length".to_string(),
            ));
        }
        if n == 0 {
            return Err(ScreeningError::InvalidInput("empty calibration set".to_string()));
        }

        // Target values with Platt's adjustment for small datasets
        let n_pos = positive.iter().filter(|&&p| p).count() as f64;
        let n_neg = n as f64 - n_pos;
        let target_pos = (n_pos + 1.0) / (n_pos + 2.0);
        let target_neg = 1.0 / (n_neg + 2.0);
        let targets: Vec<f64> = positive
            .iter()
            .map(|&p| if p { target_pos } else { target_neg })
            .collect();

        let mut a = 1.0;
        let mut b = 0.0;

        for _ in 0..self.max_iter {
            let mut grad_a = 0.0;
            let mut grad_b = 0.0;
            let mut hess_aa = 0.0;
            let mut hess_ab = 0.0;
            let mut hess_bb = 0.0;

            for i in 0..n {
                let f = scores[i];
                let p = Self::sigmoid(a * f + b);
                let d1 = p - targets[i];
                let d2 = p * (1.0 - p);

                grad_a += f * d1;
                grad_b += d1;
                hess_aa += f * f * d2;
                hess_ab += f * d2;
                hess_bb += d2;
            }

            // Regularize the Hessian diagonal
            hess_aa += 1e-6;
            hess_bb += 1e-6;

            // Solve 2x2 system using Cramer's rule
            let det = hess_aa * hess_bb - hess_ab * hess_ab;
            if det.abs() < 1e-12 {
                break;
            }

            let delta_a = (hess_bb * grad_a - hess_ab * grad_b) / det;
            let delta_b = (hess_aa * grad_b - hess_ab * grad_a) / det;

            a -= delta_a;
            b -= delta_b;

            if !a.is_finite() || !b.is_finite() {
                return Err(ScreeningError::TrainingError(
                    "Platt scaling diverged".to_string(),
                ));
            }
            if delta_a.abs() < self.tol && delta_b.abs() < self.tol {
                break;
            }
        }

        self.a = Some(a);
        self.b = Some(b);
        Ok(())
    }

    /// Probability of the positive class for a decision value
    pub fn probability(&self, score: f64) -> Result<f64> {
        let (a, b) = self.parameters().ok_or(ScreeningError::ModelNotFitted)?;
        Ok(Self::sigmoid(a * score + b))
    }
}

impl Default for PlattScaling {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platt_is_monotonic_in_score() {
        let scores = [-2.0, -1.5, -0.3, 0.2, 0.8, 1.1, 1.9, -0.9];
        let labels = [false, false, false, true, true, true, true, false];

        let mut platt = PlattScaling::new();
        platt.fit(&scores, &labels).unwrap();

        let low = platt.probability(-2.0).unwrap();
        let high = platt.probability(2.0).unwrap();
        assert!(low < 0.5 && high > 0.5);
        assert!(low < high);
        assert!((0.0..=1.0).contains(&low) && (0.0..=1.0).contains(&high));
    }

    #[test]
    fn test_unfitted_and_bad_input() {
        assert!(PlattScaling::new().probability(0.0).is_err());
        assert!(PlattScaling::new().fit(&[1.0], &[]).is_err());
        assert!(PlattScaling::new().fit(&[], &[]).is_err());
    }
}

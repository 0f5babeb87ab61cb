//! Linear support vector classifier
//!
//! Trained with SMO (Sequential Minimal Optimization) on a linear kernel. Two
//! classes use a single machine; more classes use one-vs-rest machines. Each
//! machine carries a Platt calibrator so the model can report probabilities.

use crate::calibration::PlattScaling;
use crate::error::{Result, ScreeningError};
use ndarray::{Array1, Array2, ArrayView1};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Maximum number of samples for eager kernel matrix computation.
/// Beyond this, training will return an error to prevent OOM.
const MAX_KERNEL_MATRIX_SAMPLES: usize = 10_000;

/// Below this many rows the kernel matrix is built sequentially
const PARALLEL_KERNEL_THRESHOLD: usize = 100;

/// SVM configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SvmConfig {
    /// Regularization parameter (C)
    pub c: f64,
    /// Tolerance for stopping criterion
    pub tol: f64,
    /// Maximum number of passes over the data
    pub max_iter: usize,
    /// Random seed
    pub random_state: Option<u64>,
}

impl Default for SvmConfig {
    fn default() -> Self {
        Self {
            c: 1.0,
            tol: 1e-3,
            max_iter: 1000,
            random_state: Some(42),
        }
    }
}

/// One binary linear machine: `w · x + b`, positive side is the "one" class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct BinaryMachine {
    weights: Array1<f64>,
    bias: f64,
    n_support: usize,
    calibrator: PlattScaling,
}

impl BinaryMachine {
    fn score(&self, x: ArrayView1<'_, f64>) -> f64 {
        self.weights.dot(&x) + self.bias
    }
}

/// Linear support vector classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearSvc {
    config: SvmConfig,
    /// Sorted class ids seen during fit
    classes: Vec<usize>,
    n_features: usize,
    /// One machine for binary problems, one per class otherwise
    machines: Vec<BinaryMachine>,
    is_fitted: bool,
}

impl LinearSvc {
    /// Create a new, unfitted classifier
    pub fn new(config: SvmConfig) -> Self {
        Self {
            config,
            classes: Vec::new(),
            n_features: 0,
            machines: Vec::new(),
            is_fitted: false,
        }
    }

    /// Fit from scratch on scaled features and class ids
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<usize>) -> Result<()> {
        if x.nrows() != y.len() {
            return Err(ScreeningError::ShapeError {
                expected: format!("{} labels", x.nrows()),
                actual: format!("{} labels", y.len()),
            });
        }

        let mut classes: Vec<usize> = y.to_vec();
        classes.sort_unstable();
        classes.dedup();

        if classes.len() < 2 {
            return Err(ScreeningError::InsufficientClasses { found: classes.len() });
        }

        let kernel_matrix = Self::compute_kernel_matrix(x)?;

        let positives: Vec<usize> = if classes.len() == 2 {
            vec![classes[1]]
        } else {
            classes.clone()
        };

        let machines = positives
            .iter()
            .map(|&positive| {
                let y_binary: Array1<f64> = y.mapv(|c| if c == positive { 1.0 } else { -1.0 });
                self.train_machine(x, &y_binary, &kernel_matrix)
            })
            .collect::<Result<Vec<_>>>()?;

        self.classes = classes;
        self.n_features = x.ncols();
        self.machines = machines;
        self.is_fitted = true;
        Ok(())
    }

    /// Train one machine and calibrate it on its own training margins
    fn train_machine(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        kernel_matrix: &Array2<f64>,
    ) -> Result<BinaryMachine> {
        let (alphas, bias) = self.smo_train(y, kernel_matrix);

        let mut weights = Array1::zeros(x.ncols());
        let mut n_support = 0;
        for (i, &alpha) in alphas.iter().enumerate() {
            if alpha > 1e-8 {
                weights.scaled_add(alpha * y[i], &x.row(i));
                n_support += 1;
            }
        }

        let scores: Vec<f64> = x.rows().into_iter().map(|r| weights.dot(&r) + bias).collect();
        let positive: Vec<bool> = y.iter().map(|&v| v > 0.0).collect();
        let mut calibrator = PlattScaling::new();
        calibrator.fit(&scores, &positive)?;

        debug!(n_support, bias, "Trained binary machine");
        Ok(BinaryMachine {
            weights,
            bias,
            n_support,
            calibrator,
        })
    }

    /// SMO training algorithm; returns (alphas, bias)
    fn smo_train(&self, y: &Array1<f64>, kernel_matrix: &Array2<f64>) -> (Array1<f64>, f64) {
        let n = y.len();
        let c = self.config.c;
        let tol = self.config.tol;

        let mut alphas: Array1<f64> = Array1::zeros(n);
        let mut bias = 0.0;

        if n <= 1 {
            return (alphas, bias);
        }

        let mut rng = match self.config.random_state {
            Some(seed) => Xoshiro256PlusPlus::seed_from_u64(seed),
            None => Xoshiro256PlusPlus::from_entropy(),
        };

        let decision = |alphas: &Array1<f64>, bias: f64, idx: usize| -> f64 {
            let mut sum = bias;
            for i in 0..n {
                if alphas[i] != 0.0 {
                    sum += alphas[i] * y[i] * kernel_matrix[[i, idx]];
                }
            }
            sum
        };

        let mut passes = 0;
        let max_passes = 5;
        let mut total_iter = 0;

        while passes < max_passes && total_iter < self.config.max_iter {
            let mut num_changed = 0;

            for i in 0..n {
                let e_i = decision(&alphas, bias, i) - y[i];

                // Check KKT conditions
                if (y[i] * e_i < -tol && alphas[i] < c) || (y[i] * e_i > tol && alphas[i] > 0.0) {
                    let j = loop {
                        let j = rng.gen_range(0..n);
                        if j != i {
                            break j;
                        }
                    };

                    let e_j = decision(&alphas, bias, j) - y[j];

                    let alpha_i_old = alphas[i];
                    let alpha_j_old = alphas[j];

                    let (l, h) = if y[i] != y[j] {
                        ((alphas[j] - alphas[i]).max(0.0), (c + alphas[j] - alphas[i]).min(c))
                    } else {
                        ((alphas[i] + alphas[j] - c).max(0.0), (alphas[i] + alphas[j]).min(c))
                    };

                    if (l - h).abs() < 1e-10 {
                        continue;
                    }

                    let eta = 2.0 * kernel_matrix[[i, j]] - kernel_matrix[[i, i]] - kernel_matrix[[j, j]];
                    if eta >= 0.0 {
                        continue;
                    }

                    alphas[j] = (alphas[j] - y[j] * (e_i - e_j) / eta).clamp(l, h);
                    if (alphas[j] - alpha_j_old).abs() < 1e-5 {
                        continue;
                    }

                    alphas[i] += y[i] * y[j] * (alpha_j_old - alphas[j]);

                    let b1 = bias
                        - e_i
                        - y[i] * (alphas[i] - alpha_i_old) * kernel_matrix[[i, i]]
                        - y[j] * (alphas[j] - alpha_j_old) * kernel_matrix[[i, j]];
                    let b2 = bias
                        - e_j
                        - y[i] * (alphas[i] - alpha_i_old) * kernel_matrix[[i, j]]
                        - y[j] * (alphas[j] - alpha_j_old) * kernel_matrix[[j, j]];

                    bias = if alphas[i] > 0.0 && alphas[i] < c {
                        b1
                    } else if alphas[j] > 0.0 && alphas[j] < c {
                        b2
                    } else {
                        (b1 + b2) / 2.0
                    };

                    num_changed += 1;
                }
            }

            total_iter += 1;
            if num_changed == 0 {
                passes += 1;
            } else {
                passes = 0;
            }
        }

        (alphas, bias)
    }

    /// Linear kernel matrix `X Xᵀ` (rows in parallel for larger sets)
    fn compute_kernel_matrix(x: &Array2<f64>) -> Result<Array2<f64>> {
        let n = x.nrows();
        if n > MAX_KERNEL_MATRIX_SAMPLES {
            return Err(ScreeningError::InvalidInput(format!(
                "Dataset has {} samples, exceeding the maximum {} for SVM kernel matrix",
                n, MAX_KERNEL_MATRIX_SAMPLES
            )));
        }

        if n < PARALLEL_KERNEL_THRESHOLD {
            return Ok(x.dot(&x.t()));
        }

        let rows: Vec<Vec<f64>> = (0..n)
            .into_par_iter()
            .map(|i| {
                let a = x.row(i);
                (0..n).map(|j| a.dot(&x.row(j))).collect()
            })
            .collect();

        let mut k = Array2::zeros((n, n));
        for (i, row) in rows.into_iter().enumerate() {
            for (j, val) in row.into_iter().enumerate() {
                k[[i, j]] = val;
            }
        }
        Ok(k)
    }

    fn check_fitted(&self, x: &Array2<f64>) -> Result<()> {
        if !self.is_fitted {
            return Err(ScreeningError::ModelNotFitted);
        }
        if x.ncols() != self.n_features {
            return Err(ScreeningError::ShapeError {
                expected: format!("{} features", self.n_features),
                actual: format!("{} features", x.ncols()),
            });
        }
        Ok(())
    }

    /// Raw margins: one column for binary problems, one per class otherwise
    pub fn decision_function(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.check_fitted(x)?;
        let mut scores = Array2::zeros((x.nrows(), self.machines.len()));
        for (i, row) in x.rows().into_iter().enumerate() {
            for (k, machine) in self.machines.iter().enumerate() {
                scores[[i, k]] = machine.score(row);
            }
        }
        Ok(scores)
    }

    /// Predict class ids
    pub fn predict(&self, x: &Array2<f64>) -> Result<Vec<usize>> {
        let scores = self.decision_function(x)?;
        Ok(scores
            .rows()
            .into_iter()
            .map(|row| {
                if self.classes.len() == 2 {
                    if row[0] >= 0.0 {
                        self.classes[1]
                    } else {
                        self.classes[0]
                    }
                } else {
                    let best = row
                        .iter()
                        .enumerate()
                        .fold((0, f64::NEG_INFINITY), |best, (k, &s)| if s > best.1 { (k, s) } else { best });
                    self.classes[best.0]
                }
            })
            .collect())
    }

    /// Class probabilities, one column per entry of [`classes`](Self::classes); rows sum to 1
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let scores = self.decision_function(x)?;
        let n_classes = self.classes.len();
        let mut proba = Array2::zeros((x.nrows(), n_classes));

        for (i, row) in scores.rows().into_iter().enumerate() {
            if n_classes == 2 {
                let p = self.machines[0].calibrator.probability(row[0])?;
                proba[[i, 0]] = 1.0 - p;
                proba[[i, 1]] = p;
            } else {
                let mut total = 0.0;
                for (k, machine) in self.machines.iter().enumerate() {
                    let p = machine.calibrator.probability(row[k])?;
                    proba[[i, k]] = p;
                    total += p;
                }
                if total > 0.0 {
                    proba.row_mut(i).mapv_inplace(|p| p / total);
                } else {
                    proba.row_mut(i).fill(1.0 / n_classes as f64);
                }
            }
        }

        Ok(proba)
    }

    /// Sorted class ids the model was fitted on
    pub fn classes(&self) -> &[usize] {
        &self.classes
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    /// Support vectors per machine
    pub fn n_support_vectors(&self) -> Vec<usize> {
        self.machines.iter().map(|m| m.n_support).collect()
    }
}

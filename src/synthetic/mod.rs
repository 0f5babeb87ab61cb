//! Synthetic data generation module
//!
//! Class-imbalance correction for the training set. Only SMOTE is used: the
//! minority diagnoses are oversampled by interpolating between same-class
//! neighbours before scaling.

mod smote;

pub use smote::SMOTE;

use crate::error::Result;
use ndarray::{Array1, Array2};
use std::collections::BTreeMap;

/// Result of resampling
#[derive(Debug, Clone)]
pub struct ResampleResult {
    /// Original rows first, then synthetic rows
    pub x: Array2<f64>,
    pub y: Array1<usize>,
    /// Synthetic samples generated per class id
    pub n_synthetic: BTreeMap<usize, usize>,
}

impl ResampleResult {
    pub fn total_synthetic(&self) -> usize {
        self.n_synthetic.values().sum()
    }
}

/// Trait for samplers
pub trait Sampler: Send + Sync {
    /// Fit the sampler on data
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<usize>) -> Result<()>;

    /// Resample data
    fn resample(&self, x: &Array2<f64>, y: &Array1<usize>) -> Result<ResampleResult>;

    /// Fit and resample in one step
    fn fit_resample(&mut self, x: &Array2<f64>, y: &Array1<usize>) -> Result<ResampleResult> {
        self.fit(x, y)?;
        self.resample(x, y)
    }
}

/// Samples per class, ordered by class id
pub fn class_counts(y: &Array1<usize>) -> BTreeMap<usize, usize> {
    let mut counts = BTreeMap::new();
    for &label in y.iter() {
        *counts.entry(label).or_insert(0) += 1;
    }
    counts
}

/// Row indices per class, ordered by class id
pub fn class_indices(y: &Array1<usize>) -> BTreeMap<usize, Vec<usize>> {
    let mut indices = BTreeMap::new();
    for (i, &label) in y.iter().enumerate() {
        indices.entry(label).or_insert_with(Vec::new).push(i);
    }
    indices
}

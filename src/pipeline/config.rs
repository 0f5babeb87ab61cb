//! Pipeline configuration

use crate::preprocessing::DatasetLayout;
use crate::training::SvmConfig;
use serde::{Deserialize, Serialize};

/// Configuration for training and inference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Seed shared by the oversampler and the classifier
    pub seed: u64,

    /// Same-class neighbours considered when synthesizing minority rows
    pub k_neighbors: usize,

    /// Classifier hyper-parameters
    pub svm: SvmConfig,

    /// Column names and cell tokens of uploaded tables
    pub layout: DatasetLayout,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            k_neighbors: 5,
            svm: SvmConfig::default(),
            layout: DatasetLayout::default(),
        }
    }
}

impl PipelineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the seed for both the oversampler and the classifier
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self.svm.random_state = Some(seed);
        self
    }

    pub fn with_k_neighbors(mut self, k: usize) -> Self {
        self.k_neighbors = k.max(1);
        self
    }

    /// Set the SVM regularization parameter
    pub fn with_c(mut self, c: f64) -> Self {
        self.svm.c = c;
        self
    }

    pub fn with_svm(mut self, svm: SvmConfig) -> Self {
        self.svm = svm;
        self
    }

    pub fn with_layout(mut self, layout: DatasetLayout) -> Self {
        self.layout = layout;
        self
    }
}

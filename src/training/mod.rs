//! Model training module
//!
//! Provides the linear support vector classifier and the classification
//! metrics used to report on it.

pub mod metrics;
pub mod svm;

pub use metrics::{accuracy, label_distribution, ClassMetrics, ClassificationReport, ConfusionMatrix};
pub use svm::{LinearSvc, SvmConfig};

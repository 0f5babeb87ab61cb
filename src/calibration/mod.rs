//! Probability calibration
//!
//! Platt scaling turns raw SVM margins into class probabilities.

mod platt;

pub use platt::PlattScaling;

//! Min-max feature scaling

use crate::error::{Result, ScreeningError};
use ndarray::{Array1, Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};

/// Learned range of one feature column
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureRange {
    pub min: f64,
    pub max: f64,
}

impl FeatureRange {
    /// `(x - min) / (max - min)`, or 0 for a constant column
    fn scale(&self, x: f64) -> f64 {
        let range = self.max - self.min;
        if range == 0.0 {
            0.0
        } else {
            (x - self.min) / range
        }
    }
}

/// Fitted min-max scaler.
///
/// Fit once per training run; inference reuses the stored ranges and never
/// refits. Values outside the training range are not clipped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalerState {
    ranges: Vec<FeatureRange>,
}

impl ScalerState {
    /// Learn per-column `(min, max)` from the training matrix
    pub fn fit(x: &Array2<f64>) -> Result<Self> {
        if x.nrows() == 0 {
            return Err(ScreeningError::InvalidInput(
                "cannot fit a scaler on zero rows".to_string(),
            ));
        }

        let ranges = x
            .axis_iter(Axis(1))
            .map(|col| {
                let min = col.iter().copied().fold(f64::INFINITY, f64::min);
                let max = col.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                FeatureRange { min, max }
            })
            .collect();

        Ok(Self { ranges })
    }

    pub fn n_features(&self) -> usize {
        self.ranges.len()
    }

    pub fn ranges(&self) -> &[FeatureRange] {
        &self.ranges
    }

    /// Scale a matrix with the fitted ranges
    pub fn apply(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.check_width(x.ncols())?;
        let mut out = x.clone();
        for (mut col, range) in out.axis_iter_mut(Axis(1)).zip(&self.ranges) {
            col.mapv_inplace(|v| range.scale(v));
        }
        Ok(out)
    }

    /// Scale a single feature vector
    pub fn apply_row(&self, x: ArrayView1<'_, f64>) -> Result<Array1<f64>> {
        self.check_width(x.len())?;
        Ok(Array1::from_iter(
            x.iter().zip(&self.ranges).map(|(&v, range)| range.scale(v)),
        ))
    }

    fn check_width(&self, n: usize) -> Result<()> {
        if n != self.ranges.len() {
            return Err(ScreeningError::ShapeError {
                expected: format!("{} features", self.ranges.len()),
                actual: format!("{} features", n),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_minmax_range_on_fit_data() {
        let x = array![[1.0, 20.0, 0.0], [0.0, 60.0, 1.0], [1.0, 40.0, 1.0]];
        let scaler = ScalerState::fit(&x).unwrap();
        let scaled = scaler.apply(&x).unwrap();

        assert!(scaled.iter().all(|&v| (0.0..=1.0).contains(&v)));
        assert!((scaled[[2, 1]] - 0.5).abs() < 1e-12);
        assert_eq!(scaler.ranges()[1], FeatureRange { min: 20.0, max: 60.0 });
    }

    #[test]
    fn test_constant_column_maps_to_zero() {
        let x = array![[5.0, 1.0], [5.0, 2.0]];
        let scaler = ScalerState::fit(&x).unwrap();
        let scaled = scaler.apply(&x).unwrap();
        assert_eq!(scaled.column(0).to_vec(), vec![0.0, 0.0]);
    }

    #[test]
    fn test_inference_reuses_training_ranges() {
        let train = array![[0.0, 20.0], [1.0, 60.0]];
        let scaler = ScalerState::fit(&train).unwrap();

        let row = scaler.apply_row(array![1.0, 80.0].view()).unwrap();
        assert_eq!(row.to_vec(), vec![1.0, 1.5]);
    }

    #[test]
    fn test_width_mismatch() {
        let scaler = ScalerState::fit(&array![[0.0, 1.0]]).unwrap();
        assert!(scaler.apply(&array![[0.0, 1.0, 2.0]]).is_err());
        assert!(ScalerState::fit(&Array2::zeros((0, 3))).is_err());
    }
}

//! Classification metrics over class ids

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Fraction of positions where `y_true` and `y_pred` agree (0 for empty input)
pub fn accuracy(y_true: &[usize], y_pred: &[usize]) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    let correct = y_true.iter().zip(y_pred).filter(|(t, p)| t == p).count();
    correct as f64 / y_true.len() as f64
}

/// Count of each distinct label, ordered by label
pub fn label_distribution<S: AsRef<str>>(labels: &[S]) -> BTreeMap<String, usize> {
    let mut distribution = BTreeMap::new();
    for label in labels {
        *distribution.entry(label.as_ref().to_string()).or_insert(0) += 1;
    }
    distribution
}

/// Confusion matrix; rows are actual classes, columns are predicted classes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub labels: Vec<String>,
    pub counts: Vec<Vec<usize>>,
}

impl ConfusionMatrix {
    /// Build from class ids; ids index into `labels`, out-of-range ids are ignored
    pub fn from_predictions(y_true: &[usize], y_pred: &[usize], labels: &[String]) -> Self {
        let n = labels.len();
        let mut counts = vec![vec![0; n]; n];
        for (&t, &p) in y_true.iter().zip(y_pred) {
            if t < n && p < n {
                counts[t][p] += 1;
            }
        }
        Self {
            labels: labels.to_vec(),
            counts,
        }
    }

    pub fn total(&self) -> usize {
        self.counts.iter().flatten().sum()
    }

    pub fn correct(&self) -> usize {
        (0..self.counts.len()).map(|i| self.counts[i][i]).sum()
    }

    pub fn count(&self, actual: usize, predicted: usize) -> usize {
        self.counts
            .get(actual)
            .and_then(|row| row.get(predicted))
            .copied()
            .unwrap_or(0)
    }

    fn column_sum(&self, predicted: usize) -> usize {
        self.counts.iter().map(|row| row[predicted]).sum()
    }
}

/// Per-class precision, recall and F1
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub label: String,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub support: usize,
}

/// Classification report in the usual per-class layout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationReport {
    pub classes: Vec<ClassMetrics>,
    pub accuracy: f64,
    pub macro_f1: f64,
    pub weighted_f1: f64,
}

impl ClassificationReport {
    pub fn from_confusion(matrix: &ConfusionMatrix) -> Self {
        let total = matrix.total();
        let classes: Vec<ClassMetrics> = matrix
            .labels
            .iter()
            .enumerate()
            .map(|(i, label)| {
                let tp = matrix.counts[i][i] as f64;
                let support = matrix.counts[i].iter().sum::<usize>();
                let predicted = matrix.column_sum(i);

                let precision = if predicted > 0 { tp / predicted as f64 } else { 0.0 };
                let recall = if support > 0 { tp / support as f64 } else { 0.0 };
                let f1_score = if precision + recall > 0.0 {
                    2.0 * precision * recall / (precision + recall)
                } else {
                    0.0
                };

                ClassMetrics {
                    label: label.clone(),
                    precision,
                    recall,
                    f1_score,
                    support,
                }
            })
            .collect();

        let macro_f1 = if classes.is_empty() {
            0.0
        } else {
            classes.iter().map(|c| c.f1_score).sum::<f64>() / classes.len() as f64
        };
        let weighted_f1 = if total == 0 {
            0.0
        } else {
            classes.iter().map(|c| c.f1_score * c.support as f64).sum::<f64>() / total as f64
        };
        let accuracy = if total == 0 {
            0.0
        } else {
            matrix.correct() as f64 / total as f64
        };

        Self {
            classes,
            accuracy,
            macro_f1,
            weighted_f1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels() -> Vec<String> {
        vec!["A".to_string(), "B".to_string()]
    }

    #[test]
    fn test_accuracy() {
        assert_eq!(accuracy(&[0, 1, 1, 0], &[0, 1, 0, 0]), 0.75);
        assert_eq!(accuracy(&[], &[]), 0.0);
    }

    #[test]
    fn test_confusion_matrix_counts() {
        let cm = ConfusionMatrix::from_predictions(&[0, 0, 1, 1, 1], &[0, 1, 1, 1, 0], &labels());
        assert_eq!(cm.counts, vec![vec![1, 1], vec![1, 2]]);
        assert_eq!(cm.total(), 5);
        assert_eq!(cm.correct(), 3);
        assert_eq!(cm.count(1, 1), 2);
        assert_eq!(cm.count(5, 0), 0);
    }

    #[test]
    fn test_classification_report() {
        let cm = ConfusionMatrix::from_predictions(&[0, 0, 1, 1, 1], &[0, 1, 1, 1, 0], &labels());
        let report = ClassificationReport::from_confusion(&cm);

        let b = &report.classes[1];
        assert_eq!(b.support, 3);
        assert!((b.precision - 2.0 / 3.0).abs() < 1e-12);
        assert!((b.recall - 2.0 / 3.0).abs() < 1e-12);
        assert!((report.accuracy - 0.6).abs() < 1e-12);

        let a = &report.classes[0];
        assert!((a.precision - 0.5).abs() < 1e-12);
        assert!((a.f1_score - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_label_distribution() {
        let dist = label_distribution(&["x", "y", "x"]);
        assert_eq!(dist["x"], 2);
        assert_eq!(dist["y"], 1);
    }
}

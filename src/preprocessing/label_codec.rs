//! Diagnosis label <-> class id mapping

use crate::error::{Result, ScreeningError};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Bidirectional mapping between category names and ids `0..n`.
///
/// Ids follow the sorted order of the distinct labels seen during fit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelCodec {
    classes: Vec<String>,
}

impl LabelCodec {
    /// Fit on training labels; surrounding whitespace is ignored
    pub fn fit<S: AsRef<str>>(labels: &[S]) -> Result<Self> {
        let classes: BTreeSet<String> = labels
            .iter()
            .map(|l| l.as_ref().trim())
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect();

        if classes.is_empty() {
            return Err(ScreeningError::InvalidInput(
                "no diagnosis labels to fit".to_string(),
            ));
        }

        Ok(Self {
            classes: classes.into_iter().collect(),
        })
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn n_classes(&self) -> usize {
        self.classes.len()
    }

    pub fn encode(&self, label: &str) -> Result<usize> {
        let label = label.trim();
        self.classes
            .binary_search_by(|c| c.as_str().cmp(label))
            .map_err(|_| ScreeningError::UnknownLabel(label.to_string()))
    }

    pub fn decode(&self, id: usize) -> Result<&str> {
        self.classes
            .get(id)
            .map(String::as_str)
            .ok_or(ScreeningError::UnknownId {
                id,
                n_classes: self.classes.len(),
            })
    }

    /// Encode a column of labels; the first unseen label fails the batch
    pub fn encode_all<S: AsRef<str>>(&self, labels: &[S]) -> Result<Array1<usize>> {
        labels
            .iter()
            .map(|l| self.encode(l.as_ref()))
            .collect::<Result<Vec<_>>>()
            .map(Array1::from_vec)
    }

    pub fn decode_all(&self, ids: &[usize]) -> Result<Vec<String>> {
        ids.iter()
            .map(|&id| self.decode(id).map(str::to_string))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_follow_sorted_order() {
        let codec = LabelCodec::fit(&[
            "Hepatitis Kronis",
            "Abses Hati",
            "Hepatitis Akut",
            "Abses Hati",
        ])
        .unwrap();

        assert_eq!(codec.n_classes(), 3);
        assert_eq!(codec.encode("Abses Hati").unwrap(), 0);
        assert_eq!(codec.encode("Hepatitis Akut").unwrap(), 1);
        assert_eq!(codec.encode(" Hepatitis Kronis ").unwrap(), 2);
    }

    #[test]
    fn test_round_trip() {
        let labels = ["Hepatitis Akut", "Infeksi Parasit atau Virus", "Abses Hati"];
        let codec = LabelCodec::fit(&labels).unwrap();
        for label in labels {
            assert_eq!(codec.decode(codec.encode(label).unwrap()).unwrap(), label);
        }
    }

    #[test]
    fn test_unknown_lookups() {
        let codec = LabelCodec::fit(&["a", "b"]).unwrap();
        assert!(matches!(codec.encode("c"), Err(ScreeningError::UnknownLabel(l)) if l == "c"));
        assert!(matches!(
            codec.decode(2),
            Err(ScreeningError::UnknownId { id: 2, n_classes: 2 })
        ));
        assert!(codec.encode_all(&["a", "zzz"]).is_err());
    }

    #[test]
    fn test_empty_fit_fails() {
        assert!(LabelCodec::fit::<&str>(&[]).is_err());
        assert!(LabelCodec::fit(&["  "]).is_err());
    }
}

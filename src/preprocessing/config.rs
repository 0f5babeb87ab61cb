//! Dataset layout configuration
//!
//! Names the identity columns of an uploaded table and the tokens used in
//! its yes/no symptom cells.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Symptom fields offered by the manual entry form before a model exists
pub const DEFAULT_SYMPTOMS: [&str; 14] = [
    "Demam",
    "Kelelahan",
    "Kehilangan Nafsu Makan",
    "Mual dan Muntah",
    "Nyeri Perut Kanan Atas",
    "Urin Gelap",
    "Feses Pucat",
    "Ikterus",
    "Gatal",
    "Edema/Ascites",
    "Diare/Gangguan Pencernaan",
    "Berat Badan Turun",
    "Ruam/Nyeri Sendi",
    "Menggigil",
];

/// Column names and cell tokens of the tabular input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetLayout {
    /// Sex column (first letter L/M = male, P/F = female)
    pub sex_column: String,

    /// Age column, integer years
    pub age_column: String,

    /// Diagnosis category column; present for training and evaluation
    pub target_column: String,

    /// Token marking a symptom as present, compared trimmed and case-insensitively
    pub affirmative_token: String,

    /// Token marking a symptom as explicitly absent
    pub negative_token: String,

    /// Column appended to batch results holding the predicted category
    pub prediction_column: String,
}

impl Default for DatasetLayout {
    fn default() -> Self {
        Self::indonesian()
    }
}

impl DatasetLayout {
    /// Layout of the original clinic spreadsheets
    pub fn indonesian() -> Self {
        Self {
            sex_column: "JK".to_string(),
            age_column: "Umur".to_string(),
            target_column: "Kategori Diagnosis".to_string(),
            affirmative_token: "ya".to_string(),
            negative_token: "tidak".to_string(),
            prediction_column: "Prediksi".to_string(),
        }
    }

    /// English headers and yes/no tokens
    pub fn english() -> Self {
        Self {
            sex_column: "Sex".to_string(),
            age_column: "Age".to_string(),
            target_column: "DiagnosisCategory".to_string(),
            affirmative_token: "yes".to_string(),
            negative_token: "no".to_string(),
            prediction_column: "Prediction".to_string(),
        }
    }

    /// Builder method to override the affirmative token
    pub fn with_affirmative_token(mut self, token: impl Into<String>) -> Self {
        self.affirmative_token = token.into();
        self
    }

    /// Builder method to override the negative token
    pub fn with_negative_token(mut self, token: impl Into<String>) -> Self {
        self.negative_token = token.into();
        self
    }

    /// Builder method to override the target column
    pub fn with_target_column(mut self, column: impl Into<String>) -> Self {
        self.target_column = column.into();
        self
    }

    /// Whether `name` is one of the identity columns (sex, age, target)
    pub fn is_identity_column(&self, name: &str) -> bool {
        name == self.sex_column || name == self.age_column || name == self.target_column
    }
}

impl FromStr for DatasetLayout {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "id" | "indonesian" => Ok(Self::indonesian()),
            "en" | "english" => Ok(Self::english()),
            other => Err(format!("unknown layout '{}', expected 'indonesian' or 'english'", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_indonesian() {
        let layout = DatasetLayout::default();
        assert_eq!(layout.sex_column, "JK");
        assert_eq!(layout.affirmative_token, "ya");
        assert!(layout.is_identity_column("Kategori Diagnosis"));
        assert!(!layout.is_identity_column("Demam"));
    }

    #[test]
    fn test_parse_layout() {
        assert_eq!("english".parse::<DatasetLayout>().unwrap(), DatasetLayout::english());
        assert_eq!(" ID ".parse::<DatasetLayout>().unwrap(), DatasetLayout::indonesian());
        assert!("klingon".parse::<DatasetLayout>().is_err());
    }
}

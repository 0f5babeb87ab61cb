//! Patient record parsing and feature encoding
//!
//! Raw cells are free-form text. Sex is read from the first letter of the
//! token, symptoms from a yes/no marker, age as an integer. The encoder turns
//! a [`PatientRecord`] into a feature vector ordered by a [`ColumnSchema`].

use crate::data::{RawRow, RawTable};
use crate::error::{Result, ScreeningError};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{ColumnSchema, DatasetLayout};

/// Oldest accepted age, in years
pub const MAX_AGE: u32 = 120;

/// Patient sex
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sex {
    Male,
    Female,
}

impl Sex {
    /// Parse a raw token by its first letter.
    ///
    /// `L` (laki-laki) and `M` mean male, `P` (perempuan) and `F` mean female.
    /// Anything else is unrecognized.
    pub fn from_token(raw: &str) -> Option<Sex> {
        match raw.trim().chars().next()?.to_ascii_uppercase() {
            'L' | 'M' => Some(Sex::Male),
            'P' | 'F' => Some(Sex::Female),
            _ => None,
        }
    }

    /// Feature value: male 1, female 0
    pub fn code(self) -> f64 {
        match self {
            Sex::Male => 1.0,
            Sex::Female => 0.0,
        }
    }
}

/// Reading of a single yes/no symptom cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    Affirmative,
    Negative,
    /// Blank, missing, or any other text. Encodes like `Negative`.
    Unrecognized,
}

impl Marker {
    pub fn parse(raw: Option<&str>, layout: &DatasetLayout) -> Marker {
        let Some(token) = raw.map(str::trim).filter(|t| !t.is_empty()) else {
            return Marker::Unrecognized;
        };
        if token.eq_ignore_ascii_case(layout.affirmative_token.trim()) {
            Marker::Affirmative
        } else if token.eq_ignore_ascii_case(layout.negative_token.trim()) {
            Marker::Negative
        } else {
            Marker::Unrecognized
        }
    }

    pub fn is_present(self) -> bool {
        self == Marker::Affirmative
    }
}

/// One patient's demographics and symptoms
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientRecord {
    /// `None` when the sex token was not recognized; encodes as 0
    pub sex: Option<Sex>,
    pub age: u32,
    pub symptoms: BTreeMap<String, bool>,
}

impl PatientRecord {
    /// Build a record from form input, validating the age range
    pub fn new(sex: Option<Sex>, age: u32, symptoms: BTreeMap<String, bool>) -> Result<Self> {
        if age > MAX_AGE {
            return Err(ScreeningError::InvalidRecord {
                row: 0,
                reason: format!("age {} is outside 0..={}", age, MAX_AGE),
            });
        }
        Ok(Self { sex, age, symptoms })
    }

    /// Symptoms reported as present
    pub fn present_symptoms(&self) -> impl Iterator<Item = &str> {
        self.symptoms
            .iter()
            .filter(|(_, &present)| present)
            .map(|(name, _)| name.as_str())
    }
}

/// Counts of cells that fell back to the default encoding
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EncodingReport {
    pub rows: usize,
    /// Sex cells that were neither male nor female
    pub unrecognized_sex: usize,
    /// Symptom cells that were neither affirmative nor negative (including blanks)
    pub unrecognized_symptoms: usize,
    /// Schema columns missing from the input; filled with 0
    pub missing_columns: Vec<String>,
}

impl EncodingReport {
    /// Human-readable warnings for the non-zero counters
    pub fn warnings(&self) -> Vec<String> {
        let mut out = Vec::new();
        if !self.missing_columns.is_empty() {
            out.push(format!(
                "columns missing from the upload were filled with 0: {}",
                self.missing_columns.join(", ")
            ));
        }
        if self.unrecognized_sex > 0 {
            out.push(format!(
                "{} sex value(s) were not recognized and were encoded as female (0)",
                self.unrecognized_sex
            ));
        }
        if self.unrecognized_symptoms > 0 {
            out.push(format!(
                "{} symptom cell(s) were blank or not a yes/no token and were encoded as absent",
                self.unrecognized_symptoms
            ));
        }
        out
    }
}

/// Turns raw rows into patient records and records into feature vectors
#[derive(Debug, Clone)]
pub struct FeatureEncoder {
    layout: DatasetLayout,
}

impl FeatureEncoder {
    pub fn new(layout: DatasetLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &DatasetLayout {
        &self.layout
    }

    /// Parse a table row, reading the symptoms named by `schema`
    pub fn parse_row(
        &self,
        row: RawRow<'_>,
        schema: &ColumnSchema,
        report: &mut EncodingReport,
    ) -> Result<PatientRecord> {
        let sex = match row.get(schema.sex_column()) {
            Some(token) => {
                let parsed = Sex::from_token(token);
                if parsed.is_none() {
                    report.unrecognized_sex += 1;
                }
                parsed
            }
            None => {
                report.unrecognized_sex += 1;
                None
            }
        };

        let age = parse_age(row.get(schema.age_column()), row.index())?;

        let mut symptoms = BTreeMap::new();
        for name in schema.symptoms() {
            let marker = Marker::parse(row.get(name), &self.layout);
            if marker == Marker::Unrecognized {
                report.unrecognized_symptoms += 1;
            }
            symptoms.insert(name.clone(), marker.is_present());
        }

        report.rows += 1;
        Ok(PatientRecord { sex, age, symptoms })
    }

    /// Parse every row of a table against `schema`
    pub fn parse_table(
        &self,
        table: &RawTable,
        schema: &ColumnSchema,
    ) -> Result<(Vec<PatientRecord>, EncodingReport)> {
        let mut report = EncodingReport {
            missing_columns: schema.missing_from(table.columns()),
            ..Default::default()
        };
        let records = table
            .rows()
            .map(|row| self.parse_row(row, schema, &mut report))
            .collect::<Result<Vec<_>>>()?;
        Ok((records, report))
    }

    /// Encode one record; columns follow `schema`, absent symptoms are 0
    pub fn encode(&self, record: &PatientRecord, schema: &ColumnSchema) -> Array1<f64> {
        Array1::from_iter(schema.columns().iter().enumerate().map(|(i, name)| match i {
            0 => record.sex.map_or(0.0, Sex::code),
            1 => record.age as f64,
            _ => {
                if record.symptoms.get(name).copied().unwrap_or(false) {
                    1.0
                } else {
                    0.0
                }
            }
        }))
    }

    /// Encode a batch into a row-per-record matrix
    pub fn encode_batch(&self, records: &[PatientRecord], schema: &ColumnSchema) -> Array2<f64> {
        let n_features = schema.len();
        let mut x = Array2::zeros((records.len(), n_features));
        for (i, record) in records.iter().enumerate() {
            x.row_mut(i).assign(&self.encode(record, schema));
        }
        x
    }
}

/// Blank age is 0; non-numeric or out-of-range ages reject the row
fn parse_age(raw: Option<&str>, row: usize) -> Result<u32> {
    let Some(text) = raw.map(str::trim).filter(|t| !t.is_empty()) else {
        return Ok(0);
    };
    let value: f64 = text.replace(',', ".").parse().map_err(|_| ScreeningError::InvalidRecord {
        row,
        reason: format!("age '{}' is not a number", text),
    })?;
    if !value.is_finite() || value < 0.0 || value > MAX_AGE as f64 {
        return Err(ScreeningError::InvalidRecord {
            row,
            reason: format!("age {} is outside 0..={}", text, MAX_AGE),
        });
    }
    Ok(value.round() as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> ColumnSchema {
        ColumnSchema::new(vec![
            "JK".into(),
            "Umur".into(),
            "Demam".into(),
            "Gatal".into(),
        ])
        .unwrap()
    }

    #[test]
    fn test_sex_tokens() {
        assert_eq!(Sex::from_token("Laki-laki"), Some(Sex::Male));
        assert_eq!(Sex::from_token(" l"), Some(Sex::Male));
        assert_eq!(Sex::from_token("Perempuan"), Some(Sex::Female));
        assert_eq!(Sex::from_token("female"), Some(Sex::Female));
        assert_eq!(Sex::from_token("unknown"), None);
        assert_eq!(Sex::from_token(""), None);
    }

    #[test]
    fn test_marker_is_trimmed_and_case_insensitive() {
        let layout = DatasetLayout::indonesian();
        assert_eq!(Marker::parse(Some("  YA "), &layout), Marker::Affirmative);
        assert_eq!(Marker::parse(Some("Tidak"), &layout), Marker::Negative);
        assert_eq!(Marker::parse(Some("mungkin"), &layout), Marker::Unrecognized);
        assert_eq!(Marker::parse(None, &layout), Marker::Unrecognized);
        assert!(!Marker::parse(Some("mungkin"), &layout).is_present());
    }

    #[test]
    fn test_encode_follows_schema_order() {
        let encoder = FeatureEncoder::new(DatasetLayout::indonesian());
        let table = RawTable::from_strs(
            &["Gatal", "JK", "Extra", "Umur", "Demam"],
            &[&["tidak", "L", "zzz", "40", "Ya"]],
        )
        .unwrap();

        let (records, report) = encoder.parse_table(&table, &schema()).unwrap();
        let x = encoder.encode_batch(&records, &schema());

        assert_eq!(x.row(0).to_vec(), vec![1.0, 40.0, 1.0, 0.0]);
        assert_eq!(report.rows, 1);
        assert!(report.warnings().is_empty());
    }

    #[test]
    fn test_missing_columns_default_to_zero() {
        let encoder = FeatureEncoder::new(DatasetLayout::indonesian());
        let table = RawTable::from_strs(&["JK", "Umur", "Demam"], &[&["P", "30", "ya"]]).unwrap();

        let (records, report) = encoder.parse_table(&table, &schema()).unwrap();
        let x = encoder.encode(&records[0], &schema());

        assert_eq!(x.to_vec(), vec![0.0, 30.0, 1.0, 0.0]);
        assert_eq!(report.missing_columns, vec!["Gatal".to_string()]);
        assert_eq!(report.unrecognized_symptoms, 1);
        assert_eq!(report.warnings().len(), 2);
    }

    #[test]
    fn test_unrecognized_sex_encodes_zero() {
        let encoder = FeatureEncoder::new(DatasetLayout::indonesian());
        let table = RawTable::from_strs(&["JK", "Umur"], &[&["?", "50"]]).unwrap();
        let (records, report) = encoder.parse_table(&table, &schema()).unwrap();

        assert_eq!(records[0].sex, None);
        assert_eq!(encoder.encode(&records[0], &schema())[0], 0.0);
        assert_eq!(report.unrecognized_sex, 1);
    }

    #[test]
    fn test_age_parsing() {
        assert_eq!(parse_age(None, 0).unwrap(), 0);
        assert_eq!(parse_age(Some("41.0"), 0).unwrap(), 41);
        assert!(matches!(
            parse_age(Some("abc"), 3),
            Err(ScreeningError::InvalidRecord { row: 3, .. })
        ));
        assert!(parse_age(Some("121"), 0).is_err());
        assert!(parse_age(Some("-1"), 0).is_err());
    }

    #[test]
    fn test_record_validation() {
        assert!(PatientRecord::new(Some(Sex::Male), 121, BTreeMap::new()).is_err());
        let record = PatientRecord::new(
            Some(Sex::Female),
            33,
            BTreeMap::from([("Demam".to_string(), true), ("Gatal".to_string(), false)]),
        )
        .unwrap();
        assert_eq!(record.present_symptoms().collect::<Vec<_>>(), vec!["Demam"]);
    }

    #[test]
    fn test_encoding_is_deterministic() {
        let encoder = FeatureEncoder::new(DatasetLayout::indonesian());
        let record = PatientRecord::new(
            Some(Sex::Male),
            40,
            BTreeMap::from([("Gatal".to_string(), true)]),
        )
        .unwrap();
        let a = encoder.encode(&record, &schema());
        let b = encoder.encode(&record, &schema());
        assert_eq!(a, b);
    }
}

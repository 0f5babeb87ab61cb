//! Canonical feature column ordering

use crate::error::{Result, ScreeningError};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::DatasetLayout;

/// Ordered feature columns, fixed at training time.
///
/// The first two entries are always the sex and age columns; every further
/// entry is one symptom, in the order the training table listed them. The
/// schema is the only source of feature order at inference time. It is
/// persisted as a plain JSON array and re-checked when read back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct ColumnSchema {
    columns: Vec<String>,
}

impl ColumnSchema {
    /// Build a schema from explicit column names.
    ///
    /// `columns[0]` must be the sex column and `columns[1]` the age column.
    pub fn new(columns: Vec<String>) -> Result<Self> {
        if columns.len() < 2 {
            return Err(ScreeningError::InvalidInput(format!(
                "schema needs at least the sex and age columns, got {} column(s)",
                columns.len()
            )));
        }

        let mut seen = HashSet::new();
        for name in &columns {
            if !seen.insert(name.as_str()) {
                return Err(ScreeningError::InvalidInput(format!(
                    "duplicate column '{}' in schema",
                    name
                )));
            }
        }

        Ok(Self { columns })
    }

    /// Derive the schema from the header of a training table.
    ///
    /// Sex and age come first; remaining non-target columns follow in table
    /// order. Training tables must carry sex, age and target columns.
    pub fn from_training_columns(table_columns: &[String], layout: &DatasetLayout) -> Result<Self> {
        let missing: Vec<String> = [&layout.sex_column, &layout.age_column, &layout.target_column]
            .into_iter()
            .filter(|required| !table_columns.iter().any(|c| c == *required))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(ScreeningError::SchemaMismatch { missing });
        }

        let mut columns = vec![layout.sex_column.clone(), layout.age_column.clone()];
        for name in table_columns {
            if !layout.is_identity_column(name) && !columns.contains(name) {
                columns.push(name.clone());
            }
        }

        Self::new(columns)
    }

    /// All columns in feature order
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn sex_column(&self) -> &str {
        &self.columns[0]
    }

    pub fn age_column(&self) -> &str {
        &self.columns[1]
    }

    /// Symptom columns, in feature order
    pub fn symptoms(&self) -> &[String] {
        &self.columns[2..]
    }

    /// Position of a column in the feature vector
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Schema columns absent from `available`
    pub fn missing_from(&self, available: &[String]) -> Vec<String> {
        self.columns
            .iter()
            .filter(|c| !available.contains(c))
            .cloned()
            .collect()
    }
}

impl TryFrom<Vec<String>> for ColumnSchema {
    type Error = ScreeningError;

    fn try_from(columns: Vec<String>) -> Result<Self> {
        Self::new(columns)
    }
}

impl From<ColumnSchema> for Vec<String> {
    fn from(schema: ColumnSchema) -> Self {
        schema.columns
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_sex_and_age_lead() {
        let layout = DatasetLayout::indonesian();
        let header = names(&["Demam", "Umur", "Kategori Diagnosis", "JK", "Gatal"]);
        let schema = ColumnSchema::from_training_columns(&header, &layout).unwrap();

        assert_eq!(schema.columns(), &names(&["JK", "Umur", "Demam", "Gatal"])[..]);
        assert_eq!(schema.symptoms(), &names(&["Demam", "Gatal"])[..]);
        assert_eq!(schema.index_of("Gatal"), Some(3));
    }

    #[test]
    fn test_missing_target_is_schema_mismatch() {
        let layout = DatasetLayout::indonesian();
        let header = names(&["JK", "Umur", "Demam"]);
        let err = ColumnSchema::from_training_columns(&header, &layout).unwrap_err();
        match err {
            ScreeningError::SchemaMismatch { missing } => {
                assert_eq!(missing, vec!["Kategori Diagnosis".to_string()])
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_rejects_duplicates() {
        assert!(ColumnSchema::new(names(&["JK", "Umur", "JK"])).is_err());
        assert!(ColumnSchema::new(names(&["JK"])).is_err());
    }

    #[test]
    fn test_missing_from() {
        let schema = ColumnSchema::new(names(&["JK", "Umur", "Demam", "Gatal"])).unwrap();
        let missing = schema.missing_from(&names(&["JK", "Umur", "Demam", "Extra"]));
        assert_eq!(missing, names(&["Gatal"]));
    }

    #[test]
    fn test_deserialize_checks_columns() {
        let schema: ColumnSchema = serde_json::from_str(r#"["JK", "Umur", "Demam"]"#).unwrap();
        assert_eq!(schema.symptoms(), &names(&["Demam"])[..]);

        assert!(serde_json::from_str::<ColumnSchema>(r#"["JK"]"#).is_err());
        assert!(serde_json::from_str::<ColumnSchema>(r#"[]"#).is_err());
        assert!(serde_json::from_str::<ColumnSchema>(r#"["JK", "Umur", "JK"]"#).is_err());
    }

    #[test]
    fn test_serializes_as_plain_array() {
        let schema = ColumnSchema::new(names(&["JK", "Umur", "Gatal"])).unwrap();
        assert_eq!(serde_json::to_string(&schema).unwrap(), r#"["JK","Umur","Gatal"]"#);
    }
}

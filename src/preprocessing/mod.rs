//! Data preprocessing module
//!
//! Everything between a raw upload row and the classifier input:
//! - Dataset layout (column names, yes/no tokens)
//! - Record parsing and feature encoding
//! - The persisted column schema
//! - Min-max scaling
//! - Diagnosis label encoding

mod config;
mod encoder;
mod label_codec;
mod scaler;
mod schema;

pub use config::{DatasetLayout, DEFAULT_SYMPTOMS};
pub use encoder::{EncodingReport, FeatureEncoder, Marker, PatientRecord, Sex, MAX_AGE};
pub use label_codec::LabelCodec;
pub use scaler::{FeatureRange, ScalerState};
pub use schema::ColumnSchema;

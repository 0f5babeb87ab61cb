//! hepascreen - Hepatitis diagnosis screening
//!
//! Trains a classifier that maps patient sex, age and yes/no symptoms to a
//! liver-disease diagnosis category, persists the trained artifacts, and
//! serves predictions through a web form and a CLI.
//!
//! # Modules
//!
//! ## Core pipeline
//! - [`preprocessing`] - Record parsing, feature encoding, schema, scaling, label codec
//! - [`synthetic`] - SMOTE class rebalancing
//! - [`training`] - Linear SVM and classification metrics
//! - [`calibration`] - Platt scaling for class probabilities
//! - [`pipeline`] - Train / evaluate / predict orchestration and artifact bundles
//!
//! ## Input and presentation
//! - [`data`] - Spreadsheet and CSV loading
//! - [`explanations`] - Diagnosis descriptions and recommended actions
//!
//! ## Services
//! - [`server`] - HTTP server with the form UI and JSON API
//! - [`cli`] - Command-line interface

pub mod error;

pub mod calibration;
pub mod data;
pub mod explanations;
pub mod pipeline;
pub mod preprocessing;
pub mod synthetic;
pub mod training;

pub mod cli;
pub mod server;

pub use error::{Result, ScreeningError};

/// Prelude for common imports
pub mod prelude {
    pub use crate::data::{RawTable, TableLoader};
    pub use crate::error::{Result, ScreeningError};
    pub use crate::explanations::explain;
    pub use crate::pipeline::{
        Action, ActionOutcome, ArtifactBundle, ArtifactStore, Pipeline, PipelineConfig, ScreeningService,
    };
    pub use crate::preprocessing::{ColumnSchema, DatasetLayout, PatientRecord, Sex};
    pub use crate::training::{LinearSvc, SvmConfig};
}

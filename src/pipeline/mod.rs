//! Screening pipeline orchestration
//!
//! Training runs encoder -> SMOTE -> scaler -> classifier. Inference runs
//! encoder -> scaler -> classifier -> label codec against a fixed
//! [`ArtifactBundle`].

mod bundle;
mod config;
mod service;

pub use bundle::{
    ArtifactBundle, ArtifactStore, BundleManifest, CLASSIFIER_FILE, COLUMNS_FILE, DEFAULT_RETENTION,
    LABEL_CODEC_FILE, MANIFEST_FILE, SCALER_FILE,
};
pub use config::PipelineConfig;
pub use service::{Action, ActionOutcome, PipelineState, ScreeningService};

use crate::data::RawTable;
use crate::error::{Result, ScreeningError};
use crate::preprocessing::{
    ColumnSchema, DatasetLayout, FeatureEncoder, LabelCodec, PatientRecord, ScalerState,
};
use crate::synthetic::{class_counts, Sampler, SMOTE};
use crate::training::{
    accuracy, label_distribution, ClassificationReport, ConfusionMatrix, LinearSvc,
};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Outcome of a training run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainMetrics {
    /// Accuracy on the original rows, rebalanced rows excluded
    pub accuracy: f64,
    pub report: ClassificationReport,
    /// Rows per diagnosis category in the uploaded table
    pub class_distribution: BTreeMap<String, usize>,
    /// Synthetic rows generated per category
    pub n_synthetic: BTreeMap<String, usize>,
    pub rebalanced: bool,
    pub n_rows: usize,
    pub training_time_secs: f64,
    pub warnings: Vec<String>,
}

/// Comparison of predictions against known diagnoses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalMetrics {
    pub accuracy: f64,
    pub total: usize,
    pub correct: usize,
    pub incorrect: usize,
    pub confusion_matrix: ConfusionMatrix,
}

impl EvalMetrics {
    fn from_ids(truth: &[usize], predicted: &[usize], classes: &[String]) -> Self {
        let confusion_matrix = ConfusionMatrix::from_predictions(truth, predicted, classes);
        let total = truth.len();
        let correct = confusion_matrix.correct();
        Self {
            accuracy: accuracy(truth, predicted),
            total,
            correct,
            incorrect: total - correct,
            confusion_matrix,
        }
    }
}

/// A single diagnosis with its class probabilities
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub label: String,
    /// Probability of `label`
    pub confidence: f64,
    /// Probability per category; sums to 1
    pub probabilities: BTreeMap<String, f64>,
}

/// One predicted table row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionRow {
    pub row: usize,
    pub record: PatientRecord,
    pub prediction: Prediction,
}

/// Result of predicting a whole table
#[derive(Debug, Clone, Serialize)]
pub struct BatchPrediction {
    pub rows: Vec<PredictionRow>,
    /// Input table with the predicted category appended
    pub table: RawTable,
    /// Present when the table carried the diagnosis column
    pub evaluation: Option<EvalMetrics>,
    /// Predicted category frequencies
    pub distribution: BTreeMap<String, usize>,
    pub warnings: Vec<String>,
}

/// Stateless orchestrator over a configuration
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PipelineConfig,
    encoder: FeatureEncoder,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        let encoder = FeatureEncoder::new(config.layout.clone());
        Self { config, encoder }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn layout(&self) -> &DatasetLayout {
        &self.config.layout
    }

    pub fn encoder(&self) -> &FeatureEncoder {
        &self.encoder
    }

    /// Fit a new bundle from a labelled table
    pub fn train(&self, table: &RawTable, use_rebalancing: bool) -> Result<(ArtifactBundle, TrainMetrics)> {
        let start = Instant::now();
        if table.is_empty() {
            return Err(ScreeningError::InvalidInput("training table has no rows".to_string()));
        }

        let schema = ColumnSchema::from_training_columns(table.columns(), self.layout())?;
        let labels = ground_truth(table, &self.layout().target_column)?;
        let codec = LabelCodec::fit(&labels)?;

        let (records, report) = self.encoder.parse_table(table, &schema)?;
        let mut warnings = report.warnings();
        let x = self.encoder.encode_batch(&records, &schema);
        let y = codec.encode_all(&labels)?;

        info!(
            rows = records.len(),
            features = schema.len(),
            classes = codec.n_classes(),
            "Training screening model"
        );

        let (x_train, y_train, synthetic, rebalanced) = if use_rebalancing {
            self.rebalance(&x, &y, &mut warnings)?
        } else {
            (x.clone(), y.clone(), BTreeMap::new(), false)
        };

        let scaler = ScalerState::fit(&x_train)?;
        let mut classifier = LinearSvc::new(self.config.svm.clone());
        classifier.fit(&scaler.apply(&x_train)?, &y_train)?;

        // Accuracy is measured on the original rows only
        let predicted = classifier.predict(&scaler.apply(&x)?)?;
        let truth = y.to_vec();
        let confusion = ConfusionMatrix::from_predictions(&truth, &predicted, codec.classes());
        let class_report = ClassificationReport::from_confusion(&confusion);
        let train_accuracy = accuracy(&truth, &predicted);

        let n_synthetic = synthetic
            .into_iter()
            .map(|(id, n)| -> Result<(String, usize)> { Ok((codec.decode(id)?.to_string(), n)) })
            .collect::<Result<BTreeMap<_, _>>>()?;

        for w in &warnings {
            warn!("{}", w);
        }

        let metrics = TrainMetrics {
            accuracy: train_accuracy,
            report: class_report,
            class_distribution: label_distribution(&labels),
            n_synthetic,
            rebalanced,
            n_rows: records.len(),
            training_time_secs: start.elapsed().as_secs_f64(),
            warnings,
        };

        let bundle = ArtifactBundle::new(
            classifier,
            codec,
            scaler,
            schema,
            self.layout().clone(),
            records.len(),
            train_accuracy,
            rebalanced,
        )?;

        info!(
            id = %bundle.id(),
            accuracy = train_accuracy,
            rebalanced,
            elapsed_secs = metrics.training_time_secs,
            "Training complete"
        );
        Ok((bundle, metrics))
    }

    /// SMOTE on the encoded rows; a single-class table continues unbalanced
    #[allow(clippy::type_complexity)]
    fn rebalance(
        &self,
        x: &Array2<f64>,
        y: &Array1<usize>,
        warnings: &mut Vec<String>,
    ) -> Result<(Array2<f64>, Array1<usize>, BTreeMap<usize, usize>, bool)> {
        let mut smote = SMOTE::new()
            .with_k_neighbors(self.config.k_neighbors)
            .with_seed(self.config.seed);

        match smote.fit_resample(x, y) {
            Ok(result) => {
                debug!(
                    before = ?class_counts(y),
                    after = ?class_counts(&result.y),
                    "Rebalanced training set"
                );
                Ok((result.x, result.y, result.n_synthetic, true))
            }
            Err(ScreeningError::InsufficientClasses { found }) => {
                warnings.push(format!(
                    "rebalancing skipped: only {} diagnosis category present",
                    found
                ));
                Ok((x.clone(), y.clone(), BTreeMap::new(), false))
            }
            Err(e) => Err(e),
        }
    }

    /// Compare the bundle's predictions with the table's diagnosis column.
    ///
    /// Like every inference entry point, cells are read with the layout stored
    /// in the bundle, not the one this pipeline was configured with.
    pub fn evaluate(&self, table: &RawTable, bundle: &ArtifactBundle) -> Result<EvalMetrics> {
        let labels = ground_truth(table, &bundle.layout().target_column)?;
        let truth = bundle.label_codec.encode_all(&labels)?.to_vec();

        let (records, _) = bundle.encoder().parse_table(table, &bundle.schema)?;
        let (predicted, _) = self.predict_records(&records, bundle)?;

        let metrics = EvalMetrics::from_ids(&truth, &predicted, bundle.label_codec.classes());
        info!(
            total = metrics.total,
            correct = metrics.correct,
            accuracy = metrics.accuracy,
            "Evaluation complete"
        );
        Ok(metrics)
    }

    /// Predict every row of a table; evaluates too when diagnoses are present
    pub fn predict_batch(&self, table: &RawTable, bundle: &ArtifactBundle) -> Result<BatchPrediction> {
        let layout = bundle.layout();
        let (records, report) = bundle.encoder().parse_table(table, &bundle.schema)?;
        let warnings = report.warnings();
        for w in &warnings {
            warn!("{}", w);
        }

        let (predicted, proba) = self.predict_records(&records, bundle)?;

        let mut rows = Vec::with_capacity(records.len());
        for (i, record) in records.into_iter().enumerate() {
            let prediction = Self::to_prediction(predicted[i], proba.row(i).to_vec(), bundle)?;
            rows.push(PredictionRow {
                row: i,
                record,
                prediction,
            });
        }

        let predicted_labels: Vec<String> = rows.iter().map(|r| r.prediction.label.clone()).collect();
        let distribution = label_distribution(&predicted_labels);

        let evaluation = if table.has_column(&layout.target_column) {
            let labels = ground_truth(table, &layout.target_column)?;
            let truth = bundle.label_codec.encode_all(&labels)?.to_vec();
            Some(EvalMetrics::from_ids(&truth, &predicted, bundle.label_codec.classes()))
        } else {
            None
        };

        let table = table.with_column(layout.prediction_column.clone(), predicted_labels)?;

        info!(
            rows = rows.len(),
            evaluated = evaluation.is_some(),
            "Batch prediction complete"
        );
        Ok(BatchPrediction {
            rows,
            table,
            evaluation,
            distribution,
            warnings,
        })
    }

    /// Predict a single manually entered record.
    ///
    /// A symptom marked present that the model was not trained on is an
    /// `InvalidRecord`, so a mistyped name is reported instead of ignored.
    pub fn predict_one(&self, record: &PatientRecord, bundle: &ArtifactBundle) -> Result<Prediction> {
        let unknown: Vec<&str> = record
            .present_symptoms()
            .filter(|name| !bundle.schema.symptoms().iter().any(|s| s == name))
            .collect();
        if !unknown.is_empty() {
            return Err(ScreeningError::InvalidRecord {
                row: 0,
                reason: format!(
                    "unknown symptom(s) [{}]; the model knows [{}]",
                    unknown.join(", "),
                    bundle.schema.symptoms().join(", ")
                ),
            });
        }

        let (predicted, proba) = self.predict_records(std::slice::from_ref(record), bundle)?;
        let prediction = Self::to_prediction(predicted[0], proba.row(0).to_vec(), bundle)?;
        debug!(label = %prediction.label, confidence = prediction.confidence, "Single prediction");
        Ok(prediction)
    }

    fn predict_records(
        &self,
        records: &[PatientRecord],
        bundle: &ArtifactBundle,
    ) -> Result<(Vec<usize>, Array2<f64>)> {
        let x = bundle.encoder().encode_batch(records, &bundle.schema);
        let scaled = bundle.scaler.apply(&x)?;
        let predicted = bundle.classifier.predict(&scaled)?;
        let proba = bundle.classifier.predict_proba(&scaled)?;
        Ok((predicted, proba))
    }

    fn to_prediction(class_id: usize, proba: Vec<f64>, bundle: &ArtifactBundle) -> Result<Prediction> {
        let label = bundle.label_codec.decode(class_id)?.to_string();
        let confidence = proba.get(class_id).copied().unwrap_or(0.0);
        let probabilities = proba
            .into_iter()
            .enumerate()
            .map(|(id, p)| -> Result<(String, f64)> { Ok((bundle.label_codec.decode(id)?.to_string(), p)) })
            .collect::<Result<BTreeMap<_, _>>>()?;
        Ok(Prediction {
            label,
            confidence,
            probabilities,
        })
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new(PipelineConfig::default())
    }
}

/// Non-blank diagnosis labels of the `target` column
fn ground_truth(table: &RawTable, target: &str) -> Result<Vec<String>> {
    let values = table
        .column_values(target)
        .ok_or_else(|| ScreeningError::SchemaMismatch {
            missing: vec![target.to_string()],
        })?;

    values
        .into_iter()
        .enumerate()
        .map(|(row, v)| match v.map(str::trim).filter(|s| !s.is_empty()) {
            Some(label) => Ok(label.to_string()),
            None => Err(ScreeningError::InvalidRecord {
                row,
                reason: format!("missing value in '{}'", target),
            }),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn training_table() -> RawTable {
        RawTable::from_strs(
            &["JK", "Umur", "Demam", "Ikterus", "Kategori Diagnosis"],
            &[
                &["L", "40", "ya", "ya", "Hepatitis Akut"],
                &["L", "35", "ya", "ya", "Hepatitis Akut"],
                &["P", "30", "ya", "ya", "Hepatitis Akut"],
                &["L", "28", "ya", "tidak", "Hepatitis Akut"],
                &["P", "55", "tidak", "tidak", "Hepatitis Kronis"],
                &["P", "60", "tidak", "tidak", "Hepatitis Kronis"],
                &["L", "65", "tidak", "ya", "Hepatitis Kronis"],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_train_reports_metrics() {
        let pipeline = Pipeline::default();
        let (bundle, metrics) = pipeline.train(&training_table(), true).unwrap();

        assert_eq!(bundle.schema.columns(), &["JK", "Umur", "Demam", "Ikterus"]);
        assert_eq!(metrics.class_distribution["Hepatitis Akut"], 4);
        assert_eq!(metrics.n_synthetic["Hepatitis Kronis"], 1);
        assert_eq!(metrics.n_synthetic["Hepatitis Akut"], 0);
        assert!(metrics.rebalanced);
        assert_eq!(metrics.n_rows, 7);
        assert_eq!(metrics.report.classes.len(), 2);
        assert!((0.0..=1.0).contains(&metrics.accuracy));
        assert_eq!(bundle.manifest.training_accuracy, metrics.accuracy);
    }

    #[test]
    fn test_single_class_downgrades_rebalancing_then_fails() {
        let table = RawTable::from_strs(
            &["JK", "Umur", "Demam", "Kategori Diagnosis"],
            &[&["L", "40", "ya", "A"], &["P", "50", "tidak", "A"]],
        )
        .unwrap();
        let err = Pipeline::default().train(&table, true).unwrap_err();
        assert!(matches!(err, ScreeningError::InsufficientClasses { found: 1 }));
    }

    #[test]
    fn test_missing_target_column_is_fatal() {
        let table = RawTable::from_strs(&["JK", "Umur", "Demam"], &[&["L", "40", "ya"]]).unwrap();
        let err = Pipeline::default().train(&table, false).unwrap_err();
        assert!(matches!(err, ScreeningError::SchemaMismatch { .. }));
    }

    #[test]
    fn test_predict_batch_appends_prediction_column() {
        let pipeline = Pipeline::default();
        let (bundle, _) = pipeline.train(&training_table(), false).unwrap();

        let input = RawTable::from_strs(&["JK", "Umur", "Demam"], &[&["L", "41", "ya"], &["P", "58", "tidak"]])
            .unwrap();
        let batch = pipeline.predict_batch(&input, &bundle).unwrap();

        assert_eq!(batch.rows.len(), 2);
        assert!(batch.evaluation.is_none());
        assert_eq!(batch.distribution.values().sum::<usize>(), 2);
        assert_eq!(batch.table.columns().last().map(String::as_str), Some("Prediksi"));
        assert!(batch.warnings.iter().any(|w| w.contains("Ikterus")));
    }

    #[test]
    fn test_blank_diagnosis_is_invalid_record() {
        let table = RawTable::from_strs(
            &["JK", "Umur", "Kategori Diagnosis"],
            &[&["L", "40", "A"], &["P", "50", ""]],
        )
        .unwrap();
        let err = Pipeline::default().train(&table, false).unwrap_err();
        assert!(matches!(err, ScreeningError::InvalidRecord { row: 1, .. }));
    }

    #[test]
    fn test_predict_one_rejects_unknown_present_symptom() {
        let pipeline = Pipeline::default();
        let (bundle, _) = pipeline.train(&training_table(), false).unwrap();

        let typo = PatientRecord::new(
            Some(crate::preprocessing::Sex::Male),
            40,
            BTreeMap::from([("demam".to_string(), true), ("Ikterus".to_string(), true)]),
        )
        .unwrap();
        match pipeline.predict_one(&typo, &bundle).unwrap_err() {
            ScreeningError::InvalidRecord { reason, .. } => {
                assert!(reason.starts_with("unknown symptom(s) [demam];"), "{}", reason);
            }
            other => panic!("unexpected error {:?}", other),
        }

        // Unknown names left unchecked carry no information and are accepted
        let unchecked = PatientRecord::new(
            None,
            40,
            BTreeMap::from([("Menggigil".to_string(), false), ("Demam".to_string(), true)]),
        )
        .unwrap();
        assert!(pipeline.predict_one(&unchecked, &bundle).is_ok());
    }

    #[test]
    fn test_inference_reads_cells_with_trained_layout() {
        let english = Pipeline::new(PipelineConfig::default().with_layout(DatasetLayout::english()));
        let table = RawTable::from_strs(
            &["Sex", "Age", "fever", "DiagnosisCategory"],
            &[
                &["M", "40", "yes", "A"],
                &["M", "42", "yes", "A"],
                &["F", "41", "no", "B"],
                &["F", "43", "no", "B"],
            ],
        )
        .unwrap();
        let (bundle, _) = english.train(&table, false).unwrap();
        assert_eq!(bundle.layout(), &DatasetLayout::english());

        let input = RawTable::from_strs(&["Sex", "Age", "fever"], &[&["M", "41", "yes"]]).unwrap();
        let same = english.predict_batch(&input, &bundle).unwrap();
        let other = Pipeline::default().predict_batch(&input, &bundle).unwrap();

        assert_eq!(other.rows[0].record.symptoms.get("fever"), Some(&true));
        assert_eq!(other.rows[0].prediction, same.rows[0].prediction);
        assert!(other.warnings.is_empty());
        assert_eq!(other.table.columns().last().map(String::as_str), Some("Prediction"));

        let eval = Pipeline::default().evaluate(&table, &bundle).unwrap();
        assert_eq!(eval.total, 4);
    }
}

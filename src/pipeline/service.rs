//! Stateful screening service
//!
//! Owns the active [`ArtifactBundle`] and the store it is persisted in. The
//! caller serializes access; every action runs to completion before the next.

use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use super::{
    ArtifactBundle, ArtifactStore, BatchPrediction, EvalMetrics, Pipeline, PipelineConfig,
    Prediction, TrainMetrics, CLASSIFIER_FILE, COLUMNS_FILE, LABEL_CODEC_FILE, SCALER_FILE,
};
use crate::data::RawTable;
use crate::error::{Result, ScreeningError};
use crate::preprocessing::PatientRecord;

/// Lifecycle of the service
#[derive(Debug, Clone)]
pub enum PipelineState {
    /// No bundle trained or loaded yet
    Uninitialized,
    Trained(Arc<ArtifactBundle>),
}

impl PipelineState {
    pub fn is_trained(&self) -> bool {
        matches!(self, PipelineState::Trained(_))
    }
}

/// A user request
#[derive(Debug, Clone)]
pub enum Action {
    Train { table: RawTable, use_rebalancing: bool },
    Evaluate { table: RawTable },
    PredictBatch { table: RawTable },
    PredictOne { record: PatientRecord },
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::Train { .. } => "train",
            Action::Evaluate { .. } => "evaluate",
            Action::PredictBatch { .. } => "predict_batch",
            Action::PredictOne { .. } => "predict_one",
        }
    }
}

/// Result of a dispatched [`Action`]
#[derive(Debug, Clone)]
pub enum ActionOutcome {
    Trained(TrainMetrics),
    Evaluated(EvalMetrics),
    Batch(BatchPrediction),
    Single(Prediction),
}

/// Pipeline plus the active bundle and its store
#[derive(Debug)]
pub struct ScreeningService {
    pipeline: Pipeline,
    store: ArtifactStore,
    state: PipelineState,
}

impl ScreeningService {
    /// Open the store at `models_dir` and load its current bundle, if any
    pub fn open(config: PipelineConfig, models_dir: impl Into<PathBuf>) -> Self {
        let store = ArtifactStore::new(models_dir);
        let state = match store.load_current() {
            Ok(bundle) => {
                info!(id = %bundle.id(), classes = ?bundle.label_codec.classes(), "Loaded current model");
                PipelineState::Trained(Arc::new(bundle))
            }
            Err(ScreeningError::ArtifactsNotReady { missing }) => {
                info!(?missing, "No trained model found; train one before predicting");
                PipelineState::Uninitialized
            }
            Err(e) => {
                warn!(error = %e, "Current model could not be loaded; starting untrained");
                PipelineState::Uninitialized
            }
        };

        Self {
            pipeline: Pipeline::new(config),
            store,
            state,
        }
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    /// The active bundle, or `ArtifactsNotReady` before the first training
    pub fn bundle(&self) -> Result<Arc<ArtifactBundle>> {
        match &self.state {
            PipelineState::Trained(bundle) => Ok(Arc::clone(bundle)),
            PipelineState::Uninitialized => Err(ScreeningError::ArtifactsNotReady {
                missing: [CLASSIFIER_FILE, LABEL_CODEC_FILE, SCALER_FILE, COLUMNS_FILE]
                    .iter()
                    .map(|f| f.to_string())
                    .collect(),
            }),
        }
    }

    /// Train, persist, and only then swap in the new bundle
    pub fn train(&mut self, table: &RawTable, use_rebalancing: bool) -> Result<TrainMetrics> {
        let (bundle, metrics) = self.pipeline.train(table, use_rebalancing)?;
        self.store.save(&bundle)?;
        self.state = PipelineState::Trained(Arc::new(bundle));
        Ok(metrics)
    }

    pub fn evaluate(&self, table: &RawTable) -> Result<EvalMetrics> {
        let bundle = self.bundle()?;
        self.pipeline.evaluate(table, &bundle)
    }

    pub fn predict_batch(&self, table: &RawTable) -> Result<BatchPrediction> {
        let bundle = self.bundle()?;
        self.pipeline.predict_batch(table, &bundle)
    }

    pub fn predict_one(&self, record: &PatientRecord) -> Result<Prediction> {
        let bundle = self.bundle()?;
        self.pipeline.predict_one(record, &bundle)
    }

    /// Run one action to completion
    pub fn dispatch(&mut self, action: Action) -> Result<ActionOutcome> {
        let name = action.name();
        let outcome = match action {
            Action::Train { table, use_rebalancing } => {
                self.train(&table, use_rebalancing).map(ActionOutcome::Trained)
            }
            Action::Evaluate { table } => self.evaluate(&table).map(ActionOutcome::Evaluated),
            Action::PredictBatch { table } => self.predict_batch(&table).map(ActionOutcome::Batch),
            Action::PredictOne { record } => self.predict_one(&record).map(ActionOutcome::Single),
        };
        if let Err(e) = &outcome {
            warn!(action = name, kind = e.kind(), error = %e, "Action failed");
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_untrained_service_blocks_prediction() {
        let dir = tempfile::tempdir().unwrap();
        let service = ScreeningService::open(PipelineConfig::default(), dir.path());
        assert!(!service.state().is_trained());

        let record = PatientRecord::new(None, 30, BTreeMap::new()).unwrap();
        let err = service.predict_one(&record).unwrap_err();
        assert!(matches!(err, ScreeningError::ArtifactsNotReady { .. }));
    }

    #[test]
    fn test_dispatch_train_then_predict() {
        let dir = tempfile::tempdir().unwrap();
        let mut service = ScreeningService::open(PipelineConfig::default(), dir.path());
        let table = RawTable::from_strs(
            &["JK", "Umur", "Demam", "Kategori Diagnosis"],
            &[
                &["L", "40", "ya", "A"],
                &["L", "42", "ya", "A"],
                &["P", "60", "tidak", "B"],
                &["P", "62", "tidak", "B"],
            ],
        )
        .unwrap();

        let outcome = service
            .dispatch(Action::Train { table, use_rebalancing: true })
            .unwrap();
        assert!(matches!(outcome, ActionOutcome::Trained(_)));
        assert!(service.state().is_trained());

        let record = PatientRecord::new(None, 41, BTreeMap::from([("Demam".to_string(), true)])).unwrap();
        match service.dispatch(Action::PredictOne { record }).unwrap() {
            ActionOutcome::Single(p) => assert!(p.label == "A" || p.label == "B"),
            other => panic!("unexpected outcome {:?}", other),
        }

        // A fresh service picks the published bundle up from disk
        let reopened = ScreeningService::open(PipelineConfig::default(), dir.path());
        assert_eq!(reopened.bundle().unwrap().id(), service.bundle().unwrap().id());
    }

    #[test]
    fn test_failed_training_keeps_previous_bundle() {
        let dir = tempfile::tempdir().unwrap();
        let mut service = ScreeningService::open(PipelineConfig::default(), dir.path());
        let table = RawTable::from_strs(
            &["JK", "Umur", "Demam", "Kategori Diagnosis"],
            &[
                &["L", "40", "ya", "A"],
                &["L", "42", "ya", "A"],
                &["P", "60", "tidak", "B"],
                &["P", "62", "tidak", "B"],
            ],
        )
        .unwrap();
        service.train(&table, true).unwrap();

        let before_id = service.store().current_id().unwrap().unwrap();
        let classifier_path = service.store().bundle_dir(&before_id).join(CLASSIFIER_FILE);
        let classifier_before = std::fs::read(&classifier_path).unwrap();

        let single_class = RawTable::from_strs(
            &["JK", "Umur", "Demam", "Kategori Diagnosis"],
            &[&["L", "40", "ya", "A"], &["P", "50", "tidak", "A"]],
        )
        .unwrap();
        let err = service.train(&single_class, true).unwrap_err();
        assert!(matches!(err, ScreeningError::InsufficientClasses { found: 1 }));

        assert_eq!(service.store().current_id().unwrap().unwrap(), before_id);
        assert_eq!(service.bundle().unwrap().id(), before_id);
        assert_eq!(std::fs::read(&classifier_path).unwrap(), classifier_before);
        assert_eq!(service.store().list().unwrap(), vec![before_id.clone()]);

        let reopened = ScreeningService::open(PipelineConfig::default(), dir.path());
        assert_eq!(reopened.bundle().unwrap().id(), before_id);
    }
}

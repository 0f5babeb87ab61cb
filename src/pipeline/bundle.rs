//! Artifact bundle and its on-disk store
//!
//! A bundle is written as independent JSON files inside
//! `<root>/bundles/<id>/`. Files are first written to `<id>.tmp` and the
//! directory is renamed once complete. The active bundle is named by the
//! `CURRENT` file in the store root, which is only replaced (by rename) after
//! that. Bundles older than the retention count are pruned after publishing.

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{Result, ScreeningError};
use crate::preprocessing::{ColumnSchema, DatasetLayout, FeatureEncoder, LabelCodec, ScalerState};
use crate::training::LinearSvc;

pub const CLASSIFIER_FILE: &str = "classifier.json";
pub const LABEL_CODEC_FILE: &str = "label_codec.json";
pub const SCALER_FILE: &str = "scaler.json";
pub const COLUMNS_FILE: &str = "columns.json";
pub const MANIFEST_FILE: &str = "manifest.json";

const CURRENT_FILE: &str = "CURRENT";
const BUNDLES_DIR: &str = "bundles";
const STAGING_SUFFIX: &str = ".tmp";

/// Bundles kept on disk by default, the current one included
pub const DEFAULT_RETENTION: usize = 5;

/// Descriptive metadata stored next to the artifacts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleManifest {
    pub id: String,
    pub created_at: DateTime<Utc>,
    /// Rows in the uploaded training table
    pub n_rows: usize,
    /// Accuracy on the original (non-synthetic) training rows
    pub training_accuracy: f64,
    pub rebalanced: bool,
    pub classes: Vec<String>,
    pub columns: Vec<String>,
    /// Tokens and column names the model was trained with; inference reads
    /// cells with these, whatever layout the process was started with
    pub layout: DatasetLayout,
}

/// Everything inference needs, replaced as a whole on retraining
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactBundle {
    pub classifier: LinearSvc,
    pub label_codec: LabelCodec,
    pub scaler: ScalerState,
    pub schema: ColumnSchema,
    pub manifest: BundleManifest,
}

impl ArtifactBundle {
    /// Assemble a bundle, checking that the parts agree on shape
    pub fn new(
        classifier: LinearSvc,
        label_codec: LabelCodec,
        scaler: ScalerState,
        schema: ColumnSchema,
        layout: DatasetLayout,
        n_rows: usize,
        training_accuracy: f64,
        rebalanced: bool,
    ) -> Result<Self> {
        let manifest = BundleManifest {
            id: Uuid::new_v4().to_string(),
            created_at: Utc::now(),
            n_rows,
            training_accuracy,
            rebalanced,
            classes: label_codec.classes().to_vec(),
            columns: schema.columns().to_vec(),
            layout,
        };
        let bundle = Self {
            classifier,
            label_codec,
            scaler,
            schema,
            manifest,
        };
        bundle.validate()?;
        Ok(bundle)
    }

    /// Check the artifacts were produced by the same training run
    pub fn validate(&self) -> Result<()> {
        let width = self.schema.len();
        if self.scaler.n_features() != width || self.classifier.n_features() != width {
            return Err(ScreeningError::ShapeError {
                expected: format!("{} features", width),
                actual: format!(
                    "scaler {} / classifier {}",
                    self.scaler.n_features(),
                    self.classifier.n_features()
                ),
            });
        }
        let expected: Vec<usize> = (0..self.label_codec.n_classes()).collect();
        if self.classifier.classes() != expected.as_slice() {
            return Err(ScreeningError::ShapeError {
                expected: format!("classes 0..{}", self.label_codec.n_classes()),
                actual: format!("{:?}", self.classifier.classes()),
            });
        }
        Ok(())
    }

    pub fn id(&self) -> &str {
        &self.manifest.id
    }

    pub fn layout(&self) -> &DatasetLayout {
        &self.manifest.layout
    }

    /// Encoder reading cells exactly as they were read during training
    pub fn encoder(&self) -> FeatureEncoder {
        FeatureEncoder::new(self.manifest.layout.clone())
    }
}

/// Directory-backed store of artifact bundles
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
    retention: usize,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            retention: DEFAULT_RETENTION,
        }
    }

    /// Builder method to set how many bundles survive pruning (at least 1)
    pub fn with_retention(mut self, keep: usize) -> Self {
        self.retention = keep.max(1);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding the files of bundle `id`
    pub fn bundle_dir(&self, id: &str) -> PathBuf {
        self.root.join(BUNDLES_DIR).join(id)
    }

    /// Id of the active bundle, if one has been published
    pub fn current_id(&self) -> Result<Option<String>> {
        let path = self.root.join(CURRENT_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let id = fs::read_to_string(&path)?.trim().to_string();
        Ok(if id.is_empty() { None } else { Some(id) })
    }

    /// Write every artifact of `bundle`, then publish it as current
    pub fn save(&self, bundle: &ArtifactBundle) -> Result<PathBuf> {
        let dir = self.bundle_dir(bundle.id());
        let staging = self
            .root
            .join(BUNDLES_DIR)
            .join(format!("{}{}", bundle.id(), STAGING_SUFFIX));

        let written = write_bundle_files(&staging, bundle)
            .and_then(|_| fs::rename(&staging, &dir).map_err(ScreeningError::from));
        if let Err(e) = written {
            if let Err(cleanup) = fs::remove_dir_all(&staging) {
                debug!(path = %staging.display(), error = %cleanup, "Staging directory not removed");
            }
            return Err(e);
        }

        let tmp = self.root.join(format!("{}{}", CURRENT_FILE, STAGING_SUFFIX));
        {
            let mut file = File::create(&tmp)?;
            file.write_all(bundle.id().as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&tmp, self.root.join(CURRENT_FILE))?;

        info!(id = %bundle.id(), path = %dir.display(), "Published artifact bundle");

        // The new bundle is already live; a failed prune only leaves extra files
        match self.prune() {
            Ok(removed) if !removed.is_empty() => info!(?removed, "Pruned old artifact bundles"),
            Ok(_) => {}
            Err(e) => warn!(error = %e, "Pruning old artifact bundles failed"),
        }
        Ok(dir)
    }

    /// Delete all but the newest `retention` bundles; never the current one.
    ///
    /// Bundles whose manifest cannot be read count as oldest. Returns the
    /// removed ids.
    pub fn prune(&self) -> Result<Vec<String>> {
        let current = self.current_id()?;
        let mut bundles: Vec<(Option<DateTime<Utc>>, String)> = self
            .list()?
            .into_iter()
            .map(|id| {
                let created = read_json::<BundleManifest>(&self.bundle_dir(&id).join(MANIFEST_FILE))
                    .ok()
                    .map(|m| m.created_at);
                (created, id)
            })
            .collect();
        // Newest first
        bundles.sort_by(|a, b| b.cmp(a));

        let mut kept = usize::from(current.is_some());
        let mut removed = Vec::new();
        for (_, id) in bundles {
            if current.as_deref() == Some(id.as_str()) {
                continue;
            }
            if kept < self.retention {
                kept += 1;
                continue;
            }
            fs::remove_dir_all(self.bundle_dir(&id))?;
            removed.push(id);
        }
        Ok(removed)
    }

    /// Load the active bundle
    pub fn load_current(&self) -> Result<ArtifactBundle> {
        match self.current_id()? {
            Some(id) => self.load(&id),
            None => Err(ScreeningError::ArtifactsNotReady {
                missing: artifact_files().iter().map(|f| f.to_string()).collect(),
            }),
        }
    }

    /// Load bundle `id`; any missing artifact file yields `ArtifactsNotReady`
    pub fn load(&self, id: &str) -> Result<ArtifactBundle> {
        let dir = self.bundle_dir(id);
        let missing: Vec<String> = artifact_files()
            .iter()
            .filter(|f| !dir.join(f).is_file())
            .map(|f| f.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(ScreeningError::ArtifactsNotReady { missing });
        }

        let bundle = ArtifactBundle {
            classifier: read_json(&dir.join(CLASSIFIER_FILE))?,
            label_codec: read_json(&dir.join(LABEL_CODEC_FILE))?,
            scaler: read_json(&dir.join(SCALER_FILE))?,
            schema: read_json(&dir.join(COLUMNS_FILE))?,
            manifest: read_json(&dir.join(MANIFEST_FILE))?,
        };
        bundle.validate()?;

        debug!(id, "Loaded artifact bundle");
        Ok(bundle)
    }

    /// Ids of every bundle directory in the store
    pub fn list(&self) -> Result<Vec<String>> {
        let dir = self.root.join(BUNDLES_DIR);
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut ids = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if entry.file_type()?.is_dir() && !name.ends_with(STAGING_SUFFIX) {
                ids.push(name);
            }
        }
        ids.sort();
        Ok(ids)
    }
}

fn artifact_files() -> [&'static str; 5] {
    [CLASSIFIER_FILE, LABEL_CODEC_FILE, SCALER_FILE, COLUMNS_FILE, MANIFEST_FILE]
}

fn write_bundle_files(dir: &Path, bundle: &ArtifactBundle) -> Result<()> {
    fs::create_dir_all(dir)?;
    write_json(&dir.join(CLASSIFIER_FILE), &bundle.classifier)?;
    write_json(&dir.join(LABEL_CODEC_FILE), &bundle.label_codec)?;
    write_json(&dir.join(SCALER_FILE), &bundle.scaler)?;
    write_json(&dir.join(COLUMNS_FILE), &bundle.schema)?;
    write_json(&dir.join(MANIFEST_FILE), &bundle.manifest)?;
    Ok(())
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.flush()?;
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path)?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}

//! HTTP request handlers

use std::collections::BTreeMap;
use std::sync::Arc;
use axum::{
    body::Bytes,
    extract::{Multipart, State},
    response::Html,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::data::RawTable;
use crate::error::ScreeningError;
use crate::explanations::{explain, Explanation};
use crate::pipeline::{BatchPrediction, BundleManifest, EvalMetrics, Prediction, TrainMetrics};
use crate::preprocessing::{PatientRecord, Sex, DEFAULT_SYMPTOMS, MAX_AGE};

use super::error::{Result, ServerError};
use super::state::AppState;

// ============================================================================
// Uploads
// ============================================================================

/// A multipart upload: the file plus any plain form fields
struct Upload {
    file_name: String,
    bytes: Bytes,
    fields: BTreeMap<String, String>,
}

impl Upload {
    /// Boolean form field; checkbox-style values count as true
    fn flag(&self, name: &str, default: bool) -> bool {
        match self.fields.get(name).map(|v| v.trim().to_lowercase()) {
            Some(v) => matches!(v.as_str(), "true" | "1" | "on" | "yes" | "ya"),
            None => default,
        }
    }
}

async fn read_upload(mut multipart: Multipart) -> Result<Upload> {
    let mut file = None;
    let mut fields = BTreeMap::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::BadRequest(e.to_string()))?
    {
        let name = field.name().unwrap_or("file").to_string();
        match field.file_name().map(str::to_string) {
            Some(file_name) => {
                let bytes = field.bytes().await.map_err(|e| ServerError::BadRequest(e.to_string()))?;
                info!(file = %file_name, bytes = bytes.len(), "Received upload");
                file = Some((file_name, bytes));
            }
            None => {
                let value = field.text().await.map_err(|e| ServerError::BadRequest(e.to_string()))?;
                fields.insert(name, value);
            }
        }
    }

    let (file_name, bytes) = file.ok_or_else(|| ServerError::BadRequest("No file uploaded".to_string()))?;
    Ok(Upload {
        file_name,
        bytes,
        fields,
    })
}

/// Parse the upload on the blocking pool
async fn parse_table(state: &Arc<AppState>, upload: &Upload) -> Result<RawTable> {
    let state = Arc::clone(state);
    let file_name = upload.file_name.clone();
    let bytes = upload.bytes.clone();
    let table = tokio::task::spawn_blocking(move || state.loader.load_bytes(&file_name, &bytes))
        .await
        .map_err(|e| ServerError::Internal(format!("parser task failed: {}", e)))??;
    Ok(table)
}

// ============================================================================
// Model
// ============================================================================

#[derive(Serialize)]
pub struct ModelInfo {
    pub ready: bool,
    pub columns: Vec<String>,
    pub classes: Vec<String>,
    pub manifest: Option<BundleManifest>,
}

pub async fn model_info(State(state): State<Arc<AppState>>) -> Result<Json<ModelInfo>> {
    let info = state
        .with_service(|service| {
            Ok(match service.bundle() {
                Ok(bundle) => ModelInfo {
                    ready: true,
                    columns: bundle.schema.columns().to_vec(),
                    classes: bundle.label_codec.classes().to_vec(),
                    manifest: Some(bundle.manifest.clone()),
                },
                Err(_) => ModelInfo {
                    ready: false,
                    columns: Vec::new(),
                    classes: Vec::new(),
                    manifest: None,
                },
            })
        })
        .await?;
    Ok(Json(info))
}

#[derive(Serialize)]
pub struct SymptomFields {
    pub symptoms: Vec<String>,
    /// "model" when taken from the trained schema, "default" otherwise
    pub source: &'static str,
    pub max_age: u32,
}

pub async fn symptom_fields(State(state): State<Arc<AppState>>) -> Result<Json<SymptomFields>> {
    let fields = state
        .with_service(|service| {
            Ok(match service.bundle() {
                Ok(bundle) => SymptomFields {
                    symptoms: bundle.schema.symptoms().to_vec(),
                    source: "model",
                    max_age: MAX_AGE,
                },
                Err(_) => SymptomFields {
                    symptoms: DEFAULT_SYMPTOMS.iter().map(|s| s.to_string()).collect(),
                    source: "default",
                    max_age: MAX_AGE,
                },
            })
        })
        .await?;
    Ok(Json(fields))
}

// ============================================================================
// Actions
// ============================================================================

#[derive(Serialize)]
pub struct TrainResponse {
    pub success: bool,
    pub metrics: TrainMetrics,
    pub model: Option<BundleManifest>,
}

pub async fn train(State(state): State<Arc<AppState>>, multipart: Multipart) -> Result<Json<TrainResponse>> {
    let upload = read_upload(multipart).await?;
    let use_rebalancing = upload.flag("use_rebalancing", true);
    let table = parse_table(&state, &upload).await?;

    let (metrics, manifest) = state
        .with_service(move |service| {
            let metrics = service.train(&table, use_rebalancing)?;
            let manifest = service.bundle().ok().map(|b| b.manifest.clone());
            Ok((metrics, manifest))
        })
        .await?;

    Ok(Json(TrainResponse {
        success: true,
        metrics,
        model: manifest,
    }))
}

pub async fn evaluate(State(state): State<Arc<AppState>>, multipart: Multipart) -> Result<Json<EvalMetrics>> {
    let upload = read_upload(multipart).await?;
    let table = parse_table(&state, &upload).await?;
    let metrics = state.with_service(move |service| service.evaluate(&table)).await?;
    Ok(Json(metrics))
}

#[derive(Serialize)]
pub struct BatchResponse {
    #[serde(flatten)]
    pub batch: BatchPrediction,
    /// Explanation per predicted category that has one
    pub explanations: BTreeMap<String, &'static Explanation>,
}

pub async fn predict_batch(State(state): State<Arc<AppState>>, multipart: Multipart) -> Result<Json<BatchResponse>> {
    let upload = read_upload(multipart).await?;
    let table = parse_table(&state, &upload).await?;
    let batch = state.with_service(move |service| service.predict_batch(&table)).await?;

    let explanations = batch
        .distribution
        .keys()
        .filter_map(|label| explain(label).map(|e| (label.clone(), e)))
        .collect();

    Ok(Json(BatchResponse { batch, explanations }))
}

/// Manual form submission
#[derive(Debug, Deserialize)]
pub struct PredictRequest {
    pub sex: String,
    pub age: u32,
    /// Symptom name to presence; unlisted symptoms are absent
    #[serde(default)]
    pub symptoms: BTreeMap<String, bool>,
}

impl PredictRequest {
    fn into_record(self) -> std::result::Result<PatientRecord, ScreeningError> {
        let sex = Sex::from_token(&self.sex).ok_or_else(|| ScreeningError::InvalidRecord {
            row: 0,
            reason: format!("unrecognized sex '{}'", self.sex),
        })?;
        PatientRecord::new(Some(sex), self.age, self.symptoms)
    }
}

#[derive(Serialize)]
pub struct PredictResponse {
    pub prediction: Prediction,
    pub explanation: Option<&'static Explanation>,
}

pub async fn predict_one(
    State(state): State<Arc<AppState>>,
    Json(request): Json<PredictRequest>,
) -> Result<Json<PredictResponse>> {
    let record = request.into_record()?;
    let prediction = state.with_service(move |service| service.predict_one(&record)).await?;
    let explanation = explain(&prediction.label);
    Ok(Json(PredictResponse { prediction, explanation }))
}

// ============================================================================
// System
// ============================================================================

pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let uptime = chrono::Utc::now().signed_duration_since(state.started_at);
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": uptime.num_seconds(),
    }))
}

// ============================================================================
// UI Handler
// ============================================================================

pub async fn serve_index() -> Html<&'static str> {
    Html(EMBEDDED_INDEX_HTML)
}

const EMBEDDED_INDEX_HTML: &str = r#"<!DOCTYPE html>
<html lang="id">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Diagnosis Hepatitis</title>
    <script defer src="https://cdn.jsdelivr.net/npm/alpinejs@3.x.x/dist/cdn.min.js"></script>
    <script src="https://cdn.tailwindcss.com"></script>
    <style>[x-cloak]{display:none!important}.tab-active{background-color:rgb(59 130 246);color:white}</style>
</head>
<body class="bg-gray-900 text-gray-100 min-h-screen" x-data="app()" x-init="init()">
    <header class="bg-gray-800 border-b border-gray-700 px-6 py-4">
        <div class="flex items-center justify-between">
            <h1 class="text-xl font-bold">Sistem Diagnosis Hepatitis</h1>
            <span class="text-sm text-gray-400" x-text="model.ready ? 'Model siap: ' + model.classes.length + ' kategori' : 'Model belum dilatih'"></span>
        </div>
    </header>
    <nav class="bg-gray-800 px-6 py-2 border-b border-gray-700">
        <div class="flex space-x-1">
            <button @click="tab='home'" :class="tab==='home'?'tab-active':'hover:bg-gray-700'" class="px-4 py-2 rounded-md text-sm">Beranda</button>
            <button @click="tab='diagnosis'" :class="tab==='diagnosis'?'tab-active':'hover:bg-gray-700'" class="px-4 py-2 rounded-md text-sm">Diagnosis</button>
            <button @click="tab='train'" :class="tab==='train'?'tab-active':'hover:bg-gray-700'" class="px-4 py-2 rounded-md text-sm">Latih Model</button>
        </div>
    </nav>
    <main class="p-6 max-w-5xl mx-auto space-y-6">
        <div x-show="error" x-cloak class="bg-red-900 border border-red-700 rounded p-3 text-sm" x-text="error"></div>

        <section x-show="tab==='home'">
            <h2 class="text-lg font-semibold mb-2">Selamat datang</h2>
            <p class="text-gray-300">Aplikasi ini memprediksi kategori diagnosis penyakit hati berdasarkan jenis kelamin, umur, dan gejala pasien. Unggah data pasien atau isi formulir manual pada menu Diagnosis. Gunakan menu Latih Model untuk melatih ulang model dengan data baru.</p>
        </section>

        <section x-show="tab==='diagnosis'" x-cloak class="space-y-6">
            <div class="flex space-x-2">
                <button @click="mode='upload'" :class="mode==='upload'?'tab-active':'bg-gray-800'" class="px-3 py-1 rounded text-sm">Unggah File</button>
                <button @click="mode='manual'" :class="mode==='manual'?'tab-active':'bg-gray-800'" class="px-3 py-1 rounded text-sm">Input Manual</button>
            </div>

            <form x-show="mode==='upload'" @submit.prevent="predictBatch($event)" class="bg-gray-800 rounded p-4 space-y-3">
                <input type="file" name="file" accept=".xlsx,.xls,.csv,.json,.parquet" class="text-sm" required>
                <button class="bg-blue-600 px-4 py-2 rounded text-sm">Prediksi</button>
            </form>

            <form x-show="mode==='manual'" @submit.prevent="predictOne()" class="bg-gray-800 rounded p-4 space-y-3">
                <div class="flex space-x-4">
                    <label class="text-sm">Jenis Kelamin
                        <select x-model="form.sex" class="bg-gray-700 rounded ml-2 px-2 py-1">
                            <option value="L">Laki-laki</option>
                            <option value="P">Perempuan</option>
                        </select>
                    </label>
                    <label class="text-sm">Umur
                        <input type="number" min="0" :max="maxAge" x-model.number="form.age" class="bg-gray-700 rounded ml-2 px-2 py-1 w-20">
                    </label>
                </div>
                <div class="grid grid-cols-2 md:grid-cols-3 gap-2">
                    <template x-for="s in symptoms" :key="s">
                        <label class="text-sm"><input type="checkbox" x-model="form.symptoms[s]" class="mr-2"><span x-text="s"></span></label>
                    </template>
                </div>
                <button class="bg-blue-600 px-4 py-2 rounded text-sm">Prediksi</button>
            </form>

            <div x-show="single" x-cloak class="bg-gray-800 rounded p-4 space-y-2">
                <h3 class="font-semibold">Hasil: <span x-text="single && single.prediction.label"></span>
                    (<span x-text="single && (single.prediction.confidence*100).toFixed(1)"></span>%)</h3>
                <template x-if="single && single.explanation">
                    <div class="text-sm text-gray-300 space-y-1">
                        <p x-text="single.explanation.description"></p>
                        <p><strong>Tindakan:</strong> <span x-text="single.explanation.action"></span></p>
                    </div>
                </template>
            </div>

            <div x-show="batch" x-cloak class="bg-gray-800 rounded p-4 space-y-3 text-sm">
                <template x-if="batch && batch.evaluation">
                    <div>
                        <p>Akurasi: <span x-text="(batch.evaluation.accuracy*100).toFixed(2)"></span>%
                           (benar <span x-text="batch.evaluation.correct"></span> / salah <span x-text="batch.evaluation.incorrect"></span> dari <span x-text="batch.evaluation.total"></span>)</p>
                        <table class="mt-2 border border-gray-700">
                            <tr><th class="px-2">Aktual \ Prediksi</th><template x-for="l in batch.evaluation.confusion_matrix.labels"><th class="px-2" x-text="l"></th></template></tr>
                            <template x-for="(row, i) in batch.evaluation.confusion_matrix.counts">
                                <tr><td class="px-2" x-text="batch.evaluation.confusion_matrix.labels[i]"></td><template x-for="c in row"><td class="px-2 text-center" x-text="c"></td></template></tr>
                            </template>
                        </table>
                    </div>
                </template>
                <template x-if="batch && !batch.evaluation">
                    <ul><template x-for="[label, n] in Object.entries(batch.distribution)"><li x-text="label + ': ' + n"></li></template></ul>
                </template>
                <template x-for="w in (batch ? batch.warnings : [])"><p class="text-yellow-400" x-text="w"></p></template>
                <div class="overflow-x-auto">
                    <table class="border border-gray-700">
                        <tr><template x-for="c in batch ? batch.table.columns : []"><th class="px-2" x-text="c"></th></template></tr>
                        <template x-for="r in batch ? batch.table.rows : []"><tr><template x-for="v in r"><td class="px-2" x-text="v ?? ''"></td></template></tr></template>
                    </table>
                </div>
            </div>
        </section>

        <section x-show="tab==='train'" x-cloak class="space-y-4">
            <form @submit.prevent="train($event)" class="bg-gray-800 rounded p-4 space-y-3">
                <input type="file" name="file" accept=".xlsx,.xls,.csv,.json,.parquet" class="text-sm" required>
                <label class="text-sm block"><input type="checkbox" name="use_rebalancing" value="true" checked class="mr-2">Gunakan SMOTE untuk menyeimbangkan kelas</label>
                <button class="bg-blue-600 px-4 py-2 rounded text-sm" :disabled="busy">Latih</button>
            </form>
            <div x-show="trained" x-cloak class="bg-gray-800 rounded p-4 text-sm space-y-2">
                <h3 class="font-semibold">Jumlah Kategori Diagnosis</h3>
                <table class="border border-gray-700">
                    <tr><th class="px-2">Kategori</th><th class="px-2">Jumlah</th><th class="px-2">Sampel SMOTE</th></tr>
                    <template x-for="[label, n] in trained ? Object.entries(trained.metrics.class_distribution) : []">
                        <tr><td class="px-2" x-text="label"></td><td class="px-2 text-center" x-text="n"></td><td class="px-2 text-center" x-text="trained.metrics.n_synthetic[label] ?? 0"></td></tr>
                    </template>
                </table>
                <p>Akurasi pelatihan: <span x-text="trained && (trained.metrics.accuracy*100).toFixed(2)"></span>%</p>
                <table class="border border-gray-700">
                    <tr><th class="px-2">Kategori</th><th class="px-2">Precision</th><th class="px-2">Recall</th><th class="px-2">F1</th><th class="px-2">Support</th></tr>
                    <template x-for="c in trained ? trained.metrics.report.classes : []">
                        <tr><td class="px-2" x-text="c.label"></td><td class="px-2" x-text="c.precision.toFixed(2)"></td><td class="px-2" x-text="c.recall.toFixed(2)"></td><td class="px-2" x-text="c.f1_score.toFixed(2)"></td><td class="px-2" x-text="c.support"></td></tr>
                    </template>
                </table>
                <template x-for="w in trained ? trained.metrics.warnings : []"><p class="text-yellow-400" x-text="w"></p></template>
            </div>
        </section>
    </main>
    <script>
    function app() {
        return {
            tab: 'home', mode: 'upload', busy: false, error: '',
            model: { ready: false, classes: [] }, symptoms: [], maxAge: 120,
            form: { sex: 'L', age: 30, symptoms: {} },
            single: null, batch: null, trained: null,
            async init() { await this.refresh(); },
            async refresh() {
                this.model = await (await fetch('/api/model')).json();
                const f = await (await fetch('/api/symptoms')).json();
                this.symptoms = f.symptoms; this.maxAge = f.max_age;
                this.form.symptoms = Object.fromEntries(f.symptoms.filter(s => this.form.symptoms[s]).map(s => [s, true]));
            },
            async call(url, opts) {
                this.error = ''; this.busy = true;
                try {
                    const res = await fetch(url, opts);
                    const body = await res.json();
                    if (!res.ok) { this.error = body.message; return null; }
                    return body;
                } finally { this.busy = false; }
            },
            async predictOne() {
                this.single = await this.call('/api/predict', {
                    method: 'POST', headers: { 'Content-Type': 'application/json' },
                    body: JSON.stringify(this.form),
                });
            },
            async predictBatch(e) {
                this.batch = await this.call('/api/predict/batch', { method: 'POST', body: new FormData(e.target) });
            },
            async train(e) {
                const data = new FormData(e.target);
                if (!data.has('use_rebalancing')) data.append('use_rebalancing', 'false');
                this.trained = await this.call('/api/train', { method: 'POST', body: data });
                if (this.trained) await this.refresh();
            },
        };
    }
    </script>
</body>
</html>
"#;

//! Command-line interface for training, evaluation and prediction.

use clap::{Parser, Subcommand};
use colored::*;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::data::{write_predictions_csv, RawTable, TableLoader};
use crate::explanations::explain;
use crate::pipeline::{EvalMetrics, PipelineConfig, ScreeningService};
use crate::preprocessing::{DatasetLayout, PatientRecord, Sex};
use crate::server::{run_server, ServerConfig};

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }
fn warn(s: &str) -> ColoredString   { s.truecolor(230, 190, 80) }

fn kv(key: &str, val: &str) {
    println!("  {} {}", muted(&format!("{:<22}", key)), val.white());
}

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

fn warnings(list: &[String]) {
    for w in list {
        println!("  {} {}", warn("!"), w);
    }
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "hepascreen")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Hepatitis diagnosis screening from symptoms")]
#[command(long_about = None)]
pub struct Cli {
    /// Directory holding trained model bundles
    #[arg(long, global = true, env = "MODELS_DIR", default_value = "./models")]
    pub models_dir: PathBuf,

    /// Dataset layout preset (indonesian, english)
    #[arg(long, global = true, env = "HEPASCREEN_LAYOUT", default_value = "indonesian")]
    pub layout: DatasetLayout,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Train a new model from a labelled table
    Train {
        /// Input data file (xlsx, csv, json or parquet)
        #[arg(short, long)]
        data: PathBuf,

        /// Skip SMOTE rebalancing
        #[arg(long)]
        no_rebalance: bool,

        /// SMOTE neighbours
        #[arg(long, default_value = "5")]
        k_neighbors: usize,

        /// Random seed
        #[arg(long, default_value = "42")]
        seed: u64,
    },

    /// Score the current model against a labelled table
    Evaluate {
        #[arg(short, long)]
        data: PathBuf,
    },

    /// Predict every row of a table
    Predict {
        #[arg(short, long)]
        data: PathBuf,

        /// Write the table with predictions appended as CSV
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Predict a single patient
    PredictOne {
        /// Sex (L/P or M/F)
        #[arg(long)]
        sex: String,

        #[arg(long)]
        age: u32,

        /// Present symptom, repeatable
        #[arg(short, long = "symptom")]
        symptoms: Vec<String>,
    },

    /// Show the current model
    Info,

    /// Start the web server
    Serve {
        #[arg(short, long, env = "API_PORT", default_value = "8080")]
        port: u16,

        #[arg(long, env = "API_HOST", default_value = "0.0.0.0")]
        host: String,
    },
}

impl Cli {
    fn service(&self, config: PipelineConfig) -> ScreeningService {
        ScreeningService::open(config.with_layout(self.layout.clone()), &self.models_dir)
    }
}

fn load_table(path: &Path) -> anyhow::Result<RawTable> {
    step_run("Loading data");
    let start = Instant::now();
    let table = TableLoader::new().load_path(path)?;
    step_done(&format!(
        "{} rows × {} cols in {:?}",
        table.n_rows(),
        table.columns().len(),
        start.elapsed()
    ));
    Ok(table)
}

fn print_evaluation(eval: &EvalMetrics) {
    kv("accuracy", &format!("{:.2}%", eval.accuracy * 100.0));
    kv("total", &eval.total.to_string());
    kv("correct", &eval.correct.to_string());
    kv("incorrect", &eval.incorrect.to_string());

    let cm = &eval.confusion_matrix;
    println!();
    println!("  {}", muted("confusion matrix (rows actual, columns predicted)"));
    for (i, label) in cm.labels.iter().enumerate() {
        let counts: Vec<String> = cm.counts[i].iter().map(|c| format!("{:>5}", c)).collect();
        println!("  {:<28}{}", label, counts.join(""));
    }
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    match &cli.command {
        Commands::Train { data, no_rebalance, k_neighbors, seed } => {
            let config = PipelineConfig::default().with_seed(*seed).with_k_neighbors(*k_neighbors);
            cmd_train(&cli, config, data, !no_rebalance)
        }
        Commands::Evaluate { data } => cmd_evaluate(&cli, data),
        Commands::Predict { data, output } => cmd_predict(&cli, data, output.as_deref()),
        Commands::PredictOne { sex, age, symptoms } => cmd_predict_one(&cli, sex, *age, symptoms),
        Commands::Info => cmd_info(&cli),
        Commands::Serve { port, host } => cmd_serve(&cli, host, *port).await,
    }
}

pub fn cmd_train(cli: &Cli, config: PipelineConfig, data: &Path, use_rebalancing: bool) -> anyhow::Result<()> {
    section("Train");
    let table = load_table(data)?;
    let mut service = cli.service(config);

    step_run(if use_rebalancing { "Training with SMOTE" } else { "Training" });
    let metrics = service.train(&table, use_rebalancing)?;
    step_done(&format!("{:.2}s", metrics.training_time_secs));

    section("Class distribution");
    for (label, n) in &metrics.class_distribution {
        let synthetic = metrics.n_synthetic.get(label).copied().unwrap_or(0);
        kv(label, &format!("{} (+{} synthetic)", n, synthetic));
    }

    section("Report");
    kv("accuracy", &format!("{:.2}%", metrics.accuracy * 100.0));
    println!(
        "  {}",
        muted(&format!("{:<28}{:>10}{:>10}{:>10}{:>9}", "", "precision", "recall", "f1", "support"))
    );
    for c in &metrics.report.classes {
        println!(
            "  {:<28}{:>10.2}{:>10.2}{:>10.2}{:>9}",
            c.label, c.precision, c.recall, c.f1_score, c.support
        );
    }
    warnings(&metrics.warnings);

    let bundle = service.bundle()?;
    println!();
    println!("  {} model {} saved to {}", ok("✓"), bundle.id().cyan(), cli.models_dir.display());
    Ok(())
}

pub fn cmd_evaluate(cli: &Cli, data: &Path) -> anyhow::Result<()> {
    section("Evaluate");
    let table = load_table(data)?;
    let eval = cli.service(PipelineConfig::default()).evaluate(&table)?;
    print_evaluation(&eval);
    Ok(())
}

pub fn cmd_predict(cli: &Cli, data: &Path, output: Option<&Path>) -> anyhow::Result<()> {
    section("Predict");
    let table = load_table(data)?;
    let batch = cli.service(PipelineConfig::default()).predict_batch(&table)?;

    match &batch.evaluation {
        Some(eval) => print_evaluation(eval),
        None => {
            for (label, n) in &batch.distribution {
                kv(label, &n.to_string());
            }
        }
    }
    warnings(&batch.warnings);

    if let Some(path) = output {
        write_predictions_csv(&batch.table, path)?;
        println!("  {} predictions written to {}", ok("✓"), path.display());
    }
    Ok(())
}

pub fn cmd_predict_one(cli: &Cli, sex: &str, age: u32, symptoms: &[String]) -> anyhow::Result<()> {
    let sex = Sex::from_token(sex).ok_or_else(|| anyhow::anyhow!("unrecognized sex '{}'", sex))?;
    let symptoms: BTreeMap<String, bool> = symptoms.iter().map(|s| (s.trim().to_string(), true)).collect();
    let record = PatientRecord::new(Some(sex), age, symptoms)?;

    let prediction = cli.service(PipelineConfig::default()).predict_one(&record)?;

    section("Diagnosis");
    kv("category", &prediction.label.bold().to_string());
    kv("confidence", &format!("{:.1}%", prediction.confidence * 100.0));
    for (label, p) in &prediction.probabilities {
        println!("  {} {:<26} {:.3}", dim("·"), label, p);
    }
    if let Some(e) = explain(&prediction.label) {
        println!();
        println!("  {}", e.description);
        println!("  {} {}", accent("Tindakan:"), e.action);
    }
    Ok(())
}

pub fn cmd_info(cli: &Cli) -> anyhow::Result<()> {
    section("Model");
    let service = cli.service(PipelineConfig::default());
    match service.bundle() {
        Ok(bundle) => {
            let m = &bundle.manifest;
            kv("id", &m.id);
            kv("created", &m.created_at.to_rfc3339());
            kv("training rows", &m.n_rows.to_string());
            kv("training accuracy", &format!("{:.2}%", m.training_accuracy * 100.0));
            kv("rebalanced", &m.rebalanced.to_string());
            kv("categories", &m.classes.join(", "));
            kv("columns", &m.columns.join(", "));
        }
        Err(e) => println!("  {} {}", warn("!"), e),
    }
    Ok(())
}

pub async fn cmd_serve(cli: &Cli, host: &str, port: u16) -> anyhow::Result<()> {
    let config = ServerConfig {
        host: host.to_string(),
        port,
        ..ServerConfig::default()
    }
    .with_models_dir(cli.models_dir.clone())
    .with_layout(cli.layout.clone());
    run_server(config).await
}

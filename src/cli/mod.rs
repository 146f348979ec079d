//! Edumind CLI Module
//!
//! Command-line interface for training, prediction, version management and
//! sentiment scoring.

use clap::{Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::EdumindConfig;
use crate::error::{EdumindError, ErrorResponse};
use crate::features::Record;
use crate::service::{EdumindService, PipelineInfo};
use crate::store::ModelKind;
use crate::utils::RecordLoader;

// ─── Styling helpers ───────────────────────────────────────────────────────────

const W: usize = 58; // box inner width

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }
fn bad(s: &str) -> ColoredString    { s.truecolor(235, 100, 100) }

fn line_box_top()    { println!("  {}", dim("┌─────────────────────────────────────────────────────────┐")); }
fn line_box_bottom() { println!("  {}", dim("└─────────────────────────────────────────────────────────┘")); }
fn line_box_sep()    { println!("  {}", dim("├─────────────────────────────────────────────────────────┤")); }

fn line_box(content: &str) {
    let visible_len = strip_ansi(content).chars().count();
    let pad = W.saturating_sub(visible_len);
    println!("  {}  {}{} {}", dim("│"), content, " ".repeat(pad), dim("│"));
}

fn line_box_center(content: &str) {
    let visible_len = strip_ansi(content).chars().count();
    let total_pad = W.saturating_sub(visible_len);
    let left = total_pad / 2;
    let right = total_pad - left;
    println!("  {}  {}{}{} {}", dim("│"), " ".repeat(left), content, " ".repeat(right), dim("│"));
}

fn line_box_empty() { line_box(""); }

fn strip_ansi(s: &str) -> String {
    let mut out = String::new();
    let mut in_escape = false;
    for c in s.chars() {
        if c == '\x1b' { in_escape = true; continue; }
        if in_escape { if c == 'm' { in_escape = false; } continue; }
        out.push(c);
    }
    out
}

fn kv(key: &str, val: &str) -> String {
    format!("{} {}", muted(key), val.white())
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

fn metric_row(name: &str, value: f64) {
    println!("  {:<16} {}", muted(name), format!("{:.4}", value).white().bold());
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "edumind")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Learning-style detection and performance prediction")]
#[command(long_about = None)]
pub struct Cli {
    /// JSON configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Model registry directory (overrides the configuration)
    #[arg(long, global = true)]
    pub model_dir: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Train the learning-style detector on behavioural records
    TrainStyle {
        /// Input records (JSON array, JSON lines or CSV)
        #[arg(short, long)]
        data: PathBuf,
    },

    /// Train the performance predictor on labelled records
    TrainPerformance {
        /// Input records (JSON array, JSON lines or CSV)
        #[arg(short, long)]
        data: PathBuf,

        /// Label field (at_risk, on_track, excelling or 0-2)
        #[arg(short, long, default_value = "label")]
        label: String,
    },

    /// Predict learning styles
    PredictStyle {
        /// A single record as inline JSON
        #[arg(short, long, conflicts_with = "data")]
        record: Option<String>,

        /// A file of records
        #[arg(short, long)]
        data: Option<PathBuf>,
    },

    /// Predict performance levels
    PredictPerformance {
        /// A single record as inline JSON
        #[arg(short, long, conflicts_with = "data")]
        record: Option<String>,

        /// A file of records
        #[arg(short, long)]
        data: Option<PathBuf>,
    },

    /// Score the sentiment of one or more texts
    Sentiment {
        /// Texts to analyse
        #[arg(required = true)]
        texts: Vec<String>,
    },

    /// List the versions of a model
    Versions {
        /// learning_style or performance
        model: ModelKind,
    },

    /// Move a model's active version back
    Rollback {
        /// learning_style or performance
        model: ModelKind,

        /// Target version (defaults to the one before the active version)
        #[arg(long)]
        version: Option<u64>,
    },

    /// Show model information
    Info,
}

// ─── Entry point ───────────────────────────────────────────────────────────────

/// Build the service from the global flags and run one command
pub fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = match &cli.config {
        Some(path) => EdumindConfig::from_file(path)?,
        None => EdumindConfig::default(),
    };
    if let Some(dir) = &cli.model_dir {
        config = config.with_model_dir(dir.clone());
    }
    let service = EdumindService::new(config)?;

    match cli.command {
        Commands::TrainStyle { data } => cmd_train_style(&service, &data, cli.json),
        Commands::TrainPerformance { data, label } => {
            cmd_train_performance(&service, &data, &label, cli.json)
        }
        Commands::PredictStyle { record, data } => {
            cmd_predict_style(&service, record.as_deref(), data.as_deref(), cli.json)
        }
        Commands::PredictPerformance { record, data } => {
            cmd_predict_performance(&service, record.as_deref(), data.as_deref(), cli.json)
        }
        Commands::Sentiment { texts } => cmd_sentiment(&service, &texts, cli.json),
        Commands::Versions { model } => cmd_versions(&service, model, cli.json),
        Commands::Rollback { model, version } => cmd_rollback(&service, model, version),
        Commands::Info => cmd_info(&service, cli.json),
    }
}

/// Print a failure as a short message plus its machine-readable kind
pub fn report_error(err: &anyhow::Error) {
    match err.downcast_ref::<EdumindError>() {
        Some(e) => {
            let response = ErrorResponse::from(e);
            eprintln!();
            eprintln!("  {} {}", bad("✗"), response.message);
            eprintln!("  {} {}", muted("kind"), response.kind.white());
            if response.recoverable {
                eprintln!("  {}", dim("train a model or roll back to a previous version to recover"));
            }
            eprintln!();
        }
        None => {
            eprintln!();
            eprintln!("  {} {:#}", bad("✗"), err);
            eprintln!();
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Records from either an inline JSON object or a file
fn input_records(record: Option<&str>, data: Option<&Path>) -> anyhow::Result<Vec<Record>> {
    match (record, data) {
        (Some(json), _) => Ok(vec![serde_json::from_str::<Record>(json)?]),
        (None, Some(path)) => Ok(RecordLoader::new().load(path)?.records),
        (None, None) => anyhow::bail!("Pass either --record or --data"),
    }
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_train_style(service: &EdumindService, data: &Path, json: bool) -> anyhow::Result<()> {
    if !json {
        section("Train learning style");
        step_run("Loading records");
    }
    let start = Instant::now();
    let loaded = RecordLoader::new().load(data)?;
    if !json {
        step_done(&format!("{} records in {:?}", loaded.len(), start.elapsed()));
        step_run("Clustering");
    }

    let start = Instant::now();
    let bundle = service.learning_style().train(&loaded.records)?;

    if json {
        return print_json(&bundle.model.profiles);
    }
    step_done(&format!("{:?}", start.elapsed()));

    println!();
    println!("  {:<16} {}", muted("Version"), format!("v{}", bundle.version()).white().bold());
    for profile in &bundle.model.profiles {
        println!(
            "  {:<16} {} {}",
            muted(&format!("Cluster {}", profile.cluster)),
            profile.label.to_string().cyan(),
            dim(&format!("({} members)", profile.size))
        );
    }
    println!();
    Ok(())
}

pub fn cmd_train_performance(
    service: &EdumindService,
    data: &Path,
    label: &str,
    json: bool,
) -> anyhow::Result<()> {
    if !json {
        section("Train performance");
        step_run("Loading records");
    }
    let start = Instant::now();
    let loaded = RecordLoader::new().with_label_column(label).load(data)?;
    let labels = loaded.labels.clone().unwrap_or_default();
    if !json {
        step_done(&format!("{} records in {:?}", loaded.len(), start.elapsed()));
        step_run("Training random forest");
    }

    let start = Instant::now();
    let report = service.performance().train(&loaded.records, &labels)?;

    if json {
        return print_json(&report);
    }
    step_done(&format!("{:?}", start.elapsed()));

    println!();
    println!("  {:<16} {}", muted("Version"), format!("v{}", report.version).white().bold());
    println!("  {:<16} {}", muted("Train / test"), format!("{} / {}", report.n_train, report.n_test).white());
    metric_row("Accuracy", report.metrics.accuracy);
    metric_row("Precision", report.metrics.precision);
    metric_row("Recall", report.metrics.recall);
    metric_row("F1", report.metrics.f1_score);
    println!();
    Ok(())
}

pub fn cmd_predict_style(
    service: &EdumindService,
    record: Option<&str>,
    data: Option<&Path>,
    json: bool,
) -> anyhow::Result<()> {
    let records = input_records(record, data)?;
    let predictions = records
        .iter()
        .map(|r| service.predict_learning_style(r))
        .collect::<Result<Vec<_>, _>>()?;

    if json {
        return print_json(&predictions);
    }

    section("Learning style");
    for (i, p) in predictions.iter().enumerate() {
        println!(
            "  {:<6} {:<16} {}",
            muted(&format!("#{}", i)),
            p.label.to_string().cyan().bold(),
            dim(&format!("cluster {}  confidence {:.3}", p.cluster, p.confidence))
        );
    }
    println!();
    Ok(())
}

pub fn cmd_predict_performance(
    service: &EdumindService,
    record: Option<&str>,
    data: Option<&Path>,
    json: bool,
) -> anyhow::Result<()> {
    let records = input_records(record, data)?;
    let predictions = records
        .iter()
        .map(|r| service.predict_performance(r))
        .collect::<Result<Vec<_>, _>>()?;

    if json {
        return print_json(&predictions);
    }

    section("Performance");
    for (i, p) in predictions.iter().enumerate() {
        let probabilities = p
            .probabilities
            .iter()
            .map(|(k, v)| format!("{} {:.2}", k, v))
            .collect::<Vec<_>>()
            .join("  ");
        println!(
            "  {:<6} {:<12} {}",
            muted(&format!("#{}", i)),
            p.label.to_string().cyan().bold(),
            dim(&format!("confidence {:.3}  {}", p.confidence, probabilities))
        );
    }
    println!();
    Ok(())
}

pub fn cmd_sentiment(service: &EdumindService, texts: &[String], json: bool) -> anyhow::Result<()> {
    let results = service.sentiment().analyze_batch(texts);
    let overall = service.overall_sentiment(texts);

    if json {
        return print_json(&serde_json::json!({ "results": results, "overall": overall }));
    }

    section("Sentiment");
    for (text, r) in texts.iter().zip(results.iter()) {
        println!(
            "  {:<10} {} {}",
            r.label.as_str().cyan(),
            format!("{:+.2}", r.polarity).white(),
            dim(text)
        );
    }
    if texts.len() > 1 {
        println!("  {}", dim(&"─".repeat(56)));
        println!(
            "  {:<10} {} {}",
            overall.overall_label.as_str().cyan().bold(),
            format!("{:+.2}", overall.average_polarity).white().bold(),
            dim(&format!("over {} texts", overall.sample_count))
        );
    }
    println!();
    Ok(())
}

pub fn cmd_versions(service: &EdumindService, model: ModelKind, json: bool) -> anyhow::Result<()> {
    let versions = service.list_versions(model);
    if json {
        return print_json(&versions);
    }

    section(&format!("Versions of {}", model));
    if versions.is_empty() {
        println!("  {}", "No versions published yet".yellow());
    }
    for v in &versions {
        let marker = if v.active { ok("● active") } else { dim("○") };
        let headline = v
            .metrics
            .get("accuracy")
            .map(|a| format!("accuracy {:.4}", a))
            .or_else(|| v.metrics.get("inertia").map(|i| format!("inertia {:.2}", i)))
            .unwrap_or_default();
        println!(
            "  {:<8} {:<28} {} {}",
            format!("v{}", v.version).white().bold(),
            dim(&v.trained_at.format("%Y-%m-%d %H:%M:%S UTC").to_string()),
            muted(&headline),
            marker
        );
    }
    println!();
    Ok(())
}

pub fn cmd_rollback(service: &EdumindService, model: ModelKind, version: Option<u64>) -> anyhow::Result<()> {
    section(&format!("Rollback {}", model));
    step_run("Moving active version");
    let restored = service.rollback(model, version)?;
    step_done(&format!("now serving v{}", restored));
    println!();
    Ok(())
}

fn pipeline_box(info: &PipelineInfo) {
    line_box(&format!("{}", info.kind.to_string().white().bold()));
    line_box(&kv("Algorithm ", &info.algorithm));
    line_box(&kv("Features  ", &info.n_features.to_string()));
    line_box(&kv("Outputs   ", &info.outputs.join(", ")));
    let version = info
        .active_version
        .map(|v| format!("v{}", v))
        .unwrap_or_else(|| "not trained".to_string());
    line_box(&kv("Active    ", &version));
    for (name, value) in &info.metrics {
        line_box(&kv(&format!("{:<10}", name), &format!("{:.4}", value)));
    }
}

pub fn cmd_info(service: &EdumindService, json: bool) -> anyhow::Result<()> {
    let info = service.model_info()?;
    if json {
        return print_json(&info);
    }

    println!();
    line_box_top();
    line_box_empty();
    line_box_center(&format!("{}", "Edumind".white().bold()));
    line_box_center(&format!("{}", dim(&format!("v{}", env!("CARGO_PKG_VERSION")))));
    line_box_empty();
    line_box_sep();
    line_box(&kv("Registry  ", &service.registry().root().display().to_string()));
    line_box_sep();
    pipeline_box(&info.learning_style);
    line_box_sep();
    pipeline_box(&info.performance);
    line_box_sep();
    line_box(&format!("{}", "sentiment".white().bold()));
    line_box(&kv("Algorithm ", &info.sentiment.algorithm));
    line_box(&kv("Labels    ", &info.sentiment.labels.join(", ")));
    line_box_empty();
    line_box_bottom();
    println!();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_ansi() {
        let colored = format!("{}", "hi".red());
        assert_eq!(strip_ansi(&colored), "hi");
    }

    #[test]
    fn test_parse_commands() {
        let cli = Cli::try_parse_from(["edumind", "--model-dir", "/tmp/m", "rollback", "performance", "--version", "2"]).unwrap();
        assert_eq!(cli.model_dir, Some(PathBuf::from("/tmp/m")));
        match cli.command {
            Commands::Rollback { model, version } => {
                assert_eq!(model, ModelKind::Performance);
                assert_eq!(version, Some(2));
            }
            _ => panic!("expected rollback"),
        }

        assert!(Cli::try_parse_from(["edumind", "versions", "forest"]).is_err());
    }

    #[test]
    fn test_inline_record() {
        let records = input_records(Some(r#"{"video_time": 120}"#), None).unwrap();
        assert_eq!(records.len(), 1);
        assert!(input_records(None, None).is_err());
    }
}

//! Integration test: service facade and CLI

use clap::Parser;
use edumind::cli::{run, Cli};
use edumind::config::{EdumindConfig, LearningStyleConfig, PerformanceConfig};
use edumind::error::{EdumindError, ErrorResponse};
use edumind::features::Record;
use edumind::pipelines::{LearningStyle, PerformanceLevel};
use edumind::sentiment::SentimentLabel;
use edumind::store::ModelKind;
use edumind::EdumindService;
use std::io::Write;

fn service(dir: &std::path::Path) -> EdumindService {
    let config = EdumindConfig::default()
        .with_model_dir(dir)
        .with_learning_style(LearningStyleConfig::default().with_n_init(3))
        .with_performance(PerformanceConfig::default().with_n_estimators(20));
    EdumindService::new(config).unwrap()
}

fn behaviour() -> Vec<Record> {
    let signals = ["video_time", "audio_content_views", "text_time", "interactive_time"];
    (0..32)
        .map(|i| {
            Record::new()
                .with(signals[i % 4], 90 + (i * 7) % 30)
                .with("avg_session_duration", 20 + i % 5)
        })
        .collect()
}

fn graded() -> (Vec<Record>, Vec<&'static str>) {
    (0..45)
        .map(|i| {
            let level = i % 3;
            let record = Record::new()
                .with("average_quiz_score", 35 + 28 * level + i % 7)
                .with("total_study_time", 80 + 210 * level + i % 11)
                .with("current_streak", 12 * level + i % 3);
            (record, ["at_risk", "on_track", "excelling"][level])
        })
        .unzip()
}

#[test]
fn test_untrained_service() {
    let dir = tempfile::tempdir().unwrap();
    let service = service(dir.path());

    let err = service.predict_performance(&Record::new()).unwrap_err();
    assert!(matches!(err, EdumindError::ModelNotTrained));

    let response = ErrorResponse::from(&err);
    assert_eq!(response.kind, "model_not_trained");
    assert!(response.recoverable);
    assert!(!response.message.is_empty());

    let info = service.model_info().unwrap();
    assert_eq!(info.learning_style.active_version, None);
    assert_eq!(info.performance.active_version, None);
    assert_eq!(info.learning_style.n_features, 10);
    assert_eq!(info.performance.outputs, PerformanceLevel::NAMES.to_vec());
}

#[test]
fn test_train_and_predict_through_service() {
    let dir = tempfile::tempdir().unwrap();
    let service = service(dir.path());

    assert_eq!(service.train_learning_style(&behaviour()).unwrap(), 1);
    let (records, labels) = graded();
    let metrics = service.train_performance(&records, &labels).unwrap();
    assert!(metrics.accuracy > 0.5);

    let style = service
        .predict_learning_style(&Record::new().with("video_time", 110))
        .unwrap();
    assert!(LearningStyle::ALL.contains(&style.label));

    let level = service
        .predict_performance(&Record::new().with("average_quiz_score", 97).with("total_study_time", 520))
        .unwrap();
    assert!(PerformanceLevel::ALL.contains(&level.label));

    let info = service.model_info().unwrap();
    assert_eq!(info.learning_style.active_version, Some(1));
    assert_eq!(info.performance.active_version, Some(1));
    assert!(info.performance.metrics.contains_key("f1_score"));
    assert!(info.learning_style.metrics.contains_key("inertia"));
}

#[test]
fn test_invalid_record_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let service = service(dir.path());
    let (records, labels) = graded();
    service.train_performance(&records, &labels).unwrap();

    let err = service
        .predict_performance(&Record::new().with("average_quiz_score", 140))
        .unwrap_err();
    assert!(matches!(err, EdumindError::InvalidRecord { ref field, .. } if field == "average_quiz_score"));
    assert_eq!(ErrorResponse::from(&err).kind, "invalid_record");
    assert!(!err.is_recoverable());
}

#[test]
fn test_services_are_independent() {
    let dir_a = tempfile::tempdir().unwrap();
    let dir_b = tempfile::tempdir().unwrap();
    let a = service(dir_a.path());
    let b = service(dir_b.path());

    a.train_learning_style(&behaviour()).unwrap();
    assert!(a.predict_learning_style(&Record::new()).is_ok());
    assert!(matches!(
        b.predict_learning_style(&Record::new()),
        Err(EdumindError::ModelNotTrained)
    ));
}

#[test]
fn test_service_rollback() {
    let dir = tempfile::tempdir().unwrap();
    let service = service(dir.path());
    service.train_learning_style(&behaviour()).unwrap();
    service.train_learning_style(&behaviour()).unwrap();

    assert_eq!(service.list_versions(ModelKind::LearningStyle).len(), 2);
    assert_eq!(service.rollback(ModelKind::LearningStyle, None).unwrap(), 1);
    assert_eq!(service.model_info().unwrap().learning_style.active_version, Some(1));
    assert!(matches!(
        service.rollback(ModelKind::Performance, None),
        Err(EdumindError::ModelNotTrained)
    ));
}

#[test]
fn test_sentiment_through_service() {
    let dir = tempfile::tempdir().unwrap();
    let service = service(dir.path());

    assert_eq!(
        service.analyze_sentiment("This course is really great and helpful").label,
        SentimentLabel::Positive
    );
    assert_eq!(
        service.analyze_sentiment("The lessons are not good").label,
        SentimentLabel::Negative
    );
    assert_eq!(service.analyze_sentiment("").label, SentimentLabel::Neutral);

    let overall = service.overall_sentiment(&["great", "excellent", "boring"]);
    assert_eq!(overall.sample_count, 3);
    assert_eq!(overall.overall_label, SentimentLabel::Positive);
}

#[test]
fn test_invalid_config_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let config = EdumindConfig::default()
        .with_model_dir(dir.path())
        .with_performance(PerformanceConfig::default().with_n_estimators(0));
    assert!(matches!(
        EdumindService::new(config),
        Err(EdumindError::ConfigError(_))
    ));
}

#[test]
fn test_cli_train_and_predict() {
    let dir = tempfile::tempdir().unwrap();
    let model_dir = dir.path().join("models");
    let model_dir = model_dir.to_str().unwrap();

    let data = dir.path().join("graded.jsonl");
    let mut file = std::fs::File::create(&data).unwrap();
    let (records, labels) = graded();
    for (record, label) in records.iter().zip(labels) {
        let mut value = serde_json::to_value(record).unwrap();
        value["label"] = serde_json::Value::from(label);
        writeln!(file, "{}", value).unwrap();
    }
    drop(file);
    let data = data.to_str().unwrap();

    let cli = Cli::try_parse_from(["edumind", "--model-dir", model_dir, "--json", "train-performance", "--data", data]).unwrap();
    run(cli).unwrap();

    let cli = Cli::try_parse_from([
        "edumind", "--model-dir", model_dir, "predict-performance", "--record", r#"{"average_quiz_score": 92}"#,
    ])
    .unwrap();
    run(cli).unwrap();

    let cli = Cli::try_parse_from(["edumind", "--model-dir", model_dir, "predict-style", "--record", "{}"]).unwrap();
    let err = run(cli).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<EdumindError>(),
        Some(EdumindError::ModelNotTrained)
    ));

    let cli = Cli::try_parse_from(["edumind", "--model-dir", model_dir, "info"]).unwrap();
    run(cli).unwrap();
}

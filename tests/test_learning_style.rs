//! Integration test: learning-style detection end-to-end

use edumind::config::LearningStyleConfig;
use edumind::error::EdumindError;
use edumind::features::Record;
use edumind::pipelines::{LearningStyle, LearningStyleDetector};
use edumind::store::ModelRegistry;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use std::io::Write;
use std::sync::{Arc, Mutex};

const SIGNALS: [&str; 10] = [
    "video_time",
    "text_time",
    "interactive_time",
    "quiz_attempts",
    "chat_interactions",
    "visual_content_views",
    "audio_content_views",
    "text_content_views",
    "practice_exercises_completed",
    "avg_session_duration",
];

/// Behavioural record dominated by one style's signals
fn styled_record(style: LearningStyle, rng: &mut ChaCha8Rng) -> Record {
    let mut values: Vec<f64> = (0..SIGNALS.len()).map(|_| rng.gen_range(0.0..8.0)).collect();
    let mut boost = |name: &str, lo: f64, hi: f64| {
        let i = SIGNALS.iter().position(|s| *s == name).unwrap();
        values[i] = rng.gen_range(lo..hi);
    };
    match style {
        LearningStyle::Visual => {
            boost("video_time", 100.0, 140.0);
            boost("visual_content_views", 30.0, 45.0);
        }
        LearningStyle::Auditory => {
            boost("audio_content_views", 30.0, 45.0);
            boost("chat_interactions", 40.0, 60.0);
        }
        LearningStyle::ReadingWriting => {
            boost("text_time", 100.0, 140.0);
            boost("text_content_views", 30.0, 45.0);
        }
        LearningStyle::Kinesthetic => {
            boost("interactive_time", 100.0, 140.0);
            boost("practice_exercises_completed", 25.0, 40.0);
            boost("quiz_attempts", 20.0, 30.0);
        }
    }
    SIGNALS.into_iter().zip(values).collect()
}

fn training_records(per_style: usize, seed: u64) -> Vec<(LearningStyle, Record)> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    LearningStyle::ALL
        .iter()
        .flat_map(|&style| (0..per_style).map(move |_| style).collect::<Vec<_>>())
        .map(|style| (style, styled_record(style, &mut rng)))
        .collect()
}

fn detector(dir: &std::path::Path) -> LearningStyleDetector {
    let registry = Arc::new(ModelRegistry::open(dir).unwrap());
    LearningStyleDetector::new(LearningStyleConfig::default(), registry)
}

fn video_dominant() -> Record {
    Record::new()
        .with("video_time", 120)
        .with("text_time", 10)
        .with("interactive_time", 5)
        .with("quiz_attempts", 0)
        .with("chat_interactions", 0)
        .with("visual_content_views", 0)
        .with("audio_content_views", 0)
        .with("text_content_views", 0)
        .with("practice_exercises_completed", 0)
        .with("avg_session_duration", 0)
}

#[test]
fn test_train_and_predict_styles() {
    let dir = tempfile::tempdir().unwrap();
    let detector = detector(dir.path());
    let data = training_records(25, 7);
    let records: Vec<Record> = data.iter().map(|(_, r)| r.clone()).collect();

    let bundle = detector.train(&records).unwrap();
    assert_eq!(bundle.version(), 1);
    assert_eq!(bundle.model.profiles.len(), 4);

    // Every profile is assigned a distinct style
    let mut labels: Vec<LearningStyle> = bundle.model.label_mapping.clone();
    labels.sort();
    assert_eq!(labels, LearningStyle::ALL.to_vec());

    // Clear, well separated profiles are recovered
    let correct = data
        .iter()
        .filter(|(style, record)| detector.predict(record).unwrap().label == *style)
        .count();
    assert!(correct as f64 / data.len() as f64 > 0.9, "only {} of {} correct", correct, data.len());
}

#[test]
fn test_video_dominant_record_is_stable() {
    let dir = tempfile::tempdir().unwrap();
    let detector = detector(dir.path());
    let records: Vec<Record> = training_records(25, 11).into_iter().map(|(_, r)| r).collect();
    detector.train(&records).unwrap();

    let first = detector.predict(&video_dominant()).unwrap();
    for _ in 0..5 {
        let again = detector.predict(&video_dominant()).unwrap();
        assert_eq!(again.label, first.label);
        assert_eq!(again.cluster, first.cluster);
        assert!((again.confidence - first.confidence).abs() < 1e-12);
    }

    let bundle = detector.bundle().unwrap();
    assert_eq!(first.label, bundle.model.label_for(first.cluster).unwrap());
    assert_eq!(first.label, LearningStyle::Visual);
}

#[test]
fn test_prediction_shape() {
    let dir = tempfile::tempdir().unwrap();
    let detector = detector(dir.path());
    let records: Vec<Record> = training_records(20, 3).into_iter().map(|(_, r)| r).collect();
    detector.train(&records).unwrap();

    for record in [Record::new(), video_dominant(), Record::new().with("quiz_attempts", "12")] {
        let prediction = detector.predict(&record).unwrap();
        assert!(LearningStyle::ALL.contains(&prediction.label));
        assert!(prediction.cluster < 4);
        assert!((0.0..=1.0).contains(&prediction.confidence));
        assert!(prediction.distance >= 0.0);
        assert!(prediction.cluster_characteristics.contains_key("video_time"));
    }

    let profile = detector.cluster_characteristics(0).unwrap();
    assert!(profile.size > 0);
    assert!(detector.cluster_characteristics(9).is_err());
}

#[test]
fn test_rejects_bad_training_input() {
    let dir = tempfile::tempdir().unwrap();
    let detector = detector(dir.path());

    assert!(matches!(detector.train(&[]), Err(EdumindError::EmptyTrainingSet)));

    let few: Vec<Record> = training_records(1, 1).into_iter().map(|(_, r)| r).take(3).collect();
    assert!(matches!(
        detector.train(&few),
        Err(EdumindError::InsufficientData { required: 4, actual: 3 })
    ));

    let negative = vec![Record::new().with("video_time", -5); 8];
    assert!(matches!(
        detector.train(&negative),
        Err(EdumindError::InvalidRecord { .. })
    ));
}

#[test]
fn test_predict_before_training() {
    let dir = tempfile::tempdir().unwrap();
    let detector = detector(dir.path());
    assert!(matches!(
        detector.predict(&video_dominant()),
        Err(EdumindError::ModelNotTrained)
    ));
}

#[test]
fn test_same_seed_same_model() {
    let records: Vec<Record> = training_records(15, 21).into_iter().map(|(_, r)| r).collect();

    let dir_a = tempfile::tempdir().unwrap();
    let dir_b = tempfile::tempdir().unwrap();
    let a = detector(dir_a.path()).fit(&records).unwrap();
    let b = detector(dir_b.path()).fit(&records).unwrap();

    assert_eq!(a.model.label_mapping, b.model.label_mapping);
    assert_eq!(a.model.kmeans.centroids(), b.model.kmeans.centroids());
}

/// Collects formatted log output for assertions
#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl LogBuffer {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

fn with_captured_logs<T>(f: impl FnOnce() -> T) -> (T, String) {
    let buffer = LogBuffer::default();
    let writer = buffer.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::DEBUG)
        .finish();
    let result = tracing::subscriber::with_default(subscriber, f);
    (result, buffer.contents())
}

#[test]
fn test_failed_training_is_logged() {
    let dir = tempfile::tempdir().unwrap();
    let detector = detector(dir.path());

    let (result, logs) = with_captured_logs(|| detector.train(&[]));
    assert!(matches!(result, Err(EdumindError::EmptyTrainingSet)));
    assert!(logs.contains("ERROR"), "logs: {}", logs);
    assert!(logs.contains("Learning-style training failed"), "logs: {}", logs);
}

#[test]
fn test_failed_publish_is_logged_with_metrics() {
    let dir = tempfile::tempdir().unwrap();
    let detector = detector(dir.path());
    let records: Vec<Record> = training_records(10, 5).into_iter().map(|(_, r)| r).collect();

    // A plain file where the version directory belongs makes publishing fail
    std::fs::write(dir.path().join("learning_style"), b"occupied").unwrap();

    let (result, logs) = with_captured_logs(|| detector.train(&records));
    assert!(matches!(result, Err(EdumindError::IoError(_))));
    assert!(logs.contains("could not be published"), "logs: {}", logs);
    assert!(logs.contains("inertia="), "logs: {}", logs);
    assert!(logs.contains("n_iter="), "logs: {}", logs);

    // Nothing was published, so nothing is served
    assert!(matches!(
        detector.predict(&video_dominant()),
        Err(EdumindError::ModelNotTrained)
    ));
}

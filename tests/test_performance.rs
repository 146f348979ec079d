//! Integration test: performance prediction end-to-end

use edumind::config::{ClassWeight, PerformanceConfig};
use edumind::error::EdumindError;
use edumind::features::Record;
use edumind::pipelines::{PerformanceLevel, PerformancePredictor};
use edumind::store::ModelRegistry;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use std::sync::Arc;

fn student(level: PerformanceLevel, rng: &mut ChaCha8Rng) -> Record {
    let (score, study, streak, lessons) = match level {
        PerformanceLevel::AtRisk => (20.0f64..50.0, 10.0f64..120.0, 0.0f64..4.0, 0.0f64..10.0),
        PerformanceLevel::OnTrack => (60.0f64..78.0, 180.0f64..320.0, 6.0f64..14.0, 15.0f64..30.0),
        PerformanceLevel::Excelling => (86.0f64..100.0, 420.0f64..600.0, 20.0f64..40.0, 35.0f64..60.0),
    };
    let style = ["visual", "auditory", "reading_writing", "kinesthetic"][rng.gen_range(0..4)];
    Record::new()
        .with("average_quiz_score", rng.gen_range(score))
        .with("total_study_time", rng.gen_range(study))
        .with("current_streak", rng.gen_range(streak).round())
        .with("courses_enrolled", rng.gen_range(1..6))
        .with("lessons_completed", rng.gen_range(lessons).round())
        .with("quizzes_taken", rng.gen_range(0..30))
        .with("chat_messages_sent", rng.gen_range(0..50))
        .with("average_session_duration", rng.gen_range(10.0..60.0))
        .with("learning_style", style)
        .with("days_since_enrollment", rng.gen_range(5..365))
}

/// Labelled cohort; `counts` are per level in `PerformanceLevel::ALL` order
fn cohort(counts: [usize; 3], seed: u64) -> (Vec<Record>, Vec<String>) {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut records = Vec::new();
    let mut labels = Vec::new();
    for (level, &n) in PerformanceLevel::ALL.iter().zip(counts.iter()) {
        for _ in 0..n {
            records.push(student(*level, &mut rng));
            labels.push(level.as_str().to_string());
        }
    }
    (records, labels)
}

fn predictor(dir: &std::path::Path) -> PerformancePredictor {
    let registry = Arc::new(ModelRegistry::open(dir).unwrap());
    PerformancePredictor::new(PerformanceConfig::default().with_n_estimators(30), registry)
}

fn high_performer() -> Record {
    Record::new()
        .with("average_quiz_score", 95)
        .with("total_study_time", 500)
        .with("current_streak", 30)
        .with("courses_enrolled", 3)
        .with("lessons_completed", 48)
        .with("quizzes_taken", 20)
        .with("learning_style", "visual")
}

#[test]
fn test_train_reports_metrics() {
    let dir = tempfile::tempdir().unwrap();
    let predictor = predictor(dir.path());
    let (records, labels) = cohort([40, 40, 40], 5);

    let report = predictor.train(&records, &labels).unwrap();
    assert_eq!(report.version, 1);
    assert_eq!(report.n_train + report.n_test, 120);
    assert_eq!(report.n_test, 24);
    assert!(report.metrics.accuracy > 0.85, "accuracy {}", report.metrics.accuracy);
    for value in [report.metrics.precision, report.metrics.recall, report.metrics.f1_score] {
        assert!((0.0..=1.0).contains(&value));
    }
}

#[test]
fn test_high_performer_is_excelling() {
    let dir = tempfile::tempdir().unwrap();
    let predictor = predictor(dir.path());
    let (records, labels) = cohort([40, 40, 40], 9);
    predictor.train(&records, &labels).unwrap();

    let prediction = predictor.predict(&high_performer()).unwrap();
    assert_eq!(prediction.label, PerformanceLevel::Excelling);
    assert!(prediction.confidence > 0.5);
}

#[test]
fn test_probabilities_well_formed() {
    let dir = tempfile::tempdir().unwrap();
    let predictor = predictor(dir.path());
    let (records, labels) = cohort([30, 30, 30], 13);
    predictor.train(&records, &labels).unwrap();

    let mut rng = ChaCha8Rng::seed_from_u64(99);
    let probes: Vec<Record> = PerformanceLevel::ALL
        .iter()
        .map(|&l| student(l, &mut rng))
        .chain([Record::new(), high_performer()])
        .collect();

    for record in &probes {
        let p = predictor.predict(record).unwrap();
        let total: f64 = p.probabilities.values().sum();
        assert!((total - 1.0).abs() < 1e-6, "probabilities sum to {}", total);
        assert_eq!(p.probabilities.len(), 3);
        assert!(p.probabilities.values().all(|v| (0.0..=1.0).contains(v)));
        let max = p.probabilities.values().cloned().fold(f64::MIN, f64::max);
        assert!((p.confidence - max).abs() < 1e-12);
        assert!((p.probabilities[p.label.as_str()] - p.confidence).abs() < 1e-12);
    }
}

#[test]
fn test_empty_record_predicts() {
    let dir = tempfile::tempdir().unwrap();
    let predictor = predictor(dir.path());
    let (records, labels) = cohort([30, 30, 30], 17);
    predictor.train(&records, &labels).unwrap();

    let p = predictor.predict(&Record::new()).unwrap();
    assert!(PerformanceLevel::ALL.contains(&p.label));
    assert!(p.confidence > 0.0 && p.confidence <= 1.0);
}

#[test]
fn test_prediction_is_deterministic() {
    let dir = tempfile::tempdir().unwrap();
    let predictor = predictor(dir.path());
    let (records, labels) = cohort([25, 25, 25], 23);
    predictor.train(&records, &labels).unwrap();

    let first = predictor.predict(&high_performer()).unwrap();
    for _ in 0..5 {
        assert_eq!(predictor.predict(&high_performer()).unwrap(), first);
    }
}

#[test]
fn test_label_mismatch_and_empty() {
    let dir = tempfile::tempdir().unwrap();
    let predictor = predictor(dir.path());
    let (records, _) = cohort([2, 2, 2], 1);

    assert!(matches!(
        predictor.train(&records, &["excelling"]),
        Err(EdumindError::LabelMismatch { records: 6, labels: 1 })
    ));
    assert!(matches!(
        predictor.train::<&str>(&[], &[]),
        Err(EdumindError::EmptyTrainingSet)
    ));
}

#[test]
fn test_integer_and_invalid_labels() {
    let dir = tempfile::tempdir().unwrap();
    let predictor = predictor(dir.path());
    let (records, labels) = cohort([15, 15, 15], 31);

    let codes: Vec<String> = labels
        .iter()
        .map(|l| PerformanceLevel::parse(l).unwrap().index().to_string())
        .collect();
    assert!(predictor.train(&records, &codes).is_ok());

    let mut bad = labels.clone();
    bad[3] = "genius".to_string();
    assert!(matches!(
        predictor.train(&records, &bad),
        Err(EdumindError::InvalidLabel(_))
    ));
}

#[test]
fn test_imbalanced_classes_still_predicted() {
    let dir = tempfile::tempdir().unwrap();
    let registry = Arc::new(ModelRegistry::open(dir.path()).unwrap());
    let predictor = PerformancePredictor::new(
        PerformanceConfig::default()
            .with_n_estimators(30)
            .with_class_weight(ClassWeight::Balanced),
        registry,
    );
    let (records, labels) = cohort([12, 80, 12], 41);
    predictor.train(&records, &labels).unwrap();

    let mut rng = ChaCha8Rng::seed_from_u64(1234);
    let at_risk = student(PerformanceLevel::AtRisk, &mut rng);
    assert_eq!(predictor.predict(&at_risk).unwrap().label, PerformanceLevel::AtRisk);
}

#[test]
fn test_feature_importances_ranked() {
    let dir = tempfile::tempdir().unwrap();
    let predictor = predictor(dir.path());
    let (records, labels) = cohort([30, 30, 30], 51);
    predictor.train(&records, &labels).unwrap();

    let ranked = predictor.feature_importances().unwrap();
    assert_eq!(ranked.len(), 10);
    assert!(ranked.windows(2).all(|w| w[0].1 >= w[1].1));
    let total: f64 = ranked.iter().map(|(_, v)| v).sum();
    assert!((total - 1.0).abs() < 1e-6);
    assert_ne!(ranked[0].0, "learning_style");
}

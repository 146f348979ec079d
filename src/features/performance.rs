//! Progress and engagement feature layout for the performance predictor

use super::{FeatureSchema, FeatureSpec};
use crate::pipelines::LearningStyle;

/// Encoded value of an absent or unrecognised learning style
pub const UNKNOWN_STYLE_INDEX: usize = LearningStyle::NAMES.len();

const FEATURES: &[FeatureSpec] = &[
    FeatureSpec::bounded("average_quiz_score", 0.0, 100.0),
    FeatureSpec::non_negative("total_study_time"),
    FeatureSpec::non_negative("current_streak"),
    FeatureSpec::non_negative("courses_enrolled"),
    FeatureSpec::non_negative("lessons_completed"),
    FeatureSpec::non_negative("quizzes_taken"),
    FeatureSpec::non_negative("chat_messages_sent"),
    FeatureSpec::non_negative("average_session_duration"),
    FeatureSpec::categorical("learning_style", &LearningStyle::NAMES),
    FeatureSpec::non_negative("days_since_enrollment"),
];

/// Student progress features; `learning_style` uses the fixed
/// visual/auditory/reading_writing/kinesthetic/unknown encoding
pub static PERFORMANCE_SCHEMA: FeatureSchema = FeatureSchema {
    name: "performance",
    version: 1,
    features: FEATURES,
};

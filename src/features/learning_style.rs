//! Behavioural feature layout for the learning-style detector

use super::{FeatureSchema, FeatureSpec};

const FEATURES: &[FeatureSpec] = &[
    FeatureSpec::non_negative("video_time"),
    FeatureSpec::non_negative("text_time"),
    FeatureSpec::non_negative("interactive_time"),
    FeatureSpec::non_negative("quiz_attempts"),
    FeatureSpec::non_negative("chat_interactions"),
    FeatureSpec::non_negative("visual_content_views"),
    FeatureSpec::non_negative("audio_content_views"),
    FeatureSpec::non_negative("text_content_views"),
    FeatureSpec::non_negative("practice_exercises_completed"),
    FeatureSpec::non_negative("avg_session_duration"),
];

/// Interaction-time and content-view features, all defaulting to 0
pub static LEARNING_STYLE_SCHEMA: FeatureSchema = FeatureSchema {
    name: "learning_style",
    version: 1,
    features: FEATURES,
};

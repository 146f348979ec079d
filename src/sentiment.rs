//! Lexicon-based sentiment scoring for feedback and chat text
//!
//! Each lexicon word carries a polarity in [-1, 1] and a subjectivity in
//! [0, 1]. A preceding intensifier scales the next sentiment word; a
//! negation within the previous three tokens flips and dampens it.
//! Polarity and subjectivity are the means over the sentiment words found.

use serde::{Deserialize, Serialize};

/// Polarity above which text is positive (and below whose negation it is negative)
pub const POLARITY_THRESHOLD: f64 = 0.1;

const NEGATION_WINDOW: usize = 3;
const NEGATION_FACTOR: f64 = -0.5;

/// (word, polarity, subjectivity)
const LEXICON: &[(&str, f64, f64)] = &[
    ("amazing", 0.6, 0.9),
    ("awesome", 1.0, 1.0),
    ("bad", -0.7, 0.67),
    ("best", 1.0, 0.3),
    ("boring", -1.0, 1.0),
    ("brilliant", 0.9, 1.0),
    ("clear", 0.1, 0.38),
    ("confused", -0.4, 0.7),
    ("confusing", -0.3, 0.6),
    ("difficult", -0.5, 1.0),
    ("easy", 0.43, 0.83),
    ("engaging", 0.4, 0.6),
    ("enjoy", 0.4, 0.5),
    ("enjoyed", 0.4, 0.5),
    ("excellent", 1.0, 1.0),
    ("fantastic", 0.4, 0.9),
    ("frustrated", -0.7, 0.8),
    ("frustrating", -0.4, 0.7),
    ("fun", 0.3, 0.2),
    ("good", 0.7, 0.6),
    ("great", 0.8, 0.75),
    ("hard", -0.29, 0.54),
    ("hate", -0.8, 0.9),
    ("helpful", 0.5, 0.5),
    ("horrible", -1.0, 1.0),
    ("interesting", 0.5, 0.5),
    ("like", 0.2, 0.3),
    ("love", 0.5, 0.6),
    ("nice", 0.6, 1.0),
    ("poor", -0.4, 0.6),
    ("terrible", -1.0, 1.0),
    ("useful", 0.3, 0.0),
    ("useless", -0.5, 0.2),
    ("wonderful", 1.0, 1.0),
    ("worst", -1.0, 1.0),
    ("wrong", -0.5, 0.9),
];

const INTENSIFIERS: &[(&str, f64)] = &[
    ("extremely", 1.5),
    ("incredibly", 1.5),
    ("really", 1.3),
    ("so", 1.3),
    ("super", 1.4),
    ("very", 1.3),
    ("quite", 1.1),
    ("somewhat", 0.7),
    ("slightly", 0.5),
];

const NEGATIONS: &[&str] = &["not", "no", "never", "nothing", "hardly", "without"];

/// Coarse sentiment class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SentimentLabel {
    Positive,
    Negative,
    Neutral,
}

impl SentimentLabel {
    pub fn from_polarity(polarity: f64) -> Self {
        if polarity > POLARITY_THRESHOLD {
            SentimentLabel::Positive
        } else if polarity < -POLARITY_THRESHOLD {
            SentimentLabel::Negative
        } else {
            SentimentLabel::Neutral
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SentimentLabel::Positive => "positive",
            SentimentLabel::Negative => "negative",
            SentimentLabel::Neutral => "neutral",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentResult {
    /// -1 (negative) to 1 (positive)
    pub polarity: f64,
    /// 0 (objective) to 1 (subjective)
    pub subjectivity: f64,
    pub label: SentimentLabel,
    /// |polarity|
    pub confidence: f64,
}

impl SentimentResult {
    fn neutral() -> Self {
        Self {
            polarity: 0.0,
            subjectivity: 0.0,
            label: SentimentLabel::Neutral,
            confidence: 0.0,
        }
    }
}

/// Aggregate over several texts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverallSentiment {
    pub average_polarity: f64,
    pub average_subjectivity: f64,
    pub overall_label: SentimentLabel,
    pub sample_count: usize,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SentimentAnalyzer;

impl SentimentAnalyzer {
    pub fn new() -> Self {
        Self
    }

    pub fn analyze(&self, text: &str) -> SentimentResult {
        let lower = text.to_lowercase();
        let tokens: Vec<&str> = lower
            .split(|c: char| !(c.is_alphanumeric() || c == '\''))
            .filter(|t| !t.is_empty())
            .collect();

        let mut polarities = Vec::new();
        let mut subjectivities = Vec::new();

        for (i, token) in tokens.iter().enumerate() {
            let Some(&(_, polarity, subjectivity)) = LEXICON.iter().find(|(w, _, _)| w == token) else {
                continue;
            };

            let mut score = polarity;
            let mut subj = subjectivity;
            if i > 0 {
                if let Some(&(_, factor)) = INTENSIFIERS.iter().find(|(w, _)| *w == tokens[i - 1]) {
                    score *= factor;
                    subj = (subj * factor).min(1.0);
                }
            }
            let window = &tokens[i.saturating_sub(NEGATION_WINDOW)..i];
            if window.iter().any(|t| is_negation(t)) {
                score *= NEGATION_FACTOR;
            }

            polarities.push(score.clamp(-1.0, 1.0));
            subjectivities.push(subj);
        }

        if polarities.is_empty() {
            return SentimentResult::neutral();
        }

        let polarity = mean(&polarities).clamp(-1.0, 1.0);
        let subjectivity = mean(&subjectivities).clamp(0.0, 1.0);
        SentimentResult {
            polarity,
            subjectivity,
            label: SentimentLabel::from_polarity(polarity),
            confidence: polarity.abs(),
        }
    }

    pub fn analyze_batch<S: AsRef<str>>(&self, texts: &[S]) -> Vec<SentimentResult> {
        texts.iter().map(|t| self.analyze(t.as_ref())).collect()
    }

    pub fn overall_sentiment<S: AsRef<str>>(&self, texts: &[S]) -> OverallSentiment {
        let results = self.analyze_batch(texts);
        if results.is_empty() {
            return OverallSentiment {
                average_polarity: 0.0,
                average_subjectivity: 0.0,
                overall_label: SentimentLabel::Neutral,
                sample_count: 0,
            };
        }

        let polarities: Vec<f64> = results.iter().map(|r| r.polarity).collect();
        let subjectivities: Vec<f64> = results.iter().map(|r| r.subjectivity).collect();
        let average_polarity = mean(&polarities);

        OverallSentiment {
            average_polarity,
            average_subjectivity: mean(&subjectivities),
            overall_label: SentimentLabel::from_polarity(average_polarity),
            sample_count: results.len(),
        }
    }
}

fn is_negation(token: &str) -> bool {
    NEGATIONS.contains(&token) || token.ends_with("n't")
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

//! Classifier boundary and the label → sentiment mapping.

use std::fmt;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use sentigraph_core::SentimentScore;

/// Scores below this never count as positive.
pub const POSITIVE_THRESHOLD: f64 = 0.5;

/// Label vocabulary of the classifier, matched case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SentimentLabel {
    Positive,
    Negative,
    Neutral,
    Other(String),
}

impl SentimentLabel {
    pub fn parse(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "positive" => Self::Positive,
            "negative" => Self::Negative,
            "neutral" => Self::Neutral,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Positive => f.write_str("positive"),
            Self::Negative => f.write_str("negative"),
            Self::Neutral => f.write_str("neutral"),
            Self::Other(s) => f.write_str(s),
        }
    }
}

/// The winning label for one input text and its confidence in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Classification {
    pub label: SentimentLabel,
    pub score: f64,
}

impl Classification {
    pub fn new(label: SentimentLabel, score: f64) -> Self {
        Self { label, score }
    }

    /// `1.0` for a positive label scored at or above the threshold, else `0.0`.
    /// The classifier score is kept as the confidence.
    pub fn to_score(&self) -> SentimentScore {
        let sentiment = match self.label {
            SentimentLabel::Positive if self.score >= POSITIVE_THRESHOLD => 1.0,
            _ => 0.0,
        };
        SentimentScore::new(sentiment, self.score)
    }
}

/// A remote text classifier.
///
/// Implementations must be safe to share between concurrent invocations.
#[async_trait]
pub trait SentimentClassifier: Send + Sync {
    /// Classify a single text.
    async fn classify(&self, text: &str) -> Result<Classification>;

    /// Classify many texts in one call. Best effort: backends without a batch
    /// endpoint keep this default, and callers fall back to [`classify`].
    ///
    /// [`classify`]: SentimentClassifier::classify
    async fn classify_batch(&self, texts: &[String]) -> Result<Vec<Classification>> {
        bail!("Batch classification not supported ({} texts)", texts.len())
    }
}

#[derive(Deserialize)]
struct LabelScore {
    label: String,
    score: f64,
}

/// Interpret a text-classification response body.
///
/// The only accepted shape is one candidate list per input, each a list of
/// `{"label", "score"}` objects: `[[{"label": "positive", "score": 0.9}, ...], ...]`.
/// The highest-scoring candidate wins. Any other shape, a length different
/// from `expected`, an empty candidate list or an out-of-range score is an error.
pub fn parse_classification_response(body: serde_json::Value, expected: usize) -> Result<Vec<Classification>> {
    let per_input: Vec<Vec<LabelScore>> =
        serde_json::from_value(body).context("Unexpected classification response shape")?;

    if per_input.len() != expected {
        bail!(
            "Classification response has {} results for {} inputs",
            per_input.len(),
            expected
        );
    }

    per_input
        .into_iter()
        .enumerate()
        .map(|(i, candidates)| {
            let top = candidates
                .into_iter()
                .max_by(|a, b| a.score.total_cmp(&b.score))
                .with_context(|| format!("Empty candidate list for input {i}"))?;
            if !(0.0..=1.0).contains(&top.score) {
                bail!("Score {} out of range for input {}", top.score, i);
            }
            Ok(Classification::new(SentimentLabel::parse(&top.label), top.score))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_mapping_rule() {
        let cases = [
            (SentimentLabel::Positive, 0.9, 1.0),
            (SentimentLabel::Positive, 0.5, 1.0),
            (SentimentLabel::Positive, 0.4, 0.0),
            (SentimentLabel::Negative, 0.99, 0.0),
            (SentimentLabel::Neutral, 0.7, 0.0),
        ];
        for (label, score, expected) in cases {
            let s = Classification::new(label, score).to_score();
            assert_eq!(s.sentiment, expected);
            assert_eq!(s.confidence, score);
        }
    }

    #[test]
    fn test_label_case_insensitive() {
        assert_eq!(SentimentLabel::parse("POSITIVE"), SentimentLabel::Positive);
        assert_eq!(SentimentLabel::parse(" Negative "), SentimentLabel::Negative);
        assert_eq!(SentimentLabel::parse("LABEL_2"), SentimentLabel::Other("label_2".into()));
    }

    #[test]
    fn test_parse_picks_top_candidate() {
        let body = json!([
            [{"label": "neutral", "score": 0.2}, {"label": "positive", "score": 0.7}],
            [{"label": "negative", "score": 0.6}, {"label": "positive", "score": 0.1}]
        ]);
        let results = parse_classification_response(body, 2).unwrap();
        assert_eq!(results[0], Classification::new(SentimentLabel::Positive, 0.7));
        assert_eq!(results[1], Classification::new(SentimentLabel::Negative, 0.6));
    }

    #[test]
    fn test_parse_rejects_misaligned() {
        let body = json!([[{"label": "positive", "score": 0.9}]]);
        assert!(parse_classification_response(body, 2).is_err());
    }

    #[test]
    fn test_parse_rejects_other_shapes() {
        assert!(parse_classification_response(json!([{"label": "positive", "score": 0.9}]), 1).is_err());
        assert!(parse_classification_response(json!({"error": "Model is loading"}), 1).is_err());
        assert!(parse_classification_response(json!([[]]), 1).is_err());
        assert!(parse_classification_response(json!([[{"label": "positive", "score": 1.7}]]), 1).is_err());
    }

    struct SingleOnly;

    #[async_trait]
    impl SentimentClassifier for SingleOnly {
        async fn classify(&self, _text: &str) -> Result<Classification> {
            Ok(Classification::new(SentimentLabel::Neutral, 0.5))
        }
    }

    #[tokio::test]
    async fn test_batch_unsupported_by_default() {
        assert!(SingleOnly.classify_batch(&["a".to_string()]).await.is_err());
        assert!(SingleOnly.classify("a").await.is_ok());
    }
}

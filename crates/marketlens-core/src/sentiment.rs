//! Built-in sentiment scorer backed by the VADER lexicon and rules.
//!
//! `vader_sentiment` keeps its lexicon in process-wide statics, so building an
//! analyzer per call is cheap and keeps the scorer a plain unit struct.

use vader_sentiment::SentimentIntensityAnalyzer;

use crate::sources::SentimentScorer;
use crate::Sentiment;

/// VADER sentiment: compound in `[-1, 1]`, proportions in `[0, 1]`.
#[derive(Debug, Clone, Copy, Default)]
pub struct VaderScorer;

impl SentimentScorer for VaderScorer {
    fn score(&self, text: &str) -> Sentiment {
        if text.trim().is_empty() {
            return Sentiment::NEUTRAL;
        }

        let analyzer = SentimentIntensityAnalyzer::new();
        let scores = analyzer.polarity_scores(text);
        let component = |key: &str| scores.get(key).copied().unwrap_or(0.0);

        Sentiment {
            compound: component("compound").clamp(-1.0, 1.0),
            positive: component("pos").clamp(0.0, 1.0),
            negative: component("neg").clamp(0.0, 1.0),
            neutral: component("neu").clamp(0.0, 1.0),
        }
    }
}

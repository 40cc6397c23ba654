use std::sync::Arc;
use tubemood_core::SentimentScore;
use vader_sentiment::SentimentIntensityAnalyzer;

/// Produces a compound polarity in [-1.0, 1.0] for a piece of text.
pub trait SentimentAnalyzer: Send + Sync {
    fn compound(&self, text: &str) -> f64;
}

/// VADER valence scoring over the full VADER lexicon, with its negation,
/// booster, capitalisation, contrast, punctuation and emoji rules.
pub struct VaderAnalyzer {
    inner: SentimentIntensityAnalyzer<'static>,
}

impl VaderAnalyzer {
    pub fn new() -> Self {
        Self {
            inner: SentimentIntensityAnalyzer::new(),
        }
    }
}

impl Default for VaderAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl SentimentAnalyzer for VaderAnalyzer {
    fn compound(&self, text: &str) -> f64 {
        self.inner
            .polarity_scores(text)
            .get("compound")
            .copied()
            .unwrap_or(0.0)
    }
}

impl std::fmt::Debug for VaderAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaderAnalyzer").finish_non_exhaustive()
    }
}

/// Scores comment text into a [`SentimentScore`] using a pluggable analyzer.
#[derive(Clone)]
pub struct SentimentScorer {
    analyzer: Arc<dyn SentimentAnalyzer>,
}

impl SentimentScorer {
    pub fn new(analyzer: Arc<dyn SentimentAnalyzer>) -> Self {
        Self { analyzer }
    }

    pub fn score(&self, text: &str) -> SentimentScore {
        if text.trim().is_empty() {
            return SentimentScore::neutral();
        }

        let compound = self.analyzer.compound(text);
        if !compound.is_finite() {
            tracing::debug!("Analyzer returned non-finite score, treating as neutral");
            return SentimentScore::neutral();
        }

        SentimentScore::new(compound.clamp(-1.0, 1.0))
    }
}

impl Default for SentimentScorer {
    fn default() -> Self {
        Self::new(Arc::new(VaderAnalyzer::new()))
    }
}

impl std::fmt::Debug for SentimentScorer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SentimentScorer").finish_non_exhaustive()
    }
}

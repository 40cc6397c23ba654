use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Scores at or above this value are positive.
pub const POSITIVE_THRESHOLD: f64 = 0.05;
/// Scores at or below this value are negative.
pub const NEGATIVE_THRESHOLD: f64 = -0.05;
/// Number of hourly buckets in a sentiment trend.
pub const TREND_HOURS: usize = 24;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoMetadata {
    pub id: String,
    pub title: String,
    pub channel: String,
    pub published_at: Option<DateTime<Utc>>,
    pub thumbnail_url: Option<String>,
    pub views: u64,
    pub likes: u64,
    pub comments: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub video_id: String,
    pub text: String,
    pub published_at: DateTime<Utc>,
    pub like_count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Positive,
    Neutral,
    Negative,
}

impl Category {
    pub fn from_score(score: f64) -> Self {
        if score >= POSITIVE_THRESHOLD {
            Category::Positive
        } else if score <= NEGATIVE_THRESHOLD {
            Category::Negative
        } else {
            Category::Neutral
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Positive => "positive",
            Category::Neutral => "neutral",
            Category::Negative => "negative",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SentimentScore {
    pub compound: f64,
    pub category: Category,
}

impl SentimentScore {
    pub fn new(compound: f64) -> Self {
        Self {
            compound,
            category: Category::from_score(compound),
        }
    }

    pub fn neutral() -> Self {
        Self {
            compound: 0.0,
            category: Category::Neutral,
        }
    }
}

/// Per-category tallies shared by summaries and trend buckets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCounts {
    pub positive: usize,
    pub neutral: usize,
    pub negative: usize,
}

impl CategoryCounts {
    pub fn record(&mut self, category: Category) {
        match category {
            Category::Positive => self.positive += 1,
            Category::Neutral => self.neutral += 1,
            Category::Negative => self.negative += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.positive + self.neutral + self.negative
    }

    pub fn merge(&mut self, other: &CategoryCounts) {
        self.positive += other.positive;
        self.neutral += other.neutral;
        self.negative += other.negative;
    }

    /// (positive, neutral, negative) as percentages of the total; zeros when empty.
    pub fn percentages(&self) -> (f64, f64, f64) {
        let total = self.total();
        if total == 0 {
            return (0.0, 0.0, 0.0);
        }
        let pct = |n: usize| n as f64 / total as f64 * 100.0;
        (pct(self.positive), pct(self.neutral), pct(self.negative))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlyBucket {
    pub hour_start: DateTime<Utc>,
    pub comment_count: usize,
    /// Mean compound score of the bucket; 0.0 when the bucket is empty.
    pub average_score: f64,
    pub counts: CategoryCounts,
}

impl HourlyBucket {
    pub fn empty(hour_start: DateTime<Utc>) -> Self {
        Self {
            hour_start,
            comment_count: 0,
            average_score: 0.0,
            counts: CategoryCounts::default(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.comment_count == 0
    }

    pub fn category(&self) -> Category {
        Category::from_score(self.average_score)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoSentimentSummary {
    pub video: VideoMetadata,
    pub counts: CategoryCounts,
    pub average_score: f64,
    pub total_analyzed: usize,
    /// False when no comments could be analyzed (disabled or none posted).
    pub has_data: bool,
    /// Exactly [`TREND_HOURS`] buckets, oldest first.
    pub trend: Vec<HourlyBucket>,
    pub generated_at: DateTime<Utc>,
}

impl VideoSentimentSummary {
    pub fn video_id(&self) -> &str {
        &self.video.id
    }

    pub fn overall_category(&self) -> Option<Category> {
        self.has_data
            .then(|| Category::from_score(self.average_score))
    }

    pub fn average_label(&self) -> String {
        if self.has_data {
            format!("{:.3}", self.average_score)
        } else {
            "N/A".to_string()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoFailure {
    pub video_id: String,
    pub error_code: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendingAnalysis {
    pub region: String,
    /// Summaries in the order the trending chart returned them.
    pub summaries: Vec<VideoSentimentSummary>,
    pub failures: Vec<VideoFailure>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionSentiment {
    pub region: String,
    pub average_score: f64,
    pub counts: CategoryCounts,
    pub total_comments: usize,
    pub positive_pct: f64,
    pub neutral_pct: f64,
    pub negative_pct: f64,
    pub video_count: usize,
    pub failures: Vec<VideoFailure>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum AnalysisRequest {
    Trending {
        region: Option<String>,
        count: Option<u32>,
    },
    SingleVideo {
        video_ref: String,
    },
    RegionComparison {
        regions: Vec<String>,
        count: Option<u32>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum AnalysisOutcome {
    Trending(TrendingAnalysis),
    SingleVideo(VideoSentimentSummary),
    RegionComparison { regions: Vec<RegionSentiment> },
}

impl AnalysisOutcome {
    pub fn failures(&self) -> Vec<&VideoFailure> {
        match self {
            AnalysisOutcome::Trending(analysis) => analysis.failures.iter().collect(),
            AnalysisOutcome::SingleVideo(_) => Vec::new(),
            AnalysisOutcome::RegionComparison { regions } => {
                regions.iter().flat_map(|r| r.failures.iter()).collect()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_boundaries_are_inclusive() {
        assert_eq!(Category::from_score(0.05), Category::Positive);
        assert_eq!(Category::from_score(-0.05), Category::Negative);
        assert_eq!(Category::from_score(0.049_999), Category::Neutral);
        assert_eq!(Category::from_score(-0.049_999), Category::Neutral);
        assert_eq!(Category::from_score(0.0), Category::Neutral);
        assert_eq!(Category::from_score(1.0), Category::Positive);
        assert_eq!(Category::from_score(-1.0), Category::Negative);
    }

    #[test]
    fn test_category_counts_percentages() {
        let mut counts = CategoryCounts::default();
        assert_eq!(counts.percentages(), (0.0, 0.0, 0.0));

        counts.record(Category::Positive);
        counts.record(Category::Positive);
        counts.record(Category::Negative);
        counts.record(Category::Neutral);
        assert_eq!(counts.total(), 4);
        assert_eq!(counts.percentages(), (50.0, 25.0, 25.0));
    }

    #[test]
    fn test_request_serialization_is_tagged() {
        let request = AnalysisRequest::SingleVideo {
            video_ref: "https://youtu.be/ABC123".to_string(),
        };
        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("\"mode\":\"single_video\""));

        let parsed: AnalysisRequest =
            serde_json::from_str(r#"{"mode":"trending","region":"US","count":5}"#).unwrap();
        assert_eq!(
            parsed,
            AnalysisRequest::Trending {
                region: Some("US".to_string()),
                count: Some(5),
            }
        );
    }
}

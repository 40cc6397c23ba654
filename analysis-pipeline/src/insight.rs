//! Derived readings over finished summaries: trend direction, a short
//! narrative, and per-region roll-ups.

use serde::{Deserialize, Serialize};
use tubemood_core::{
    CategoryCounts, HourlyBucket, RegionSentiment, TrendingAnalysis, VideoSentimentSummary,
};

/// Minimum change in half-window averages that counts as movement.
pub const TREND_SHIFT_THRESHOLD: f64 = 0.05;
const POSITIVE_PROFILE_PCT: f64 = 60.0;
const NEGATIVE_PROFILE_PCT: f64 = 40.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Improving,
    Declining,
    Stable,
}

impl TrendDirection {
    fn describe(&self) -> &'static str {
        match self {
            TrendDirection::Improving => "has been improving",
            TrendDirection::Declining => "indicates declining sentiment",
            TrendDirection::Stable => "has remained relatively stable",
        }
    }
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Compare the mean of the older half of non-empty buckets with the newer half.
pub fn trend_direction(trend: &[HourlyBucket]) -> TrendDirection {
    let values: Vec<f64> = trend
        .iter()
        .filter(|bucket| !bucket.is_empty())
        .map(|bucket| bucket.average_score)
        .collect();

    if values.len() < 2 {
        return TrendDirection::Stable;
    }

    let (older, newer) = values.split_at(values.len() / 2);
    let shift = mean(newer) - mean(older);

    if shift > TREND_SHIFT_THRESHOLD {
        TrendDirection::Improving
    } else if shift < -TREND_SHIFT_THRESHOLD {
        TrendDirection::Declining
    } else {
        TrendDirection::Stable
    }
}

/// Two-sentence reading of a summary, or `None` when there is nothing to read.
pub fn overall_analysis(summary: &VideoSentimentSummary) -> Option<String> {
    if !summary.has_data {
        return None;
    }

    let (pos_pct, neu_pct, neg_pct) = summary.counts.percentages();
    let direction = trend_direction(&summary.trend);
    let trend = direction.describe();

    let text = if pos_pct >= POSITIVE_PROFILE_PCT {
        let profile = format!(
            "The video has received predominantly positive feedback ({:.0}% positive comments).",
            pos_pct
        );
        match direction {
            TrendDirection::Improving => format!(
                "{} Sentiment {} over the past 24 hours, with recent comments showing more enthusiasm than earlier ones.",
                profile, trend
            ),
            TrendDirection::Declining => format!(
                "{} However, sentiment {} over the past 24 hours, with more recent comments being less positive.",
                profile, trend
            ),
            TrendDirection::Stable => format!(
                "{} Sentiment {} over the past 24 hours, showing consistent viewer engagement.",
                profile, trend
            ),
        }
    } else if neg_pct >= NEGATIVE_PROFILE_PCT {
        let profile = format!(
            "The video shows mixed sentiment with {:.0}% positive and {:.0}% negative comments.",
            pos_pct, neg_pct
        );
        match direction {
            TrendDirection::Improving => format!(
                "{} The trend shows improving sentiment over the past 24 hours, suggesting viewer sentiment is recovering.",
                profile
            ),
            TrendDirection::Declining => format!(
                "{} The trend {} over the past 24 hours, with more recent comments being increasingly critical.",
                profile, trend
            ),
            TrendDirection::Stable => format!(
                "{} Sentiment {} over the past 24 hours without significant shifts.",
                profile, trend
            ),
        }
    } else {
        let profile = format!(
            "The video maintains a balanced sentiment profile with {:.0}% positive and {:.0}% neutral comments.",
            pos_pct, neu_pct
        );
        match direction {
            TrendDirection::Improving => format!(
                "{} Sentiment {} over the past 24 hours, with recent comments showing more positive engagement.",
                profile, trend
            ),
            TrendDirection::Declining => format!(
                "{} However, sentiment {} over the past 24 hours, with more recent comments showing increased criticism.",
                profile, trend
            ),
            TrendDirection::Stable => format!(
                "{} Sentiment {} over the past 24 hours without significant shifts.",
                profile, trend
            ),
        }
    };

    Some(text)
}

/// Roll a region's trending analysis into one row. `None` when no video had comments.
pub fn region_sentiment(region: &str, analysis: &TrendingAnalysis) -> Option<RegionSentiment> {
    let with_data: Vec<&VideoSentimentSummary> =
        analysis.summaries.iter().filter(|s| s.has_data).collect();
    if with_data.is_empty() {
        return None;
    }

    let mut counts = CategoryCounts::default();
    for summary in &with_data {
        counts.merge(&summary.counts);
    }
    let average_score =
        with_data.iter().map(|s| s.average_score).sum::<f64>() / with_data.len() as f64;
    let (positive_pct, neutral_pct, negative_pct) = counts.percentages();

    Some(RegionSentiment {
        region: region.to_string(),
        average_score,
        counts,
        total_comments: counts.total(),
        positive_pct,
        neutral_pct,
        negative_pct,
        video_count: analysis.summaries.len(),
        failures: analysis.failures.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use tubemood_core::{VideoFailure, VideoMetadata, TREND_HOURS};

    fn trend_from(values: &[Option<f64>]) -> Vec<HourlyBucket> {
        let start = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        (0..TREND_HOURS)
            .map(|i| {
                let mut bucket = HourlyBucket::empty(start + Duration::hours(i as i64));
                if let Some(Some(score)) = values.get(i) {
                    bucket.comment_count = 1;
                    bucket.average_score = *score;
                    bucket.counts.record(tubemood_core::Category::from_score(*score));
                }
                bucket
            })
            .collect()
    }

    fn summary(
        id: &str,
        positive: usize,
        neutral: usize,
        negative: usize,
        average: f64,
    ) -> VideoSentimentSummary {
        let counts = CategoryCounts {
            positive,
            neutral,
            negative,
        };
        VideoSentimentSummary {
            video: VideoMetadata {
                id: id.to_string(),
                title: id.to_string(),
                channel: "c".to_string(),
                published_at: None,
                thumbnail_url: None,
                views: 0,
                likes: 0,
                comments: 0,
            },
            counts,
            average_score: average,
            total_analyzed: counts.total(),
            has_data: counts.total() > 0,
            trend: trend_from(&[]),
            generated_at: Utc.with_ymd_and_hms(2024, 6, 1, 23, 30, 0).unwrap(),
        }
    }

    #[test]
    fn test_trend_direction() {
        assert_eq!(trend_direction(&trend_from(&[])), TrendDirection::Stable);
        assert_eq!(
            trend_direction(&trend_from(&[Some(0.9)])),
            TrendDirection::Stable
        );
        assert_eq!(
            trend_direction(&trend_from(&[
                Some(-0.2),
                None,
                Some(0.0),
                Some(0.4),
                Some(0.5)
            ])),
            TrendDirection::Improving
        );
        assert_eq!(
            trend_direction(&trend_from(&[
                Some(0.5),
                Some(0.5),
                None,
                Some(0.1),
                Some(0.1)
            ])),
            TrendDirection::Declining
        );
        assert_eq!(
            trend_direction(&trend_from(&[Some(0.30), Some(0.32)])),
            TrendDirection::Stable
        );
    }

    #[test]
    fn test_overall_analysis_profiles() {
        assert!(overall_analysis(&summary("empty", 0, 0, 0, 0.0)).is_none());

        let positive = overall_analysis(&summary("p", 7, 2, 1, 0.4)).unwrap();
        assert!(positive.contains("predominantly positive feedback (70% positive comments)"));
        assert!(positive.contains("relatively stable"));

        let negative = overall_analysis(&summary("n", 2, 3, 5, -0.3)).unwrap();
        assert!(negative.contains("20% positive and 50% negative"));

        let balanced = overall_analysis(&summary("b", 4, 5, 1, 0.1)).unwrap();
        assert!(balanced.contains("balanced sentiment profile with 40% positive and 50% neutral"));
    }

    #[test]
    fn test_region_sentiment_rollup() {
        let analysis = TrendingAnalysis {
            region: "CA".to_string(),
            summaries: vec![
                summary("a", 6, 2, 2, 0.4),
                summary("b", 0, 0, 0, 0.0),
                summary("c", 2, 4, 4, -0.2),
            ],
            failures: vec![VideoFailure {
                video_id: "d".to_string(),
                error_code: "YOUTUBE_VIDEO_NOT_FOUND".to_string(),
                reason: "gone".to_string(),
            }],
        };

        let row = region_sentiment("CA", &analysis).unwrap();
        assert_eq!(row.total_comments, 20);
        assert_eq!(row.counts.positive, 8);
        assert!((row.average_score - 0.1).abs() < 1e-9);
        assert!((row.positive_pct - 40.0).abs() < 1e-9);
        assert!((row.positive_pct + row.neutral_pct + row.negative_pct - 100.0).abs() < 1e-9);
        assert_eq!(row.video_count, 3);
        assert_eq!(row.failures.len(), 1);

        let empty = TrendingAnalysis {
            region: "US".to_string(),
            summaries: vec![summary("x", 0, 0, 0, 0.0)],
            failures: Vec::new(),
        };
        assert!(region_sentiment("US", &empty).is_none());
    }
}

use chrono::{DateTime, Duration as ChronoDuration, DurationRound, Utc};
use sentiment_engine::SentimentScorer;
use std::collections::HashSet;
use std::sync::Arc;
use tubemood_core::{
    CategoryCounts, Clock, Comment, HourlyBucket, SystemClock, VideoMetadata,
    VideoSentimentSummary, TREND_HOURS,
};

/// Start of the hour containing `instant`.
pub fn hour_floor(instant: DateTime<Utc>) -> DateTime<Utc> {
    instant
        .duration_trunc(ChronoDuration::hours(1))
        .unwrap_or(instant)
}

#[derive(Default)]
struct BucketAccumulator {
    score_sum: f64,
    counts: CategoryCounts,
}

/// Turns a video's comments into a scored summary with an hourly trend.
#[derive(Clone)]
pub struct Aggregator {
    scorer: SentimentScorer,
    clock: Arc<dyn Clock>,
}

impl Aggregator {
    pub fn new(scorer: SentimentScorer, clock: Arc<dyn Clock>) -> Self {
        Self { scorer, clock }
    }

    pub fn scorer(&self) -> &SentimentScorer {
        &self.scorer
    }

    pub fn summarize(&self, video: VideoMetadata, comments: &[Comment]) -> VideoSentimentSummary {
        self.summarize_at(video, comments, self.clock.now())
    }

    /// Summarize as of `now`. The trend covers the 24 hours ending with the
    /// hour that contains `now`, oldest first.
    pub fn summarize_at(
        &self,
        video: VideoMetadata,
        comments: &[Comment],
        now: DateTime<Utc>,
    ) -> VideoSentimentSummary {
        let current_hour = hour_floor(now);
        let window_start = current_hour - ChronoDuration::hours(TREND_HOURS as i64 - 1);

        let mut seen = HashSet::new();
        let mut counts = CategoryCounts::default();
        let mut score_sum = 0.0;
        let mut buckets: Vec<BucketAccumulator> =
            (0..TREND_HOURS).map(|_| BucketAccumulator::default()).collect();

        for comment in comments {
            if !seen.insert(comment.id.as_str()) {
                continue;
            }

            let score = self.scorer.score(&comment.text);
            counts.record(score.category);
            score_sum += score.compound;

            let offset = (hour_floor(comment.published_at) - window_start).num_hours();
            if let Ok(index) = usize::try_from(offset) {
                if let Some(bucket) = buckets.get_mut(index) {
                    bucket.score_sum += score.compound;
                    bucket.counts.record(score.category);
                }
            }
        }

        let total_analyzed = counts.total();
        let trend = buckets
            .into_iter()
            .enumerate()
            .map(|(index, bucket)| {
                let hour_start = window_start + ChronoDuration::hours(index as i64);
                let comment_count = bucket.counts.total();
                if comment_count == 0 {
                    return HourlyBucket::empty(hour_start);
                }
                HourlyBucket {
                    hour_start,
                    comment_count,
                    average_score: bucket.score_sum / comment_count as f64,
                    counts: bucket.counts,
                }
            })
            .collect();

        VideoSentimentSummary {
            video,
            counts,
            average_score: if total_analyzed == 0 {
                0.0
            } else {
                score_sum / total_analyzed as f64
            },
            total_analyzed,
            has_data: total_analyzed > 0,
            trend,
            generated_at: now,
        }
    }
}

impl std::fmt::Debug for Aggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Aggregator")
            .field("scorer", &self.scorer)
            .finish_non_exhaustive()
    }
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new(SentimentScorer::default(), Arc::new(SystemClock))
    }
}

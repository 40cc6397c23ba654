use crate::aggregator::Aggregator;
use crate::cache::FetchCache;
use crate::insight::region_sentiment;
use futures::stream::{self, StreamExt};
use sentiment_engine::SentimentScorer;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, warn};
use tubemood_core::{
    AnalysisOutcome, AnalysisRequest, AppConfig, Clock, Comment, CoreError, ErrorExt,
    RegionSentiment, SystemClock, TrendingAnalysis, VideoFailure, VideoMetadata, VideoRef,
    VideoSentimentSummary, DEFAULT_CACHE_TTL_SECONDS, DEFAULT_MAX_COMMENTS,
    DEFAULT_MAX_CONCURRENCY, DEFAULT_REGION, DEFAULT_REQUEST_TIMEOUT_SECONDS,
    DEFAULT_TRENDING_COUNT, MAX_TRENDING_COUNT,
};
use youtube_client::VideoSource;

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub default_region: String,
    pub default_count: u32,
    pub max_comments: u32,
    pub cache_ttl_seconds: u64,
    /// Videos analyzed at once within a batch
    pub max_concurrency: usize,
    /// Budget for one whole request, batch included
    pub request_timeout: Duration,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            default_region: DEFAULT_REGION.to_string(),
            default_count: DEFAULT_TRENDING_COUNT,
            max_comments: DEFAULT_MAX_COMMENTS,
            cache_ttl_seconds: DEFAULT_CACHE_TTL_SECONDS,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECONDS),
        }
    }
}

impl PipelineSettings {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            default_region: config.region.clone(),
            default_count: config.trending_count,
            max_comments: config.max_comments,
            cache_ttl_seconds: config.cache_ttl_seconds,
            max_concurrency: config.max_concurrency,
            request_timeout: Duration::from_secs(config.request_timeout_seconds),
        }
    }
}

/// Cache, fetch, score and aggregate, one request at a time.
pub struct SentimentPipeline<S> {
    source: Arc<S>,
    cache: Arc<FetchCache>,
    aggregator: Aggregator,
    settings: PipelineSettings,
}

impl<S: VideoSource> SentimentPipeline<S> {
    pub fn new(source: Arc<S>, settings: PipelineSettings) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        Self::with_parts(
            source,
            Arc::new(FetchCache::new(clock.clone())),
            SentimentScorer::default(),
            clock,
            settings,
        )
    }

    pub fn with_parts(
        source: Arc<S>,
        cache: Arc<FetchCache>,
        scorer: SentimentScorer,
        clock: Arc<dyn Clock>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            source,
            cache,
            aggregator: Aggregator::new(scorer, clock),
            settings,
        }
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub fn cache(&self) -> &Arc<FetchCache> {
        &self.cache
    }

    pub async fn analyze(&self, request: AnalysisRequest) -> Result<AnalysisOutcome, CoreError> {
        match request {
            AnalysisRequest::Trending { region, count } => {
                let region = region.unwrap_or_else(|| self.settings.default_region.clone());
                let count = count.unwrap_or(self.settings.default_count);
                self.analyze_trending(&region, count)
                    .await
                    .map(AnalysisOutcome::Trending)
            }
            AnalysisRequest::SingleVideo { video_ref } => self
                .analyze_video(&video_ref)
                .await
                .map(AnalysisOutcome::SingleVideo),
            AnalysisRequest::RegionComparison { regions, count } => {
                let count = count.unwrap_or(self.settings.default_count);
                self.compare_regions(&regions, count)
                    .await
                    .map(|regions| AnalysisOutcome::RegionComparison { regions })
            }
        }
    }

    /// Summaries for the region's trending chart, in chart order. A video
    /// that cannot be analyzed becomes an entry in `failures` instead.
    pub async fn analyze_trending(
        &self,
        region: &str,
        count: u32,
    ) -> Result<TrendingAnalysis, CoreError> {
        let deadline = self.deadline();
        let region = normalize_region(region);
        let count = count.clamp(1, MAX_TRENDING_COUNT);

        info!("Analyzing {} trending videos for {}", count, region);
        let videos = self
            .with_deadline(deadline, self.trending_videos(&region, count))
            .await?;

        let outcomes: Vec<(String, Result<VideoSentimentSummary, CoreError>)> =
            stream::iter(videos.into_iter().map(move |video| async move {
                let video_id = video.id.clone();
                let result = self.with_deadline(deadline, self.summarize_video(video)).await;
                (video_id, result)
            }))
            .buffered(self.settings.max_concurrency.max(1))
            .collect()
            .await;

        let mut summaries = Vec::with_capacity(outcomes.len());
        let mut failures = Vec::new();
        for (video_id, result) in outcomes {
            match result {
                Ok(summary) => summaries.push(summary),
                Err(error) => {
                    warn!("Skipping video {} in {} batch: {}", video_id, region, error);
                    failures.push(VideoFailure {
                        video_id,
                        error_code: error.error_code(),
                        reason: error.to_string(),
                    });
                }
            }
        }

        info!(
            "Trending analysis for {}: {} summaries, {} failures",
            region,
            summaries.len(),
            failures.len()
        );
        Ok(TrendingAnalysis {
            region,
            summaries,
            failures,
        })
    }

    /// Summary for one video given as URL or bare id.
    pub async fn analyze_video(&self, reference: &str) -> Result<VideoSentimentSummary, CoreError> {
        let deadline = self.deadline();
        let video_ref = VideoRef::parse(reference)?;
        debug!("Resolved {} to video {}", reference, video_ref.id);

        self.with_deadline(deadline, async {
            let video = self.video(&video_ref).await?;
            self.summarize_video(video).await
        })
        .await
    }

    /// One roll-up row per region, in the order given. Regions whose chart
    /// cannot be fetched, or whose videos have no comments, are left out.
    /// Unknown codes are passed through and rejected by the source.
    pub async fn compare_regions(
        &self,
        regions: &[String],
        count: u32,
    ) -> Result<Vec<RegionSentiment>, CoreError> {
        let mut seen = Vec::new();
        let mut rows = Vec::new();

        for raw in regions {
            let region = normalize_region(raw);
            if seen.contains(&region) {
                continue;
            }
            seen.push(region.clone());

            match self.analyze_trending(&region, count).await {
                Ok(analysis) => match region_sentiment(&region, &analysis) {
                    Some(row) => rows.push(row),
                    None => info!("No comment data for region {}", region),
                },
                Err(error) => {
                    error.log_warn();
                    warn!("Leaving region {} out of comparison", region);
                }
            }
        }

        Ok(rows)
    }

    fn deadline(&self) -> Instant {
        Instant::now() + self.settings.request_timeout
    }

    async fn with_deadline<T, F>(&self, deadline: Instant, work: F) -> Result<T, CoreError>
    where
        F: Future<Output = Result<T, CoreError>>,
    {
        timeout_at(deadline, work)
            .await
            .unwrap_or_else(|_| {
                Err(CoreError::Timeout {
                    seconds: self.settings.request_timeout.as_secs(),
                })
            })
    }

    async fn trending_videos(&self, region: &str, count: u32) -> Result<Vec<VideoMetadata>, CoreError> {
        let ttl = self.settings.cache_ttl_seconds;
        let videos = self
            .cache
            .trending
            .get_or_fetch(&FetchCache::trending_key(region, count), ttl, || {
                self.source.list_trending(region, count)
            })
            .await?;

        for video in &videos {
            if self.cache.videos.get(&FetchCache::video_key(&video.id), ttl).is_none() {
                self.cache
                    .videos
                    .insert(FetchCache::video_key(&video.id), video.clone());
            }
        }
        Ok(videos)
    }

    async fn video(&self, video_ref: &VideoRef) -> Result<VideoMetadata, CoreError> {
        self.cache
            .videos
            .get_or_fetch(
                &FetchCache::video_key(&video_ref.id),
                self.settings.cache_ttl_seconds,
                || async {
                    self.source
                        .resolve_video(&video_ref.url)
                        .await
                        .map(|(_, video)| video)
                },
            )
            .await
    }

    async fn comments(&self, video_id: &str) -> Result<Vec<Comment>, CoreError> {
        let max_comments = self.settings.max_comments;
        self.cache
            .comments
            .get_or_fetch(
                &FetchCache::comments_key(video_id, max_comments),
                self.settings.cache_ttl_seconds,
                || self.source.fetch_comments(video_id, max_comments),
            )
            .await
    }

    async fn summarize_video(&self, video: VideoMetadata) -> Result<VideoSentimentSummary, CoreError> {
        let comments = self.comments(&video.id).await?;
        let summary = self.aggregator.summarize(video, &comments);
        debug!(
            "Summarized {}: {} comments, average {}",
            summary.video_id(),
            summary.total_analyzed,
            summary.average_label()
        );
        Ok(summary)
    }
}

/// Request region codes are only trimmed and uppercased; the API decides validity.
fn normalize_region(raw: &str) -> String {
    raw.trim().to_ascii_uppercase()
}

impl<S> std::fmt::Debug for SentimentPipeline<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SentimentPipeline")
            .field("settings", &self.settings)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

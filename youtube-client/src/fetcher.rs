use crate::retry::{RetryConfig, RetryExecutor, RetryMetrics};
use crate::source::{VideoSource, YouTubeApi};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use tubemood_core::{AppConfig, Comment, CoreError, VideoMetadata, VideoRef, YouTubeApiError};

/// Largest page `videos.list` accepts.
pub const TRENDING_PAGE_SIZE: u32 = 50;
/// Largest page `commentThreads.list` accepts.
pub const COMMENT_PAGE_SIZE: u32 = 100;
pub const DEFAULT_PAGE_DELAY: Duration = Duration::from_millis(100);

/// Paginating, retrying fetcher on top of a [`YouTubeApi`].
#[derive(Debug)]
pub struct YouTubeFetcher<A> {
    api: Arc<A>,
    retry: RetryExecutor,
    page_delay: Duration,
}

impl<A: YouTubeApi> YouTubeFetcher<A> {
    pub fn new(api: Arc<A>) -> Self {
        Self::with_retry_config(api, RetryConfig::youtube())
    }

    pub fn with_retry_config(api: Arc<A>, config: RetryConfig) -> Self {
        Self {
            api,
            retry: RetryExecutor::new(config),
            page_delay: DEFAULT_PAGE_DELAY,
        }
    }

    pub fn from_config(api: Arc<A>, config: &AppConfig) -> Self {
        let retry = RetryConfig::youtube()
            .with_max_attempts(config.retry_max_attempts)
            .with_base_delay_ms(config.retry_base_delay_ms);
        Self::with_retry_config(api, retry)
    }

    /// Pause inserted between consecutive page requests.
    pub fn with_page_delay(mut self, page_delay: Duration) -> Self {
        self.page_delay = page_delay;
        self
    }

    pub fn api(&self) -> &Arc<A> {
        &self.api
    }

    pub fn retry_metrics(&self) -> RetryMetrics {
        self.retry.get_metrics()
    }

    async fn pause_between_pages(&self) {
        if !self.page_delay.is_zero() {
            tokio::time::sleep(self.page_delay).await;
        }
    }

    async fn collect_comments(
        &self,
        video_id: &str,
        max_comments: u32,
    ) -> Result<Vec<Comment>, CoreError> {
        let limit = max_comments as usize;
        let mut comments: Vec<Comment> = Vec::new();
        let mut page_token: Option<String> = None;

        while comments.len() < limit {
            let page_size = (limit - comments.len()).min(COMMENT_PAGE_SIZE as usize) as u32;
            let page = self
                .retry
                .execute("commentThreads.list", || {
                    self.api
                        .comment_threads(video_id, page_size, page_token.as_deref())
                })
                .await?;

            debug!(
                "Fetched {} comments for {} (page token {:?})",
                page.comments.len(),
                video_id,
                page_token
            );
            if page.comments.is_empty() {
                break;
            }
            comments.extend(page.comments);

            match page.next_page_token {
                Some(next)
                    if comments.len() < limit && page_token.as_deref() != Some(next.as_str()) =>
                {
                    page_token = Some(next);
                    self.pause_between_pages().await;
                }
                _ => break,
            }
        }

        comments.truncate(limit);
        Ok(comments)
    }
}

#[async_trait]
impl<A: YouTubeApi> VideoSource for YouTubeFetcher<A> {
    async fn list_trending(
        &self,
        region: &str,
        max_results: u32,
    ) -> Result<Vec<VideoMetadata>, CoreError> {
        let limit = max_results as usize;
        let mut videos: Vec<VideoMetadata> = Vec::new();
        let mut seen = HashSet::new();
        let mut page_token: Option<String> = None;

        while videos.len() < limit {
            let page_size = (limit - videos.len()).min(TRENDING_PAGE_SIZE as usize) as u32;
            let page = self
                .retry
                .execute("videos.list(mostPopular)", || {
                    self.api
                        .most_popular(region, page_size, page_token.as_deref())
                })
                .await?;

            // The chart can shift between pages
            let before = videos.len();
            videos.extend(
                page.videos
                    .into_iter()
                    .filter(|video| seen.insert(video.id.clone())),
            );
            if videos.len() == before {
                break;
            }

            match page.next_page_token {
                Some(next)
                    if videos.len() < limit && page_token.as_deref() != Some(next.as_str()) =>
                {
                    page_token = Some(next);
                    self.pause_between_pages().await;
                }
                _ => break,
            }
        }

        videos.truncate(limit);
        info!("Listed {} trending videos for {}", videos.len(), region);
        Ok(videos)
    }

    async fn resolve_video(&self, reference: &str) -> Result<(VideoRef, VideoMetadata), CoreError> {
        let video_ref = VideoRef::parse(reference)?;
        let video = self.fetch_video(&video_ref.id).await?;
        Ok((video_ref, video))
    }

    async fn fetch_video(&self, video_id: &str) -> Result<VideoMetadata, CoreError> {
        let video = self
            .retry
            .execute("videos.list(id)", || self.api.video_by_id(video_id))
            .await?;

        video.ok_or_else(|| {
            CoreError::YouTubeApi(YouTubeApiError::VideoNotFound {
                video_id: video_id.to_string(),
            })
        })
    }

    async fn fetch_comments(
        &self,
        video_id: &str,
        max_comments: u32,
    ) -> Result<Vec<Comment>, CoreError> {
        match self.collect_comments(video_id, max_comments).await {
            Err(CoreError::YouTubeApi(YouTubeApiError::CommentsDisabled { .. })) => {
                warn!("Comments are disabled for {}", video_id);
                Ok(Vec::new())
            }
            other => other,
        }
    }
}

use async_trait::async_trait;
use tubemood_core::{Comment, CoreError, VideoMetadata, VideoRef};

/// One page of a video listing.
#[derive(Debug, Clone, Default)]
pub struct VideoPage {
    pub videos: Vec<VideoMetadata>,
    pub next_page_token: Option<String>,
}

/// One page of top-level comments.
#[derive(Debug, Clone, Default)]
pub struct CommentPage {
    pub comments: Vec<Comment>,
    pub next_page_token: Option<String>,
}

/// Raw page-at-a-time access to the YouTube Data API.
#[async_trait]
pub trait YouTubeApi: Send + Sync {
    async fn most_popular(
        &self,
        region: &str,
        page_size: u32,
        page_token: Option<&str>,
    ) -> Result<VideoPage, CoreError>;

    async fn video_by_id(&self, video_id: &str) -> Result<Option<VideoMetadata>, CoreError>;

    async fn comment_threads(
        &self,
        video_id: &str,
        page_size: u32,
        page_token: Option<&str>,
    ) -> Result<CommentPage, CoreError>;
}

/// Complete, retried fetch operations the analysis pipeline consumes.
#[async_trait]
pub trait VideoSource: Send + Sync {
    /// Up to `max_results` most-popular videos for a region, in API order.
    async fn list_trending(
        &self,
        region: &str,
        max_results: u32,
    ) -> Result<Vec<VideoMetadata>, CoreError>;

    /// Parse a URL or bare id and fetch the video it names.
    async fn resolve_video(&self, reference: &str) -> Result<(VideoRef, VideoMetadata), CoreError>;

    async fn fetch_video(&self, video_id: &str) -> Result<VideoMetadata, CoreError>;

    /// Newest-first top-level comments, at most `max_comments`. Disabled comments yield an empty list.
    async fn fetch_comments(
        &self,
        video_id: &str,
        max_comments: u32,
    ) -> Result<Vec<Comment>, CoreError>;
}

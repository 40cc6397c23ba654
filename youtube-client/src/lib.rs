pub mod api;
pub mod fetcher;
pub mod metrics;
pub mod rate_limiter;
pub mod retry;
pub mod source;


pub use api::{map_error_response, RequestContext, YouTubeApiClient, YOUTUBE_API_BASE};
pub use fetcher::{YouTubeFetcher, COMMENT_PAGE_SIZE, TRENDING_PAGE_SIZE};
pub use metrics::{ApiMetrics, MetricsCollector, DEFAULT_DAILY_QUOTA};
pub use rate_limiter::{RateLimitConfig, RateLimiter};
pub use retry::{RetryConfig, RetryExecutor, RetryOutcome, RetryStrategy};
pub use source::{CommentPage, VideoPage, VideoSource, YouTubeApi};

/// Fetcher wired to the live HTTP client.
pub type LiveFetcher = YouTubeFetcher<YouTubeApiClient>;

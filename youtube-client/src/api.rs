use crate::metrics::{ApiMetrics, MetricsCollector, RequestMetrics};
use crate::rate_limiter::{RateLimitConfig, RateLimitStatus, RateLimiter};
use crate::source::{CommentPage, VideoPage, YouTubeApi};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use tubemood_core::{AppConfig, Comment, CoreError, VideoMetadata, YouTubeApiError};

pub const YOUTUBE_API_BASE: &str = "https://www.googleapis.com/youtube/v3";
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

const QUOTA_REASONS: &[&str] = &[
    "quotaExceeded",
    "rateLimitExceeded",
    "userRateLimitExceeded",
    "dailyLimitExceeded",
];
const KEY_REASONS: &[&str] = &["keyInvalid", "keyExpired"];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoListResponse {
    #[serde(default)]
    pub items: Vec<VideoResource>,
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoResource {
    pub id: String,
    pub snippet: Option<VideoSnippet>,
    pub statistics: Option<VideoStatistics>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoSnippet {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub channel_title: String,
    pub published_at: Option<String>,
    pub thumbnails: Option<Thumbnails>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Thumbnails {
    pub default: Option<Thumbnail>,
    pub medium: Option<Thumbnail>,
    pub high: Option<Thumbnail>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thumbnail {
    pub url: String,
}

/// The API reports counts as decimal strings; hidden counts are omitted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoStatistics {
    pub view_count: Option<String>,
    pub like_count: Option<String>,
    pub comment_count: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentThreadListResponse {
    #[serde(default)]
    pub items: Vec<CommentThreadResource>,
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentThreadResource {
    pub id: String,
    pub snippet: Option<CommentThreadSnippet>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentThreadSnippet {
    pub video_id: Option<String>,
    pub top_level_comment: Option<CommentResource>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentResource {
    pub id: Option<String>,
    pub snippet: Option<CommentSnippet>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentSnippet {
    pub text_original: Option<String>,
    pub text_display: Option<String>,
    pub published_at: Option<String>,
    pub like_count: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorEnvelope {
    pub error: ApiErrorBody,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiErrorBody {
    pub code: Option<u16>,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub errors: Vec<ApiErrorItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorItem {
    pub reason: Option<String>,
    pub message: Option<String>,
}

impl ApiErrorBody {
    fn has_reason(&self, candidates: &[&str]) -> Option<String> {
        self.errors
            .iter()
            .filter_map(|item| item.reason.as_deref())
            .find(|reason| candidates.contains(reason))
            .map(str::to_string)
    }

    fn first_reason(&self) -> Option<&str> {
        self.errors.iter().find_map(|item| item.reason.as_deref())
    }
}

fn parse_timestamp(raw: Option<&str>) -> Option<DateTime<Utc>> {
    raw.and_then(|value| DateTime::parse_from_rfc3339(value).ok())
        .map(|parsed| parsed.with_timezone(&Utc))
}

fn parse_count(raw: Option<&str>) -> u64 {
    raw.and_then(|value| value.parse().ok()).unwrap_or(0)
}

impl VideoResource {
    pub fn into_metadata(self) -> VideoMetadata {
        let snippet = self.snippet.unwrap_or_default();
        let statistics = self.statistics.unwrap_or_default();
        let thumbnail_url = snippet.thumbnails.and_then(|thumbs| {
            thumbs
                .high
                .or(thumbs.medium)
                .or(thumbs.default)
                .map(|thumb| thumb.url)
        });

        VideoMetadata {
            id: self.id,
            title: snippet.title,
            channel: snippet.channel_title,
            published_at: parse_timestamp(snippet.published_at.as_deref()),
            thumbnail_url,
            views: parse_count(statistics.view_count.as_deref()),
            likes: parse_count(statistics.like_count.as_deref()),
            comments: parse_count(statistics.comment_count.as_deref()),
        }
    }
}

impl CommentThreadResource {
    /// Convert a thread to its top-level comment, or `None` when text or timestamp is missing.
    pub fn into_comment(self, video_id: &str) -> Option<Comment> {
        let snippet = self.snippet?;
        let top_level = snippet.top_level_comment?;
        let content = top_level.snippet?;

        let text = content
            .text_original
            .filter(|text| !text.trim().is_empty())
            .or(content.text_display.filter(|text| !text.trim().is_empty()))?;
        let published_at = parse_timestamp(content.published_at.as_deref())?;

        Some(Comment {
            id: top_level.id.unwrap_or(self.id),
            video_id: snippet.video_id.unwrap_or_else(|| video_id.to_string()),
            text,
            published_at,
            like_count: content.like_count.unwrap_or(0),
        })
    }
}

/// What a request was for, so error responses map to the right resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestContext {
    Trending { region: String },
    Video { video_id: String },
    Comments { video_id: String },
}

impl RequestContext {
    pub fn endpoint(&self) -> &'static str {
        match self {
            RequestContext::Trending { .. } | RequestContext::Video { .. } => "videos",
            RequestContext::Comments { .. } => "commentThreads",
        }
    }

    fn resource(&self) -> String {
        match self {
            RequestContext::Trending { region } => format!("trending videos for {}", region),
            RequestContext::Video { video_id } => format!("video {}", video_id),
            RequestContext::Comments { video_id } => format!("comments for {}", video_id),
        }
    }

    fn region(&self) -> String {
        match self {
            RequestContext::Trending { region } => region.clone(),
            _ => "unknown".to_string(),
        }
    }

    fn video_id(&self) -> String {
        match self {
            RequestContext::Video { video_id } | RequestContext::Comments { video_id } => {
                video_id.clone()
            }
            RequestContext::Trending { .. } => "unknown".to_string(),
        }
    }
}

/// Map a non-success response to a typed error.
pub fn map_error_response(status: u16, body: &str, context: &RequestContext) -> YouTubeApiError {
    let envelope = serde_json::from_str::<ApiErrorEnvelope>(body)
        .map(|envelope| envelope.error)
        .unwrap_or_default();

    let key_rejected = status == 401
        || envelope.has_reason(KEY_REASONS).is_some()
        || envelope.message.contains("API key not valid");
    if key_rejected && matches!(status, 400 | 401 | 403) {
        return YouTubeApiError::InvalidApiKey;
    }

    if status == 429 || status == 403 {
        if let Some(reason) = envelope.has_reason(QUOTA_REASONS) {
            return YouTubeApiError::RateLimitExceeded {
                reason,
                retry_after: None,
            };
        }
        if status == 429 {
            return YouTubeApiError::RateLimitExceeded {
                reason: "tooManyRequests".to_string(),
                retry_after: None,
            };
        }
    }

    match status {
        400 => {
            let region_rejected = envelope.has_reason(&["invalidRegionCode"]).is_some()
                || envelope.message.to_lowercase().contains("region");
            if region_rejected {
                YouTubeApiError::RegionNotFound {
                    region: context.region(),
                }
            } else {
                YouTubeApiError::BadRequest {
                    reason: if envelope.message.is_empty() {
                        envelope.first_reason().unwrap_or("badRequest").to_string()
                    } else {
                        envelope.message.clone()
                    },
                }
            }
        }
        403 if envelope.has_reason(&["commentsDisabled"]).is_some() => {
            YouTubeApiError::CommentsDisabled {
                video_id: context.video_id(),
            }
        }
        403 => YouTubeApiError::Forbidden {
            resource: context.resource(),
        },
        404 => match context {
            RequestContext::Trending { region } => YouTubeApiError::RegionNotFound {
                region: region.clone(),
            },
            RequestContext::Video { video_id } | RequestContext::Comments { video_id } => {
                YouTubeApiError::VideoNotFound {
                    video_id: video_id.clone(),
                }
            }
        },
        408 => YouTubeApiError::RequestTimeout,
        500..=599 => YouTubeApiError::ServerError {
            status_code: status,
        },
        _ => YouTubeApiError::InvalidResponse {
            details: format!("unexpected status {} for {}", status, context.resource()),
        },
    }
}

pub struct YouTubeApiClient {
    http_client: Client,
    api_key: String,
    base_url: String,
    rate_limiter: Arc<RateLimiter>,
    metrics: Arc<MetricsCollector>,
}

impl YouTubeApiClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self, CoreError> {
        let http_client = Client::builder()
            .user_agent(concat!("tubemood/", env!("CARGO_PKG_VERSION")))
            .timeout(HTTP_TIMEOUT)
            .build()?;

        Ok(Self {
            http_client,
            api_key: api_key.into(),
            base_url: YOUTUBE_API_BASE.to_string(),
            rate_limiter: Arc::new(RateLimiter::new(RateLimitConfig::youtube_data_api())),
            metrics: Arc::new(MetricsCollector::new()),
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, CoreError> {
        let client = Self::new(config.api_key.clone())?;
        Ok(match &config.api_base_url {
            Some(base_url) => client.with_base_url(base_url.clone()),
            None => client,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn make_request<T: DeserializeOwned>(
        &self,
        context: &RequestContext,
        query_params: &[(&str, String)],
    ) -> Result<T, CoreError> {
        let endpoint = context.endpoint();
        let url = format!("{}/{}", self.base_url, endpoint);
        let start_time = Instant::now();

        let _permit = self.rate_limiter.acquire_permit().await?;
        debug!("Acquired rate limit permit for {}", endpoint);

        let request_builder = self
            .http_client
            .get(&url)
            .query(&[("key", self.api_key.as_str())])
            .query(query_params);

        info!("Making YouTube API request: {} ({})", endpoint, context.resource());
        let response = match request_builder.send().await {
            Ok(response) => response,
            Err(e) => {
                error!("Network error for {}: {}", endpoint, e);
                self.record(endpoint, None, start_time, false, Some("network_error"))
                    .await;
                return Err(if e.is_timeout() {
                    CoreError::YouTubeApi(YouTubeApiError::RequestTimeout)
                } else {
                    CoreError::Network(e)
                });
            }
        };

        let status = response.status();
        if !status.is_success() {
            let retry_after = retry_after_seconds(&response);
            let body = response.text().await.unwrap_or_default();
            let mut api_error = map_error_response(status.as_u16(), &body, context);

            if let YouTubeApiError::RateLimitExceeded {
                retry_after: slot, ..
            } = &mut api_error
            {
                *slot = retry_after;
                warn!("Rate limited on {}, retry after {:?}", endpoint, retry_after);
            } else {
                error!("Request failed with status {} for {}", status, endpoint);
            }

            let rate_limited = matches!(api_error, YouTubeApiError::RateLimitExceeded { .. });
            self.record(
                endpoint,
                Some(status),
                start_time,
                false,
                Some(if rate_limited { "rate_limited" } else { "api_error" }),
            )
            .await;
            return Err(api_error.into());
        }

        let parsed = response.json::<T>().await.map_err(|e| {
            error!("Failed to parse {} response: {}", endpoint, e);
            CoreError::YouTubeApi(YouTubeApiError::InvalidResponse {
                details: format!("Failed to parse {} response", endpoint),
            })
        });
        self.record(
            endpoint,
            Some(status),
            start_time,
            parsed.is_ok(),
            parsed.as_ref().err().map(|_| "invalid_response"),
        )
        .await;
        parsed
    }

    async fn record(
        &self,
        endpoint: &str,
        status: Option<StatusCode>,
        start_time: Instant,
        success: bool,
        error_type: Option<&str>,
    ) {
        self.metrics
            .record_request(RequestMetrics {
                endpoint: endpoint.to_string(),
                status_code: status.map(|s| s.as_u16()),
                response_time: start_time.elapsed(),
                success,
                rate_limited: error_type == Some("rate_limited"),
                error_type: error_type.map(str::to_string),
            })
            .await;
    }

    pub async fn get_metrics(&self) -> ApiMetrics {
        self.metrics.get_metrics().await
    }

    pub async fn remaining_quota(&self, daily_quota: u64) -> u64 {
        self.metrics.remaining_quota(daily_quota).await
    }

    pub async fn get_rate_limit_status(&self) -> RateLimitStatus {
        self.rate_limiter.get_rate_limit_status().await
    }

    pub async fn reset_metrics(&self) {
        self.metrics.reset_metrics().await;
    }
}

impl fmt::Debug for YouTubeApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("YouTubeApiClient")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .finish_non_exhaustive()
    }
}

fn retry_after_seconds(response: &reqwest::Response) -> Option<u64> {
    response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse().ok())
}

#[async_trait]
impl YouTubeApi for YouTubeApiClient {
    async fn most_popular(
        &self,
        region: &str,
        page_size: u32,
        page_token: Option<&str>,
    ) -> Result<VideoPage, CoreError> {
        let context = RequestContext::Trending {
            region: region.to_string(),
        };
        let mut params = vec![
            ("part", "snippet,statistics".to_string()),
            ("chart", "mostPopular".to_string()),
            ("regionCode", region.to_string()),
            ("maxResults", page_size.to_string()),
        ];
        if let Some(token) = page_token {
            params.push(("pageToken", token.to_string()));
        }

        let listing: VideoListResponse = self.make_request(&context, &params).await?;
        info!("Retrieved {} trending videos for {}", listing.items.len(), region);

        Ok(VideoPage {
            videos: listing
                .items
                .into_iter()
                .map(VideoResource::into_metadata)
                .collect(),
            next_page_token: listing.next_page_token,
        })
    }

    async fn video_by_id(&self, video_id: &str) -> Result<Option<VideoMetadata>, CoreError> {
        let context = RequestContext::Video {
            video_id: video_id.to_string(),
        };
        let params = [
            ("part", "snippet,statistics".to_string()),
            ("id", video_id.to_string()),
        ];

        let listing: VideoListResponse = self.make_request(&context, &params).await?;
        debug!("Retrieved {} videos for id {}", listing.items.len(), video_id);
        Ok(listing
            .items
            .into_iter()
            .next()
            .map(VideoResource::into_metadata))
    }

    async fn comment_threads(
        &self,
        video_id: &str,
        page_size: u32,
        page_token: Option<&str>,
    ) -> Result<CommentPage, CoreError> {
        let context = RequestContext::Comments {
            video_id: video_id.to_string(),
        };
        let mut params = vec![
            ("part", "snippet".to_string()),
            ("videoId", video_id.to_string()),
            ("maxResults", page_size.to_string()),
            ("order", "time".to_string()),
            ("textFormat", "plainText".to_string()),
        ];
        if let Some(token) = page_token {
            params.push(("pageToken", token.to_string()));
        }

        let listing: CommentThreadListResponse = self.make_request(&context, &params).await?;
        let received = listing.items.len();
        let comments: Vec<Comment> = listing
            .items
            .into_iter()
            .filter_map(|thread| thread.into_comment(video_id))
            .collect();
        if comments.len() < received {
            debug!(
                "Skipped {} comment threads without text or timestamp on {}",
                received - comments.len(),
                video_id
            );
        }

        Ok(CommentPage {
            comments,
            next_page_token: listing.next_page_token,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn error_body(code: u16, reason: &str, message: &str) -> String {
        serde_json::json!({
            "error": {
                "code": code,
                "message": message,
                "errors": [{ "reason": reason, "message": message }]
            }
        })
        .to_string()
    }

    fn video_ctx() -> RequestContext {
        RequestContext::Video {
            video_id: "abc123".to_string(),
        }
    }

    fn trending_ctx() -> RequestContext {
        RequestContext::Trending {
            region: "ZZ".to_string(),
        }
    }

    #[test]
    fn test_quota_errors_are_rate_limits() {
        let body = error_body(403, "quotaExceeded", "The request cannot be completed");
        assert_eq!(
            map_error_response(403, &body, &video_ctx()),
            YouTubeApiError::RateLimitExceeded {
                reason: "quotaExceeded".to_string(),
                retry_after: None,
            }
        );

        assert!(matches!(
            map_error_response(429, "", &video_ctx()),
            YouTubeApiError::RateLimitExceeded { .. }
        ));
    }

    #[test]
    fn test_invalid_key_detection() {
        let body = error_body(400, "badRequest", "API key not valid. Please pass a valid API key.");
        assert_eq!(
            map_error_response(400, &body, &video_ctx()),
            YouTubeApiError::InvalidApiKey
        );

        let body = error_body(403, "keyExpired", "expired");
        assert_eq!(
            map_error_response(403, &body, &video_ctx()),
            YouTubeApiError::InvalidApiKey
        );
    }

    #[test]
    fn test_comments_disabled() {
        let ctx = RequestContext::Comments {
            video_id: "abc123".to_string(),
        };
        let body = error_body(403, "commentsDisabled", "The video has disabled comments.");
        assert_eq!(
            map_error_response(403, &body, &ctx),
            YouTubeApiError::CommentsDisabled {
                video_id: "abc123".to_string()
            }
        );
    }

    #[test]
    fn test_region_and_not_found_mapping() {
        let body = error_body(400, "invalidRegionCode", "The regionCode parameter is invalid");
        assert_eq!(
            map_error_response(400, &body, &trending_ctx()),
            YouTubeApiError::RegionNotFound {
                region: "ZZ".to_string()
            }
        );

        assert_eq!(
            map_error_response(404, "", &video_ctx()),
            YouTubeApiError::VideoNotFound {
                video_id: "abc123".to_string()
            }
        );
        assert_eq!(
            map_error_response(404, "", &trending_ctx()),
            YouTubeApiError::RegionNotFound {
                region: "ZZ".to_string()
            }
        );
    }

    #[test]
    fn test_other_statuses() {
        let body = error_body(400, "invalidParameter", "maxResults out of range");
        assert_eq!(
            map_error_response(400, &body, &video_ctx()),
            YouTubeApiError::BadRequest {
                reason: "maxResults out of range".to_string()
            }
        );
        assert!(matches!(
            map_error_response(403, &error_body(403, "forbidden", "nope"), &video_ctx()),
            YouTubeApiError::Forbidden { .. }
        ));
        assert_eq!(
            map_error_response(503, "<html>unavailable</html>", &video_ctx()),
            YouTubeApiError::ServerError { status_code: 503 }
        );
        assert!(matches!(
            map_error_response(302, "", &video_ctx()),
            YouTubeApiError::InvalidResponse { .. }
        ));
    }

    #[test]
    fn test_video_list_deserialization() {
        let body = r#"{
            "kind": "youtube#videoListResponse",
            "nextPageToken": "CAUQAA",
            "items": [{
                "id": "dQw4w9WgXcQ",
                "snippet": {
                    "publishedAt": "2009-10-25T06:57:33Z",
                    "title": "Never Gonna Give You Up",
                    "channelTitle": "Rick Astley",
                    "thumbnails": {
                        "default": { "url": "https://i.ytimg.com/vi/dQw4w9WgXcQ/default.jpg" },
                        "high": { "url": "https://i.ytimg.com/vi/dQw4w9WgXcQ/hqdefault.jpg" }
                    }
                },
                "statistics": { "viewCount": "1500000000", "likeCount": "17000000", "commentCount": "2300000" }
            }, {
                "id": "hiddenStats",
                "snippet": { "title": "No stats" }
            }]
        }"#;

        let listing: VideoListResponse = serde_json::from_str(body).unwrap();
        assert_eq!(listing.next_page_token.as_deref(), Some("CAUQAA"));

        let videos: Vec<VideoMetadata> = listing
            .items
            .into_iter()
            .map(VideoResource::into_metadata)
            .collect();
        assert_eq!(videos[0].id, "dQw4w9WgXcQ");
        assert_eq!(videos[0].channel, "Rick Astley");
        assert_eq!(videos[0].views, 1_500_000_000);
        assert_eq!(videos[0].comments, 2_300_000);
        assert!(videos[0].published_at.is_some());
        assert_eq!(
            videos[0].thumbnail_url.as_deref(),
            Some("https://i.ytimg.com/vi/dQw4w9WgXcQ/hqdefault.jpg")
        );
        assert_eq!(videos[1].views, 0);
        assert!(videos[1].published_at.is_none());
    }

    #[test]
    fn test_comment_thread_conversion() {
        let body = r#"{
            "items": [
                { "id": "t1", "snippet": { "videoId": "v1", "topLevelComment": { "id": "c1",
                    "snippet": { "textOriginal": "Great video!", "textDisplay": "Great video!",
                                 "publishedAt": "2024-03-01T12:30:00Z", "likeCount": 4 } } } },
                { "id": "t2", "snippet": { "topLevelComment": {
                    "snippet": { "textOriginal": "", "textDisplay": "display only",
                                 "publishedAt": "2024-03-01T12:00:00Z" } } } },
                { "id": "t3", "snippet": { "topLevelComment": { "id": "c3",
                    "snippet": { "textOriginal": "no timestamp" } } } },
                { "id": "t4", "snippet": { "topLevelComment": { "id": "c4",
                    "snippet": { "publishedAt": "2024-03-01T12:00:00Z" } } } }
            ]
        }"#;

        let listing: CommentThreadListResponse = serde_json::from_str(body).unwrap();
        assert!(listing.next_page_token.is_none());

        let comments: Vec<Comment> = listing
            .items
            .into_iter()
            .filter_map(|thread| thread.into_comment("v1"))
            .collect();

        assert_eq!(comments.len(), 2);
        assert_eq!(comments[0].id, "c1");
        assert_eq!(comments[0].like_count, 4);
        assert_eq!(comments[1].id, "t2");
        assert_eq!(comments[1].text, "display only");
        assert_eq!(comments[1].video_id, "v1");
    }

    #[tokio::test]
    async fn test_api_client_creation() {
        let client = YouTubeApiClient::new("secret-key")
            .unwrap()
            .with_base_url("http://localhost:8080/youtube/v3/");
        assert_eq!(client.base_url(), "http://localhost:8080/youtube/v3");
        assert!(!format!("{:?}", client).contains("secret-key"));

        let status = client.get_rate_limit_status().await;
        assert!(status.available_tokens > 0);

        let metrics = client.get_metrics().await;
        assert_eq!(metrics.total_requests, 0);
        assert_eq!(client.remaining_quota(100).await, 100);
    }
}

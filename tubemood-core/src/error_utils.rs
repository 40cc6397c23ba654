use crate::error::*;
use std::time::Duration;
use tracing::{error, info, warn};

pub trait ErrorExt {
    fn log_error(&self) -> &Self;
    fn log_warn(&self) -> &Self;
    fn is_retryable(&self) -> bool;
    fn retry_after(&self) -> Option<Duration>;
    fn is_not_found(&self) -> bool;
    fn user_friendly_message(&self) -> String;
    fn error_code(&self) -> String;
}

impl ErrorExt for CoreError {
    fn log_error(&self) -> &Self {
        error!("CoreError: {}", self);
        match self {
            CoreError::YouTubeApi(e) => {
                error!("YouTube API error details: {:?}", e);
            }
            CoreError::Config(e) => {
                error!("Configuration error details: {:?}", e);
            }
            _ => {}
        }
        self
    }

    fn log_warn(&self) -> &Self {
        warn!("CoreError (warning): {}", self);
        self
    }

    fn is_retryable(&self) -> bool {
        match self {
            CoreError::YouTubeApi(e) => e.is_retryable(),
            CoreError::Network(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            CoreError::YouTubeApi(e) => e.retry_after(),
            _ => None,
        }
    }

    fn is_not_found(&self) -> bool {
        match self {
            CoreError::YouTubeApi(e) => e.is_not_found(),
            CoreError::NotFound { .. } => true,
            _ => false,
        }
    }

    fn user_friendly_message(&self) -> String {
        match self {
            CoreError::YouTubeApi(e) => e.user_friendly_message(),
            CoreError::Config(e) => e.user_friendly_message(),
            CoreError::Network(_) => {
                "Network connection error. Please check your internet connection.".to_string()
            }
            CoreError::InvalidReference { .. } => {
                "Invalid YouTube URL. Please enter a valid YouTube video link or ID.".to_string()
            }
            CoreError::NotFound { resource } => format!("Could not find: {}", resource),
            CoreError::Unavailable { operation, .. } => format!(
                "YouTube is not responding to {} right now. Please try again later.",
                operation
            ),
            CoreError::Timeout { .. } => {
                "The analysis took too long to complete. Please try again.".to_string()
            }
            _ => "An unexpected error occurred. Please try again later.".to_string(),
        }
    }

    fn error_code(&self) -> String {
        match self {
            CoreError::YouTubeApi(e) => e.error_code(),
            CoreError::Config(e) => e.error_code(),
            CoreError::Io(_) => "IO".to_string(),
            CoreError::Serialization(_) => "SERIALIZATION".to_string(),
            CoreError::Network(_) => "NETWORK".to_string(),
            CoreError::InvalidReference { .. } => "INVALID_REFERENCE".to_string(),
            CoreError::NotFound { .. } => "NOT_FOUND".to_string(),
            CoreError::Unavailable { .. } => "UNAVAILABLE".to_string(),
            CoreError::Timeout { .. } => "TIMEOUT".to_string(),
            CoreError::Internal { .. } => "INTERNAL".to_string(),
        }
    }
}

impl ErrorExt for YouTubeApiError {
    fn log_error(&self) -> &Self {
        error!("YouTubeApiError: {}", self);
        self
    }

    fn log_warn(&self) -> &Self {
        warn!("YouTubeApiError (warning): {}", self);
        self
    }

    fn is_retryable(&self) -> bool {
        match self {
            YouTubeApiError::RateLimitExceeded { .. } => true,
            YouTubeApiError::RequestTimeout => true,
            YouTubeApiError::ServerError { status_code } => *status_code >= 500,
            _ => false,
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            YouTubeApiError::RateLimitExceeded {
                retry_after: Some(seconds),
                ..
            } => Some(Duration::from_secs(*seconds)),
            _ => None,
        }
    }

    fn is_not_found(&self) -> bool {
        matches!(
            self,
            YouTubeApiError::VideoNotFound { .. } | YouTubeApiError::RegionNotFound { .. }
        )
    }

    fn user_friendly_message(&self) -> String {
        match self {
            YouTubeApiError::InvalidApiKey => {
                "The YouTube API key is invalid. Please check YOUTUBE_API_KEY.".to_string()
            }
            YouTubeApiError::RateLimitExceeded { .. } => {
                "YouTube API quota or rate limit reached. Please wait before trying again."
                    .to_string()
            }
            YouTubeApiError::VideoNotFound { .. } => {
                "Video not found. Please check the URL and try again.".to_string()
            }
            YouTubeApiError::RegionNotFound { region } => {
                format!("Region '{}' is not supported by YouTube.", region)
            }
            YouTubeApiError::CommentsDisabled { .. } => {
                "Comments are disabled for this video.".to_string()
            }
            YouTubeApiError::Forbidden { resource } => {
                format!("Access denied to {}.", resource)
            }
            YouTubeApiError::RequestTimeout => {
                "Request to YouTube timed out. Please try again.".to_string()
            }
            _ => "YouTube API error occurred. Please try again later.".to_string(),
        }
    }

    fn error_code(&self) -> String {
        match self {
            YouTubeApiError::InvalidApiKey => "YOUTUBE_INVALID_API_KEY".to_string(),
            YouTubeApiError::RateLimitExceeded { .. } => "YOUTUBE_RATE_LIMIT".to_string(),
            YouTubeApiError::VideoNotFound { .. } => "YOUTUBE_VIDEO_NOT_FOUND".to_string(),
            YouTubeApiError::RegionNotFound { .. } => "YOUTUBE_REGION_NOT_FOUND".to_string(),
            YouTubeApiError::CommentsDisabled { .. } => "YOUTUBE_COMMENTS_DISABLED".to_string(),
            YouTubeApiError::Forbidden { .. } => "YOUTUBE_FORBIDDEN".to_string(),
            YouTubeApiError::BadRequest { .. } => "YOUTUBE_BAD_REQUEST".to_string(),
            YouTubeApiError::ServerError { .. } => "YOUTUBE_SERVER_ERROR".to_string(),
            YouTubeApiError::RequestTimeout => "YOUTUBE_TIMEOUT".to_string(),
            YouTubeApiError::InvalidResponse { .. } => "YOUTUBE_INVALID_RESPONSE".to_string(),
        }
    }
}

impl ErrorExt for ConfigError {
    fn log_error(&self) -> &Self {
        error!("ConfigError: {}", self);
        self
    }

    fn log_warn(&self) -> &Self {
        warn!("ConfigError (warning): {}", self);
        self
    }

    fn is_retryable(&self) -> bool {
        false
    }

    fn retry_after(&self) -> Option<Duration> {
        None
    }

    fn is_not_found(&self) -> bool {
        false
    }

    fn user_friendly_message(&self) -> String {
        match self {
            ConfigError::FileNotFound { path } => {
                format!("Configuration file '{}' not found.", path)
            }
            ConfigError::InvalidFormat { .. } | ConfigError::Parse(_) => {
                "Configuration file format is invalid. Please check the settings.".to_string()
            }
            ConfigError::InvalidValue { field, .. } => {
                format!("Invalid value for configuration field '{}'.", field)
            }
            ConfigError::MissingEnvironmentVariable { var_name } => format!(
                "{} not set. Add it to .env or the environment.",
                var_name
            ),
        }
    }

    fn error_code(&self) -> String {
        match self {
            ConfigError::FileNotFound { .. } => "CONFIG_FILE_NOT_FOUND".to_string(),
            ConfigError::InvalidFormat { .. } => "CONFIG_INVALID_FORMAT".to_string(),
            ConfigError::InvalidValue { .. } => "CONFIG_INVALID_VALUE".to_string(),
            ConfigError::MissingEnvironmentVariable { .. } => "CONFIG_MISSING_ENV_VAR".to_string(),
            ConfigError::Parse(_) => "CONFIG_PARSE_ERROR".to_string(),
        }
    }
}

pub struct ErrorReporter {
    report_errors: bool,
    report_warnings: bool,
}

impl ErrorReporter {
    pub fn new() -> Self {
        Self {
            report_errors: true,
            report_warnings: true,
        }
    }

    pub fn with_error_reporting(mut self, enabled: bool) -> Self {
        self.report_errors = enabled;
        self
    }

    pub fn with_warning_reporting(mut self, enabled: bool) -> Self {
        self.report_warnings = enabled;
        self
    }

    pub fn report_error(&self, error: &CoreError) {
        if self.report_errors {
            error.log_error();
            info!("Error code: {}", error.error_code());
            info!("User message: {}", error.user_friendly_message());
        }
    }

    pub fn report_warning(&self, error: &CoreError) {
        if self.report_warnings {
            error.log_warn();
        }
    }
}

impl Default for ErrorReporter {
    fn default() -> Self {
        Self::new()
    }
}

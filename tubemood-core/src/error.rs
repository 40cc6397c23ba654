use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("YouTube API error: {0}")]
    YouTubeApi(#[from] YouTubeApiError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid video reference: {input:?}")]
    InvalidReference { input: String },

    #[error("Resource not found: {resource}")]
    NotFound { resource: String },

    #[error("{operation} unavailable after {attempts} attempts: {last_error}")]
    Unavailable {
        operation: String,
        attempts: u32,
        last_error: String,
    },

    #[error("Operation timeout after {seconds} seconds")]
    Timeout { seconds: u64 },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum YouTubeApiError {
    #[error("API key invalid or missing")]
    InvalidApiKey,

    #[error("Rate limit exceeded: {reason}")]
    RateLimitExceeded {
        reason: String,
        retry_after: Option<u64>,
    },

    #[error("Video not found: {video_id}")]
    VideoNotFound { video_id: String },

    #[error("Region not found: {region}")]
    RegionNotFound { region: String },

    #[error("Comments are disabled for video {video_id}")]
    CommentsDisabled { video_id: String },

    #[error("Forbidden access to resource: {resource}")]
    Forbidden { resource: String },

    #[error("Bad request: {reason}")]
    BadRequest { reason: String },

    #[error("Server error: {status_code}")]
    ServerError { status_code: u16 },

    #[error("Request timeout")]
    RequestTimeout,

    #[error("Invalid API response: {details}")]
    InvalidResponse { details: String },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },

    #[error("Invalid configuration format: {details}")]
    InvalidFormat { details: String },

    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    #[error("Environment variable not set: {var_name}")]
    MissingEnvironmentVariable { var_name: String },

    #[error("Configuration parsing error: {0}")]
    Parse(#[from] toml::de::Error),
}

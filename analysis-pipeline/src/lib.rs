//! Turns fetched videos and comments into sentiment summaries.

pub mod aggregator;
pub mod cache;
pub mod insight;
pub mod orchestrator;

pub use aggregator::{hour_floor, Aggregator};
pub use cache::{CacheEntry, CacheStats, FetchCache, TtlCache};
pub use insight::{overall_analysis, region_sentiment, trend_direction, TrendDirection};
pub use orchestrator::{PipelineSettings, SentimentPipeline};

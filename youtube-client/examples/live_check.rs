use std::sync::Arc;
use tubemood_core::{AppConfig, ErrorExt};
use youtube_client::{VideoSource, YouTubeApiClient, YouTubeFetcher, DEFAULT_DAILY_QUOTA};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter("youtube_client=debug")
        .init();

    println!("=== YouTube Client Live Check ===\n");

    let config = AppConfig::from_env()?;
    println!("Region: {}", config.region);

    let client = Arc::new(YouTubeApiClient::from_config(&config)?);
    let fetcher = YouTubeFetcher::from_config(client.clone(), &config);

    // Test 1: Trending listing
    println!("\n🧪 Test 1: Trending videos");
    let videos = match fetcher.list_trending(&config.region, 3).await {
        Ok(videos) => {
            println!("✅ Retrieved {} trending videos", videos.len());
            for video in &videos {
                println!("   {} | {} ({} views)", video.id, video.title, video.views);
            }
            videos
        }
        Err(e) => {
            println!("❌ Trending failed [{}]: {}", e.error_code(), e.user_friendly_message());
            return Ok(());
        }
    };

    // Test 2: Comments for the first video
    if let Some(video) = videos.first() {
        println!("\n🧪 Test 2: Comments for {}", video.id);
        match fetcher.fetch_comments(&video.id, 20).await {
            Ok(comments) => {
                println!("✅ Retrieved {} comments", comments.len());
                for comment in comments.iter().take(3) {
                    println!("   [{}] {}", comment.published_at, comment.text);
                }
            }
            Err(e) => println!("❌ Comments failed [{}]: {}", e.error_code(), e),
        }
    }

    // Test 3: Client bookkeeping
    println!("\n🧪 Test 3: Metrics");
    let metrics = client.get_metrics().await;
    println!("   Requests: {} ({} failed)", metrics.total_requests, metrics.failed_requests);
    println!(
        "   Quota remaining: {}/{}",
        client.remaining_quota(DEFAULT_DAILY_QUOTA).await,
        DEFAULT_DAILY_QUOTA
    );
    let rate_status = client.get_rate_limit_status().await;
    println!(
        "   Available tokens: {}/{}",
        rate_status.available_tokens, rate_status.max_tokens
    );

    println!("\n=== Live check complete ===");
    Ok(())
}

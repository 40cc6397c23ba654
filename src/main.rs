use analysis_pipeline::{overall_analysis, PipelineSettings, SentimentPipeline};
use anyhow::{bail, Context, Result};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use tubemood_core::{AnalysisOutcome, AnalysisRequest, AppConfig, ErrorReporter};
use youtube_client::{YouTubeApiClient, YouTubeFetcher};

const DEFAULT_LOG_FILTER: &str = "tubemood=info,youtube_client=info,analysis_pipeline=info";

const USAGE: &str = "usage:
  tubemood trending [REGION] [COUNT]
  tubemood video <URL|ID>
  tubemood compare <REGION,REGION,...> [COUNT]";

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let request = parse_request(&args)?;

    tracing::info!("Starting Tubemood - YouTube comment sentiment");

    let config = AppConfig::from_env().context("Failed to load configuration")?;
    let client = Arc::new(YouTubeApiClient::from_config(&config)?);
    let fetcher = Arc::new(YouTubeFetcher::from_config(client, &config));
    let pipeline = SentimentPipeline::new(fetcher, PipelineSettings::from_app_config(&config));

    let outcome = match pipeline.analyze(request).await {
        Ok(outcome) => outcome,
        Err(error) => {
            ErrorReporter::new().report_error(&error);
            return Err(error).context("Analysis failed");
        }
    };

    for failure in outcome.failures() {
        tracing::warn!(
            "Video {} skipped [{}]: {}",
            failure.video_id,
            failure.error_code,
            failure.reason
        );
    }
    log_insights(&outcome);

    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

fn log_insights(outcome: &AnalysisOutcome) {
    match outcome {
        AnalysisOutcome::SingleVideo(summary) => {
            if let Some(text) = overall_analysis(summary) {
                tracing::info!("{}", text);
            }
        }
        AnalysisOutcome::Trending(analysis) => {
            for summary in &analysis.summaries {
                tracing::info!(
                    "{} | {} | average {} over {} comments",
                    summary.video_id(),
                    summary.video.title,
                    summary.average_label(),
                    summary.total_analyzed
                );
            }
        }
        AnalysisOutcome::RegionComparison { regions } => {
            for row in regions {
                tracing::info!(
                    "{}: average {:.3}, {:.1}% positive across {} comments",
                    row.region,
                    row.average_score,
                    row.positive_pct,
                    row.total_comments
                );
            }
        }
    }
}

fn parse_count(raw: Option<&String>) -> Result<Option<u32>> {
    raw.map(|value| {
        value
            .parse::<u32>()
            .with_context(|| format!("COUNT must be a positive number, got {:?}", value))
    })
    .transpose()
}

fn parse_request(args: &[String]) -> Result<AnalysisRequest> {
    let Some(command) = args.first() else {
        bail!("missing command\n{}", USAGE);
    };

    match command.as_str() {
        "trending" => Ok(AnalysisRequest::Trending {
            region: args.get(1).cloned(),
            count: parse_count(args.get(2))?,
        }),
        "video" => match args.get(1) {
            Some(video_ref) => Ok(AnalysisRequest::SingleVideo {
                video_ref: video_ref.clone(),
            }),
            None => bail!("video needs a URL or id\n{}", USAGE),
        },
        "compare" => {
            let regions: Vec<String> = args
                .get(1)
                .map(|list| {
                    list.split(',')
                        .map(str::trim)
                        .filter(|r| !r.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default();
            if regions.is_empty() {
                bail!("compare needs at least one region\n{}", USAGE);
            }
            Ok(AnalysisRequest::RegionComparison {
                regions,
                count: parse_count(args.get(2))?,
            })
        }
        other => bail!("unknown command {:?}\n{}", other, USAGE),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_trending() {
        assert_eq!(
            parse_request(&args(&["trending"])).unwrap(),
            AnalysisRequest::Trending {
                region: None,
                count: None
            }
        );
        assert_eq!(
            parse_request(&args(&["trending", "gb", "5"])).unwrap(),
            AnalysisRequest::Trending {
                region: Some("gb".to_string()),
                count: Some(5)
            }
        );
        assert!(parse_request(&args(&["trending", "gb", "five"])).is_err());
    }

    #[test]
    fn test_parse_video_and_compare() {
        assert_eq!(
            parse_request(&args(&["video", "https://youtu.be/abc"])).unwrap(),
            AnalysisRequest::SingleVideo {
                video_ref: "https://youtu.be/abc".to_string()
            }
        );
        assert!(parse_request(&args(&["video"])).is_err());

        assert_eq!(
            parse_request(&args(&["compare", "CA, US,,GB"])).unwrap(),
            AnalysisRequest::RegionComparison {
                regions: vec!["CA".to_string(), "US".to_string(), "GB".to_string()],
                count: None
            }
        );
        assert!(parse_request(&args(&["compare", ","])).is_err());
    }

    #[test]
    fn test_parse_rejects_unknown_commands() {
        assert!(parse_request(&[]).is_err());
        let error = parse_request(&args(&["dashboard"])).unwrap_err();
        assert!(error.to_string().contains("unknown command"));
    }
}

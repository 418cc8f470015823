#![forbid(unsafe_code)]

//! Replays a playback trace through a view tracker. Reports go to the
//! Podcast Service unless `--dry-run` is given.

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use castify_views::{
    config::{DEFAULT_CONFIG_PATH, load_runtime_config_from},
    format::format_duration,
    logging::init_logging,
    media::MediaElement,
    podcast::PodcastClient,
    session::ViewPolicy,
    trace::PlaybackTrace,
    tracker::{ReportFuture, ReportOutcome, ViewReporter, attach},
};
use clap::Parser;
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about = "Replay a playback trace through the view tracker.")]
struct Cli {
    #[arg(value_name = "TRACE", help = "TOML playback trace to replay")]
    trace: PathBuf,
    #[arg(long = "config", value_name = "PATH", default_value = DEFAULT_CONFIG_PATH, help = "Path to the config file")]
    config: PathBuf,
    #[arg(
        long = "dry-run",
        help = "Log reports instead of sending them to the Podcast Service"
    )]
    dry_run: bool,
    #[arg(
        long = "keep-attached",
        help = "Do not detach the tracker after the last event"
    )]
    keep_attached: bool,
}

/// Reporter that only logs, used with `--dry-run`.
struct DryRunReporter;

impl ViewReporter for DryRunReporter {
    fn report_view(&self, podcast_id: &str) -> ReportFuture {
        let podcast_id = podcast_id.to_owned();
        Box::pin(async move {
            info!(%podcast_id, "dry run: view would be reported");
            Ok(())
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_runtime_config_from(&cli.config).context("loading configuration")?;
    init_logging(&config.log_filter);

    let trace = PlaybackTrace::load(&cli.trace)?;
    let policy = trace.policy.unwrap_or(config.policy);

    println!("Trace: {}", cli.trace.display());
    println!("Podcast: {}", trace.podcast_id);

    if cli.dry_run {
        replay(&trace, Arc::new(DryRunReporter), policy, cli.keep_attached).await
    } else {
        let client = PodcastClient::from_config(&config);
        println!("Podcast Service: {}", client.base_url());
        replay(&trace, Arc::new(client), policy, cli.keep_attached).await
    }
}

async fn replay<R: ViewReporter>(
    trace: &PlaybackTrace,
    reporter: Arc<R>,
    policy: ViewPolicy,
    keep_attached: bool,
) -> Result<()> {
    let element = MediaElement::new();
    let tracking = attach(&element, reporter, trace.podcast_id.clone(), policy)?;

    let policy = tracking.policy();
    println!(
        "Policy: short clips under {} count at {:.0}%, otherwise {}",
        format_duration(policy.short_clip_cutoff),
        policy.short_clip_fraction * 100.0,
        format_duration(policy.long_form_threshold)
    );

    let deliveries = trace.replay(&element);
    if !keep_attached {
        tracking.detach();
    }
    let outcomes = tracking.settle().await;
    let session = tracking.session();

    println!("Deliveries: {deliveries}");
    println!(
        "Watched: {} (threshold {})",
        format_duration(session.watch_time()),
        session
            .threshold()
            .map(format_duration)
            .unwrap_or_else(|| "unknown".to_string())
    );
    if outcomes.is_empty() {
        println!("No view reported for {}.", tracking.podcast_id());
    }
    for outcome in &outcomes {
        match outcome {
            ReportOutcome::Delivered => println!("View reported for {}.", tracking.podcast_id()),
            ReportOutcome::Failed(reason) => {
                println!("View report for {} failed: {reason}", tracking.podcast_id())
            }
        }
    }
    Ok(())
}

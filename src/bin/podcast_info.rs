#![forbid(unsafe_code)]

//! Fetches a podcast from the Podcast Service and prints its counters, or
//! lists one page of podcasts with `--page`.

use std::path::PathBuf;

use anyhow::{Context, Result};
use castify_views::{
    config::{DEFAULT_CONFIG_PATH, load_runtime_config_from},
    format::format_views,
    logging::init_logging,
    podcast::PodcastClient,
};
use clap::Parser;
use tokio::task;

#[derive(Parser, Debug)]
#[command(author, version, about = "Show podcast metadata from the Podcast Service.")]
struct Cli {
    #[arg(value_name = "ID", help = "Podcast id", required_unless_present = "page")]
    id: Option<String>,
    #[arg(long = "page", value_name = "N", conflicts_with = "id", help = "List a page of podcasts instead")]
    page: Option<u32>,
    #[arg(long = "config", value_name = "PATH", default_value = DEFAULT_CONFIG_PATH, help = "Path to the config file")]
    config: PathBuf,
    #[arg(long = "json", help = "Print the raw podcast as JSON")]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_runtime_config_from(&cli.config).context("loading configuration")?;
    init_logging(&config.log_filter);

    let client = PodcastClient::from_config(&config);
    let Some(id) = cli.id else {
        let page = cli.page.unwrap_or_default();
        let listing = task::spawn_blocking(move || client.list_podcasts(page))
            .await
            .context("podcast listing task panicked")?
            .with_context(|| format!("listing podcasts page {page}"))?;
        if cli.json {
            println!("{}", serde_json::to_string_pretty(&listing)?);
            return Ok(());
        }
        println!("Page {} of {}", listing.current_page + 1, listing.total_pages);
        for podcast in &listing.podcasts {
            println!(
                "{}  {}  ({} views)",
                podcast.id,
                podcast.title,
                format_views(podcast.views)
            );
        }
        return Ok(());
    };

    let fetch_id = id.clone();
    let podcast = task::spawn_blocking(move || client.get_podcast(&fetch_id))
        .await
        .context("podcast fetch task panicked")?
        .with_context(|| format!("fetching podcast {id}"))?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&podcast)?);
        return Ok(());
    }

    println!("{}", podcast.title);
    println!("by {} (@{})", podcast.user.fullname, podcast.user.username);
    println!("{} views", format_views(podcast.views));
    println!("{} likes", format_views(podcast.total_likes));
    println!("{} comments", format_views(podcast.total_comments));
    println!(
        "{} followers",
        format_views(podcast.user.total_follower)
    );
    if let Some(created) = podcast.created_day {
        println!("Published {}", created.format("%Y-%m-%d %H:%M"));
    }
    println!("Video: {}", podcast.video_url);
    Ok(())
}

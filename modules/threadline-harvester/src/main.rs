use std::sync::Arc;

use anyhow::{bail, Result};
use chrono::{Duration, NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use threadline_common::{
    Config, DateRange, JsonFileSettings, Platform, SettingsStore, API_KEY_SETTING,
};
use threadline_harvester::{ApifyFetcher, Harvester, HarvestOptions, RecordStore, RunReport};

#[derive(Parser)]
#[command(
    name = "threadline-harvester",
    about = "Incremental multi-platform social post and comment-thread harvester"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scrape posts and comment threads for the configured handles.
    Scrape(ScrapeArgs),
    /// Manage the per-platform handle lists in the settings file.
    Handles {
        #[command(subcommand)]
        action: HandlesAction,
    },
}

#[derive(Args)]
struct ScrapeArgs {
    /// Platform to scrape; repeatable. Defaults to every platform.
    #[arg(long = "platform", value_name = "PLATFORM")]
    platforms: Vec<Platform>,

    /// Extra handle scraped in addition to the configured ones; repeatable.
    /// Requires exactly one --platform.
    #[arg(long = "handle", value_name = "NAME")]
    handles: Vec<String>,

    /// Start of the posts date window (default: lookback from --until).
    #[arg(long, value_name = "YYYY-MM-DD")]
    since: Option<NaiveDate>,

    /// End of the posts date window (default: today).
    #[arg(long, value_name = "YYYY-MM-DD")]
    until: Option<NaiveDate>,

    /// Max posts per handle.
    #[arg(long)]
    max_posts: Option<u32>,

    /// Max comments per post.
    #[arg(long)]
    max_comments: Option<u32>,

    /// Concurrent comment fetches within one handle.
    #[arg(long)]
    concurrency: Option<usize>,

    /// Skip comment scraping entirely.
    #[arg(long)]
    no_comments: bool,

    /// Fetch comments even for posts reporting zero replies, overriding the
    /// per-platform default.
    #[arg(long, conflicts_with = "skip_commentless")]
    fetch_all_comments: bool,

    /// Skip comment fetches for posts reporting zero replies, on every
    /// platform.
    #[arg(long)]
    skip_commentless: bool,
}

#[derive(Subcommand)]
enum HandlesAction {
    /// List configured handles.
    List {
        #[arg(long)]
        platform: Option<Platform>,
    },
    /// Add a handle to a platform's list.
    Add {
        #[arg(long)]
        platform: Platform,
        name: String,
    },
    /// Remove a handle from a platform's list.
    Remove {
        #[arg(long)]
        platform: Platform,
        name: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("threadline_harvester=info".parse()?)
                .add_directive("threadline_common=info".parse()?)
                .add_directive("apify_client=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();

    match cli.command {
        Command::Scrape(args) => scrape(config, args).await,
        Command::Handles { action } => manage_handles(config, action),
    }
}

async fn scrape(config: Config, args: ScrapeArgs) -> Result<()> {
    let settings = JsonFileSettings::load(&config.settings_path)?;
    let Some(token) = config.apify_token.clone().or_else(|| settings.api_token()) else {
        bail!(
            "no Apify token: set {} in {} or export APIFY_API_KEY",
            API_KEY_SETTING,
            config.settings_path.display()
        );
    };

    let mut platforms: Vec<Platform> = Vec::new();
    for p in if args.platforms.is_empty() {
        Platform::ALL.to_vec()
    } else {
        args.platforms.clone()
    } {
        if !platforms.contains(&p) {
            platforms.push(p);
        }
    }
    if !args.handles.is_empty() && platforms.len() != 1 {
        bail!("--handle requires exactly one --platform");
    }

    let range = match (args.since, args.until) {
        (Some(since), Some(until)) => DateRange::new(since, until),
        (Some(since), None) => DateRange::new(since, Utc::now().date_naive()),
        (None, Some(until)) => {
            DateRange::new(until - Duration::days(config.lookback_days), until)
        }
        (None, None) => DateRange::last_days(config.lookback_days),
    };
    if range.since > range.until {
        bail!("--since must not be after --until");
    }

    let opts = HarvestOptions {
        date_range: range,
        max_posts: args.max_posts.unwrap_or(config.max_posts),
        max_comments: args.max_comments.unwrap_or(config.max_comments),
        comment_concurrency: args.concurrency.unwrap_or(config.comment_concurrency),
        scrape_comments: !args.no_comments,
        comment_prefilter: if args.fetch_all_comments {
            Some(false)
        } else if args.skip_commentless {
            Some(true)
        } else {
            None
        },
    };

    let fetcher = Arc::new(ApifyFetcher::new(token));
    let store = RecordStore::new(config.data_dir.clone());
    let harvester = Harvester::new(fetcher, store);

    // Ctrl-c stops dispatching new fetches; in-flight ones drain.
    let cancel = harvester.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, letting in-flight fetches drain");
            cancel.cancel();
        }
    });

    for platform in platforms {
        let mut accounts = settings.handles_for(platform);
        for extra in &args.handles {
            if !accounts.contains(extra) {
                accounts.push(extra.clone());
            }
        }
        if accounts.is_empty() {
            info!(%platform, "No handles configured, skipping");
            continue;
        }

        let harvest = harvester.scrape(platform, &accounts, &opts).await;
        match RunReport::from_harvest(&harvest).write(&config.data_dir) {
            Ok(path) => info!(report = %path.display(), "Run report written"),
            Err(e) => warn!(error = %e, "Failed to write run report"),
        }
        println!(
            "{}: {} posts, {} comments reconciled",
            platform,
            harvest.posts.len(),
            harvest.comments.len()
        );
    }

    Ok(())
}

fn manage_handles(config: Config, action: HandlesAction) -> Result<()> {
    let mut settings = JsonFileSettings::load(&config.settings_path)?;
    match action {
        HandlesAction::List { platform } => {
            let platforms = platform
                .map(|p| vec![p])
                .unwrap_or_else(|| Platform::ALL.to_vec());
            for p in platforms {
                let list = settings.handles_for(p);
                if list.is_empty() {
                    println!("{p}: (none)");
                } else {
                    println!("{p}: {}", list.join(", "));
                }
            }
        }
        HandlesAction::Add { platform, name } => {
            if settings.add_handle(platform, &name) {
                settings.save()?;
                println!("Added {name} to {platform}");
            } else {
                println!("{name} is already configured for {platform}");
            }
        }
        HandlesAction::Remove { platform, name } => {
            if settings.remove_handle(platform, &name) {
                settings.save()?;
                println!("Removed {name} from {platform}");
            } else {
                println!("{name} is not configured for {platform}");
            }
        }
    }
    Ok(())
}

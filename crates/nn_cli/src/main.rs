use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{ArgAction, Parser};
use nn_core::{Article, Category, Media, NeutralArticle, NewsStorage, Relevance, Result};
use nn_feeds::FeedManager;
use nn_inference::clustering::DEFAULT_THRESHOLD;
use nn_inference::grouping::{filter_grouped_news, group_pending, merge_assignments, Grouper};
use nn_inference::models::hashing::DEFAULT_DIMS;
use nn_inference::{Config, GroupingStrategy};
use nn_storage::MemoryStorage;
use nn_timeline::scheduler::local_clock;
use nn_timeline::{FeedEvent, FeedState, MidnightScheduler};
use nn_web::AppState;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

mod duration;
mod logging;

use duration::HumanDuration;

#[derive(Parser, Debug)]
#[command(author, version, about = "Groups news from Spanish outlets into stories", long_about = None)]
pub struct Cli {
    /// Embedding model: hashing (default) or remote
    #[arg(long, env = "NN_MODEL", default_value = "hashing")]
    model: String,
    #[arg(long, env = "NN_MODEL_URL")]
    model_url: Option<String>,
    #[arg(long, env = "NN_API_KEY", hide_env_values = true)]
    api_key: Option<String>,
    /// Model id sent to a remote embeddings endpoint
    #[arg(long)]
    remote_model: Option<String>,
    #[arg(long, default_value_t = DEFAULT_DIMS)]
    dims: usize,
    /// Minimum cosine similarity for two articles to share a story
    #[arg(long, env = "NN_THRESHOLD", default_value_t = DEFAULT_THRESHOLD)]
    threshold: f32,
    #[arg(long, default_value_t = 8)]
    concurrency: usize,
    #[arg(long, value_enum, default_value_t = GroupingStrategy::Local)]
    strategy: GroupingStrategy,
    #[arg(long, env = "NN_GROUPING_URL")]
    grouping_url: Option<String>,
    #[arg(long, env = "NN_GROUPING_TOKEN", hide_env_values = true)]
    grouping_token: Option<String>,
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
    #[arg(short, long, global = true)]
    quiet: bool,
    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    fn config(&self) -> Config {
        Config {
            model_name: Some(self.model.clone()),
            model_url: self.model_url.clone(),
            api_key: self.api_key.clone(),
            remote_model: self.remote_model.clone(),
            dims: self.dims,
            threshold: self.threshold,
            concurrency: self.concurrency,
            strategy: self.strategy,
            grouping_url: self.grouping_url.clone(),
            grouping_token: self.grouping_token.clone(),
        }
    }
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Fetch the RSS feeds and print the stories found
    Fetch {
        /// Outlets to fetch, e.g. abc,elPais. All of them by default.
        #[arg(long, value_delimiter = ',')]
        media: Vec<Media>,
        /// Print the groups as JSON
        #[arg(long)]
        json: bool,
    },
    /// Group the articles of a JSON file; articles that already have a group are kept as references
    Group {
        #[arg(long)]
        input: PathBuf,
        /// Where to write the grouped articles. Standard output by default.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Show the seven day timeline of neutral summaries
    Days {
        #[arg(long)]
        input: PathBuf,
        /// 0 is today, 6 is six days ago
        #[arg(long, default_value_t = 0)]
        day: usize,
        #[arg(long, value_delimiter = ',')]
        category: Vec<Category>,
        #[arg(long, value_delimiter = ',')]
        relevance: Vec<Relevance>,
        #[arg(long, value_delimiter = ',')]
        medium: Vec<Media>,
        #[arg(long)]
        search: Option<String>,
    },
    /// Serve the JSON API
    Serve {
        #[arg(long, default_value = "127.0.0.1:3000")]
        addr: SocketAddr,
        /// How often feeds are fetched and regrouped (e.g. 30m, 1h15m)
        #[arg(long, default_value = "15m")]
        refresh: HumanDuration,
        /// Do not fetch feeds; only serve what is posted to the API
        #[arg(long)]
        no_fetch: bool,
        /// Neutral summaries to load at startup
        #[arg(long)]
        neutral: Option<PathBuf>,
        /// Articles ingested longer ago than this are dropped after each fetch
        #[arg(long, default_value = "72h")]
        retention: HumanDuration,
    },
}

async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    Ok(serde_json::from_str(&raw)?)
}

fn print_groups(groups: &[Vec<Article>]) {
    for group in groups {
        let number = group.first().and_then(|a| a.group).unwrap_or_default();
        println!("📰 Grupo {} ({} medios)", number, group.len());
        for article in group {
            println!("   - [{}] {}", article.source_medium.name(), article.title);
        }
    }
}

async fn fetch(cli: &Cli, media: Vec<Media>, json: bool) -> Result<()> {
    let media = if media.is_empty() { Media::ALL.to_vec() } else { media };
    let grouper = Grouper::from_config(&cli.config())?;
    let storage = MemoryStorage::new();

    let articles = FeedManager::for_media(&media, cli.concurrency).fetch_all().await;
    let stored = storage.store_articles(&articles).await?;
    info!("💾 {} articles stored", stored);

    group_pending(&storage, &grouper).await?;
    let groups = filter_grouped_news(&storage.all_articles().await?);
    if json {
        println!("{}", serde_json::to_string_pretty(&groups)?);
    } else {
        print_groups(&groups);
    }
    Ok(())
}

async fn group(cli: &Cli, input: &Path, output: Option<&Path>) -> Result<()> {
    let mut articles: Vec<Article> = read_json(input).await?;
    let grouper = Grouper::from_config(&cli.config())?;

    let (references, pending): (Vec<Article>, Vec<Article>) =
        articles.iter().cloned().partition(|a| a.is_grouped());
    let first_free = references.iter().filter_map(Article::group_id).max().map_or(0, |max| max + 1);
    let assignments = grouper.group(pending, references, first_free).await;
    let changed = merge_assignments(&mut articles, &assignments);
    info!("📎 {} articles changed group", changed);

    let rendered = serde_json::to_string_pretty(&articles)?;
    match output {
        Some(path) => tokio::fs::write(path, rendered)
            .await
            .with_context(|| format!("writing {}", path.display()))?,
        None => println!("{}", rendered),
    }
    Ok(())
}

fn days(
    neutral: Vec<NeutralArticle>,
    day: usize,
    categories: Vec<Category>,
    relevances: Vec<Relevance>,
    media: Vec<Media>,
    search: Option<String>,
) {
    let mut state = FeedState::new(local_clock()())
        .apply(FeedEvent::NeutralArticlesLoaded(neutral))
        .apply(FeedEvent::SelectDay(day));
    for category in categories {
        state.update(FeedEvent::ToggleCategory(category));
    }
    for relevance in relevances {
        state.update(FeedEvent::ToggleRelevance(relevance));
    }
    for medium in media {
        state.update(FeedEvent::ToggleMedium(medium));
    }
    if let Some(search) = search {
        state.update(FeedEvent::SetSearch(search));
    }

    for (i, bucket) in state.days().iter().enumerate() {
        let marker = if i == state.selected_day() { "▶" } else { " " };
        println!("{} {:<14} {}", marker, bucket.day.short_format(), bucket.articles.len());
    }
    if let Some(bucket) = state.selected_bucket() {
        println!();
        println!("{}", bucket.day.formatted());
    }
    for article in state.news_to_show() {
        let relevance = article.relevance.map(|r| r.label()).unwrap_or("-");
        println!("  • [{}] [{}] {}", article.category, relevance, article.neutral_title);
    }
}

async fn serve(
    cli: &Cli,
    addr: SocketAddr,
    refresh: HumanDuration,
    retention: HumanDuration,
    no_fetch: bool,
    neutral: Option<PathBuf>,
) -> Result<()> {
    let retention = chrono::Duration::from_std(retention.0)
        .with_context(|| format!("retention of {} is too long", retention))?;
    let grouper = Arc::new(Grouper::from_config(&cli.config())?);
    let storage = Arc::new(MemoryStorage::new());
    let state = Arc::new(AppState::new(storage, grouper));
    if let Some(path) = neutral {
        let summaries: Vec<NeutralArticle> = read_json(&path).await?;
        state.load_neutral(summaries).await?;
    }
    state.refresh().await?;

    let scheduler = MidnightScheduler::new(state.feed.clone());
    let shutdown = CancellationToken::new();
    let scheduler_token = scheduler.cancel_token();
    let scheduler_handle = scheduler.spawn();

    let fetcher = if no_fetch {
        None
    } else {
        let state = state.clone();
        let token = shutdown.clone();
        let manager = FeedManager::for_media(&Media::ALL, cli.concurrency);
        Some(tokio::spawn(async move {
            loop {
                let articles = manager.fetch_all().await;
                match state.storage.store_articles(&articles).await {
                    Ok(stored) => info!("💾 {} new articles", stored),
                    Err(e) => warn!("⚠️ Could not store articles: {}", e),
                }
                if let Err(e) = state.storage.delete_older_than(chrono::Utc::now() - retention).await {
                    warn!("⚠️ Could not delete old articles: {}", e);
                }
                if let Err(e) = state.refresh().await {
                    warn!("⚠️ Refresh failed: {}", e);
                }
                info!("Waiting {} before next fetch", refresh);
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(refresh.0) => {}
                }
            }
        }))
    };

    let result = tokio::select! {
        result = nn_web::serve(addr, state.clone()) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("👋 Shutting down");
            Ok(())
        }
    };

    shutdown.cancel();
    scheduler_token.cancel();
    if let Some(fetcher) = fetcher {
        fetcher.abort();
    }
    if let Err(e) = scheduler_handle.await {
        warn!("⚠️ Midnight scheduler ended abnormally: {}", e);
    }
    result
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_logging(logging::level(cli.verbose, cli.quiet));
    info!("🧠 Grouping with {} strategy, threshold {:.2}", cli.strategy, cli.threshold);

    match &cli.command {
        Commands::Fetch { media, json } => fetch(&cli, media.clone(), *json).await,
        Commands::Group { input, output } => group(&cli, input, output.as_deref()).await,
        Commands::Days {
            input,
            day,
            category,
            relevance,
            medium,
            search,
        } => {
            let neutral = read_json(input).await?;
            days(
                neutral,
                *day,
                category.clone(),
                relevance.clone(),
                medium.clone(),
                search.clone(),
            );
            Ok(())
        }
        Commands::Serve {
            addr,
            refresh,
            no_fetch,
            neutral,
            retention,
        } => serve(&cli, *addr, *refresh, *retention, *no_fetch, neutral.clone()).await,
    }
}

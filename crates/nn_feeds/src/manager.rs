use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use nn_core::{Article, Error, Media, Result};
use reqwest::Client;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::rss::parse_feed;

#[async_trait]
pub trait FeedSource: Send + Sync {
    fn medium(&self) -> Media;

    async fn fetch_articles(&self) -> Result<Vec<Article>>;
}

/// An outlet's RSS feed fetched over HTTP.
pub struct RssSource {
    medium: Media,
    url: String,
    client: Arc<Client>,
}

impl RssSource {
    pub fn new(medium: Media, client: Arc<Client>) -> Self {
        Self::with_url(medium, medium.feed_url(), client)
    }

    pub fn with_url(medium: Media, url: impl Into<String>, client: Arc<Client>) -> Self {
        Self {
            medium,
            url: url.into(),
            client,
        }
    }
}

#[async_trait]
impl FeedSource for RssSource {
    fn medium(&self) -> Media {
        self.medium
    }

    async fn fetch_articles(&self) -> Result<Vec<Article>> {
        debug!("Fetching {} from {}", self.medium, self.url);
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| Error::NetworkFailure(format!("{}: {}", self.medium, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::NetworkFailure(format!(
                "{} feed returned {}",
                self.medium, status
            )));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::NetworkFailure(format!("{}: {}", self.medium, e)))?;
        parse_feed(&body, self.medium)
    }
}

pub struct FeedManager {
    sources: Vec<Box<dyn FeedSource>>,
    semaphore: Arc<Semaphore>,
}

impl FeedManager {
    pub fn new(concurrency: usize) -> Self {
        Self {
            sources: Vec::new(),
            semaphore: Arc::new(Semaphore::new(concurrency.max(1))),
        }
    }

    /// One RSS source per outlet, sharing a single HTTP client.
    pub fn for_media(media: &[Media], concurrency: usize) -> Self {
        let client = Arc::new(Client::new());
        let mut manager = Self::new(concurrency);
        for &medium in media {
            manager.add_source(Box::new(RssSource::new(medium, client.clone())));
        }
        manager
    }

    pub fn add_source(&mut self, source: Box<dyn FeedSource>) {
        self.sources.push(source);
    }

    pub fn media(&self) -> Vec<Media> {
        self.sources.iter().map(|s| s.medium()).collect()
    }

    /// Fetches every feed concurrently. Failed feeds are logged and skipped;
    /// articles repeating a link already seen are dropped.
    pub async fn fetch_all(&self) -> Vec<Article> {
        info!("📡 Fetching {} feeds", self.sources.len());

        let fetches = self.sources.iter().map(|source| {
            let semaphore = self.semaphore.clone();
            async move {
                let _permit = semaphore
                    .acquire()
                    .await
                    .map_err(|e| Error::External(e.into()))?;
                source.fetch_articles().await
            }
        });

        let mut seen = HashSet::new();
        let mut articles = Vec::new();
        for (source, result) in self.sources.iter().zip(join_all(fetches).await) {
            match result {
                Ok(batch) => {
                    info!("📰 {}: {} articles", source.medium().name(), batch.len());
                    for article in batch {
                        if article.link.is_empty() || seen.insert(article.link.clone()) {
                            articles.push(article);
                        }
                    }
                }
                Err(e) => warn!("⚠️ Skipping {} feed: {}", source.medium().name(), e),
            }
        }

        info!("✅ {} articles fetched", articles.len());
        articles
    }
}

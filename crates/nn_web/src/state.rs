use std::sync::Arc;

use nn_core::{Article, NeutralArticle, NewsStorage, Result};
use nn_feeds::most_neutral_image;
use nn_inference::grouping::{group_pending, Grouper};
use nn_timeline::scheduler::{local_clock, Clock};
use nn_timeline::{FeedEvent, FeedState};
use tokio::sync::Mutex;
use tracing::info;

pub struct AppState {
    pub feed: Arc<Mutex<FeedState>>,
    pub storage: Arc<dyn NewsStorage>,
    pub grouper: Arc<Grouper>,
    pub clock: Clock,
}

impl AppState {
    pub fn new(storage: Arc<dyn NewsStorage>, grouper: Arc<Grouper>) -> Self {
        Self::with_clock(storage, grouper, local_clock())
    }

    pub fn with_clock(storage: Arc<dyn NewsStorage>, grouper: Arc<Grouper>, clock: Clock) -> Self {
        let feed = FeedState::new(clock());
        Self {
            feed: Arc::new(Mutex::new(feed)),
            storage,
            grouper,
            clock,
        }
    }

    /// Groups whatever is pending in storage and publishes the stored
    /// articles and summaries to the feed. Returns how many articles
    /// changed group.
    pub async fn refresh(&self) -> Result<usize> {
        let changed = group_pending(self.storage.as_ref(), &self.grouper).await?;
        let articles = self.storage.all_articles().await?;
        let neutral = self.storage.neutral_articles().await?;

        let mut feed = self.feed.lock().await;
        feed.update(FeedEvent::Tick((self.clock)()));
        feed.update(FeedEvent::ArticlesLoaded(articles));
        feed.update(FeedEvent::NeutralArticlesLoaded(neutral));
        info!("🔄 Feed refreshed, {} articles regrouped", changed);
        Ok(changed)
    }

    /// Stores summaries and reclassifies the timeline. A summary that arrives
    /// without an image is credited with the most neutral valid image among
    /// the stored articles of its group. Returns how many summaries are stored.
    pub async fn load_neutral(&self, mut summaries: Vec<NeutralArticle>) -> Result<usize> {
        let articles = self.storage.all_articles().await?;
        for summary in summaries.iter_mut().filter(|s| s.image_url.is_none()) {
            let members: Vec<Article> = articles
                .iter()
                .filter(|a| a.group_id() == Some(summary.group))
                .cloned()
                .collect();
            if let Some((url, medium)) = most_neutral_image(&members) {
                summary.image_url = Some(url);
                summary.image_medium = Some(medium);
            }
        }

        self.storage.store_neutral(&summaries).await?;
        let all = self.storage.neutral_articles().await?;
        let total = all.len();

        let mut feed = self.feed.lock().await;
        feed.update(FeedEvent::Tick((self.clock)()));
        feed.update(FeedEvent::NeutralArticlesLoaded(all));
        Ok(total)
    }
}

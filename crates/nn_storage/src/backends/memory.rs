use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nn_core::{merge_assignments, Article, GroupAssignment, NeutralArticle, NewsStorage, Result};
use tokio::sync::RwLock;
use tracing::{debug, info};

#[derive(Debug, Default)]
pub struct MemoryStore {
    articles: Vec<Article>,
    links: HashSet<String>,
    neutral: Vec<NeutralArticle>,
}

impl MemoryStore {
    pub fn store_articles(&mut self, articles: &[Article]) -> usize {
        let mut added = 0;
        for article in articles {
            if !article.link.is_empty() && !self.links.insert(article.link.clone()) {
                debug!("Already stored: {}", article.link);
                continue;
            }
            self.articles.push(article.clone());
            added += 1;
        }
        added
    }

    pub fn apply_assignments(&mut self, assignments: &[GroupAssignment]) -> usize {
        merge_assignments(&mut self.articles, assignments)
    }

    /// Summaries count too: their group numbers must not be reused after the
    /// articles behind them are gone.
    pub fn max_group(&self) -> Option<i64> {
        let articles = self.articles.iter().filter_map(Article::group_id);
        let summaries = self.neutral.iter().map(|n| n.group).filter(|g| *g >= 0);
        articles.chain(summaries).max()
    }

    /// Forgets the links of removed articles too, so a feed that still
    /// carries one stores it again as a fresh article.
    pub fn delete_older_than(&mut self, before: DateTime<Utc>) -> usize {
        let links = &mut self.links;
        let before_len = self.articles.len();
        self.articles.retain(|article| {
            let keep = article.created_at >= before;
            if !keep {
                links.remove(&article.link);
            }
            keep
        });
        before_len - self.articles.len()
    }

    /// Summaries are keyed by group: a new summary replaces the old one.
    pub fn store_neutral(&mut self, articles: &[NeutralArticle]) {
        for article in articles {
            match self.neutral.iter_mut().find(|n| n.group == article.group) {
                Some(existing) => *existing = article.clone(),
                None => self.neutral.push(article.clone()),
            }
        }
    }
}

/// Process-local storage, shared behind an async lock.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    store: Arc<RwLock<MemoryStore>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl NewsStorage for MemoryStorage {
    async fn store_articles(&self, articles: &[Article]) -> Result<usize> {
        let mut store = self.store.write().await;
        Ok(store.store_articles(articles))
    }

    async fn all_articles(&self) -> Result<Vec<Article>> {
        let store = self.store.read().await;
        Ok(store.articles.clone())
    }

    async fn get_ungrouped(&self) -> Result<Vec<Article>> {
        let store = self.store.read().await;
        Ok(store
            .articles
            .iter()
            .filter(|a| a.group.is_none())
            .cloned()
            .collect())
    }

    async fn get_recent_grouped(&self, since: DateTime<Utc>) -> Result<Vec<Article>> {
        let store = self.store.read().await;
        Ok(store
            .articles
            .iter()
            .filter(|a| a.is_grouped() && a.created_at >= since)
            .cloned()
            .collect())
    }

    async fn apply_assignments(&self, assignments: &[GroupAssignment]) -> Result<usize> {
        let mut store = self.store.write().await;
        Ok(store.apply_assignments(assignments))
    }

    async fn max_group(&self) -> Result<Option<i64>> {
        let store = self.store.read().await;
        Ok(store.max_group())
    }

    async fn delete_older_than(&self, before: DateTime<Utc>) -> Result<usize> {
        let mut store = self.store.write().await;
        let deleted = store.delete_older_than(before);
        info!("🧹 Deleted {} articles ingested before {}", deleted, before);
        Ok(deleted)
    }

    async fn store_neutral(&self, articles: &[NeutralArticle]) -> Result<()> {
        let mut store = self.store.write().await;
        store.store_neutral(articles);
        Ok(())
    }

    async fn neutral_articles(&self) -> Result<Vec<NeutralArticle>> {
        let store = self.store.read().await;
        Ok(store.neutral.clone())
    }
}

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::types::{Article, GroupAssignment, NeutralArticle};
use crate::Result;

#[async_trait]
pub trait NewsStorage: Send + Sync {
    /// Store articles, skipping any whose link is already known.
    /// Returns how many were new.
    async fn store_articles(&self, articles: &[Article]) -> Result<usize>;

    /// All stored articles in insertion order.
    async fn all_articles(&self) -> Result<Vec<Article>>;

    /// Articles that have not been assigned to a group yet.
    async fn get_ungrouped(&self) -> Result<Vec<Article>>;

    /// Grouped articles ingested at or after `since`; they serve as
    /// references for the next grouping pass.
    async fn get_recent_grouped(&self, since: DateTime<Utc>) -> Result<Vec<Article>>;

    /// Write group numbers back by article id. Returns how many records
    /// actually changed.
    async fn apply_assignments(&self, assignments: &[GroupAssignment]) -> Result<usize>;

    /// Highest group number still in use by a stored article or summary.
    async fn max_group(&self) -> Result<Option<i64>>;

    /// Drop articles ingested before `before`. Returns how many were removed.
    async fn delete_older_than(&self, before: DateTime<Utc>) -> Result<usize>;

    /// Replace the summaries of the given groups.
    async fn store_neutral(&self, articles: &[NeutralArticle]) -> Result<()>;

    async fn neutral_articles(&self) -> Result<Vec<NeutralArticle>>;
}

//! Turning clusters into persisted group numbers, and reading groups back.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{Duration, Utc};
use nn_core::{Article, GroupAssignment, Media, NewsStorage, Result};

pub use nn_core::merge_assignments;
use tracing::{error, info, warn};

use crate::clustering::SimilarityClusterer;
use crate::embeddings::EmbeddingGenerator;
use crate::models::create_model;
use crate::{Config, GroupingStrategy};

pub mod client;

pub use client::{GroupingClient, StaticToken, TokenProvider};

/// Converts clusters into group assignments for every member.
///
/// Articles that already carry a group are references: they keep their group,
/// and a cluster containing references hands the most frequent of their groups
/// (first seen on ties) to its new members. A cluster without references gets
/// the next free number, never below `first_free` so numbers still carried
/// by older stored articles are not handed out again. Only the first article per medium joins a group, so
/// one outlet cannot fill a story on its own; later duplicates stay ungrouped.
/// A cluster left with fewer than two members and no reference is ungrouped.
pub fn assign_groups(clusters: &[Vec<Article>], first_free: i64) -> Vec<GroupAssignment> {
    let mut next_group = clusters
        .iter()
        .flatten()
        .filter_map(Article::group_id)
        .max()
        .map_or(0, |max| max + 1)
        .max(first_free);

    let mut assignments = Vec::new();
    for cluster in clusters {
        let references: Vec<&Article> = cluster.iter().filter(|a| a.is_grouped()).collect();
        let pending: Vec<&Article> = cluster.iter().filter(|a| !a.is_grouped()).collect();

        for reference in &references {
            assignments.push(GroupAssignment {
                id: reference.id.clone(),
                group_number: reference.group_id(),
            });
        }

        let target = most_frequent_group(&references);
        let mut seen: HashSet<Media> = references
            .iter()
            .filter(|r| r.group_id() == target)
            .map(|r| r.source_medium)
            .collect();

        let mut kept = Vec::new();
        for article in pending {
            if seen.insert(article.source_medium) {
                kept.push(article);
            } else {
                assignments.push(GroupAssignment {
                    id: article.id.clone(),
                    group_number: None,
                });
            }
        }

        let group_number = match target {
            Some(group) => Some(group),
            None if kept.len() >= 2 => {
                let group = next_group;
                next_group += 1;
                Some(group)
            }
            None => None,
        };
        for article in kept {
            assignments.push(GroupAssignment {
                id: article.id.clone(),
                group_number,
            });
        }
    }

    assignments
}

fn most_frequent_group(references: &[&Article]) -> Option<i64> {
    let mut counts: Vec<(i64, usize)> = Vec::new();
    for group in references.iter().filter_map(|r| r.group_id()) {
        match counts.iter_mut().find(|(g, _)| *g == group) {
            Some((_, count)) => *count += 1,
            None => counts.push((group, 1)),
        }
    }
    // max_by_key keeps the last maximum, so walk from the back to prefer the first seen.
    counts
        .into_iter()
        .rev()
        .max_by_key(|(_, count)| *count)
        .map(|(group, _)| group)
}

/// Groups of at least two articles, most recently published group first.
/// Ungrouped articles and the sentinel group are skipped; members keep their
/// input order.
pub fn filter_grouped_news(articles: &[Article]) -> Vec<Vec<Article>> {
    let mut order: Vec<i64> = Vec::new();
    let mut groups: HashMap<i64, Vec<Article>> = HashMap::new();
    for article in articles {
        if let Some(group) = article.group_id() {
            groups
                .entry(group)
                .or_insert_with(|| {
                    order.push(group);
                    Vec::new()
                })
                .push(article.clone());
        }
    }

    let mut result: Vec<Vec<Article>> = order
        .into_iter()
        .filter_map(|group| groups.remove(&group))
        .filter(|members| members.len() >= 2)
        .collect();
    result.sort_by(|a, b| latest_pub_date(b).cmp(&latest_pub_date(a)));
    result
}

fn latest_pub_date(group: &[Article]) -> Option<chrono::DateTime<chrono::Utc>> {
    group.iter().filter_map(|a| a.pub_date).max()
}

enum Backend {
    Local(SimilarityClusterer),
    Remote(GroupingClient),
}

/// Runs a grouping pass with the configured strategy.
pub struct Grouper {
    backend: Backend,
}

impl Grouper {
    pub fn local(clusterer: SimilarityClusterer) -> Self {
        Self {
            backend: Backend::Local(clusterer),
        }
    }

    pub fn remote(client: GroupingClient) -> Self {
        Self {
            backend: Backend::Remote(client),
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        match config.strategy {
            GroupingStrategy::Local => {
                let model = create_model(Some(config.clone()))?;
                let generator = EmbeddingGenerator::new(model, config.concurrency);
                Ok(Self::local(SimilarityClusterer::new(generator, config.threshold)))
            }
            GroupingStrategy::Remote => {
                let url = config.grouping_url.clone().ok_or_else(|| {
                    nn_core::Error::InvalidInput("remote grouping requires a grouping URL".to_string())
                })?;
                let token = Arc::new(StaticToken::new(config.grouping_token.clone().unwrap_or_default()));
                Ok(Self::remote(GroupingClient::new(url, token)))
            }
        }
    }

    /// Groups `pending` articles, using already grouped `references` to keep
    /// numbering stable across passes. New groups are numbered from
    /// `first_free` up; the remote service numbers its own groups. Failures
    /// are logged and leave the articles ungrouped; the returned assignments
    /// may then be empty.
    pub async fn group(
        &self,
        pending: Vec<Article>,
        references: Vec<Article>,
        first_free: i64,
    ) -> Vec<GroupAssignment> {
        match &self.backend {
            Backend::Local(clusterer) => {
                let mut batch = references;
                batch.extend(pending);
                let clusters = clusterer.cluster(batch).await;
                let assignments = assign_groups(&clusters, first_free);
                info!(
                    "📎 {} articles assigned to groups",
                    assignments.iter().filter(|a| a.group_number.is_some()).count()
                );
                assignments
            }
            Backend::Remote(client) => match client.request_groups(&pending).await {
                Ok(assignments) => assignments,
                Err(e @ nn_core::Error::DecodeFailure(_)) => {
                    warn!("⚠️ Could not decode grouping response, leaving articles ungrouped: {}", e);
                    Vec::new()
                }
                Err(e) => {
                    error!("❌ Grouping batch failed: {}", e);
                    Vec::new()
                }
            },
        }
    }
}

/// Grouped articles younger than this serve as references for a new pass.
pub const REFERENCE_WINDOW_HOURS: i64 = 24;

/// Groups every stored article that has no group yet, against the recently
/// grouped ones, and writes the result back. Returns how many articles
/// changed group.
pub async fn group_pending(storage: &dyn NewsStorage, grouper: &Grouper) -> Result<usize> {
    let pending = storage.get_ungrouped().await?;
    if pending.is_empty() {
        info!("Nothing to group");
        return Ok(0);
    }

    let since = Utc::now() - Duration::hours(REFERENCE_WINDOW_HOURS);
    let references = storage.get_recent_grouped(since).await?;
    let first_free = storage.max_group().await?.map_or(0, |max| max + 1);
    info!(
        "📚 Grouping {} pending articles against {} references",
        pending.len(),
        references.len()
    );
    let assignments = grouper.group(pending, references, first_free).await;
    storage.apply_assignments(&assignments).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use nn_core::Category;

    fn article(id: &str, medium: Media, group: Option<i64>) -> Article {
        let mut a = Article::new(id, id, Category::Politica, id, medium);
        a.id = id.to_string();
        a.group = group;
        a
    }

    fn group_of(assignments: &[GroupAssignment], id: &str) -> Option<i64> {
        assignments
            .iter()
            .find(|a| a.id == id)
            .and_then(|a| a.group_number)
    }

    #[test]
    fn test_filter_grouped_news() {
        let articles = vec![
            article("a", Media::Abc, Some(1)),
            article("b", Media::ElPais, Some(1)),
            article("c", Media::Cope, Some(-1)),
            article("d", Media::Rtve, Some(2)),
        ];
        let groups = filter_grouped_news(&articles);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].len(), 2);
        assert!(groups[0].iter().all(|a| a.group == Some(1)));
    }

    #[test]
    fn test_filter_grouped_news_sorted_by_latest_member() {
        let base = Utc.with_ymd_and_hms(2025, 5, 1, 12, 0, 0).unwrap();
        let mut articles = vec![
            article("old-1", Media::Abc, Some(1)),
            article("old-2", Media::ElPais, Some(1)),
            article("new-1", Media::Abc, Some(2)),
            article("new-2", Media::ElPais, Some(2)),
            article("none", Media::Cope, None),
        ];
        articles[0].pub_date = Some(base);
        articles[1].pub_date = Some(base + Duration::hours(1));
        articles[2].pub_date = Some(base - Duration::hours(5));
        articles[3].pub_date = Some(base + Duration::hours(3));

        let groups = filter_grouped_news(&articles);
        let ids: Vec<Vec<&str>> = groups
            .iter()
            .map(|g| g.iter().map(|a| a.id.as_str()).collect())
            .collect();
        assert_eq!(ids, vec![vec!["new-1", "new-2"], vec!["old-1", "old-2"]]);
    }

    #[test]
    fn test_assign_new_groups() {
        let clusters = vec![
            vec![article("a", Media::Abc, None), article("b", Media::ElPais, None)],
            vec![article("c", Media::Cope, None)],
            vec![article("d", Media::Abc, None), article("e", Media::Rtve, None)],
        ];
        let assignments = assign_groups(&clusters, 0);
        assert_eq!(assignments.len(), 5);
        assert_eq!(group_of(&assignments, "a"), Some(0));
        assert_eq!(group_of(&assignments, "b"), Some(0));
        assert_eq!(group_of(&assignments, "c"), None);
        assert_eq!(group_of(&assignments, "d"), Some(1));
        assert_eq!(group_of(&assignments, "e"), Some(1));
    }

    #[test]
    fn test_assign_reuses_reference_group() {
        let clusters = vec![
            vec![
                article("ref-1", Media::Abc, Some(7)),
                article("ref-2", Media::ElMundo, Some(7)),
                article("ref-3", Media::Cope, Some(3)),
                article("new", Media::ElPais, None),
            ],
            vec![article("x", Media::Rtve, None), article("y", Media::LaSexta, None)],
        ];
        let assignments = assign_groups(&clusters, 0);
        assert_eq!(group_of(&assignments, "new"), Some(7));
        assert_eq!(group_of(&assignments, "ref-3"), Some(3));
        assert_eq!(group_of(&assignments, "x"), Some(8));
        assert_eq!(group_of(&assignments, "y"), Some(8));
    }

    #[test]
    fn test_assign_starts_at_first_free() {
        let clusters = vec![
            vec![article("a", Media::Abc, None), article("b", Media::ElPais, None)],
            vec![article("r", Media::Cope, Some(2)), article("c", Media::Rtve, None)],
        ];
        let assignments = assign_groups(&clusters, 10);
        assert_eq!(group_of(&assignments, "a"), Some(10));
        assert_eq!(group_of(&assignments, "c"), Some(2));

        // a reference above the floor still wins
        let clusters = vec![
            vec![article("r", Media::Cope, Some(12))],
            vec![article("a", Media::Abc, None), article("b", Media::ElPais, None)],
        ];
        assert_eq!(group_of(&assign_groups(&clusters, 10), "a"), Some(13));
    }

    #[test]
    fn test_assign_tie_prefers_first_reference_group() {
        let clusters = vec![vec![
            article("ref-1", Media::Abc, Some(5)),
            article("ref-2", Media::Cope, Some(2)),
            article("new", Media::ElPais, None),
        ]];
        assert_eq!(group_of(&assign_groups(&clusters, 0), "new"), Some(5));
    }

    #[test]
    fn test_assign_one_article_per_medium() {
        let clusters = vec![
            vec![
                article("a", Media::Abc, None),
                article("a2", Media::Abc, None),
                article("b", Media::ElPais, None),
            ],
            vec![article("c", Media::Cope, None), article("c2", Media::Cope, None)],
            vec![article("r", Media::Rtve, Some(0)), article("r2", Media::Rtve, None)],
        ];
        let assignments = assign_groups(&clusters, 0);
        assert_eq!(group_of(&assignments, "a"), Some(1));
        assert_eq!(group_of(&assignments, "a2"), None);
        assert_eq!(group_of(&assignments, "b"), Some(1));
        // only one outlet left: not a cross-source story
        assert_eq!(group_of(&assignments, "c"), None);
        assert_eq!(group_of(&assignments, "c2"), None);
        assert_eq!(group_of(&assignments, "r"), Some(0));
        assert_eq!(group_of(&assignments, "r2"), None);
    }
}

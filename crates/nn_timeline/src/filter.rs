use std::cmp::Ordering;
use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use nn_core::text::normalized;
use nn_core::{Article, Category, Media, NeutralArticle, Relevance};
use serde::{Deserialize, Serialize};

/// What the filters look at on a record.
pub trait Filterable {
    fn category(&self) -> Category;
    fn relevance(&self) -> Option<Relevance>;
    fn medium(&self) -> Option<Media>;
    fn title(&self) -> &str;
    fn body(&self) -> &str;
    fn date(&self) -> Option<DateTime<Utc>>;
}

impl Filterable for Article {
    fn category(&self) -> Category {
        self.category
    }

    fn relevance(&self) -> Option<Relevance> {
        None
    }

    fn medium(&self) -> Option<Media> {
        Some(self.source_medium)
    }

    fn title(&self) -> &str {
        &self.title
    }

    fn body(&self) -> &str {
        &self.description
    }

    fn date(&self) -> Option<DateTime<Utc>> {
        self.pub_date
    }
}

impl Filterable for NeutralArticle {
    fn category(&self) -> Category {
        self.category
    }

    fn relevance(&self) -> Option<Relevance> {
        self.relevance
    }

    /// The outlet the summary's image is credited to.
    fn medium(&self) -> Option<Media> {
        self.image_medium
    }

    fn title(&self) -> &str {
        &self.neutral_title
    }

    fn body(&self) -> &str {
        &self.neutral_description
    }

    fn date(&self) -> Option<DateTime<Utc>> {
        self.date
    }
}

fn toggle<T: Ord>(set: &mut BTreeSet<T>, value: T) {
    if !set.remove(&value) {
        set.insert(value);
    }
}

/// Newest first, undated records last.
fn by_date_desc(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterState {
    pub categories: BTreeSet<Category>,
    pub relevances: BTreeSet<Relevance>,
    pub media: BTreeSet<Media>,
    pub search: String,
}

impl FilterState {
    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
            && self.relevances.is_empty()
            && self.media.is_empty()
            && self.search.trim().is_empty()
    }

    pub fn toggle_category(&mut self, category: Category) {
        toggle(&mut self.categories, category);
    }

    pub fn toggle_relevance(&mut self, relevance: Relevance) {
        toggle(&mut self.relevances, relevance);
    }

    pub fn toggle_medium(&mut self, medium: Media) {
        toggle(&mut self.media, medium);
    }

    pub fn set_search(&mut self, search: impl Into<String>) {
        self.search = search.into();
    }

    /// Resets the category, relevance and medium filters. The search text stays.
    pub fn clear(&mut self) {
        self.categories.clear();
        self.relevances.clear();
        self.media.clear();
    }

    pub fn matches<T: Filterable>(&self, item: &T) -> bool {
        self.matches_query(item, &normalized(&self.search))
    }

    fn matches_query<T: Filterable>(&self, item: &T, query: &str) -> bool {
        let category = self.categories.is_empty() || self.categories.contains(&item.category());
        let relevance = self.relevances.is_empty()
            || item.relevance().map_or(false, |r| self.relevances.contains(&r));
        let medium =
            self.media.is_empty() || item.medium().map_or(false, |m| self.media.contains(&m));
        let search = query.is_empty()
            || normalized(item.title()).contains(query)
            || normalized(item.body()).contains(query);
        category && relevance && medium && search
    }

    /// The visible list: matching records, newest first. With no active
    /// filter the input comes back as is.
    pub fn apply<T: Filterable + Clone>(&self, items: &[T]) -> Vec<T> {
        if self.is_empty() {
            return items.to_vec();
        }

        let query = normalized(&self.search);
        let mut visible: Vec<T> = items
            .iter()
            .filter(|item| self.matches_query(*item, &query))
            .cloned()
            .collect();
        visible.sort_by(|a, b| by_date_desc(a.date(), b.date()));
        visible
    }
}

/// Filters one day's summaries by category, relevance and free text.
pub fn apply_filters(
    bucket: &[NeutralArticle],
    categories: &BTreeSet<Category>,
    relevances: &BTreeSet<Relevance>,
    search: &str,
) -> Vec<NeutralArticle> {
    let filters = FilterState {
        categories: categories.clone(),
        relevances: relevances.clone(),
        media: BTreeSet::new(),
        search: search.to_string(),
    };
    filters.apply(bucket)
}

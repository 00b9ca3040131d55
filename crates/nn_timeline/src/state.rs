use chrono::{DateTime, FixedOffset};
use nn_core::{Article, Category, Media, NeutralArticle, Relevance};
use nn_inference::grouping::filter_grouped_news;
use tracing::{debug, warn};

use crate::days::{DayBucket, DayBuckets, TemporalClassifier, DAYS};
use crate::filter::FilterState;

#[derive(Debug, Clone)]
pub enum FeedEvent {
    ArticlesLoaded(Vec<Article>),
    NeutralArticlesLoaded(Vec<NeutralArticle>),
    SelectDay(usize),
    ToggleCategory(Category),
    ToggleRelevance(Relevance),
    ToggleMedium(Media),
    SetSearch(String),
    ClearFilters,
    /// The clock moved; rolls the timeline over when the day changed.
    Tick(DateTime<FixedOffset>),
}

/// Everything a reader of the feed sees, driven by `FeedEvent`s.
#[derive(Debug, Clone)]
pub struct FeedState {
    articles: Vec<Article>,
    neutral: Vec<NeutralArticle>,
    classifier: TemporalClassifier,
    selected_day: usize,
    filters: FilterState,
    now: DateTime<FixedOffset>,
}

impl FeedState {
    pub fn new(now: DateTime<FixedOffset>) -> Self {
        let mut classifier = TemporalClassifier::new(now.date_naive());
        classifier.refresh(&[], &now);
        Self {
            articles: Vec::new(),
            neutral: Vec::new(),
            classifier,
            selected_day: 0,
            filters: FilterState::default(),
            now,
        }
    }

    pub fn apply(mut self, event: FeedEvent) -> Self {
        self.update(event);
        self
    }

    pub fn update(&mut self, event: FeedEvent) {
        match event {
            FeedEvent::ArticlesLoaded(articles) => {
                debug!("Loaded {} articles", articles.len());
                self.articles = articles;
            }
            FeedEvent::NeutralArticlesLoaded(neutral) => {
                debug!("Loaded {} summaries", neutral.len());
                self.neutral = neutral;
                self.reclassify();
            }
            FeedEvent::SelectDay(day) if day < DAYS => self.selected_day = day,
            FeedEvent::SelectDay(day) => warn!("Ignoring selection of day {}", day),
            FeedEvent::ToggleCategory(category) => self.filters.toggle_category(category),
            FeedEvent::ToggleRelevance(relevance) => self.filters.toggle_relevance(relevance),
            FeedEvent::ToggleMedium(medium) => self.filters.toggle_medium(medium),
            FeedEvent::SetSearch(search) => self.filters.set_search(search),
            FeedEvent::ClearFilters => self.filters.clear(),
            FeedEvent::Tick(now) => {
                self.now = now;
                if self.classifier.is_stale(now.date_naive()) {
                    self.reclassify();
                    self.selected_day = 0;
                }
            }
        }
    }

    fn reclassify(&mut self) {
        self.classifier.refresh(&self.neutral, &self.now);
    }

    pub fn now(&self) -> DateTime<FixedOffset> {
        self.now
    }

    pub fn articles(&self) -> &[Article] {
        &self.articles
    }

    pub fn neutral_articles(&self) -> &[NeutralArticle] {
        &self.neutral
    }

    pub fn days(&self) -> &DayBuckets {
        self.classifier.buckets()
    }

    pub fn selected_day(&self) -> usize {
        self.selected_day
    }

    pub fn selected_bucket(&self) -> Option<&DayBucket> {
        self.days().get(self.selected_day)
    }

    pub fn filters(&self) -> &FilterState {
        &self.filters
    }

    /// Summaries of the selected day that pass the active filters.
    pub fn news_to_show(&self) -> Vec<NeutralArticle> {
        self.selected_bucket()
            .map(|bucket| self.filters.apply(&bucket.articles))
            .unwrap_or_default()
    }

    /// Raw articles passing the active filters.
    pub fn articles_to_show(&self) -> Vec<Article> {
        self.filters.apply(&self.articles)
    }

    /// Groups of two or more of the visible raw articles, most recent first.
    pub fn groups_of_news(&self) -> Vec<Vec<Article>> {
        filter_grouped_news(&self.articles_to_show())
    }
}

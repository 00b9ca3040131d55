use std::collections::BTreeSet;
use std::str::FromStr;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use nn_core::{Article, Error, NeutralArticle};
use nn_inference::grouping::filter_grouped_news;
use nn_timeline::{DayInfo, FilterState, DAYS};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info};

use crate::AppState;

pub struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0 {
            Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
            _ => {
                error!("❌ Request failed: {}", self.0);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

/// Comma separated filter values, e.g. `category=Política,Economía`.
#[derive(Debug, Default, Deserialize)]
pub struct NewsQuery {
    pub day: Option<usize>,
    pub category: Option<String>,
    pub relevance: Option<String>,
    pub medium: Option<String>,
    pub q: Option<String>,
}

fn parse_set<T: FromStr<Err = Error> + Ord>(raw: Option<&str>) -> nn_core::Result<BTreeSet<T>> {
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(T::from_str)
        .collect()
}

impl NewsQuery {
    pub fn filters(&self) -> nn_core::Result<FilterState> {
        Ok(FilterState {
            categories: parse_set(self.category.as_deref())?,
            relevances: parse_set(self.relevance.as_deref())?,
            media: parse_set(self.medium.as_deref())?,
            search: self.q.clone().unwrap_or_default(),
        })
    }
}

pub async fn list_news(
    State(state): State<Arc<AppState>>,
    Query(query): Query<NewsQuery>,
) -> ApiResult<Vec<NeutralArticle>> {
    let filters = query.filters()?;
    let day = query.day.unwrap_or(0);
    if day >= DAYS {
        return Err(Error::InvalidInput(format!("day must be below {}", DAYS)).into());
    }

    let feed = state.feed.lock().await;
    let news = feed
        .days()
        .get(day)
        .map(|bucket| filters.apply(&bucket.articles))
        .unwrap_or_default();
    Ok(Json(news))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DaySummary {
    #[serde(flatten)]
    pub day: DayInfo,
    pub formatted: String,
    pub short: String,
    pub count: usize,
}

pub async fn list_days(State(state): State<Arc<AppState>>) -> Json<Vec<DaySummary>> {
    let feed = state.feed.lock().await;
    let days = feed
        .days()
        .iter()
        .map(|bucket| DaySummary {
            formatted: bucket.day.formatted(),
            short: bucket.day.short_format(),
            count: bucket.articles.len(),
            day: bucket.day.clone(),
        })
        .collect();
    Json(days)
}

pub async fn list_groups(
    State(state): State<Arc<AppState>>,
    Query(query): Query<NewsQuery>,
) -> ApiResult<Vec<Vec<Article>>> {
    let filters = query.filters()?;
    let feed = state.feed.lock().await;
    Ok(Json(filter_grouped_news(&filters.apply(feed.articles()))))
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct IngestSummary {
    pub received: usize,
    pub stored: usize,
    pub regrouped: usize,
}

pub async fn ingest_articles(
    State(state): State<Arc<AppState>>,
    Json(articles): Json<Vec<Article>>,
) -> ApiResult<IngestSummary> {
    let received = articles.len();
    let stored = state.storage.store_articles(&articles).await?;
    let regrouped = state.refresh().await?;
    info!("📥 Ingested {} of {} articles", stored, received);
    Ok(Json(IngestSummary {
        received,
        stored,
        regrouped,
    }))
}

pub async fn load_neutral(
    State(state): State<Arc<AppState>>,
    Json(neutral): Json<Vec<NeutralArticle>>,
) -> ApiResult<serde_json::Value> {
    let received = neutral.len();
    let total = state.load_neutral(neutral).await?;
    Ok(Json(json!({ "received": received, "total": total })))
}

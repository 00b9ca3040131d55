use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use nn_core::{Article, Error, GroupAssignment, Result};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Source of the bearer token sent to the grouping service.
#[async_trait]
pub trait TokenProvider: Send + Sync + fmt::Debug {
    async fn token(&self) -> Result<String>;

    /// Called after the service rejected the current token.
    async fn refresh(&self) -> Result<String>;
}

/// A fixed token. Refreshing hands back the same value.
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl fmt::Debug for StaticToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("StaticToken").field(&"<redacted>").finish()
    }
}

#[async_trait]
impl TokenProvider for StaticToken {
    async fn token(&self) -> Result<String> {
        Ok(self.0.clone())
    }

    async fn refresh(&self) -> Result<String> {
        Ok(self.0.clone())
    }
}

#[derive(Serialize)]
struct GroupingRequestItem<'a> {
    id: &'a str,
    title: &'a str,
    body: &'a str,
}

/// The service is backed by pandas, so group numbers may arrive as floats.
#[derive(Deserialize)]
struct GroupingResponseItem {
    id: String,
    group_number: Option<serde_json::Number>,
}

impl From<GroupingResponseItem> for GroupAssignment {
    fn from(item: GroupingResponseItem) -> Self {
        let group_number = item
            .group_number
            .and_then(|n| n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)));
        GroupAssignment {
            id: item.id,
            group_number,
        }
    }
}

/// Client for the external grouping service.
pub struct GroupingClient {
    client: Arc<Client>,
    endpoint: String,
    auth: Arc<dyn TokenProvider>,
}

impl fmt::Debug for GroupingClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GroupingClient")
            .field("client", &"<reqwest::Client>")
            .field("endpoint", &self.endpoint)
            .field("auth", &self.auth)
            .finish()
    }
}

impl GroupingClient {
    pub fn new(endpoint: impl Into<String>, auth: Arc<dyn TokenProvider>) -> Self {
        Self {
            client: Arc::new(Client::new()),
            endpoint: endpoint.into(),
            auth,
        }
    }

    async fn send(&self, items: &[GroupingRequestItem<'_>], token: &str) -> Result<Vec<GroupAssignment>> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(token)
            .json(items)
            .send()
            .await
            .map_err(|e| Error::NetworkFailure(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::FORBIDDEN || status == StatusCode::UNAUTHORIZED {
            return Err(Error::AuthExpired);
        }
        if !status.is_success() {
            return Err(Error::NetworkFailure(format!(
                "grouping service returned {}",
                status
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::NetworkFailure(e.to_string()))?;
        let items: Vec<GroupingResponseItem> =
            serde_json::from_str(&body).map_err(|e| Error::DecodeFailure(e.to_string()))?;
        Ok(items.into_iter().map(GroupAssignment::from).collect())
    }

    /// Sends the batch and returns the service's assignments. An expired
    /// token is refreshed and the request retried once.
    pub async fn request_groups(&self, articles: &[Article]) -> Result<Vec<GroupAssignment>> {
        if articles.is_empty() {
            return Ok(Vec::new());
        }

        let items: Vec<_> = articles
            .iter()
            .map(|a| GroupingRequestItem {
                id: &a.id,
                title: &a.title,
                body: &a.description,
            })
            .collect();

        info!("🌐 Requesting groups for {} articles", items.len());
        let token = self.auth.token().await?;
        match self.send(&items, &token).await {
            Err(Error::AuthExpired) => {
                warn!("🔑 Grouping service rejected the token, re-authenticating");
                let token = self.auth.refresh().await?;
                self.send(&items, &token).await
            }
            other => other,
        }
    }
}

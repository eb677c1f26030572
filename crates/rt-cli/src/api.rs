//! Radio-T site API and news API client.

use std::time::Duration;

use rt_proto::config::ApiConfig;
use rt_proto::protocol::{decode_episodes, Article, Episode, ShowStart};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Unreachable host, transport error or non-2xx status.
    #[error("request to {url} failed: {reason}")]
    Network { url: String, reason: String },
    #[error("unexpected response from {url}: {reason}")]
    Decode { url: String, reason: String },
}

#[derive(Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    episodes_base: String,
    news_base: String,
}

impl ApiClient {
    pub fn new(config: &ApiConfig) -> anyhow::Result<Self> {
        let mut builder = reqwest::Client::builder()
            .user_agent(concat!("rt/", env!("CARGO_PKG_VERSION")));
        if config.request_timeout_secs > 0 {
            builder = builder.timeout(Duration::from_secs(config.request_timeout_secs));
        }
        Ok(Self {
            client: builder.build()?,
            episodes_base: config.episodes_base.trim_end_matches('/').to_string(),
            news_base: config.news_base.trim_end_matches('/').to_string(),
        })
    }

    pub async fn latest_episodes(&self, limit: usize) -> Result<Vec<Episode>, ApiError> {
        let url = format!("{}/last/{}", self.episodes_base, limit);
        let body = self.get_text(self.client.get(&url), &url).await?;
        Ok(episodes_from_body(&body))
    }

    /// Episodes matching `query`.  A blank query never hits the network.
    pub async fn search_episodes(&self, query: &str, limit: usize) -> Result<Vec<Episode>, ApiError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        let url = format!("{}/search", self.episodes_base);
        let limit = limit.to_string();
        let request = self
            .client
            .get(&url)
            .query(&[("q", query), ("limit", limit.as_str())]);
        let body = self.get_text(request, &url).await?;
        Ok(episodes_from_body(&body))
    }

    pub async fn show_start(&self) -> Result<ShowStart, ApiError> {
        let url = format!("{}/show/start", self.news_base);
        let body = self.get_text(self.client.get(&url), &url).await?;
        decode(&body, &url)
    }

    /// Currently discussed news item.  Only meaningful while the show is live.
    pub async fn active_news(&self) -> Result<Option<Article>, ApiError> {
        let url = format!("{}/news/active", self.news_base);
        let body = self.get_text(self.client.get(&url), &url).await?;
        if body.trim().is_empty() {
            return Ok(None);
        }
        decode::<Option<Article>>(&body, &url)
    }

    async fn get_text(&self, request: reqwest::RequestBuilder, url: &str) -> Result<String, ApiError> {
        debug!("GET {}", url);
        let network = |reason: String| ApiError::Network {
            url: url.to_string(),
            reason,
        };
        let response = request
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(network(format!("status {}", response.status())));
        }

        response.text().await.map_err(|e| network(e.to_string()))
    }
}

fn episodes_from_body(body: &str) -> Vec<Episode> {
    match serde_json::from_str::<Value>(body) {
        Ok(value) => decode_episodes(value),
        Err(e) => {
            debug!("episode list is not JSON: {}", e);
            Vec::new()
        }
    }
}

fn decode<T: DeserializeOwned>(body: &str, url: &str) -> Result<T, ApiError> {
    serde_json::from_str(body).map_err(|e| ApiError::Decode {
        url: url.to_string(),
        reason: e.to_string(),
    })
}

/// Local HTTP servers standing in for the real APIs.
#[cfg(test)]
pub mod testing {
    use axum::Router;
    use rt_proto::config::ApiConfig;

    /// Serve `router` on an ephemeral port and return its base URL.
    pub async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    pub fn config_for(base: &str) -> ApiConfig {
        ApiConfig {
            episodes_base: format!("{}/site-api", base),
            news_base: format!("{}/api/v1", base),
            request_timeout_secs: 5,
        }
    }
}

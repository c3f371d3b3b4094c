//! Brave Web Search后端

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use super::{SearchBackend, SearchHit};
use crate::config::SearchConfig;
use crate::error::ResearchError;

/// Brave Web Search API客户端
pub struct BraveSearch {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
}

#[derive(Debug, Default, Deserialize)]
struct BraveResponse {
    #[serde(default)]
    web: Option<BraveWeb>,
}

#[derive(Debug, Default, Deserialize)]
struct BraveWeb {
    #[serde(default)]
    results: Vec<BraveResult>,
}

#[derive(Debug, Deserialize)]
struct BraveResult {
    #[serde(default)]
    url: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
}

impl BraveSearch {
    pub fn new(config: &SearchConfig) -> Result<Self, ResearchError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| ResearchError::SearchRequest(e.to_string()))?;

        Ok(Self {
            http,
            endpoint: config.api_base_url.clone(),
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait]
impl SearchBackend for BraveSearch {
    async fn search(
        &self,
        query: &str,
        offset: usize,
        count: usize,
    ) -> Result<Vec<SearchHit>, ResearchError> {
        let response = self
            .http
            .get(&self.endpoint)
            .header("Accept", "application/json")
            .header("X-Subscription-Token", &self.api_key)
            .query(&[
                ("q", query.to_string()),
                ("offset", offset.to_string()),
                ("count", count.to_string()),
            ])
            .send()
            .await
            .map_err(|e| ResearchError::SearchRequest(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ResearchError::SearchRequest(format!(
                "brave search returned {}",
                status
            )));
        }

        let body: BraveResponse = response
            .json()
            .await
            .map_err(|e| ResearchError::SearchRequest(e.to_string()))?;

        Ok(body
            .web
            .unwrap_or_default()
            .results
            .into_iter()
            .filter(|r| !r.url.is_empty())
            .map(|r| SearchHit {
                url: r.url,
                title: r.title,
                description: r.description,
            })
            .collect())
    }
}

//! 基于reqwest的轻量页面抓取

use async_trait::async_trait;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, USER_AGENT};
use std::time::Duration;

use super::PageTransport;
use crate::config::ScrapeConfig;
use crate::error::ResearchError;

const ACCEPT_HTML: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

/// HTTP抓取，非2xx状态视为失败
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(config: &ScrapeConfig) -> Result<Self, ResearchError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent).map_err(|e| {
                ResearchError::InvalidConfiguration(format!("invalid user agent: {}", e))
            })?,
        );
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_HTML));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| ResearchError::InvalidConfiguration(e.to_string()))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl PageTransport for HttpTransport {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn fetch(&self, url: &str) -> Result<String, ResearchError> {
        let to_fetch_error = |e: reqwest::Error| ResearchError::TransientFetch {
            url: url.to_string(),
            message: e.to_string(),
        };

        self.client
            .get(url)
            .send()
            .await
            .map_err(to_fetch_error)?
            .error_for_status()
            .map_err(to_fetch_error)?
            .text()
            .await
            .map_err(to_fetch_error)
    }
}

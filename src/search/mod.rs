//! 搜索网关：限速、分页重试的查询到URL列表

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::ResearchError;
use crate::utils::rate_limiter::RateLimiter;

pub mod brave;

pub use brave::BraveSearch;

/// 单条搜索结果
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SearchHit {
    pub url: String,
    pub title: String,
    pub description: String,
}

/// 搜索后端
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// 查询一页结果；失败时返回`SearchRequest`错误
    async fn search(
        &self,
        query: &str,
        offset: usize,
        count: usize,
    ) -> Result<Vec<SearchHit>, ResearchError>;
}

/// 搜索网关
///
/// 每次后端调用之前都会经过共享的限速器。
/// 某个偏移量失败时推进到下一个偏移量，最多尝试`max_offset_attempts`个。
#[derive(Clone)]
pub struct SearchGateway {
    backend: Arc<dyn SearchBackend>,
    limiter: Arc<RateLimiter>,
    max_offset_attempts: usize,
}

impl SearchGateway {
    pub fn new(
        backend: Arc<dyn SearchBackend>,
        limiter: Arc<RateLimiter>,
        max_offset_attempts: usize,
    ) -> Self {
        Self {
            backend,
            limiter,
            max_offset_attempts: max_offset_attempts.max(1),
        }
    }

    pub async fn search(
        &self,
        query: &str,
        offset: usize,
        count: usize,
    ) -> Result<Vec<String>, ResearchError> {
        let hits = self.search_hits(query, offset, count).await?;
        Ok(hits.into_iter().map(|hit| hit.url).collect())
    }

    /// 与`search`相同，但保留标题与摘要
    pub async fn search_hits(
        &self,
        query: &str,
        offset: usize,
        count: usize,
    ) -> Result<Vec<SearchHit>, ResearchError> {
        for current in offset..offset + self.max_offset_attempts {
            self.limiter.wait().await;

            match self.backend.search(query, current, count).await {
                Ok(mut hits) => {
                    hits.retain(|hit| !hit.url.is_empty());
                    hits.truncate(count);
                    tracing::debug!(query, offset = current, hits = hits.len(), "search succeeded");
                    return Ok(hits);
                }
                Err(e) => {
                    tracing::warn!(query, offset = current, error = %e, "search attempt failed");
                }
            }
        }

        Err(ResearchError::SearchExhausted {
            query: query.to_string(),
            attempts: self.max_offset_attempts,
        })
    }
}

//! LLM客户端 - 基于rig的结构化补全实现

use anyhow::Result;
use rig::extractor::ExtractionError;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::config::LLMConfig;
use crate::error::ResearchError;
use crate::llm::CompletionService;
use crate::utils::prompt_budgeter::PromptBudgeter;

mod providers;

use providers::ProviderClient;

/// LLM客户端 - 提供统一的LLM服务接口
#[derive(Clone)]
pub struct LLMClient {
    config: LLMConfig,
    client: ProviderClient,
    budgeter: Arc<PromptBudgeter>,
}

impl LLMClient {
    /// 创建新的LLM客户端，Provider与预算策略在此一次性选定
    pub fn new(config: &LLMConfig) -> Result<Self> {
        let client = ProviderClient::new(config)?;
        let budgeter = Arc::new(PromptBudgeter::for_provider(config));
        Ok(Self {
            config: config.clone(),
            client,
            budgeter,
        })
    }

    /// 通用重试逻辑，只对服务错误重试，解析错误直接返回
    async fn retry_with_backoff<T, F, Fut>(&self, operation: F) -> Result<T, ResearchError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, ResearchError>>,
    {
        let max_retries = self.config.retry_attempts.max(1);
        let retry_delay_ms = self.config.retry_delay_ms;
        let mut retries = 0;

        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(err @ ResearchError::Service(_)) => {
                    retries += 1;
                    tracing::warn!(
                        attempt = retries,
                        max_attempts = max_retries,
                        error = %err,
                        "completion call failed"
                    );
                    if retries >= max_retries {
                        return Err(err);
                    }
                    tokio::time::sleep(Duration::from_millis(retry_delay_ms)).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

impl CompletionService for LLMClient {
    async fn complete<T>(&self, system_instruction: &str, prompt: &str) -> Result<T, ResearchError>
    where
        T: JsonSchema + for<'a> Deserialize<'a> + Serialize + Send + Sync + 'static,
    {
        let prompt = self.budgeter.fit(system_instruction, prompt).await;
        let extractor = self
            .client
            .create_extractor::<T>(&self.config.model, system_instruction, &self.config)
            .map_err(|e| ResearchError::Service(e.to_string()))?;
        let timeout = Duration::from_secs(self.config.timeout_seconds);

        self.retry_with_backoff(|| async {
            match tokio::time::timeout(timeout, extractor.extract(&prompt)).await {
                Ok(result) => result.map_err(classify_extraction_error),
                Err(_) => Err(ResearchError::Service(format!(
                    "completion timed out after {}s",
                    timeout.as_secs()
                ))),
            }
        })
        .await
    }
}

fn classify_extraction_error(error: ExtractionError) -> ResearchError {
    match error {
        ExtractionError::CompletionError(e) => ResearchError::Service(e.to_string()),
        other => ResearchError::Parse(other.to_string()),
    }
}

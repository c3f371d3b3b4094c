//! 模型服务 - 对调研核心暴露统一的结构化补全接口

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::ResearchError;

pub mod client;
pub mod prompts;

pub use client::LLMClient;

/// 结构化补全服务
///
/// 输出结构由`T`的JSON Schema描述；服务失败返回`Service`错误，
/// 结果无法解析为`T`时返回`Parse`错误。
pub trait CompletionService {
    async fn complete<T>(&self, system_instruction: &str, prompt: &str) -> Result<T, ResearchError>
    where
        T: JsonSchema + for<'a> Deserialize<'a> + Serialize + Send + Sync + 'static;
}

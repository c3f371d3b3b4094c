//! Prompt预算裁剪
//!
//! 每个Provider在构建时选定一种计量策略，之后所有调用共用该策略，不再按Provider名称分支。
//! 超出预算时只裁剪用户prompt（保留前缀，丢弃后缀），系统指令永远保持原样。

use serde::Deserialize;
use tiktoken_rs::CoreBPE;
use tokio::sync::OnceCell;

use crate::config::{LLMConfig, LLMProvider};

/// OpenAI模型的上下文窗口（tokens）
pub const OPENAI_CONTEXT_WINDOW: usize = 190_000;
/// xAI模型的上下文窗口（按空白分词计）
pub const XAI_CONTEXT_WINDOW: usize = 130_000;
/// Gemini模型信息查询失败时使用的上下文窗口
pub const GEMINI_FALLBACK_CONTEXT_WINDOW: usize = 1_048_576;
/// Gemini模型信息接口
pub const GEMINI_MODELS_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";

/// 计量策略
enum BudgetStrategy {
    /// 精确分词器计数
    Tokenizer { bpe: CoreBPE, budget: usize },
    /// 由服务端报告上下文上限，按空白分词计数
    BackendReported {
        lookup: ModelLimitLookup,
        budget: OnceCell<usize>,
        fallback: usize,
    },
    /// 空白分词的启发式计数
    WordCount { budget: usize },
    /// 没有预算，原样放行
    Unbounded,
}

/// 通过模型信息接口查询上下文上限
pub struct ModelLimitLookup {
    http: reqwest::Client,
    url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModelInfo {
    input_token_limit: usize,
}

impl ModelLimitLookup {
    /// `model_url`为完整的模型资源地址，例如`{endpoint}/models/gemini-2.0-flash`
    pub fn new(model_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            url: model_url.into(),
            api_key: api_key.into(),
        }
    }

    fn for_gemini(endpoint: &str, model: &str, api_key: &str) -> Self {
        let model_path = if model.starts_with("models/") {
            model.to_string()
        } else {
            format!("models/{}", model)
        };
        Self::new(
            format!("{}/{}", endpoint.trim_end_matches('/'), model_path),
            api_key,
        )
    }

    async fn fetch(&self) -> Result<usize, reqwest::Error> {
        let info: ModelInfo = self
            .http
            .get(&self.url)
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(info.input_token_limit)
    }
}

/// Prompt预算器
pub struct PromptBudgeter {
    strategy: BudgetStrategy,
}

impl PromptBudgeter {
    /// 根据Provider选择计量策略
    pub fn for_provider(config: &LLMConfig) -> Self {
        let strategy = match config.provider {
            LLMProvider::OpenAI => {
                let budget = config.context_window.unwrap_or(OPENAI_CONTEXT_WINDOW);
                match tokenizer_for_model(&config.model) {
                    Some(bpe) => BudgetStrategy::Tokenizer { bpe, budget },
                    None => {
                        tracing::warn!(
                            model = %config.model,
                            "no tokenizer available, falling back to word counting"
                        );
                        BudgetStrategy::WordCount { budget }
                    }
                }
            }
            LLMProvider::Gemini => BudgetStrategy::BackendReported {
                lookup: ModelLimitLookup::for_gemini(
                    GEMINI_MODELS_ENDPOINT,
                    &config.model,
                    &config.api_key,
                ),
                budget: match config.context_window {
                    Some(window) => OnceCell::new_with(Some(window)),
                    None => OnceCell::new(),
                },
                fallback: GEMINI_FALLBACK_CONTEXT_WINDOW,
            },
            LLMProvider::XAI => BudgetStrategy::WordCount {
                budget: config.context_window.unwrap_or(XAI_CONTEXT_WINDOW),
            },
            _ => match config.context_window {
                Some(budget) => BudgetStrategy::WordCount { budget },
                None => BudgetStrategy::Unbounded,
            },
        };
        Self { strategy }
    }

    pub fn tokenizer(bpe: CoreBPE, budget: usize) -> Self {
        Self {
            strategy: BudgetStrategy::Tokenizer { bpe, budget },
        }
    }

    pub fn backend_reported(lookup: ModelLimitLookup, fallback: usize) -> Self {
        Self {
            strategy: BudgetStrategy::BackendReported {
                lookup,
                budget: OnceCell::new(),
                fallback,
            },
        }
    }

    pub fn word_count(budget: usize) -> Self {
        Self {
            strategy: BudgetStrategy::WordCount { budget },
        }
    }

    pub fn unbounded() -> Self {
        Self {
            strategy: BudgetStrategy::Unbounded,
        }
    }

    /// 当前策略下的预算（Unbounded返回None）
    pub async fn budget(&self) -> Option<usize> {
        match &self.strategy {
            BudgetStrategy::Tokenizer { budget, .. } | BudgetStrategy::WordCount { budget } => {
                Some(*budget)
            }
            BudgetStrategy::BackendReported {
                lookup,
                budget,
                fallback,
            } => Some(
                *budget
                    .get_or_init(|| async {
                        match lookup.fetch().await {
                            Ok(limit) => {
                                tracing::debug!(limit, "model input limit reported by backend");
                                limit
                            }
                            Err(e) => {
                                tracing::warn!(
                                    error = %e,
                                    fallback = *fallback,
                                    "failed to look up model input limit, using fallback"
                                );
                                *fallback
                            }
                        }
                    })
                    .await,
            ),
            BudgetStrategy::Unbounded => None,
        }
    }

    /// 按当前策略计量文本大小
    pub fn measure(&self, text: &str) -> usize {
        match &self.strategy {
            BudgetStrategy::Tokenizer { bpe, .. } => bpe.encode_with_special_tokens(text).len(),
            BudgetStrategy::BackendReported { .. }
            | BudgetStrategy::WordCount { .. }
            | BudgetStrategy::Unbounded => count_words(text),
        }
    }

    /// 保证 size(system) + size(prompt) <= budget，必要时裁剪prompt
    pub async fn fit(&self, system_instruction: &str, prompt: &str) -> String {
        let Some(budget) = self.budget().await else {
            return prompt.to_string();
        };

        let system_size = self.measure(system_instruction);
        let prompt_size = self.measure(prompt);
        if system_size + prompt_size <= budget {
            return prompt.to_string();
        }

        let allowed = budget.saturating_sub(system_size);
        tracing::debug!(
            system_size,
            prompt_size,
            budget,
            allowed,
            "prompt exceeds budget, truncating"
        );

        match &self.strategy {
            BudgetStrategy::Tokenizer { bpe, .. } => truncate_tokens(bpe, prompt, allowed),
            _ => truncate_words(prompt, allowed),
        }
    }
}

fn tokenizer_for_model(model: &str) -> Option<CoreBPE> {
    tiktoken_rs::get_bpe_from_model(model)
        .or_else(|_| tiktoken_rs::o200k_base())
        .ok()
}

fn count_words(text: &str) -> usize {
    text.split_whitespace().count()
}

fn truncate_words(prompt: &str, allowed: usize) -> String {
    prompt
        .split_whitespace()
        .take(allowed)
        .collect::<Vec<_>>()
        .join(" ")
}

fn truncate_tokens(bpe: &CoreBPE, prompt: &str, allowed: usize) -> String {
    let tokens = bpe.encode_with_special_tokens(prompt);
    let mut keep = allowed.min(tokens.len());

    // 截断位置可能落在多字节字符中间，回退到可解码的位置
    while keep > 0 {
        if let Ok(text) = bpe.decode(tokens[..keep].to_vec()) {
            if bpe.encode_with_special_tokens(&text).len() <= allowed {
                return text;
            }
        }
        keep -= 1;
    }
    String::new()
}

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::PathBuf;

use crate::i18n::TargetLanguage;

/// OpenAI默认API地址
pub const OPENAI_API_BASE_URL: &str = "https://api.openai.com/v1";

/// LLM Provider类型
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
pub enum LLMProvider {
    #[serde(rename = "openai")]
    #[default]
    OpenAI,
    #[serde(rename = "gemini")]
    Gemini,
    #[serde(rename = "xai")]
    XAI,
    #[serde(rename = "anthropic")]
    Anthropic,
    #[serde(rename = "deepseek")]
    DeepSeek,
    #[serde(rename = "ollama")]
    Ollama,
}

impl std::fmt::Display for LLMProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LLMProvider::OpenAI => write!(f, "openai"),
            LLMProvider::Gemini => write!(f, "gemini"),
            LLMProvider::XAI => write!(f, "xai"),
            LLMProvider::Anthropic => write!(f, "anthropic"),
            LLMProvider::DeepSeek => write!(f, "deepseek"),
            LLMProvider::Ollama => write!(f, "ollama"),
        }
    }
}

impl std::str::FromStr for LLMProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(LLMProvider::OpenAI),
            "gemini" => Ok(LLMProvider::Gemini),
            "xai" | "grok" => Ok(LLMProvider::XAI),
            "anthropic" => Ok(LLMProvider::Anthropic),
            "deepseek" => Ok(LLMProvider::DeepSeek),
            "ollama" => Ok(LLMProvider::Ollama),
            _ => Err(format!("Unknown provider: {}", s)),
        }
    }
}

/// 应用程序配置
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct Config {
    /// 最终报告的输出路径
    pub output_path: PathBuf,

    /// 报告的目标语言
    pub target_language: TargetLanguage,

    /// LLM模型配置
    pub llm: LLMConfig,

    /// 搜索服务配置
    pub search: SearchConfig,

    /// 页面抓取配置
    pub scrape: ScrapeConfig,

    /// 递归调研参数
    pub research: ResearchConfig,

    /// 是否启用详细日志
    pub verbose: bool,
}

/// LLM模型配置
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct LLMConfig {
    /// LLM Provider类型
    pub provider: LLMProvider,

    /// LLM API KEY
    pub api_key: String,

    /// LLM API基地址（OpenAI兼容的Provider使用）
    pub api_base_url: String,

    /// 用于查询扩展、内容提取与结果归纳的模型
    pub model: String,

    /// 最大输出tokens
    pub max_tokens: u32,

    /// 模型服务调用的尝试次数
    pub retry_attempts: u32,

    /// 重试间隔（毫秒）
    pub retry_delay_ms: u64,

    /// 超时时间（秒）
    pub timeout_seconds: u64,

    /// 覆盖Provider默认的上下文窗口（按该Provider的计量单位）
    pub context_window: Option<usize>,
}

/// 搜索服务配置（Brave Web Search）
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct SearchConfig {
    /// 搜索服务API KEY
    pub api_key: String,

    /// 搜索服务地址
    pub api_base_url: String,

    /// 每个子查询获取的结果数量
    pub page_size: usize,

    /// 单次搜索失败时最多尝试的偏移量个数
    pub max_offset_attempts: usize,

    /// 两次搜索请求之间的最小间隔（毫秒）
    pub rate_limit_interval_ms: u64,

    /// 超时时间（秒）
    pub timeout_seconds: u64,
}

/// 页面抓取配置
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct ScrapeConfig {
    /// 轻量HTTP抓取使用的User-Agent
    pub user_agent: String,

    /// 超时时间（秒）
    pub timeout_seconds: u64,

    /// HTTP抓取失败时是否回退到无头浏览器
    pub browser_fallback: bool,

    /// Chrome/Chromium可执行文件路径，不设置时自动探测
    pub chrome_path: Option<PathBuf>,
}

/// 递归调研参数
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct ResearchConfig {
    /// 每一层展开的子查询数量
    pub breadth: usize,

    /// 递归深度
    pub depth: usize,

    /// 同一层内并发执行的分支数
    pub concurrency: usize,

    /// 开始调研前是否向用户追问以澄清调研意图
    pub ask_follow_up: bool,
}

impl Config {
    /// 从文件加载配置
    pub fn from_file(path: &PathBuf) -> Result<Self> {
        let mut file =
            File::open(path).context(format!("Failed to open config file: {:?}", path))?;
        let mut content = String::new();
        file.read_to_string(&mut content)
            .context("Failed to read config file")?;

        let config: Config = toml::from_str(&content).context("Failed to parse config file")?;
        Ok(config)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_path: PathBuf::from("./output.md"),
            target_language: TargetLanguage::default(),
            llm: LLMConfig::default(),
            search: SearchConfig::default(),
            scrape: ScrapeConfig::default(),
            research: ResearchConfig::default(),
            verbose: false,
        }
    }
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            provider: LLMProvider::default(),
            api_key: std::env::var("DEEP_RESEARCH_LLM_API_KEY").unwrap_or_default(),
            api_base_url: String::from(OPENAI_API_BASE_URL),
            model: String::from("o3-mini"),
            max_tokens: 16384,
            retry_attempts: 2,
            retry_delay_ms: 3000,
            timeout_seconds: 300,
            context_window: None,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api_key: std::env::var("BRAVE_API_KEY").unwrap_or_default(),
            api_base_url: String::from("https://api.search.brave.com/res/v1/web/search"),
            page_size: 5,
            max_offset_attempts: 3,
            rate_limit_interval_ms: 2000,
            timeout_seconds: 15,
        }
    }
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            user_agent: String::from(
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/115.0.0.0 Safari/537.36",
            ),
            timeout_seconds: 10,
            browser_fallback: true,
            chrome_path: None,
        }
    }
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            breadth: 4,
            depth: 2,
            concurrency: 2,
            ask_follow_up: true,
        }
    }
}

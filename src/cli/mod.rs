use crate::config::{Config, LLMProvider};
use crate::i18n::TargetLanguage;
use anyhow::{Context, Result, bail};
use clap::Parser;
use std::io::{BufRead, Write};
use std::path::PathBuf;

/// 默认配置文件名
pub const DEFAULT_CONFIG_FILE: &str = "deep-research.toml";

/// Deep Research RS - 递归式网络调研与报告生成
#[derive(Parser, Debug)]
#[command(name = "deep-research-rs")]
#[command(
    about = "Recursively expands a research topic into web searches, extracts and summarizes the results, and writes a markdown report."
)]
#[command(version)]
pub struct Args {
    /// 调研主题，不指定时交互式输入
    pub query: Option<String>,

    /// 每层展开的子查询数量（建议 2-10）
    #[arg(short, long)]
    pub breadth: Option<usize>,

    /// 递归深度（建议 1-5）
    #[arg(short, long)]
    pub depth: Option<usize>,

    /// 同一层内并发执行的分支数
    #[arg(short, long)]
    pub concurrency: Option<usize>,

    /// 配置文件路径
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// 报告输出路径
    #[arg(short, long)]
    pub output_path: Option<PathBuf>,

    /// LLM Provider (openai, gemini, xai, anthropic, deepseek, ollama)
    #[arg(long)]
    pub llm_provider: Option<String>,

    /// LLM API KEY
    #[arg(long)]
    pub llm_api_key: Option<String>,

    /// LLM API基地址
    #[arg(long)]
    pub llm_api_base_url: Option<String>,

    /// 使用的模型
    #[arg(short, long)]
    pub model: Option<String>,

    /// 搜索服务API KEY
    #[arg(long)]
    pub search_api_key: Option<String>,

    /// 报告的目标语言 (en, zh, ja, de, fr)
    #[arg(long)]
    pub target_language: Option<String>,

    /// 跳过调研前的追问
    #[arg(long)]
    pub no_feedback: bool,

    /// 以NDJSON格式输出调研事件
    #[arg(long)]
    pub json_events: bool,

    /// 是否启用详细日志
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    /// 将CLI参数转换为配置
    ///
    /// 优先使用`--config`指定的文件，其次是当前目录下的默认配置文件，否则使用默认值；
    /// 命令行参数覆盖文件中的设置。
    pub fn into_config(self) -> Result<Config> {
        let mut config = match &self.config {
            Some(config_path) => Config::from_file(config_path)?,
            None => {
                let default_config_path = std::env::current_dir()
                    .unwrap_or_else(|_| PathBuf::from("."))
                    .join(DEFAULT_CONFIG_FILE);

                if default_config_path.exists() {
                    Config::from_file(&default_config_path)?
                } else {
                    Config::default()
                }
            }
        };

        // 调研参数
        if let Some(breadth) = self.breadth {
            config.research.breadth = breadth;
        }
        if let Some(depth) = self.depth {
            config.research.depth = depth;
        }
        if let Some(concurrency) = self.concurrency {
            config.research.concurrency = concurrency;
        }
        if self.no_feedback || self.json_events {
            config.research.ask_follow_up = false;
        }
        if let Some(output_path) = self.output_path {
            config.output_path = output_path;
        }

        // 覆盖LLM配置
        if let Some(provider_str) = self.llm_provider {
            if let Ok(provider) = provider_str.parse::<LLMProvider>() {
                config.llm.provider = provider;
            } else {
                eprintln!(
                    "⚠️ 警告: 未知的provider: {}，使用默认provider",
                    provider_str
                );
            }
        }
        if let Some(llm_api_base_url) = self.llm_api_base_url {
            config.llm.api_base_url = llm_api_base_url;
        }
        if let Some(llm_api_key) = self.llm_api_key {
            config.llm.api_key = llm_api_key;
        }
        if let Some(model) = self.model {
            config.llm.model = model;
        }

        if let Some(search_api_key) = self.search_api_key {
            config.search.api_key = search_api_key;
        }

        // 目标语言配置
        if let Some(target_language_str) = self.target_language {
            if let Ok(target_language) = target_language_str.parse::<TargetLanguage>() {
                config.target_language = target_language;
            } else {
                eprintln!(
                    "⚠️ 警告: 未知的目标语言: {}，使用默认语言 (English)",
                    target_language_str
                );
            }
        }

        config.verbose = config.verbose || self.verbose;

        Ok(config)
    }
}

/// 在终端提示并读取一行输入
pub fn ask(message: &str) -> Result<String> {
    ask_from(&mut std::io::stdin().lock(), &mut std::io::stdout(), message)
}

/// 交互式补全调研主题与广度、深度
pub fn prompt_research(config: &mut Config) -> Result<String> {
    prompt_research_from(&mut std::io::stdin().lock(), &mut std::io::stdout(), config)
}

/// 输入流关闭（读到0字节）时返回错误
fn ask_from(input: &mut impl BufRead, output: &mut impl Write, message: &str) -> Result<String> {
    write!(output, "{}", message)?;
    output.flush()?;

    let mut line = String::new();
    let read = input
        .read_line(&mut line)
        .context("Failed to read from stdin")?;
    if read == 0 {
        bail!("stdin closed before an answer was given");
    }
    Ok(line.trim().to_string())
}

/// 读取一个正整数，空输入使用默认值
fn ask_usize_from(
    input: &mut impl BufRead,
    output: &mut impl Write,
    message: &str,
    default: usize,
) -> Result<usize> {
    loop {
        let answer = ask_from(input, output, &format!("{} [{}]: ", message, default))?;
        match parse_usize_or(&answer, default) {
            Some(value) => return Ok(value),
            None => eprintln!("⚠️ 请输入一个正整数"),
        }
    }
}

fn parse_usize_or(input: &str, default: usize) -> Option<usize> {
    if input.trim().is_empty() {
        return Some(default);
    }
    input.trim().parse::<usize>().ok().filter(|value| *value > 0)
}

fn prompt_research_from(
    input: &mut impl BufRead,
    output: &mut impl Write,
    config: &mut Config,
) -> Result<String> {
    let topic = loop {
        let topic = ask_from(input, output, "\n🔬 What would you like to research? ")?;
        if !topic.is_empty() {
            break topic;
        }
    };
    config.research.breadth = ask_usize_from(
        input,
        output,
        "Research breadth (recommended 2-10)",
        config.research.breadth,
    )?;
    config.research.depth = ask_usize_from(
        input,
        output,
        "Research depth (recommended 1-5)",
        config.research.depth,
    )?;
    Ok(topic)
}

//! 测试用的脚本化协作者

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::ResearchError;
use crate::llm::CompletionService;
use crate::scrape::PageTransport;
use crate::search::{SearchBackend, SearchHit};

type Handler = Box<dyn Fn(&str) -> Result<serde_json::Value, ResearchError> + Send + Sync>;

/// 按输出结构名称分派的补全服务
#[derive(Default)]
pub struct ScriptedCompletion {
    handlers: HashMap<String, Handler>,
    prompts: Mutex<HashMap<String, Vec<String>>>,
}

impl ScriptedCompletion {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on<F>(mut self, schema: &str, handler: F) -> Self
    where
        F: Fn(&str) -> Result<serde_json::Value, ResearchError> + Send + Sync + 'static,
    {
        self.handlers.insert(schema.to_string(), Box::new(handler));
        self
    }

    pub fn prompts(&self, schema: &str) -> Vec<String> {
        self.prompts
            .lock()
            .unwrap()
            .get(schema)
            .cloned()
            .unwrap_or_default()
    }

    pub fn calls(&self, schema: &str) -> usize {
        self.prompts(schema).len()
    }
}

impl CompletionService for ScriptedCompletion {
    async fn complete<T>(&self, _system_instruction: &str, prompt: &str) -> Result<T, ResearchError>
    where
        T: JsonSchema + for<'a> Deserialize<'a> + Serialize + Send + Sync + 'static,
    {
        let schema = T::schema_name().to_string();
        self.prompts
            .lock()
            .unwrap()
            .entry(schema.clone())
            .or_default()
            .push(prompt.to_string());

        // 让并发分支有机会交错执行
        tokio::task::yield_now().await;

        let handler = self
            .handlers
            .get(&schema)
            .ok_or_else(|| ResearchError::Service(format!("no script for {}", schema)))?;
        let value = handler(prompt)?;
        serde_json::from_value(value).map_err(|e| ResearchError::Parse(e.to_string()))
    }
}

/// 每个查询返回固定URL的搜索后端；`failing`中的查询总是失败
pub struct UrlPerQueryBackend {
    pub failing: Vec<String>,
}

#[async_trait]
impl SearchBackend for UrlPerQueryBackend {
    async fn search(
        &self,
        query: &str,
        _offset: usize,
        _count: usize,
    ) -> Result<Vec<SearchHit>, ResearchError> {
        if self.failing.iter().any(|q| q == query) {
            return Err(ResearchError::SearchRequest("backend down".to_string()));
        }
        Ok(vec![SearchHit {
            url: format!("https://source.example/{}", query.replace(' ', "-")),
            ..SearchHit::default()
        }])
    }
}

/// 返回包含URL的简单HTML
pub struct EchoTransport;

#[async_trait]
impl PageTransport for EchoTransport {
    fn name(&self) -> &'static str {
        "echo"
    }

    async fn fetch(&self, url: &str) -> Result<String, ResearchError> {
        Ok(format!("<html><body><p>{}</p></body></html>", url))
    }
}

/// 从prompt中提取`<tag>...</tag>`包裹的第一段内容
pub fn between<'a>(text: &'a str, open: &str, close: &str) -> Option<&'a str> {
    let start = text.find(open)? + open.len();
    let end = text[start..].find(close)? + start;
    Some(&text[start..end])
}

//! 页面内容提取：抓取URL并把正文整理为markdown

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::ScrapeConfig;
use crate::error::ResearchError;
use crate::llm::CompletionService;
use crate::llm::prompts::PAGE_EXTRACTOR_INSTRUCTION;
use crate::research::types::{ExtractedPage, PageExtraction};

#[cfg(feature = "browser")]
pub mod browser;
pub mod html;
pub mod http;

#[cfg(feature = "browser")]
pub use browser::BrowserTransport;
pub use http::HttpTransport;

/// 页面抓取传输方式
#[async_trait]
pub trait PageTransport: Send + Sync {
    /// 用于日志的名称
    fn name(&self) -> &'static str;

    /// 获取页面的原始HTML
    async fn fetch(&self, url: &str) -> Result<String, ResearchError>;
}

/// 内容提取器
///
/// 先用主传输方式抓取，失败时尝试备用传输方式；两者都失败则返回空内容页面。
/// 不做任何跨调用的缓存。
pub struct ContentExtractor<C> {
    completion: Arc<C>,
    primary: Arc<dyn PageTransport>,
    fallback: Option<Arc<dyn PageTransport>>,
}

impl<C: CompletionService> ContentExtractor<C> {
    pub fn new(
        completion: Arc<C>,
        primary: Arc<dyn PageTransport>,
        fallback: Option<Arc<dyn PageTransport>>,
    ) -> Self {
        Self {
            completion,
            primary,
            fallback,
        }
    }

    /// 按抓取配置组装HTTP主传输与（启用`browser`特性时的）浏览器备用传输
    pub fn from_config(completion: Arc<C>, config: &ScrapeConfig) -> Result<Self, ResearchError> {
        let primary: Arc<dyn PageTransport> = Arc::new(HttpTransport::new(config)?);
        Ok(Self::new(completion, primary, fallback_transport(config)))
    }

    pub async fn extract(&self, url: &str) -> ExtractedPage {
        let Some(raw_html) = self.fetch(url).await else {
            return ExtractedPage::placeholder(url);
        };

        let prompt = format!(
            "Below is the complete HTML content of a webpage:\n\n<html>\n{}\n</html>\n\n\
             Extract the main article heading and body. Return the fields 'heading' and 'body' in markdown format.",
            html::normalize_html(&raw_html)
        );

        match self
            .completion
            .complete::<PageExtraction>(PAGE_EXTRACTOR_INSTRUCTION, &prompt)
            .await
        {
            Ok(page) => ExtractedPage::new(url, format!("# {}\n\n{}", page.heading, page.body)),
            Err(e) => {
                tracing::warn!(url, error = %e, "page extraction failed");
                ExtractedPage::placeholder(url)
            }
        }
    }

    async fn fetch(&self, url: &str) -> Option<String> {
        let transports = std::iter::once(&self.primary).chain(self.fallback.iter());

        for transport in transports {
            match transport.fetch(url).await {
                Ok(html) => return Some(html),
                Err(e) => {
                    tracing::warn!(url, transport = transport.name(), error = %e, "fetch failed");
                }
            }
        }
        None
    }
}

#[cfg(feature = "browser")]
fn fallback_transport(config: &ScrapeConfig) -> Option<Arc<dyn PageTransport>> {
    config
        .browser_fallback
        .then(|| Arc::new(BrowserTransport::new(config)) as Arc<dyn PageTransport>)
}

#[cfg(not(feature = "browser"))]
fn fallback_transport(config: &ScrapeConfig) -> Option<Arc<dyn PageTransport>> {
    if config.browser_fallback {
        tracing::debug!("browser fallback requested but the `browser` feature is disabled");
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::research::testing::ScriptedCompletion;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StaticTransport {
        result: Result<&'static str, &'static str>,
        calls: AtomicUsize,
    }

    impl StaticTransport {
        fn ok(html: &'static str) -> Arc<Self> {
            Arc::new(Self {
                result: Ok(html),
                calls: AtomicUsize::new(0),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                result: Err("connection reset"),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl PageTransport for StaticTransport {
        fn name(&self) -> &'static str {
            "static"
        }

        async fn fetch(&self, url: &str) -> Result<String, ResearchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result
                .map(str::to_string)
                .map_err(|message| ResearchError::TransientFetch {
                    url: url.to_string(),
                    message: message.to_string(),
                })
        }
    }

    fn completion() -> Arc<ScriptedCompletion> {
        Arc::new(ScriptedCompletion::new().on(
            "PageExtraction",
            |_prompt| Ok(serde_json::json!({"heading": "Solid-state batteries", "body": "Denser cells."})),
        ))
    }

    #[tokio::test]
    async fn test_primary_success_builds_markdown() {
        let primary = StaticTransport::ok("<html><body><h1>Solid-state batteries</h1></body></html>");
        let fallback = StaticTransport::ok("<html></html>");
        let extractor = ContentExtractor::new(completion(), primary.clone(), Some(fallback.clone()));

        let page = extractor.extract("https://a.example").await;

        assert_eq!(page.url, "https://a.example");
        assert_eq!(page.markdown, "# Solid-state batteries\n\nDenser cells.");
        assert_eq!(fallback.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_primary_failure_uses_fallback() {
        let primary = StaticTransport::failing();
        let fallback = StaticTransport::ok("<html><body>rendered</body></html>");
        let extractor = ContentExtractor::new(completion(), primary.clone(), Some(fallback.clone()));

        let page = extractor.extract("https://b.example").await;

        assert!(!page.is_empty());
        assert_eq!(primary.calls.load(Ordering::SeqCst), 1);
        assert_eq!(fallback.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_both_transports_failing_yields_placeholder() {
        let completion = completion();
        let extractor = ContentExtractor::new(
            completion.clone(),
            StaticTransport::failing(),
            Some(StaticTransport::failing()),
        );

        let page = extractor.extract("https://c.example").await;

        assert_eq!(page.url, "https://c.example");
        assert!(page.is_empty());
        assert_eq!(completion.calls("PageExtraction"), 0);
    }

    #[tokio::test]
    async fn test_completion_failure_yields_placeholder() {
        let completion = Arc::new(ScriptedCompletion::new().on("PageExtraction", |_| {
            Err(ResearchError::Parse("not json".to_string()))
        }));
        let extractor = ContentExtractor::new(completion, StaticTransport::ok("<p>x</p>"), None);

        assert!(extractor.extract("https://d.example").await.is_empty());
    }

    #[tokio::test]
    async fn test_prompt_contains_normalized_html() {
        let completion = completion();
        let extractor = ContentExtractor::new(
            completion.clone(),
            StaticTransport::ok("<p>keep</p><script>drop()</script>"),
            None,
        );

        extractor.extract("https://e.example").await;

        let prompts = completion.prompts("PageExtraction");
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("<p>keep</p>"));
        assert!(!prompts[0].contains("drop()"));
    }
}

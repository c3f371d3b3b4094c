//! 无头Chromium抓取，作为HTTP抓取失败时的备用传输方式

use async_trait::async_trait;
use futures::StreamExt;
use std::path::PathBuf;
use std::time::Duration;

use super::PageTransport;
use crate::config::ScrapeConfig;
use crate::error::ResearchError;

/// 每次抓取启动一个独立的浏览器进程，抓取结束后关闭
///
/// 浏览器的用户数据目录在`profile_root`下临时创建，浏览器退出后删除。
pub struct BrowserTransport {
    chrome_path: Option<PathBuf>,
    profile_root: PathBuf,
    timeout: Duration,
}

impl BrowserTransport {
    pub fn new(config: &ScrapeConfig) -> Self {
        Self {
            chrome_path: config.chrome_path.clone(),
            profile_root: std::env::temp_dir(),
            timeout: Duration::from_secs(config.timeout_seconds.max(1) * 3),
        }
    }

    async fn render(&self, url: &str) -> Result<String, String> {
        let profile = tempfile::Builder::new()
            .prefix("deep-research-chrome-")
            .tempdir_in(&self.profile_root)
            .map_err(|e| format!("failed to create browser profile dir: {}", e))?;

        let html = self.render_with_profile(url, profile.path().to_path_buf()).await;

        if let Err(e) = profile.close() {
            tracing::debug!(error = %e, "failed to remove browser profile dir");
        }
        html
    }

    async fn render_with_profile(&self, url: &str, profile_dir: PathBuf) -> Result<String, String> {
        let mut builder = chromiumoxide::BrowserConfig::builder()
            .arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--no-first-run")
            .arg("--disable-extensions")
            .arg("--disable-dev-shm-usage")
            .user_data_dir(profile_dir);
        if let Some(path) = &self.chrome_path {
            builder = builder.chrome_executable(path);
        }
        let browser_config = builder.build()?;

        let (mut browser, mut handler) = chromiumoxide::Browser::launch(browser_config)
            .await
            .map_err(|e| format!("failed to launch chrome: {}", e))?;
        let handler_task = tokio::spawn(async move { while handler.next().await.is_some() {} });

        let html = async {
            let page = browser
                .new_page(url)
                .await
                .map_err(|e| format!("navigation failed: {}", e))?;
            page.content()
                .await
                .map_err(|e| format!("failed to read page content: {}", e))
        }
        .await;

        if let Err(e) = browser.close().await {
            tracing::debug!(error = %e, "failed to close browser");
        }
        // 进程退出后才能安全删除用户数据目录
        if let Err(e) = browser.wait().await {
            tracing::debug!(error = %e, "failed to wait for browser exit");
        }
        handler_task.abort();

        html
    }
}

#[async_trait]
impl PageTransport for BrowserTransport {
    fn name(&self) -> &'static str {
        "browser"
    }

    async fn fetch(&self, url: &str) -> Result<String, ResearchError> {
        let to_fetch_error = |message: String| ResearchError::TransientFetch {
            url: url.to_string(),
            message,
        };

        tokio::time::timeout(self.timeout, self.render(url))
            .await
            .map_err(|_| to_fetch_error(format!("timed out after {}s", self.timeout.as_secs())))?
            .map_err(to_fetch_error)
    }
}

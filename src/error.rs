//! 调研流程中的错误分类
//!
//! 所有错误都在最小的作用域内被恢复（单个分支），不会跨越分支汇合点向上传播。

/// 调研核心的错误类型
#[derive(Debug, thiserror::Error)]
pub enum ResearchError {
    /// 页面抓取时的网络或超时错误，由ContentExtractor通过备用传输方式处理
    #[error("failed to fetch {url}: {message}")]
    TransientFetch { url: String, message: String },

    /// 所有尝试过的搜索偏移量都失败了
    #[error("search exhausted for query `{query}` after {attempts} offset attempts")]
    SearchExhausted { query: String, attempts: usize },

    /// 单次搜索请求失败（会推进到下一个偏移量重试）
    #[error("search request failed: {0}")]
    SearchRequest(String),

    /// 模型返回的结构化结果无法解析
    #[error("malformed completion response: {0}")]
    Parse(String),

    /// 模型服务调用失败
    #[error("completion service error: {0}")]
    Service(String),

    /// 无法启动调研的配置
    #[error("invalid research configuration: {0}")]
    InvalidConfiguration(String),
}

impl ResearchError {
    /// 是否为解析类错误（调用方可以降级为空结果）
    pub fn is_parse(&self) -> bool {
        matches!(self, ResearchError::Parse(_))
    }
}

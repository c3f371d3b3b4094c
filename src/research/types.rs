use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// 由查询扩展生成的子查询
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ResearchQuery {
    /// 发送给搜索引擎的查询语句
    pub query: String,
    /// 该查询希望达成的调研目标
    pub research_goal: String,
}

/// 查询扩展的结构化输出
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct SerpQueryList {
    pub queries: Vec<ResearchQuery>,
}

/// 结果归纳的结构化输出
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Synthesis {
    pub learnings: Vec<String>,
    #[serde(rename = "followUpQuestions")]
    pub follow_up_questions: Vec<String>,
}

/// 网页内容提取的结构化输出
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PageExtraction {
    pub heading: String,
    pub body: String,
}

/// 抓取并提取后的页面，仅在创建它的分支内存在
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedPage {
    pub url: String,
    pub markdown: String,
}

impl ExtractedPage {
    pub fn new(url: impl Into<String>, markdown: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            markdown: markdown.into(),
        }
    }

    /// 抓取失败时使用的空内容占位页面
    pub fn placeholder(url: impl Into<String>) -> Self {
        Self::new(url, "")
    }

    pub fn is_empty(&self) -> bool {
        self.markdown.trim().is_empty()
    }
}

/// 调研结果：去重后的learning与访问过的URL
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResearchResult {
    pub learnings: BTreeSet<String>,
    pub visited_urls: BTreeSet<String>,
}

impl ResearchResult {
    /// 按字符串相等合并另一个结果
    pub fn merge(&mut self, other: ResearchResult) {
        self.learnings.extend(other.learnings);
        self.visited_urls.extend(other.visited_urls);
    }

    pub fn is_empty(&self) -> bool {
        self.learnings.is_empty() && self.visited_urls.is_empty()
    }
}

/// 单个分支持有的调研状态，兄弟分支之间互不共享
#[derive(Debug, Clone, PartialEq)]
pub struct ResearchState {
    pub learnings: BTreeSet<String>,
    pub visited_urls: BTreeSet<String>,
    pub breadth: usize,
    pub depth: usize,
}

impl ResearchState {
    pub fn new(breadth: usize, depth: usize) -> Self {
        Self {
            learnings: BTreeSet::new(),
            visited_urls: BTreeSet::new(),
            breadth: breadth.max(1),
            depth,
        }
    }

    /// 下一层的广度：减半且不小于1
    pub fn next_breadth(&self) -> usize {
        next_breadth(self.breadth)
    }

    /// 下一层的深度
    pub fn next_depth(&self) -> usize {
        self.depth.saturating_sub(1)
    }

    pub fn into_result(self) -> ResearchResult {
        ResearchResult {
            learnings: self.learnings,
            visited_urls: self.visited_urls,
        }
    }
}

pub fn next_breadth(breadth: usize) -> usize {
    (breadth / 2).max(1)
}

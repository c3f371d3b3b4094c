//! 递归调研编排
//!
//! 每一层：扩展主题 → 以有限并发展开分支 → 每个分支依次搜索、抓取、归纳，
//! 然后以减半的广度与减一的深度继续递归，或作为叶子返回。
//! 分支内的任何错误都在分支边界被吸收为空结果，不会影响兄弟分支与上层调用。

use futures::future::{FutureExt, LocalBoxFuture, join_all};
use std::sync::Arc;

use super::expander::QueryExpander;
use super::synthesizer::ResultSynthesizer;
use super::types::{ResearchQuery, ResearchResult, ResearchState};
use crate::error::ResearchError;
use crate::llm::CompletionService;
use crate::scrape::ContentExtractor;
use crate::search::SearchGateway;
use crate::utils::progress::{ProgressSnapshot, ProgressTracker};
use crate::utils::threads::do_parallel_with_limit;

/// 进度回调
pub type ProgressCallback<'a> = &'a dyn Fn(ProgressSnapshot);

/// 一次`invoke`调用内所有层级共享的上下文
struct Run<'a> {
    concurrency: usize,
    tracker: ProgressTracker,
    on_progress: Option<ProgressCallback<'a>>,
}

impl Run<'_> {
    fn branch_finished(&self) {
        self.tracker.update(1);
        if let Some(callback) = self.on_progress {
            callback(self.tracker.snapshot());
        }
    }
}

pub struct ResearchOrchestrator<C> {
    expander: QueryExpander<C>,
    search: SearchGateway,
    extractor: ContentExtractor<C>,
    synthesizer: ResultSynthesizer<C>,
    page_size: usize,
}

impl<C: CompletionService> ResearchOrchestrator<C> {
    pub fn new(
        completion: Arc<C>,
        search: SearchGateway,
        extractor: ContentExtractor<C>,
        page_size: usize,
    ) -> Self {
        Self {
            expander: QueryExpander::new(completion.clone()),
            search,
            extractor,
            synthesizer: ResultSynthesizer::new(completion),
            page_size: page_size.max(1),
        }
    }

    pub fn search(&self) -> &SearchGateway {
        &self.search
    }

    pub fn extractor(&self) -> &ContentExtractor<C> {
        &self.extractor
    }

    /// 对主题执行递归调研，返回去重后的learning与访问过的URL
    ///
    /// 只有在展开分支之前发生的错误会返回给调用方：
    /// 非法参数（广度或并发数为0）以及根层查询扩展时的模型服务错误。
    pub async fn invoke(
        &self,
        topic: &str,
        breadth: usize,
        depth: usize,
        concurrency: usize,
        on_progress: Option<ProgressCallback<'_>>,
    ) -> Result<ResearchResult, ResearchError> {
        if breadth == 0 {
            return Err(ResearchError::InvalidConfiguration(
                "breadth must be at least 1".to_string(),
            ));
        }
        if concurrency == 0 {
            return Err(ResearchError::InvalidConfiguration(
                "concurrency must be at least 1".to_string(),
            ));
        }

        let run = Run {
            concurrency,
            tracker: ProgressTracker::new(ProgressTracker::estimate_total(breadth, depth)),
            on_progress,
        };
        tracing::info!(
            breadth,
            depth,
            concurrency,
            estimated_branches = run.tracker.total(),
            "starting research"
        );

        let result = self
            .research(topic.to_string(), ResearchState::new(breadth, depth), &run)
            .await?;

        tracing::info!(
            learnings = result.learnings.len(),
            visited_urls = result.visited_urls.len(),
            completed_branches = run.tracker.completed(),
            "research finished"
        );
        Ok(result)
    }

    /// 单层调研：扩展、扇出、汇合
    fn research<'a>(
        &'a self,
        topic: String,
        state: ResearchState,
        run: &'a Run<'a>,
    ) -> LocalBoxFuture<'a, Result<ResearchResult, ResearchError>> {
        async move {
            let prior_learnings: Vec<&str> = state.learnings.iter().map(String::as_str).collect();
            let queries = self
                .expander
                .expand(&topic, &prior_learnings, state.breadth)
                .await?;
            tracing::debug!(
                breadth = state.breadth,
                depth = state.depth,
                queries = queries.len(),
                "fanning out"
            );

            // 每一层使用独立的并发限制
            let branches = queries
                .into_iter()
                .map(|query| {
                    let state = state.clone();
                    async move {
                        let result = match self.run_branch(&query, state, run).await {
                            Ok(result) => result,
                            Err(e) => {
                                tracing::warn!(query = %query.query, error = %e, "branch failed");
                                ResearchResult::default()
                            }
                        };
                        run.branch_finished();
                        result
                    }
                })
                .collect::<Vec<_>>();

            let mut merged = ResearchResult::default();
            for result in do_parallel_with_limit(branches, run.concurrency).await {
                merged.merge(result);
            }
            Ok(merged)
        }
        .boxed_local()
    }

    /// 单个分支：搜索 → 抓取 → 归纳 → 递归或返回叶子结果
    async fn run_branch(
        &self,
        query: &ResearchQuery,
        mut state: ResearchState,
        run: &Run<'_>,
    ) -> Result<ResearchResult, ResearchError> {
        let urls = self.search.search(&query.query, 0, self.page_size).await?;
        tracing::debug!(query = %query.query, urls = urls.len(), "searched");

        let pages = join_all(urls.iter().map(|url| self.extractor.extract(url))).await;

        let next_breadth = state.next_breadth();
        let next_depth = state.next_depth();
        let synthesis = self
            .synthesizer
            .synthesize(&query.query, &pages, next_breadth, next_breadth)
            .await?;

        state.learnings.extend(synthesis.learnings);
        state.visited_urls.extend(urls);

        if next_depth == 0 {
            return Ok(state.into_result());
        }

        tracing::debug!(
            query = %query.query,
            breadth = next_breadth,
            depth = next_depth,
            "researching deeper"
        );
        let next_topic = format!(
            "Previous research goal: {}\nFollow-up research directions: {}",
            query.research_goal,
            synthesis.follow_up_questions.join("\n")
        );
        let next_state = ResearchState {
            breadth: next_breadth,
            depth: next_depth,
            ..state
        };
        self.research(next_topic, next_state, run).await
    }
}

//! 查询扩展：把调研主题展开为若干子查询

use std::sync::Arc;

use super::types::{ResearchQuery, SerpQueryList};
use crate::error::ResearchError;
use crate::llm::CompletionService;
use crate::llm::prompts::system_prompt;

pub struct QueryExpander<C> {
    completion: Arc<C>,
}

impl<C: CompletionService> QueryExpander<C> {
    pub fn new(completion: Arc<C>) -> Self {
        Self { completion }
    }

    /// 生成至多`n`个子查询
    ///
    /// 不足`n`个时直接接受，不会重新请求；模型输出无法解析时返回空列表。
    /// 模型服务本身失败时返回`Service`错误，由调用方决定如何处理。
    pub async fn expand<S: AsRef<str>>(
        &self,
        topic: &str,
        prior_learnings: &[S],
        n: usize,
    ) -> Result<Vec<ResearchQuery>, ResearchError> {
        let mut prompt = format!(
            "Given the following prompt from the user, generate a list of SERP queries to research the topic. \
             Return up to {} unique queries, each with a 'query' and a 'research_goal' field. \
             Make sure each query is unique and not similar to each other.\n\n<prompt>{}</prompt>",
            n, topic
        );
        if !prior_learnings.is_empty() {
            let learnings = prior_learnings
                .iter()
                .map(|l| l.as_ref())
                .collect::<Vec<_>>()
                .join("\n");
            prompt.push_str(&format!(
                "\n\nHere are some learnings from previous research, use them to generate more specific queries:\n{}",
                learnings
            ));
        }

        match self
            .completion
            .complete::<SerpQueryList>(&system_prompt(), &prompt)
            .await
        {
            Ok(list) => {
                let mut queries = list.queries;
                queries.truncate(n);
                tracing::debug!(topic, requested = n, generated = queries.len(), "expanded topic");
                Ok(queries)
            }
            Err(e) if e.is_parse() => {
                tracing::warn!(topic, error = %e, "failed to parse generated queries");
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }
}

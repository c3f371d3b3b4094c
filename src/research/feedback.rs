//! 调研前的追问：帮助用户澄清调研意图

use futures::future::join_all;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::ResearchError;
use crate::llm::CompletionService;
use crate::llm::prompts::system_prompt;
use crate::scrape::ContentExtractor;
use crate::search::SearchGateway;

/// 追问前参考的搜索结果数量
const FEEDBACK_SEARCH_COUNT: usize = 3;

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ClarifiedQuery {
    pub clarified_query: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct FeedbackQuestions {
    pub questions: Vec<String>,
}

/// 先把主题提炼为一个搜索查询，参考少量搜索结果后生成3-5个追问
pub struct FeedbackGenerator<'a, C> {
    completion: &'a C,
    search: &'a SearchGateway,
    extractor: &'a ContentExtractor<C>,
}

impl<'a, C: CompletionService> FeedbackGenerator<'a, C> {
    pub fn new(
        completion: &'a C,
        search: &'a SearchGateway,
        extractor: &'a ContentExtractor<C>,
    ) -> Self {
        Self {
            completion,
            search,
            extractor,
        }
    }

    pub async fn generate(&self, topic: &str) -> Result<Vec<String>, ResearchError> {
        let clarified = self.clarify(topic).await?;

        let hits = match self
            .search
            .search_hits(&clarified, 0, FEEDBACK_SEARCH_COUNT)
            .await
        {
            Ok(hits) => hits,
            Err(e) => {
                tracing::warn!(query = %clarified, error = %e, "feedback search failed");
                Vec::new()
            }
        };
        let pages = join_all(hits.iter().map(|hit| self.extractor.extract(&hit.url))).await;
        let context = hits
            .iter()
            .zip(pages)
            .filter_map(|(hit, page)| {
                if !page.is_empty() {
                    Some(page.markdown)
                } else {
                    search_snippet(&hit.title, &hit.description)
                }
            })
            .collect::<Vec<_>>()
            .join("\n");

        let prompt = format!(
            "Given the research topic: '{}' and the following information retrieved from a refined SERP query:\n{}\n\n\
             Generate 3-5 follow-up questions designed to help the user further refine and clarify their research intent. \
             The questions should be open-ended and encourage the user to provide additional context, preferences, \
             or specific aspects of the topic they are interested in. Avoid framing the questions in a way that tests \
             the user or assumes detailed prior knowledge of the subject matter. Focus solely on clarifying the \
             user's research needs rather than the content of the SERP results.",
            topic, context
        );

        match self
            .completion
            .complete::<FeedbackQuestions>(&system_prompt(), &prompt)
            .await
        {
            Ok(feedback) => Ok(feedback.questions),
            Err(e) if e.is_parse() => {
                tracing::warn!(error = %e, "failed to parse follow-up questions");
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }

    /// 提炼失败时退回原始主题
    async fn clarify(&self, topic: &str) -> Result<String, ResearchError> {
        let prompt = format!(
            "Given the research topic: '{}', generate a single SERP search query that captures the core essence of the topic. \
             Retain any acronyms and abbreviations exactly as provided, do not expand them into their full forms. \
             Avoid overly specific terms; use a more general context while keeping the user's terminology. \
             For example, if the input is 'Tell me the latest news about the decision made by DOGE and Elon Musk', \
             the clarified query is 'latest news DOGE Elon Musk decision'.",
            topic
        );

        match self
            .completion
            .complete::<ClarifiedQuery>(&system_prompt(), &prompt)
            .await
        {
            Ok(clarified) if !clarified.clarified_query.trim().is_empty() => {
                tracing::debug!(clarified = %clarified.clarified_query, "clarified topic");
                Ok(clarified.clarified_query)
            }
            Ok(_) => Ok(topic.to_string()),
            Err(e) if e.is_parse() => {
                tracing::warn!(error = %e, "failed to parse clarified query");
                Ok(topic.to_string())
            }
            Err(e) => Err(e),
        }
    }
}

/// 页面抓取失败时用搜索结果的标题与摘要代替
fn search_snippet(title: &str, description: &str) -> Option<String> {
    match (title.trim(), description.trim()) {
        ("", "") => None,
        ("", description) => Some(description.to_string()),
        (title, "") => Some(format!("# {}", title)),
        (title, description) => Some(format!("# {}\n\n{}", title, description)),
    }
}

/// 把初始主题与追问的问答合并为最终的调研主题
pub fn combine_query(topic: &str, questions: &[String], answers: &[String]) -> String {
    if questions.is_empty() {
        return topic.to_string();
    }

    let pairs = questions
        .iter()
        .zip(answers.iter().map(String::as_str).chain(std::iter::repeat("")))
        .map(|(q, a)| format!("Q: {}\nA: {}", q, a))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Initial Query: {}\nFollow-up Questions and Answers:\n{}",
        topic, pairs
    )
}

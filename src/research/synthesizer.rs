//! 结果归纳：把一个子查询抓取到的页面压缩成learning与后续问题

use std::sync::Arc;

use super::types::{ExtractedPage, Synthesis};
use crate::error::ResearchError;
use crate::llm::CompletionService;
use crate::llm::prompts::system_prompt;

pub struct ResultSynthesizer<C> {
    completion: Arc<C>,
}

impl<C: CompletionService> ResultSynthesizer<C> {
    pub fn new(completion: Arc<C>) -> Self {
        Self { completion }
    }

    /// 两个列表分别截断到各自的上限；输出无法解析时返回空结果
    pub async fn synthesize(
        &self,
        query: &str,
        pages: &[ExtractedPage],
        max_learnings: usize,
        max_follow_ups: usize,
    ) -> Result<Synthesis, ResearchError> {
        let contents = pages
            .iter()
            .filter(|page| !page.is_empty())
            .map(|page| format!("<content>\n{}\n</content>", page.markdown))
            .collect::<String>();

        let prompt = format!(
            "Given the following contents from a SERP search for the query <query>{}</query>, \
             generate a list of learnings from the contents. Return up to {} learnings and up to {} follow-up questions. \
             Make sure each learning is unique and not similar to each other. The learnings should be concise and to the point, \
             as detailed and information dense as possible. Include any entities like people, places, companies, products, \
             things, etc in the learnings, as well as any exact metrics, numbers, or dates.\n\n<contents>{}</contents>",
            query, max_learnings, max_follow_ups, contents
        );

        match self
            .completion
            .complete::<Synthesis>(&system_prompt(), &prompt)
            .await
        {
            Ok(mut synthesis) => {
                synthesis.learnings.truncate(max_learnings);
                synthesis.follow_up_questions.truncate(max_follow_ups);
                Ok(synthesis)
            }
            Err(e) if e.is_parse() => {
                tracing::warn!(query, error = %e, "failed to parse synthesis");
                Ok(Synthesis::default())
            }
            Err(e) => Err(e),
        }
    }
}

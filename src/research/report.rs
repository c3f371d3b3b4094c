//! 最终报告撰写

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::types::ResearchResult;
use crate::error::ResearchError;
use crate::i18n::TargetLanguage;
use crate::llm::CompletionService;
use crate::llm::prompts::system_prompt;

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FinalReport {
    #[serde(rename = "reportMarkdown")]
    pub report_markdown: String,
}

pub struct ReportWriter<C> {
    completion: Arc<C>,
    language: TargetLanguage,
}

impl<C: CompletionService> ReportWriter<C> {
    pub fn new(completion: Arc<C>, language: TargetLanguage) -> Self {
        Self {
            completion,
            language,
        }
    }

    /// 生成markdown报告并在末尾附上来源列表
    ///
    /// 模型输出无法解析时退化为learning的列表。
    pub async fn write(&self, prompt: &str, result: &ResearchResult) -> Result<String, ResearchError> {
        let learnings = result
            .learnings
            .iter()
            .map(|learning| format!("<learning>\n{}\n</learning>", learning))
            .collect::<Vec<_>>()
            .join("\n");

        let user_prompt = format!(
            "Given the following prompt from the user, write a final report on the topic using the learnings from research. \
             Make it as detailed as possible, aim for 3 or more pages, include ALL the learnings from research. {}\n\n\
             <prompt>{}</prompt>\n\nHere are all the learnings from previous research:\n\n<learnings>\n{}\n</learnings>",
            self.language.report_instruction(),
            prompt,
            learnings
        );

        let body = match self
            .completion
            .complete::<FinalReport>(&system_prompt(), &user_prompt)
            .await
        {
            Ok(report) => report.report_markdown,
            Err(e) if e.is_parse() => {
                tracing::warn!(error = %e, "failed to parse final report, falling back to learnings");
                learnings_as_markdown(result)
            }
            Err(e) => return Err(e),
        };

        Ok(format!("{}{}", body.trim_end(), self.sources_section(result)))
    }

    fn sources_section(&self, result: &ResearchResult) -> String {
        let urls = result
            .visited_urls
            .iter()
            .map(|url| format!("- {}", url))
            .collect::<Vec<_>>()
            .join("\n");
        format!("\n\n## {}\n\n{}\n", self.language.sources_heading(), urls)
    }
}

fn learnings_as_markdown(result: &ResearchResult) -> String {
    result
        .learnings
        .iter()
        .map(|learning| format!("- {}", learning))
        .collect::<Vec<_>>()
        .join("\n")
}

//! 调研核心：查询扩展、结果归纳与递归编排

pub mod expander;
pub mod feedback;
pub mod orchestrator;
pub mod report;
pub mod synthesizer;
pub mod types;

pub use expander::QueryExpander;
pub use feedback::{FeedbackGenerator, combine_query};
pub use orchestrator::{ProgressCallback, ResearchOrchestrator};
pub use report::ReportWriter;
pub use synthesizer::ResultSynthesizer;
pub use types::{ExtractedPage, ResearchQuery, ResearchResult, ResearchState, Synthesis};

#[cfg(test)]
pub(crate) mod testing;

#[cfg(test)]
mod tests;

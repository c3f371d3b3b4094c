use anyhow::{Context, Result};
use serde::Serialize;
use std::sync::Arc;

use crate::config::Config;
use crate::llm::{CompletionService, LLMClient};
use crate::outlet::{DiskOutlet, Outlet};
use crate::research::{
    FeedbackGenerator, ReportWriter, ResearchOrchestrator, ResearchResult, combine_query,
};
use crate::scrape::ContentExtractor;
use crate::search::{BraveSearch, SearchGateway};
use crate::utils::progress::ProgressSnapshot;
use crate::utils::rate_limiter::RateLimiter;

/// 一次调研运行所需的全部组件，由配置一次性构建
pub struct ResearchContext<C = LLMClient> {
    /// 配置
    pub config: Config,
    /// 模型服务
    pub completion: Arc<C>,
    /// 递归调研编排器
    pub orchestrator: ResearchOrchestrator<C>,
    /// 报告撰写
    pub report_writer: ReportWriter<C>,
}

impl ResearchContext<LLMClient> {
    pub fn new(config: Config) -> Result<Self> {
        let completion = Arc::new(LLMClient::new(&config.llm)?);
        let backend = Arc::new(BraveSearch::new(&config.search)?);
        let search = SearchGateway::new(
            backend,
            Arc::new(RateLimiter::from_millis(config.search.rate_limit_interval_ms)),
            config.search.max_offset_attempts,
        );
        let extractor = ContentExtractor::from_config(completion.clone(), &config.scrape)?;

        Ok(Self::with_parts(config, completion, search, extractor))
    }
}

impl<C: CompletionService> ResearchContext<C> {
    pub fn with_parts(
        config: Config,
        completion: Arc<C>,
        search: SearchGateway,
        extractor: ContentExtractor<C>,
    ) -> Self {
        let orchestrator = ResearchOrchestrator::new(
            completion.clone(),
            search,
            extractor,
            config.search.page_size,
        );
        let report_writer = ReportWriter::new(completion.clone(), config.target_language.clone());

        Self {
            config,
            completion,
            orchestrator,
            report_writer,
        }
    }

    pub fn feedback(&self) -> FeedbackGenerator<'_, C> {
        FeedbackGenerator::new(
            self.completion.as_ref(),
            self.orchestrator.search(),
            self.orchestrator.extractor(),
        )
    }
}

/// 调研事件流：零个或多个`progress`，之后恰好一个`final`或`error`
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ResearchEvent {
    #[serde(rename_all = "camelCase")]
    Progress {
        run_id: String,
        #[serde(flatten)]
        snapshot: ProgressSnapshot,
    },
    #[serde(rename_all = "camelCase")]
    Final {
        run_id: String,
        learnings: Vec<String>,
        visited_urls: Vec<String>,
        report: String,
    },
    #[serde(rename_all = "camelCase")]
    Error { run_id: String, message: String },
}

/// 调研产出
#[derive(Debug, Clone)]
pub struct ResearchOutcome {
    pub result: ResearchResult,
    pub report: String,
}

/// 执行调研并撰写报告，过程中通过`sink`发出事件
pub async fn run_research<C: CompletionService>(
    context: &ResearchContext<C>,
    topic: &str,
    sink: &dyn Fn(ResearchEvent),
) -> Result<ResearchOutcome> {
    let run_id = uuid::Uuid::new_v4().to_string();

    match research_and_report(context, topic, &run_id, sink).await {
        Ok(outcome) => {
            sink(ResearchEvent::Final {
                run_id,
                learnings: outcome.result.learnings.iter().cloned().collect(),
                visited_urls: outcome.result.visited_urls.iter().cloned().collect(),
                report: outcome.report.clone(),
            });
            Ok(outcome)
        }
        Err(e) => {
            sink(ResearchEvent::Error {
                run_id,
                message: format!("{:#}", e),
            });
            Err(e)
        }
    }
}

async fn research_and_report<C: CompletionService>(
    context: &ResearchContext<C>,
    topic: &str,
    run_id: &str,
    sink: &dyn Fn(ResearchEvent),
) -> Result<ResearchOutcome> {
    let research = &context.config.research;
    let on_progress = |snapshot: ProgressSnapshot| {
        sink(ResearchEvent::Progress {
            run_id: run_id.to_string(),
            snapshot,
        })
    };

    let result = context
        .orchestrator
        .invoke(
            topic,
            research.breadth,
            research.depth,
            research.concurrency,
            Some(&on_progress),
        )
        .await
        .context("Research failed")?;

    let report = context
        .report_writer
        .write(topic, &result)
        .await
        .context("Failed to write final report")?;

    Ok(ResearchOutcome { result, report })
}

/// 生成追问并收集用户回答，返回合并后的调研主题
///
/// 追问生成失败不影响调研，直接使用原始主题。
pub async fn refine_topic<C, F>(context: &ResearchContext<C>, topic: &str, mut answer: F) -> Result<String>
where
    C: CompletionService,
    F: FnMut(&str) -> Result<String>,
{
    println!("\n🧭 正在生成调研计划...");
    let questions = match context.feedback().generate(topic).await {
        Ok(questions) => questions,
        Err(e) => {
            eprintln!("⚠️ 追问生成失败，直接使用原始主题: {}", e);
            return Ok(topic.to_string());
        }
    };

    if questions.is_empty() {
        return Ok(topic.to_string());
    }

    println!("\n❓ 为了更好地理解你的调研需求，请回答以下问题:");
    let mut answers = Vec::with_capacity(questions.len());
    for (i, question) in questions.iter().enumerate() {
        answers.push(answer(&format!("\nQ{}: {}\n➤ ", i + 1, question))?);
    }

    Ok(combine_query(topic, &questions, &answers))
}

/// 控制台输出：NDJSON事件或带emoji的进度行
pub fn console_sink(json_events: bool) -> impl Fn(ResearchEvent) {
    move |event| {
        if json_events {
            match serde_json::to_string(&event) {
                Ok(line) => println!("{}", line),
                Err(e) => tracing::error!(error = %e, "failed to serialize research event"),
            }
            return;
        }

        match event {
            ResearchEvent::Progress { snapshot, .. } => println!(
                "🔎 调研进度: {}/{} ({:.1}%)，已用时 {:.1}秒，预计剩余 {:.1}秒",
                snapshot.completed,
                snapshot.total,
                snapshot.percentage,
                snapshot.elapsed_seconds,
                snapshot.estimated_remaining_seconds
            ),
            ResearchEvent::Final {
                learnings,
                visited_urls,
                ..
            } => {
                println!("\n📚 调研结论:");
                for learning in &learnings {
                    println!("- {}", learning);
                }
                println!(
                    "\n✅ 调研完成，共 {} 条结论，{} 个来源",
                    learnings.len(),
                    visited_urls.len()
                );
            }
            ResearchEvent::Error { message, .. } => eprintln!("❌ 调研失败: {}", message),
        }
    }
}

/// 启动调研工作流
pub async fn launch(config: &Config, topic: &str, json_events: bool) -> Result<()> {
    let context = ResearchContext::new(config.clone())?;

    let topic = if config.research.ask_follow_up && !json_events {
        refine_topic(&context, topic, crate::cli::ask).await?
    } else {
        topic.to_string()
    };

    if !json_events {
        println!(
            "\n🚀 开始调研 (广度 {}，深度 {}，并发 {}，报告语言 {})...",
            config.research.breadth,
            config.research.depth,
            config.research.concurrency,
            config.target_language.display_name()
        );
    }
    let sink = console_sink(json_events);
    let outcome = run_research(&context, &topic, &sink).await?;

    let outlet = DiskOutlet::new(&config.output_path);
    outlet.save(&outcome.report).await?;
    if !json_events {
        println!("💾 报告已保存: {}", outlet.output_path().display());
    }

    Ok(())
}

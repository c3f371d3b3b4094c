use serde_json::json;
use std::cell::RefCell;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use super::testing::{EchoTransport, ScriptedCompletion, UrlPerQueryBackend, between};
use super::*;
use crate::error::ResearchError;
use crate::i18n::TargetLanguage;
use crate::scrape::ContentExtractor;
use crate::search::{SearchBackend, SearchGateway, SearchHit};
use crate::utils::progress::ProgressSnapshot;
use crate::utils::rate_limiter::RateLimiter;

/// 每次扩展都生成全局唯一的查询，每个分支产出一条与查询对应的learning
fn scripted() -> ScriptedCompletion {
    let counter = Arc::new(AtomicUsize::new(0));
    ScriptedCompletion::new()
        .on("SerpQueryList", move |prompt| {
            let n: usize = between(prompt, "Return up to ", " unique queries")
                .and_then(|n| n.parse().ok())
                .unwrap_or(0);
            let queries = (0..n)
                .map(|_| {
                    let id = counter.fetch_add(1, Ordering::SeqCst);
                    json!({"query": format!("query-{}", id), "research_goal": format!("goal-{}", id)})
                })
                .collect::<Vec<_>>();
            Ok(json!({ "queries": queries }))
        })
        .on("PageExtraction", |prompt| {
            let url = between(prompt, "<p>", "</p>").unwrap_or_default();
            Ok(json!({"heading": "Page", "body": format!("content of {}", url)}))
        })
        .on("Synthesis", |prompt| {
            let query = between(prompt, "<query>", "</query>").unwrap_or_default();
            Ok(json!({
                "learnings": [format!("learning from {}", query)],
                "followUpQuestions": [format!("what else about {}?", query)]
            }))
        })
}

fn gateway_with(backend: Arc<dyn SearchBackend>) -> SearchGateway {
    SearchGateway::new(backend, Arc::new(RateLimiter::new(Duration::ZERO)), 2)
}

fn orchestrator_with(
    completion: Arc<ScriptedCompletion>,
    backend: Arc<dyn SearchBackend>,
) -> ResearchOrchestrator<ScriptedCompletion> {
    let extractor = ContentExtractor::new(completion.clone(), Arc::new(EchoTransport), None);
    ResearchOrchestrator::new(completion, gateway_with(backend), extractor, 5)
}

fn orchestrator(
    completion: Arc<ScriptedCompletion>,
    failing: &[&str],
) -> ResearchOrchestrator<ScriptedCompletion> {
    let backend = Arc::new(UrlPerQueryBackend {
        failing: failing.iter().map(|q| q.to_string()).collect(),
    });
    orchestrator_with(completion, backend)
}

#[tokio::test]
async fn test_two_branches_yield_two_learnings_and_urls() {
    let completion = Arc::new(scripted());
    let result = orchestrator(completion, &[])
        .invoke("topic", 2, 0, 2, None)
        .await
        .unwrap();

    assert_eq!(result.learnings.len(), 2);
    assert!(result.learnings.contains("learning from query-0"));
    assert!(result.learnings.contains("learning from query-1"));
    assert_eq!(result.visited_urls.len(), 2);
    assert!(result.visited_urls.contains("https://source.example/query-0"));
}

#[tokio::test]
async fn test_depth_one_runs_a_single_round_of_leaves() {
    let completion = Arc::new(scripted());
    let completed = RefCell::new(Vec::new());
    let on_progress = |snapshot: ProgressSnapshot| completed.borrow_mut().push(snapshot.completed);

    let result = orchestrator(completion.clone(), &[])
        .invoke("topic", 4, 1, 4, Some(&on_progress))
        .await
        .unwrap();

    assert_eq!(result.learnings.len(), 4);
    assert_eq!(completion.calls("SerpQueryList"), 1);
    assert_eq!(completion.calls("Synthesis"), 4);
    assert_eq!(completed.borrow().len(), 4);
}

#[tokio::test]
async fn test_recursion_halves_breadth_and_threads_state() {
    let completion = Arc::new(scripted());
    let result = orchestrator(completion.clone(), &[])
        .invoke("topic", 4, 2, 2, None)
        .await
        .unwrap();

    // 根层4个分支，每个以广度2递归一次
    assert_eq!(completion.calls("SerpQueryList"), 5);
    assert_eq!(completion.calls("Synthesis"), 12);
    assert_eq!(result.learnings.len(), 12);
    assert_eq!(result.visited_urls.len(), 12);

    let nested = completion.prompts("SerpQueryList");
    let deeper = &nested[1..];
    assert!(deeper.iter().all(|p| p.contains("Return up to 2 unique queries")));
    assert!(deeper.iter().all(|p| p.contains("Previous research goal: goal-")));
    assert!(deeper.iter().all(|p| p.contains("Follow-up research directions: what else about")));
    assert!(deeper.iter().all(|p| p.contains("learnings from previous research")));
}

#[tokio::test]
async fn test_synthesis_caps_follow_the_halved_breadth() {
    let completion = Arc::new(scripted());
    orchestrator(completion.clone(), &[])
        .invoke("topic", 6, 0, 2, None)
        .await
        .unwrap();

    let prompts = completion.prompts("Synthesis");
    assert_eq!(prompts.len(), 6);
    assert!(
        prompts
            .iter()
            .all(|p| p.contains("up to 3 learnings and up to 3 follow-up questions"))
    );
}

#[tokio::test]
async fn test_sub_queries_never_exceed_breadth() {
    let completion = Arc::new(scripted().on("SerpQueryList", |_| {
        Ok(json!({
            "queries": (0..10)
                .map(|i| json!({"query": format!("wide-{}", i), "research_goal": "g"}))
                .collect::<Vec<_>>()
        }))
    }));

    let result = orchestrator(completion.clone(), &[])
        .invoke("topic", 3, 0, 3, None)
        .await
        .unwrap();

    assert_eq!(completion.calls("Synthesis"), 3);
    assert_eq!(result.visited_urls.len(), 3);
}

#[tokio::test]
async fn test_one_failing_branch_does_not_affect_siblings() {
    let completion = Arc::new(scripted());
    let completed = RefCell::new(Vec::new());
    let on_progress = |snapshot: ProgressSnapshot| completed.borrow_mut().push(snapshot.completed);

    let result = orchestrator(completion.clone(), &["query-1"])
        .invoke("topic", 3, 0, 3, Some(&on_progress))
        .await
        .unwrap();

    assert_eq!(result.learnings.len(), 2);
    assert!(!result.learnings.contains("learning from query-1"));
    assert!(!result.visited_urls.contains("https://source.example/query-1"));
    // 失败的分支同样计入进度
    assert_eq!(completed.borrow().len(), 3);
}

#[tokio::test]
async fn test_synthesis_service_error_degrades_branch() {
    let completion = Arc::new(scripted().on("Synthesis", |prompt| {
        if prompt.contains("<query>query-0</query>") {
            Err(ResearchError::Service("overloaded".to_string()))
        } else {
            Ok(json!({"learnings": ["survivor"], "followUpQuestions": []}))
        }
    }));

    let result = orchestrator(completion, &[])
        .invoke("topic", 2, 0, 2, None)
        .await
        .unwrap();

    assert_eq!(result.learnings.len(), 1);
    assert_eq!(result.visited_urls.len(), 1);
    assert!(result.visited_urls.contains("https://source.example/query-1"));
}

#[tokio::test]
async fn test_nested_expansion_failure_stays_inside_the_branch() {
    let counter = Arc::new(AtomicUsize::new(0));
    let completion = Arc::new(scripted().on("SerpQueryList", move |prompt| {
        if prompt.contains("Previous research goal") {
            return Err(ResearchError::Service("quota exceeded".to_string()));
        }
        let id = counter.fetch_add(1, Ordering::SeqCst);
        Ok(json!({"queries": [{"query": format!("root-{}", id), "research_goal": "g"}]}))
    }));

    let result = orchestrator(completion, &[])
        .invoke("topic", 1, 2, 1, None)
        .await
        .unwrap();

    assert!(result.is_empty());
}

#[tokio::test]
async fn test_root_expansion_service_error_is_returned() {
    let completion = Arc::new(scripted().on("SerpQueryList", |_| {
        Err(ResearchError::Service("unauthorized".to_string()))
    }));

    let err = orchestrator(completion, &[])
        .invoke("topic", 2, 1, 2, None)
        .await
        .unwrap_err();

    assert!(matches!(err, ResearchError::Service(_)));
}

#[tokio::test]
async fn test_malformed_root_expansion_returns_empty_result() {
    let completion =
        Arc::new(scripted().on("SerpQueryList", |_| Ok(json!({"unexpected": true}))));

    let result = orchestrator(completion.clone(), &[])
        .invoke("topic", 2, 1, 2, None)
        .await
        .unwrap();

    assert!(result.is_empty());
    assert_eq!(completion.calls("Synthesis"), 0);
}

#[tokio::test]
async fn test_zero_breadth_or_concurrency_is_rejected() {
    let completion = Arc::new(scripted());
    let orchestrator = orchestrator(completion.clone(), &[]);

    assert!(matches!(
        orchestrator.invoke("topic", 0, 1, 2, None).await,
        Err(ResearchError::InvalidConfiguration(_))
    ));
    assert!(matches!(
        orchestrator.invoke("topic", 2, 1, 0, None).await,
        Err(ResearchError::InvalidConfiguration(_))
    ));
    assert_eq!(completion.calls("SerpQueryList"), 0);
}

#[tokio::test]
async fn test_duplicate_learnings_collapse_at_join() {
    let completion = Arc::new(scripted().on("Synthesis", |_| {
        Ok(json!({
            "learnings": ["EV sales grew 35% in 2023", "EV sales grew 35% in 2023."],
            "followUpQuestions": []
        }))
    }));

    let result = orchestrator(completion, &[])
        .invoke("topic", 4, 0, 2, None)
        .await
        .unwrap();

    // 完全相同的字符串去重，措辞略有不同的保留
    assert_eq!(result.learnings.len(), 2);
    assert_eq!(result.visited_urls.len(), 4);
}

#[tokio::test]
async fn test_progress_is_monotonic_and_uses_static_total() {
    let completion = Arc::new(scripted());
    let snapshots = RefCell::new(Vec::<ProgressSnapshot>::new());
    let on_progress = |snapshot: ProgressSnapshot| snapshots.borrow_mut().push(snapshot);

    orchestrator(completion, &[])
        .invoke("topic", 4, 2, 3, Some(&on_progress))
        .await
        .unwrap();

    let snapshots = snapshots.into_inner();
    assert_eq!(snapshots.len(), 12);
    assert!(snapshots.iter().all(|s| s.total == 6));
    assert!(
        snapshots
            .windows(2)
            .all(|pair| pair[0].completed <= pair[1].completed)
    );
    assert_eq!(snapshots.last().map(|s| s.completed), Some(12));
}

/// 记录同时处于搜索中的分支数量
struct SlowBackend {
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

#[async_trait]
impl SearchBackend for SlowBackend {
    async fn search(
        &self,
        query: &str,
        _offset: usize,
        _count: usize,
    ) -> Result<Vec<SearchHit>, ResearchError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(vec![SearchHit {
            url: format!("https://slow.example/{}", query),
            ..SearchHit::default()
        }])
    }
}

#[tokio::test]
async fn test_fan_out_respects_concurrency_per_level() {
    let backend = Arc::new(SlowBackend {
        in_flight: AtomicUsize::new(0),
        peak: AtomicUsize::new(0),
    });
    let completion = Arc::new(scripted());

    let result = orchestrator_with(completion, backend.clone())
        .invoke("topic", 4, 0, 2, None)
        .await
        .unwrap();

    assert_eq!(result.visited_urls.len(), 4);
    assert!(backend.peak.load(Ordering::SeqCst) <= 2);
    assert!(backend.peak.load(Ordering::SeqCst) >= 1);
}

#[tokio::test]
async fn test_feedback_uses_clarified_query_for_context() {
    let completion = Arc::new(
        scripted()
            .on("ClarifiedQuery", |_| Ok(json!({"clarified_query": "solid state batteries"})))
            .on("FeedbackQuestions", |_| {
                Ok(json!({"questions": ["Which markets?", "Which time frame?", "Cost or performance?"]}))
            }),
    );
    let gateway = gateway_with(Arc::new(UrlPerQueryBackend { failing: vec![] }));
    let extractor = ContentExtractor::new(completion.clone(), Arc::new(EchoTransport), None);
    let generator = FeedbackGenerator::new(completion.as_ref(), &gateway, &extractor);

    let questions = generator.generate("tell me about SSB").await.unwrap();

    assert_eq!(questions.len(), 3);
    let prompt = &completion.prompts("FeedbackQuestions")[0];
    assert!(prompt.contains("'tell me about SSB'"));
    assert!(prompt.contains("content of https://source.example/solid-state-batteries"));
}

#[tokio::test]
async fn test_feedback_degrades_on_unparsable_responses() {
    let completion = Arc::new(
        scripted()
            .on("ClarifiedQuery", |_| Err(ResearchError::Parse("garbled".to_string())))
            .on("FeedbackQuestions", |_| Ok(json!({"questions": "not a list"}))),
    );
    let gateway = gateway_with(Arc::new(UrlPerQueryBackend {
        failing: vec!["raw topic".to_string()],
    }));
    let extractor = ContentExtractor::new(completion.clone(), Arc::new(EchoTransport), None);
    let generator = FeedbackGenerator::new(completion.as_ref(), &gateway, &extractor);

    let questions = generator.generate("raw topic").await.unwrap();

    assert!(questions.is_empty());
    assert_eq!(completion.calls("PageExtraction"), 0);
}

/// 带标题与摘要的搜索结果
struct SnippetBackend;

#[async_trait]
impl SearchBackend for SnippetBackend {
    async fn search(
        &self,
        _query: &str,
        _offset: usize,
        _count: usize,
    ) -> Result<Vec<SearchHit>, ResearchError> {
        Ok(vec![
            SearchHit {
                url: "https://paywalled.example/ssb".to_string(),
                title: "Solid-state battery outlook".to_string(),
                description: "Pilot lines ramp up in 2027.".to_string(),
            },
            SearchHit {
                url: "https://bare.example/ssb".to_string(),
                ..SearchHit::default()
            },
        ])
    }
}

/// 总是抓取失败的传输
struct DownTransport;

#[async_trait]
impl crate::scrape::PageTransport for DownTransport {
    fn name(&self) -> &'static str {
        "down"
    }

    async fn fetch(&self, url: &str) -> Result<String, ResearchError> {
        Err(ResearchError::TransientFetch {
            url: url.to_string(),
            message: "connection refused".to_string(),
        })
    }
}

#[tokio::test]
async fn test_feedback_falls_back_to_search_snippets() {
    let completion = Arc::new(
        scripted()
            .on("ClarifiedQuery", |_| Ok(json!({"clarified_query": "solid state batteries"})))
            .on("FeedbackQuestions", |_| Ok(json!({"questions": ["Which markets?"]}))),
    );
    let gateway = gateway_with(Arc::new(SnippetBackend));
    let extractor = ContentExtractor::new(completion.clone(), Arc::new(DownTransport), None);
    let generator = FeedbackGenerator::new(completion.as_ref(), &gateway, &extractor);

    let questions = generator.generate("tell me about SSB").await.unwrap();

    assert_eq!(questions, vec!["Which markets?".to_string()]);
    let prompt = &completion.prompts("FeedbackQuestions")[0];
    assert!(prompt.contains("# Solid-state battery outlook\n\nPilot lines ramp up in 2027."));
    assert!(!prompt.contains("bare.example"));
    assert_eq!(completion.calls("PageExtraction"), 0);
}

#[test]
fn test_combine_query_pairs_questions_with_answers() {
    let combined = combine_query(
        "EV batteries",
        &["Which chemistry?".to_string(), "Which region?".to_string()],
        &["Sodium-ion".to_string()],
    );

    assert_eq!(
        combined,
        "Initial Query: EV batteries\nFollow-up Questions and Answers:\nQ: Which chemistry?\nA: Sodium-ion\nQ: Which region?\nA: "
    );
    assert_eq!(combine_query("EV batteries", &[], &[]), "EV batteries");
}

fn sample_result() -> ResearchResult {
    let mut result = ResearchResult::default();
    result.learnings.insert("CATL announced sodium-ion cells".to_string());
    result.visited_urls.insert("https://a.example".to_string());
    result.visited_urls.insert("https://b.example".to_string());
    result
}

#[tokio::test]
async fn test_report_appends_localized_sources() {
    let completion = Arc::new(
        ScriptedCompletion::new()
            .on("FinalReport", |_| Ok(json!({"reportMarkdown": "# 报告\n\n正文\n"}))),
    );
    let writer = ReportWriter::new(completion.clone(), TargetLanguage::Chinese);

    let report = writer.write("EV batteries", &sample_result()).await.unwrap();

    assert_eq!(
        report,
        "# 报告\n\n正文\n\n## 参考来源\n\n- https://a.example\n- https://b.example\n"
    );
    let prompt = &completion.prompts("FinalReport")[0];
    assert!(prompt.contains("<learning>\nCATL announced sodium-ion cells\n</learning>"));
    assert!(prompt.contains(TargetLanguage::Chinese.report_instruction()));
}

#[tokio::test]
async fn test_report_falls_back_to_learning_list() {
    let completion = Arc::new(
        ScriptedCompletion::new().on("FinalReport", |_| Ok(json!({"markdown": "wrong field"}))),
    );
    let writer = ReportWriter::new(completion, TargetLanguage::English);

    let report = writer.write("EV batteries", &sample_result()).await.unwrap();

    assert!(report.starts_with("- CATL announced sodium-ion cells\n\n## Sources\n\n"));
}

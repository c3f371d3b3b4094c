use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

/// 进度快照
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSnapshot {
    pub completed: usize,
    pub total: usize,
    pub percentage: f64,
    pub elapsed_seconds: f64,
    pub estimated_remaining_seconds: f64,
}

/// 进度跟踪器
///
/// `total`在根调用开始前一次性估算，`completed`在每个分支结束时单调递增，
/// 两者独立计算，不保证最终吻合。`completed`超过`total`时百分比超过100，
/// 剩余时间为负，均不截断。
#[derive(Debug)]
pub struct ProgressTracker {
    total: usize,
    completed: AtomicUsize,
    started_at: Instant,
}

impl ProgressTracker {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            completed: AtomicUsize::new(0),
            started_at: Instant::now(),
        }
    }

    /// 根据广度减半规则估算总工作量：各深度层级的广度之和
    pub fn estimate_total(breadth: usize, depth: usize) -> usize {
        let mut total = 0;
        let mut level_breadth = breadth;
        for _ in 0..depth.max(1) {
            total += level_breadth;
            level_breadth = (level_breadth / 2).max(1);
        }
        total
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    pub fn update(&self, count: usize) {
        self.completed.fetch_add(count, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        self.snapshot_at(self.started_at.elapsed().as_secs_f64())
    }

    fn snapshot_at(&self, elapsed: f64) -> ProgressSnapshot {
        let completed = self.completed();
        let total = self.total;

        let percentage = if total > 0 {
            completed as f64 / total as f64 * 100.0
        } else {
            100.0
        };
        let estimated_remaining_seconds = if total == 0 || completed == 0 {
            0.0
        } else {
            elapsed / completed as f64 * total as f64 - elapsed
        };

        ProgressSnapshot {
            completed,
            total,
            percentage: round2(percentage),
            elapsed_seconds: round2(elapsed),
            estimated_remaining_seconds: round2(estimated_remaining_seconds),
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

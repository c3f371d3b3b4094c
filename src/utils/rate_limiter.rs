use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// 限速器：保证两次放行之间至少间隔`interval`
///
/// 上一次放行的时间戳是唯一被并发调用方共享的状态，由互斥锁保护。
/// 不保证FIFO顺序，只保证间隔。
#[derive(Debug)]
pub struct RateLimiter {
    interval: Duration,
    last_granted: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_granted: Mutex::new(None),
        }
    }

    pub fn from_millis(interval_ms: u64) -> Self {
        Self::new(Duration::from_millis(interval_ms))
    }

    /// 挂起调用方直到距离上一次放行已超过`interval`，然后记录新的放行时间
    pub async fn wait(&self) {
        let mut last_granted = self.last_granted.lock().await;

        if let Some(last) = *last_granted {
            let elapsed = last.elapsed();
            if elapsed < self.interval {
                tokio::time::sleep(self.interval - elapsed).await;
            }
        }

        *last_granted = Some(Instant::now());
    }
}

use std::time::{Duration, Instant};
use tokio::sync::Mutex as TokioMutex;
use tokio::time::sleep;

/// Rolling per-minute request budget shared across concurrent tasks.
///
/// Callers block in `acquire` until a slot frees up rather than receiving an
/// error; the sliding window is rebuilt from timestamps on every call.
#[derive(Debug)]
pub struct SlidingWindowLimiter {
    timestamps: TokioMutex<Vec<Instant>>,
    per_minute: u32,
}

const WINDOW: Duration = Duration::from_secs(60);

impl SlidingWindowLimiter {
    pub fn new(per_minute: u32) -> Self {
        Self {
            timestamps: TokioMutex::new(Vec::new()),
            per_minute,
        }
    }

    /// Wait for a slot, without bound.
    pub async fn acquire(&self) {
        self.acquire_capped(None).await;
    }

    /// Wait for a slot, sleeping at most `cap` when one is given. A capped
    /// caller may proceed before the window has fully reset; the budget is a
    /// throttle, not a hard quota.
    pub async fn acquire_capped(&self, cap: Option<Duration>) {
        let now = Instant::now();
        let mut timestamps = self.timestamps.lock().await;

        timestamps.retain(|&t| now.duration_since(t) < WINDOW);

        if timestamps.len() >= self.per_minute as usize {
            if let Some(&oldest) = timestamps.first() {
                let mut wait = WINDOW.saturating_sub(now.duration_since(oldest));
                if let Some(cap) = cap {
                    wait = wait.min(cap);
                }
                if !wait.is_zero() {
                    // Drop the lock before sleeping so other tasks can check
                    // the window.
                    drop(timestamps);
                    sleep(wait + Duration::from_millis(100)).await;
                    let mut timestamps = self.timestamps.lock().await;
                    timestamps.push(Instant::now());
                    return;
                }
            }
        }

        timestamps.push(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_under_budget_does_not_block() {
        let limiter = SlidingWindowLimiter::new(10);
        let start = Instant::now();
        for _ in 0..5 {
            limiter.acquire().await;
        }
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_capped_wait_is_bounded() {
        let limiter = SlidingWindowLimiter::new(1);
        limiter.acquire().await;

        let start = Instant::now();
        limiter
            .acquire_capped(Some(Duration::from_millis(200)))
            .await;
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(200));
        assert!(elapsed < Duration::from_secs(5));
    }
}

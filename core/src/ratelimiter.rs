use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::Semaphore;

/// Token bucket used to pace check launches. Refilled by a background task
/// that exits once the last clone of the limiter is dropped.
#[derive(Clone)]
pub struct RateLimiter {
    sem: Arc<Semaphore>,
}

impl RateLimiter {
    /// Must be called from inside a tokio runtime.
    pub fn new(tokens_per_sec: u32) -> Self {
        let per_sec = tokens_per_sec.max(1);
        let burst = per_sec as usize;
        let sem = Arc::new(Semaphore::new(1));
        let weak: Weak<Semaphore> = Arc::downgrade(&sem);
        // rates above 1M/s floor at one refill per microsecond
        let interval = Duration::from_micros((1_000_000 / per_sec as u64).max(1));
        tokio::spawn(async move {
            let mut t = tokio::time::interval(interval);
            t.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            t.tick().await;
            loop {
                t.tick().await;
                let Some(sem) = weak.upgrade() else { break };
                if sem.available_permits() < burst {
                    sem.add_permits(1);
                }
            }
        });
        RateLimiter { sem }
    }

    /// Waits for one token and consumes it.
    pub async fn acquire(&self) {
        if let Ok(permit) = self.sem.acquire().await {
            permit.forget();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn tokens_are_consumed_not_returned() {
        let rl = RateLimiter::new(20);
        let start = Instant::now();
        for _ in 0..4 {
            rl.acquire().await;
        }
        // one token up front, three refills at 50ms each
        assert!(start.elapsed() >= Duration::from_millis(120));
    }

    #[tokio::test]
    async fn rates_beyond_a_million_still_refill() {
        let rl = RateLimiter::new(2_000_000);
        let drained = tokio::time::timeout(Duration::from_secs(1), async {
            for _ in 0..5 {
                rl.acquire().await;
            }
        })
        .await;
        assert!(drained.is_ok());
    }
}

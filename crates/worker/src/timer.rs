use std::time::Duration;

use async_trait::async_trait;
use mlip_core::PollTimer;

/// 基于 tokio 定时器的轮询等待
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioTimer;

#[async_trait]
impl PollTimer for TokioTimer {
    async fn wait(&self, interval: Duration) {
        tokio::time::sleep(interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_wait_advances_virtual_clock() {
        let start = tokio::time::Instant::now();
        TokioTimer.wait(Duration::from_secs(30)).await;
        assert!(start.elapsed() >= Duration::from_secs(30));
    }
}

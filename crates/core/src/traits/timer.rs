use std::time::Duration;

use async_trait::async_trait;

/// 作业池两次轮询之间的等待
#[async_trait]
pub trait PollTimer: Send + Sync {
    async fn wait(&self, interval: Duration);
}

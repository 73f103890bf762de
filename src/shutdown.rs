use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use mlip_core::PoolCancellation;
use tracing::{debug, info};

/// 优雅关闭管理器
///
/// 关闭后作业池在下一次轮询前停止等待。已提交给集群的作业不会被终止。
#[derive(Debug, Clone)]
pub struct ShutdownManager {
    /// 是否已经关闭，所有克隆共享
    is_shutdown: Arc<AtomicBool>,
}

impl ShutdownManager {
    pub fn new() -> Self {
        Self {
            is_shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// 触发关闭，重复调用无副作用
    pub fn shutdown(&self) {
        if self.is_shutdown.swap(true, Ordering::SeqCst) {
            debug!("关闭管理器已经触发过关闭");
            return;
        }

        info!("触发系统关闭，等待作业池停止轮询 (已提交的作业继续在集群上运行)");
    }

    pub fn is_shutdown(&self) -> bool {
        self.is_shutdown.load(Ordering::SeqCst)
    }
}

impl Default for ShutdownManager {
    fn default() -> Self {
        Self::new()
    }
}

impl PoolCancellation for ShutdownManager {
    fn is_cancelled(&self) -> bool {
        self.is_shutdown()
    }
}

/// 等待 Ctrl+C 或 SIGTERM
pub async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("安装Ctrl+C信号处理器失败: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("安装SIGTERM信号处理器失败: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("收到Ctrl+C信号");
        },
        _ = terminate => {
            info!("收到SIGTERM信号");
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shutdown_cancels_the_pool() {
        let manager = ShutdownManager::new();
        assert!(!manager.is_cancelled());

        manager.shutdown();

        assert!(manager.is_shutdown());
        assert!(manager.is_cancelled());
    }

    #[test]
    fn test_shutdown_is_idempotent_across_clones() {
        let manager = ShutdownManager::new();
        let clone = manager.clone();

        clone.shutdown();
        clone.shutdown();

        assert!(manager.is_cancelled());
        assert!(!ShutdownManager::default().is_shutdown());
    }
}

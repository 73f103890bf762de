use std::sync::Arc;

use anyhow::{Context, Result};
use mlip_config::AppConfig;
use mlip_core::{JobSubmitter, PollTimer};
use mlip_dispatcher::{IterationController, RunInputs, RunOutcome, StageRunner};
use mlip_worker::WorkerPool;
use tracing::info;

use crate::shutdown::ShutdownManager;

/// 主应用程序
///
/// 负责组装作业池、阶段执行器与迭代控制器。提交器和轮询定时器默认来自配置，
/// 可以替换为其他实现（例如测试中的脚本化集群）。
pub struct Application {
    config: Arc<AppConfig>,
    shutdown: ShutdownManager,
    submitter: Option<Arc<dyn JobSubmitter>>,
    timer: Option<Arc<dyn PollTimer>>,
}

impl Application {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config: Arc::new(config),
            shutdown: ShutdownManager::new(),
            submitter: None,
            timer: None,
        }
    }

    pub fn with_submitter(mut self, submitter: Arc<dyn JobSubmitter>) -> Self {
        self.submitter = Some(submitter);
        self
    }

    pub fn with_timer(mut self, timer: Arc<dyn PollTimer>) -> Self {
        self.timer = Some(timer);
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// 触发后作业池停止等待，运行以取消错误结束
    pub fn shutdown_manager(&self) -> ShutdownManager {
        self.shutdown.clone()
    }

    pub async fn run(&self) -> Result<RunOutcome> {
        let config = &self.config;
        let work_dir = &config.run.work_dir;
        if !work_dir.is_dir() {
            anyhow::bail!("工作目录不存在: {}", work_dir.display());
        }
        info!("工作目录: {}", work_dir.display());
        info!(
            "作业池: capacity={}, poll_interval={}s, submit_command='{}'",
            config.pool.capacity, config.pool.poll_interval_seconds, config.pool.submit_command
        );

        let mut builder = WorkerPool::from_config(&config.pool)
            .cancellation(Arc::new(self.shutdown.clone()));
        if let Some(submitter) = &self.submitter {
            builder = builder.submitter(Arc::clone(submitter));
        }
        if let Some(timer) = &self.timer {
            builder = builder.timer(Arc::clone(timer));
        }
        let pool = builder.build().context("创建作业池失败")?;

        let inputs = RunInputs::load(config, pool.io().as_ref())
            .await
            .context("加载输入载荷失败")?;

        let runner = StageRunner::new(Arc::clone(config), Arc::new(inputs), pool);
        let mut controller = IterationController::new(Arc::clone(config), runner);
        let outcome = controller.run().await.context("主动学习运行失败")?;

        match outcome {
            RunOutcome::Converged { iterations } => {
                info!("主动学习在 {iterations} 轮迭代后收敛");
            }
            RunOutcome::IterationLimit { iterations } => {
                info!("达到迭代上限，共运行 {iterations} 轮，未收敛");
            }
        }
        Ok(outcome)
    }
}

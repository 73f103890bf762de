use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use metrics::{counter, gauge};
use mlip_config::PoolConfig;
use mlip_core::{
    CompletionSignal, JobSubmitter, NeverCancel, PollTimer, PoolCancellation, StructureIo,
    XyzStructureIo,
};
use mlip_errors::{MlipError, MlipResult};
use tracing::{debug, info, warn};

use crate::{CommandSubmitter, SentinelFile, Task, TokioTimer};

/// 作业池运行结束的方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolOutcome {
    /// 所有任务都已 Finished
    Completed,
    /// 取消钩子触发，仍有任务在运行或排队
    Cancelled,
}

/// 一次运行的统计
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolReport {
    /// 至少提交了一个任务的轮次数
    pub submission_rounds: usize,
    pub sleeps: usize,
    pub max_in_flight: usize,
    pub submitted: usize,
    pub launch_failures: usize,
}

#[derive(Debug)]
pub struct PoolRun {
    /// 按提交顺序（即输入顺序）排列的任务
    pub tasks: Vec<Task>,
    pub report: PoolReport,
    pub outcome: PoolOutcome,
}

impl PoolRun {
    pub fn is_completed(&self) -> bool {
        self.outcome == PoolOutcome::Completed
    }
}

/// 有界并发的作业池
///
/// 维护 FIFO 的待提交队列和容量有限的运行集合，反复执行：
/// 轮询运行中的任务，填满空位，两者都为空时返回，否则等待一个轮询间隔。
/// 作业池本身不会失败，单个任务的准备或提交失败会记录在任务上。
pub struct WorkerPool {
    capacity: usize,
    poll_interval: Duration,
    script_name: String,
    submitter: Arc<dyn JobSubmitter>,
    signal: Arc<dyn CompletionSignal>,
    io: Arc<dyn StructureIo>,
    timer: Arc<dyn PollTimer>,
    cancellation: Arc<dyn PoolCancellation>,
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("capacity", &self.capacity)
            .field("poll_interval", &self.poll_interval)
            .field("script_name", &self.script_name)
            .field("submitter", &self.submitter.name())
            .finish()
    }
}

impl WorkerPool {
    pub fn builder(capacity: usize, poll_interval: Duration) -> WorkerPoolBuilder {
        WorkerPoolBuilder::new(capacity, poll_interval)
    }

    /// 按配置创建：命令提交器、完成标记文件、tokio 定时器
    pub fn from_config(config: &PoolConfig) -> WorkerPoolBuilder {
        Self::builder(config.capacity, config.poll_interval())
            .submitter(Arc::new(CommandSubmitter::from_config(config)))
            .signal(Arc::new(SentinelFile::new(config.sentinel_name.clone())))
            .script_name(config.script_name.clone())
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn io(&self) -> Arc<dyn StructureIo> {
        Arc::clone(&self.io)
    }

    /// 运行一批任务，直到全部结束或取消钩子触发
    pub async fn run(&self, mut tasks: Vec<Task>) -> PoolRun {
        let mut report = PoolReport::default();
        let mut pending: VecDeque<usize> = (0..tasks.len()).collect();
        let mut in_flight: Vec<usize> = Vec::with_capacity(self.capacity);

        if let Some(first) = tasks.first() {
            info!(
                "作业池开始运行: kind={}, tasks={}, capacity={}, poll_interval={:?}",
                first.kind(),
                tasks.len(),
                self.capacity,
                self.poll_interval
            );
        }

        loop {
            if self.cancellation.is_cancelled() {
                warn!(
                    "作业池已取消: 运行中 {} 个, 排队 {} 个 (外部作业不会被终止)",
                    in_flight.len(),
                    pending.len()
                );
                gauge!("mlip_pool_in_flight").set(0.0);
                return PoolRun {
                    tasks,
                    report,
                    outcome: PoolOutcome::Cancelled,
                };
            }

            // 1. 轮询运行中的任务
            let mut still_running = Vec::with_capacity(in_flight.len());
            for index in in_flight.drain(..) {
                let task = &mut tasks[index];
                if task.poll(self.signal.as_ref()).await {
                    counter!("mlip_pool_tasks_finished_total", "kind" => task.kind().as_str())
                        .increment(1);
                    debug!("任务已结束: {}", task.id());
                } else {
                    still_running.push(index);
                }
            }
            in_flight = still_running;

            // 2. 按 FIFO 顺序填满空位
            let mut dequeued = 0;
            while in_flight.len() < self.capacity {
                let Some(index) = pending.pop_front() else {
                    break;
                };
                dequeued += 1;
                let task = &mut tasks[index];
                match self.launch(task).await {
                    Ok(()) => {
                        report.submitted += 1;
                        counter!("mlip_pool_tasks_submitted_total", "kind" => task.kind().as_str())
                            .increment(1);
                        in_flight.push(index);
                    }
                    Err(e) => {
                        warn!("任务启动失败，标记为结束: task={}, error={e}", task.id());
                        report.launch_failures += 1;
                        counter!("mlip_pool_launch_failures_total", "kind" => task.kind().as_str())
                            .increment(1);
                        task.mark_launch_failed(e.to_string());
                    }
                }
            }
            if dequeued > 0 {
                report.submission_rounds += 1;
            }
            report.max_in_flight = report.max_in_flight.max(in_flight.len());
            gauge!("mlip_pool_in_flight").set(in_flight.len() as f64);

            // 3. 全部结束则返回，否则等待
            if pending.is_empty() && in_flight.is_empty() {
                break;
            }
            debug!(
                "等待 {:?}: 运行中 {} 个, 排队 {} 个",
                self.poll_interval,
                in_flight.len(),
                pending.len()
            );
            self.timer.wait(self.poll_interval).await;
            report.sleeps += 1;
        }

        if !tasks.is_empty() {
            info!(
                "作业池运行完成: tasks={}, rounds={}, sleeps={}, launch_failures={}",
                tasks.len(),
                report.submission_rounds,
                report.sleeps,
                report.launch_failures
            );
        }
        PoolRun {
            tasks,
            report,
            outcome: PoolOutcome::Completed,
        }
    }

    async fn launch(&self, task: &mut Task) -> MlipResult<()> {
        task.prepare(self.io.as_ref()).await?;
        task.submit(
            self.submitter.as_ref(),
            self.signal.as_ref(),
            &self.script_name,
        )
        .await
    }
}

pub struct WorkerPoolBuilder {
    capacity: usize,
    poll_interval: Duration,
    script_name: String,
    submitter: Option<Arc<dyn JobSubmitter>>,
    signal: Arc<dyn CompletionSignal>,
    io: Arc<dyn StructureIo>,
    timer: Arc<dyn PollTimer>,
    cancellation: Arc<dyn PoolCancellation>,
}

impl WorkerPoolBuilder {
    fn new(capacity: usize, poll_interval: Duration) -> Self {
        Self {
            capacity,
            poll_interval,
            script_name: "job.sh".to_string(),
            submitter: None,
            signal: Arc::new(SentinelFile::default()),
            io: Arc::new(XyzStructureIo::new()),
            timer: Arc::new(TokioTimer),
            cancellation: Arc::new(NeverCancel),
        }
    }

    pub fn submitter(mut self, submitter: Arc<dyn JobSubmitter>) -> Self {
        self.submitter = Some(submitter);
        self
    }

    pub fn signal(mut self, signal: Arc<dyn CompletionSignal>) -> Self {
        self.signal = signal;
        self
    }

    pub fn structure_io(mut self, io: Arc<dyn StructureIo>) -> Self {
        self.io = io;
        self
    }

    pub fn timer(mut self, timer: Arc<dyn PollTimer>) -> Self {
        self.timer = timer;
        self
    }

    pub fn cancellation(mut self, cancellation: Arc<dyn PoolCancellation>) -> Self {
        self.cancellation = cancellation;
        self
    }

    pub fn script_name<S: Into<String>>(mut self, name: S) -> Self {
        self.script_name = name.into();
        self
    }

    pub fn build(self) -> MlipResult<WorkerPool> {
        if self.capacity == 0 {
            return Err(MlipError::config_error("作业池容量必须至少为 1"));
        }
        if !mlip_core::is_plain_file_name(&self.script_name) {
            return Err(MlipError::config_error(format!(
                "作业脚本文件名不合法: '{}'",
                self.script_name
            )));
        }
        let submitter = self
            .submitter
            .ok_or_else(|| MlipError::config_error("作业池缺少作业提交器"))?;
        Ok(WorkerPool {
            capacity: self.capacity,
            poll_interval: self.poll_interval,
            script_name: self.script_name,
            submitter,
            signal: self.signal,
            io: self.io,
            timer: self.timer,
            cancellation: self.cancellation,
        })
    }
}

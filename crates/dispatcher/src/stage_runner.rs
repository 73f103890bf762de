use std::path::{Path, PathBuf};
use std::sync::Arc;

use metrics::counter;
use mlip_config::AppConfig;
use mlip_core::{Stage, StagedFile, Structure, StructureIo, TaskOutput, TaskPayload};
use mlip_errors::{MlipError, MlipResult};
use mlip_worker::{Task, WorkerPool};
use tokio::fs;
use tracing::{info, warn};

use crate::inputs::{RunInputs, StageInputs};

/// 标注任务工作目录中的待计算构型文件名
pub const LABELING_STRUCTURE_FILE: &str = "structure.xyz";

/// 一个阶段回收的结果
#[derive(Debug, Clone, Default)]
pub struct StageOutcome {
    /// 成功回收的结果，按任务提交顺序排列
    pub outputs: Vec<TaskOutput>,
    /// 被记录并跳过的任务级失败数
    pub failures: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExplorationSummary {
    pub flagged: usize,
    /// 本轮探索的累积文件，未标记任何构型时可能不存在
    pub flagged_path: PathBuf,
}

/// 单个阶段的编排：创建阶段目录，暂存上游产出，构建任务批次，
/// 交给作业池执行并回收结果
pub struct StageRunner {
    config: Arc<AppConfig>,
    inputs: Arc<RunInputs>,
    pool: WorkerPool,
    io: Arc<dyn StructureIo>,
}

impl StageRunner {
    pub fn new(config: Arc<AppConfig>, inputs: Arc<RunInputs>, pool: WorkerPool) -> Self {
        let io = pool.io();
        Self {
            config,
            inputs,
            pool,
            io,
        }
    }

    pub fn io(&self) -> Arc<dyn StructureIo> {
        Arc::clone(&self.io)
    }

    /// 参考计算：每个构型一个任务，返回成功标注的构型
    pub async fn label(
        &self,
        iteration_dir: &Path,
        structures: &[Structure],
    ) -> MlipResult<Vec<Structure>> {
        let stage = Stage::Labeling;
        if structures.is_empty() {
            return Err(MlipError::missing_stage_input(stage.as_str(), "待标注构型"));
        }
        let stage_dir = create_stage_dir(iteration_dir, stage).await?;
        let stage_inputs = &self.inputs.labeling;

        let tasks = structures
            .iter()
            .map(|structure| {
                self.build_task(
                    TaskPayload::Labeling {
                        structure: structure.clone(),
                        structure_file: LABELING_STRUCTURE_FILE.to_string(),
                        output: self.config.stages.labeling.output_artifact.clone(),
                    },
                    stage_inputs,
                    &stage_dir,
                )
            })
            .collect::<MlipResult<Vec<_>>>()?;

        let outcome = self.execute(stage, tasks).await?;
        Ok(outcome
            .outputs
            .into_iter()
            .flat_map(|output| match output {
                TaskOutput::Labeled { structures } => structures,
                _ => Vec::new(),
            })
            .collect())
    }

    /// 势函数训练，返回阶段目录内的势函数文件
    pub async fn train(&self, iteration_dir: &Path, dataset: &Path) -> MlipResult<PathBuf> {
        let stage = Stage::Training;
        let stage_dir = create_stage_dir(iteration_dir, stage).await?;
        let dataset = self
            .stage_in(stage, &stage_dir, dataset, &self.config.run.dataset_file)
            .await?;

        let task = self.build_task(
            TaskPayload::Training {
                dataset,
                output: self.config.stages.training.output_artifact.clone(),
            },
            &self.inputs.training,
            &stage_dir,
        )?;

        let outcome = self.execute(stage, vec![task]).await?;
        single_path(stage, outcome)
    }

    /// 活跃集选择，返回外推判据描述文件
    pub async fn select_active_set(
        &self,
        iteration_dir: &Path,
        potential: &Path,
        dataset: &Path,
    ) -> MlipResult<PathBuf> {
        let stage = Stage::ActiveSetSelection;
        let stage_dir = create_stage_dir(iteration_dir, stage).await?;
        let run = &self.config.run;
        let potential = self
            .stage_in(stage, &stage_dir, potential, &run.potential_file)
            .await?;
        let dataset = self.stage_in(stage, &stage_dir, dataset, &run.dataset_file).await?;

        let task = self.build_task(
            TaskPayload::ActiveSetSelection {
                potential,
                dataset,
                output: self.config.stages.active_set.output_artifact.clone(),
            },
            &self.inputs.active_set,
            &stage_dir,
        )?;

        let outcome = self.execute(stage, vec![task]).await?;
        single_path(stage, outcome)
    }

    /// 分子动力学探索：每个动力学参数文件一个任务，初始构型循环分配。
    /// 被标记的构型追加到阶段目录下的累积文件。
    pub async fn explore(
        &self,
        iteration_dir: &Path,
        potential: &Path,
        active_set: &Path,
    ) -> MlipResult<ExplorationSummary> {
        let stage = Stage::Exploring;
        let parameters = &self.inputs.exploration_parameters;
        let seeds = &self.inputs.seed_structures;
        if parameters.is_empty() {
            return Err(MlipError::missing_stage_input(
                stage.as_str(),
                "动力学参数文件",
            ));
        }
        if seeds.is_empty() {
            return Err(MlipError::missing_stage_input(stage.as_str(), "初始构型"));
        }

        let stage_dir = create_stage_dir(iteration_dir, stage).await?;
        let run = &self.config.run;
        let potential = self
            .stage_in(stage, &stage_dir, potential, &run.potential_file)
            .await?;
        let active_set = self
            .stage_in(stage, &stage_dir, active_set, &run.active_set_file)
            .await?;
        let flagged_path = stage_dir.join(&run.flagged_file);
        let exploration = &self.config.exploration;

        let tasks = parameters
            .iter()
            .zip(seeds.iter().cycle())
            .map(|((name, content), seed)| {
                info!("探索任务: 参数文件 {name}");
                self.build_task(
                    TaskPayload::Exploration {
                        potential: potential.clone(),
                        active_set: active_set.clone(),
                        parameters: content.clone(),
                        parameter_file: exploration.parameter_file_name.clone(),
                        seed: seed.clone(),
                        seed_file: exploration.seed_file_name.clone(),
                        flagged_sink: flagged_path.clone(),
                        output: self.config.stages.exploration.output_artifact.clone(),
                    },
                    &self.inputs.exploration,
                    &stage_dir,
                )
            })
            .collect::<MlipResult<Vec<_>>>()?;

        let outcome = self.execute(stage, tasks).await?;
        let flagged: usize = outcome
            .outputs
            .iter()
            .map(|output| match output {
                TaskOutput::Flagged { count } => *count,
                _ => 0,
            })
            .sum();

        info!("探索共标记 {flagged} 个构型: {}", flagged_path.display());
        Ok(ExplorationSummary {
            flagged,
            flagged_path,
        })
    }

    /// 从被标记的构型中筛选下一轮的候选构型
    pub async fn select_structures(
        &self,
        iteration_dir: &Path,
        potential: &Path,
        dataset: &Path,
        flagged: &Path,
    ) -> MlipResult<Vec<Structure>> {
        let stage = Stage::StructureSelection;
        let stage_dir = create_stage_dir(iteration_dir, stage).await?;
        let run = &self.config.run;
        let potential = self
            .stage_in(stage, &stage_dir, potential, &run.potential_file)
            .await?;
        let dataset = self.stage_in(stage, &stage_dir, dataset, &run.dataset_file).await?;
        let candidates = self
            .stage_in(stage, &stage_dir, flagged, &run.flagged_file)
            .await?;

        let task = self.build_task(
            TaskPayload::StructureSelection {
                potential,
                dataset,
                candidates,
                output: self.config.stages.selection.output_artifact.clone(),
            },
            &self.inputs.selection,
            &stage_dir,
        )?;

        let outcome = self.execute(stage, vec![task]).await?;
        match outcome.outputs.into_iter().next() {
            Some(TaskOutput::Selected { structures }) => Ok(structures),
            _ => Err(MlipError::stage_exhausted(
                stage.as_str(),
                "结构筛选任务没有可用产出",
            )),
        }
    }

    fn build_task(
        &self,
        payload: TaskPayload,
        stage_inputs: &StageInputs,
        stage_dir: &Path,
    ) -> MlipResult<Task> {
        Task::new(payload, stage_inputs.job_template.clone(), stage_dir)?
            .with_inputs(stage_inputs.files.clone())
    }

    /// 把上游产出复制进阶段目录；缺失即为致命错误
    async fn stage_in(
        &self,
        stage: Stage,
        stage_dir: &Path,
        source: &Path,
        name: &str,
    ) -> MlipResult<StagedFile> {
        let present = fs::metadata(source)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false);
        if !present {
            return Err(MlipError::missing_stage_input(
                stage.as_str(),
                source.display().to_string(),
            ));
        }
        let target = stage_dir.join(name);
        fs::copy(source, &target)
            .await
            .map_err(|e| MlipError::io(&target, e))?;
        Ok(StagedFile::new(name, target))
    }

    /// 执行任务批次并按提交顺序回收；任务级失败记录后跳过
    async fn execute(&self, stage: Stage, tasks: Vec<Task>) -> MlipResult<StageOutcome> {
        info!("阶段 {stage} 开始: {} 个任务", tasks.len());
        let mut run = self.pool.run(tasks).await;
        if !run.is_completed() {
            return Err(MlipError::Cancelled);
        }

        let mut outcome = StageOutcome::default();
        for task in run.tasks.iter_mut() {
            match task.harvest(self.io.as_ref()).await {
                Ok(output) => {
                    counter!("mlip_stage_harvested_total", "stage" => stage.as_str()).increment(1);
                    outcome.outputs.push(output);
                }
                Err(e) if e.is_task_level() => {
                    warn!("阶段 {stage} 任务失败，已跳过: task={}, error={e}", task.id());
                    counter!("mlip_stage_failed_total", "stage" => stage.as_str()).increment(1);
                    outcome.failures += 1;
                }
                Err(e) => return Err(e),
            }
        }

        info!(
            "阶段 {stage} 完成: 成功 {} 个, 失败 {} 个",
            outcome.outputs.len(),
            outcome.failures
        );
        Ok(outcome)
    }
}

async fn create_stage_dir(iteration_dir: &Path, stage: Stage) -> MlipResult<PathBuf> {
    let name = stage
        .dir_name()
        .ok_or_else(|| MlipError::Internal(format!("终止状态 {stage} 没有阶段目录")))?;
    let dir = iteration_dir.join(name);
    fs::create_dir_all(&dir)
        .await
        .map_err(|e| MlipError::io(&dir, e))?;
    Ok(dir)
}

fn single_path(stage: Stage, outcome: StageOutcome) -> MlipResult<PathBuf> {
    match outcome.outputs.into_iter().next() {
        Some(TaskOutput::Potential { path }) | Some(TaskOutput::ActiveSet { path }) => Ok(path),
        _ => Err(MlipError::stage_exhausted(stage.as_str(), "任务没有产出必需的文件")),
    }
}

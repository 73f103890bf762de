use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use mlip_config::AppConfig;
use mlip_core::{IterationState, Stage, Structure, StructureIo};
use mlip_errors::{MlipError, MlipResult};
use tokio::fs;
use tracing::{error, info};

use crate::dataset::CumulativeDataset;
use crate::selection::cap_candidates;
use crate::stage_runner::StageRunner;

/// 运行的正常结束方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// 某轮探索没有标记任何构型
    Converged { iterations: usize },
    /// 达到迭代次数上限
    IterationLimit { iterations: usize },
}

/// 主动学习迭代控制器
///
/// 状态机：
///
/// ```text
/// Labeling -> Training -> ActiveSetSelection -> Exploring -+-> Converged
///    ^                                                     |
///    +---------------- StructureSelection <----------------+
/// ```
///
/// 任何致命错误进入 Failed。每次状态转换后把 [`IterationState`] 写入检查点文件。
pub struct IterationController {
    config: Arc<AppConfig>,
    runner: StageRunner,
    dataset: CumulativeDataset,
    io: Arc<dyn StructureIo>,
    state: IterationState,
}

impl IterationController {
    pub fn new(config: Arc<AppConfig>, runner: StageRunner) -> Self {
        let io = runner.io();
        let dataset = CumulativeDataset::new(config.run.dataset_path(), Arc::clone(&io));
        Self {
            config,
            runner,
            dataset,
            io,
            state: IterationState::initial(),
        }
    }

    pub fn state(&self) -> &IterationState {
        &self.state
    }

    pub fn dataset(&self) -> &CumulativeDataset {
        &self.dataset
    }

    /// 运行直到收敛、达到迭代上限或遇到致命错误
    pub async fn run(&mut self) -> MlipResult<RunOutcome> {
        match self.run_iterations().await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                error!(
                    "第 {} 轮 {} 阶段失败，运行终止: {e}",
                    self.state.iteration, self.state.stage
                );
                self.state = self.state.clone().fail(e.to_string());
                if let Err(checkpoint_error) = self.checkpoint().await {
                    error!("写入失败状态检查点失败: {checkpoint_error}");
                }
                Err(e)
            }
        }
    }

    async fn run_iterations(&mut self) -> MlipResult<RunOutcome> {
        loop {
            let iteration = self.state.iteration;
            if iteration >= self.config.run.max_iterations {
                info!("达到迭代次数上限 {}，停止运行", self.config.run.max_iterations);
                self.checkpoint().await?;
                return Ok(RunOutcome::IterationLimit {
                    iterations: iteration,
                });
            }

            let started = Instant::now();
            info!("==================== 第 {iteration} 轮迭代开始 ====================");
            let converged = self.run_iteration(iteration).await?;
            let minutes = started.elapsed().as_secs() / 60;
            info!("============ 第 {iteration} 轮迭代完成，耗时 {minutes} 分钟 ============");

            if converged {
                info!("探索没有发现新的外推构型，主动学习已收敛");
                return Ok(RunOutcome::Converged {
                    iterations: iteration + 1,
                });
            }
        }
    }

    /// 执行一轮迭代，收敛时返回 `true`
    async fn run_iteration(&mut self, iteration: usize) -> MlipResult<bool> {
        let iteration_dir = self.config.run.iteration_dir(iteration);
        fs::create_dir(&iteration_dir)
            .await
            .map_err(|e| MlipError::io(&iteration_dir, e))?;
        self.checkpoint().await?;

        // 标注
        if let Some(structures) = self.labeling_input(iteration).await? {
            info!("开始标注 {} 个构型", structures.len());
            let labeled = self.runner.label(&iteration_dir, &structures).await?;
            if labeled.is_empty() {
                return Err(MlipError::stage_exhausted(
                    Stage::Labeling.as_str(),
                    format!("{} 个构型全部标注失败", structures.len()),
                ));
            }
            let labeled_path = iteration_dir.join(&self.config.run.labeled_file);
            self.io.write(&labeled_path, &labeled).await?;
            self.dataset.append(&labeled).await?;
        }
        self.transition(Stage::Training).await?;

        // 训练
        let potential = self.config.run.potential_path();
        if iteration == 0 && is_file(&potential).await {
            info!("已存在势函数 {}，跳过第 0 轮训练", potential.display());
        } else {
            let trained = self.runner.train(&iteration_dir, self.dataset.path()).await?;
            persist(&trained, &potential).await?;
            persist(&trained, &iteration_dir.join(&self.config.run.potential_file)).await?;
        }
        self.transition(Stage::ActiveSetSelection).await?;

        // 活跃集选择
        let active_set = self.config.run.active_set_path();
        let selected = self
            .runner
            .select_active_set(&iteration_dir, &potential, self.dataset.path())
            .await?;
        persist(&selected, &active_set).await?;
        persist(&selected, &iteration_dir.join(&self.config.run.active_set_file)).await?;
        self.transition(Stage::Exploring).await?;

        // 探索
        let exploration = self
            .runner
            .explore(&iteration_dir, &potential, &active_set)
            .await?;
        if exploration.flagged == 0 {
            self.state = self.state.clone().converge();
            self.checkpoint().await?;
            return Ok(true);
        }
        self.transition(Stage::StructureSelection).await?;

        // 结构筛选
        let accepted = self
            .runner
            .select_structures(
                &iteration_dir,
                &potential,
                self.dataset.path(),
                &exploration.flagged_path,
            )
            .await?;
        // 有被标记的构型却一个都没有接受时，下一轮没有可标注的输入
        if accepted.is_empty() {
            return Err(MlipError::stage_exhausted(
                Stage::StructureSelection.as_str(),
                format!("{} 个被标记的构型全部未被接受", exploration.flagged),
            ));
        }
        let candidates = cap_candidates(
            accepted,
            self.config.run.max_structures_per_iteration,
            self.config.run.selection_seed,
        );
        info!("下一轮候选构型: {} 个", candidates.len());
        self.io
            .write(&self.config.run.candidates_path(), &candidates)
            .await?;
        self.io
            .write(&iteration_dir.join(&self.config.run.candidates_file), &candidates)
            .await?;

        self.state = self.state.clone().next_iteration(candidates);
        self.checkpoint().await?;
        Ok(false)
    }

    /// 本轮需要标注的构型；`None` 表示跳过标注
    async fn labeling_input(&self, iteration: usize) -> MlipResult<Option<Vec<Structure>>> {
        if iteration > 0 {
            let candidates = self.config.run.candidates_path();
            if !is_file(&candidates).await {
                return Err(MlipError::missing_stage_input(
                    Stage::Labeling.as_str(),
                    format!("上一轮筛选的候选构型 {}", candidates.display()),
                ));
            }
            return Ok(Some(self.io.read(&candidates).await?));
        }
        if self.dataset.exists().await {
            info!(
                "已存在数据集 {}，跳过第 0 轮标注",
                self.dataset.path().display()
            );
            return Ok(None);
        }
        let initial = self.config.run.initial_structures_path();
        if !is_file(&initial).await {
            return Err(MlipError::missing_stage_input(
                Stage::Labeling.as_str(),
                format!("需要提供初始构型 {}", initial.display()),
            ));
        }
        Ok(Some(self.io.read(&initial).await?))
    }

    async fn transition(&mut self, stage: Stage) -> MlipResult<()> {
        self.state = self.state.clone().advance(stage);
        self.checkpoint().await
    }

    async fn checkpoint(&self) -> MlipResult<()> {
        let path = self.config.run.state_path();
        let json = serde_json::to_string_pretty(&self.state)?;
        fs::write(&path, json)
            .await
            .map_err(|e| MlipError::io(path, e))
    }
}

async fn is_file(path: &Path) -> bool {
    fs::metadata(path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
}

async fn persist(source: &Path, target: &Path) -> MlipResult<()> {
    fs::copy(source, target)
        .await
        .map_err(|e| MlipError::io(target, e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inputs::RunInputs;
    use mlip_core::XyzStructureIo;
    use mlip_testing_utils::{
        structures, write_run_layout, write_structures, CountingTimer, ScriptedSubmitter,
    };
    use mlip_worker::WorkerPool;
    use tempfile::TempDir;

    async fn controller(root: &Path) -> IterationController {
        write_run_layout(root, &["300K.in"]).unwrap();
        let config = Arc::new(AppConfig::default().with_work_dir(root));
        let pool = WorkerPool::builder(1, config.pool.poll_interval())
            .submitter(Arc::new(ScriptedSubmitter::manual()))
            .timer(Arc::new(CountingTimer::new()))
            .build()
            .unwrap();
        let inputs = RunInputs::load(&config, &XyzStructureIo::new())
            .await
            .unwrap();
        let runner = StageRunner::new(Arc::clone(&config), Arc::new(inputs), pool);
        IterationController::new(config, runner)
    }

    #[tokio::test]
    async fn test_later_iterations_label_the_candidate_file() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        let mut controller = controller(root).await;
        controller.state = IterationState::initial().next_iteration(structures(0, 5));
        write_structures(&root.join("to_add.xyz"), &structures(40, 2)).unwrap();

        let input = controller.labeling_input(1).await.unwrap();

        assert_eq!(input, Some(structures(40, 2)));
    }

    #[tokio::test]
    async fn test_missing_candidate_file_is_missing_stage_input() {
        let temp_dir = TempDir::new().unwrap();
        let controller = controller(temp_dir.path()).await;

        let err = controller.labeling_input(1).await.unwrap_err();

        assert!(matches!(err, MlipError::MissingStageInput { ref stage, .. } if stage == "labeling"));
    }

    #[tokio::test]
    async fn test_failed_checkpoint_keeps_the_stage_error() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        let mut controller = controller(root).await;
        // 迭代目录已存在，检查点路径是目录，两处写入都会失败
        std::fs::create_dir(root.join("iter_0")).unwrap();
        std::fs::create_dir(root.join("state.json")).unwrap();

        let err = controller.run().await.unwrap_err();

        assert!(matches!(err, MlipError::Io { ref path, .. } if path.ends_with("iter_0")));
        assert_eq!(controller.state().stage, Stage::Failed);
    }
}

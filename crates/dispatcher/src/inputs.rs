use std::collections::BTreeMap;
use std::path::Path;

use mlip_config::{AppConfig, StageConfig};
use mlip_core::{Structure, StructureIo};
use mlip_errors::{MlipError, MlipResult};
use tokio::fs;
use tracing::{debug, info, warn};

/// 单个阶段的作业模板与写入每个任务工作目录的输入文件
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageInputs {
    pub job_template: String,
    pub files: BTreeMap<String, String>,
}

/// 启动前一次性读取的全部载荷
///
/// 配置中引用的任何文件缺失都在第 0 轮开始前报告为配置错误。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunInputs {
    pub labeling: StageInputs,
    pub training: StageInputs,
    pub active_set: StageInputs,
    pub exploration: StageInputs,
    pub selection: StageInputs,
    /// 动力学参数文件（文件名, 内容），按文件名排序
    pub exploration_parameters: Vec<(String, String)>,
    pub seed_structures: Vec<Structure>,
}

impl RunInputs {
    pub async fn load(config: &AppConfig, io: &dyn StructureIo) -> MlipResult<Self> {
        let stages = &config.stages;
        let inputs = Self {
            labeling: load_stage(config, "labeling", &stages.labeling).await?,
            training: load_stage(config, "training", &stages.training).await?,
            active_set: load_stage(config, "active_set", &stages.active_set).await?,
            exploration: load_stage(config, "exploration", &stages.exploration).await?,
            selection: load_stage(config, "selection", &stages.selection).await?,
            exploration_parameters: load_parameter_dir(
                &config.resolve_path(&config.exploration.inputs_dir),
            )
            .await?,
            seed_structures: load_seeds(config, io).await?,
        };

        info!(
            "输入载荷已加载: 探索参数 {} 个, 初始构型 {} 个",
            inputs.exploration_parameters.len(),
            inputs.seed_structures.len()
        );
        Ok(inputs)
    }
}

async fn load_stage(
    config: &AppConfig,
    stage: &str,
    stage_config: &StageConfig,
) -> MlipResult<StageInputs> {
    let job_template =
        read_required(&config.resolve_path(&stage_config.job_template), stage).await?;
    let mut files = BTreeMap::new();
    for (name, source) in &stage_config.input_files {
        let content = read_required(&config.resolve_path(source), stage).await?;
        files.insert(name.clone(), content);
    }
    debug!("阶段 {stage} 的作业模板与 {} 个输入文件已加载", files.len());
    Ok(StageInputs {
        job_template,
        files,
    })
}

async fn read_required(path: &Path, stage: &str) -> MlipResult<String> {
    fs::read_to_string(path).await.map_err(|e| {
        MlipError::config_error(format!(
            "阶段 {stage} 需要的文件无法读取: {}: {e}",
            path.display()
        ))
    })
}

async fn load_parameter_dir(dir: &Path) -> MlipResult<Vec<(String, String)>> {
    if !fs::try_exists(dir).await.unwrap_or(false) {
        warn!("探索参数目录不存在: {}", dir.display());
        return Ok(Vec::new());
    }

    let mut entries = fs::read_dir(dir)
        .await
        .map_err(|e| MlipError::io(dir, e))?;
    let mut parameters = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| MlipError::io(dir, e))?
    {
        let path = entry.path();
        let is_file = entry
            .file_type()
            .await
            .map_err(|e| MlipError::io(&path, e))?
            .is_file();
        if !is_file {
            continue;
        }
        let content = fs::read_to_string(&path)
            .await
            .map_err(|e| MlipError::io(&path, e))?;
        parameters.push((entry.file_name().to_string_lossy().into_owned(), content));
    }
    parameters.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(parameters)
}

async fn load_seeds(config: &AppConfig, io: &dyn StructureIo) -> MlipResult<Vec<Structure>> {
    let path = config.resolve_path(&config.exploration.seed_structures);
    let seeds = io.read(&path).await.map_err(|e| {
        MlipError::config_error(format!("探索初始构型无法读取: {}: {e}", path.display()))
    })?;
    if seeds.is_empty() {
        return Err(MlipError::config_error(format!(
            "探索初始构型文件为空: {}",
            path.display()
        )));
    }
    Ok(seeds)
}

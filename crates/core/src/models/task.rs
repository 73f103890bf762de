use std::fmt;
use std::path::PathBuf;

use mlip_errors::{MlipError, MlipResult};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Structure;

/// 任务唯一标识
///
/// 基于随机 UUID 生成，任务工作目录名由它派生，因此同一批次内不会冲突。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(Uuid);

impl TaskId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// 任务工作目录名
    pub fn workspace_name(&self) -> String {
        format!("task_{}", self.0)
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.workspace_name())
    }
}

/// 任务种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Labeling,
    Training,
    ActiveSetSelection,
    Exploration,
    StructureSelection,
    Generic,
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::Labeling => "labeling",
            TaskKind::Training => "training",
            TaskKind::ActiveSetSelection => "active_set_selection",
            TaskKind::Exploration => "exploration",
            TaskKind::StructureSelection => "structure_selection",
            TaskKind::Generic => "generic",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 需要复制进任务工作目录的已暂存文件
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagedFile {
    /// 工作目录内的文件名
    pub name: String,
    /// 源文件路径
    pub source: PathBuf,
}

impl StagedFile {
    pub fn new<N: Into<String>, P: Into<PathBuf>>(name: N, source: P) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
        }
    }
}

/// 任务载荷
///
/// 每个变体只携带其 `prepare` / `harvest` 需要的字段，构造后通过 [`TaskPayload::validate`]
/// 检查，而不是在运行时动态拼装。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskPayload {
    /// 参考计算：构型 → 带能量/力的构型
    Labeling {
        structure: Structure,
        structure_file: String,
        output: String,
    },
    /// 势函数训练：数据集 → 势函数文件
    Training { dataset: StagedFile, output: String },
    /// 活跃集选择：势函数 + 数据集 → 外推判据描述文件
    ActiveSetSelection {
        potential: StagedFile,
        dataset: StagedFile,
        output: String,
    },
    /// 分子动力学探索：势函数 + 活跃集 + 动力学参数 + 初始构型 → 被标记的构型，
    /// 追加写入共享的累积文件而不是逐个返回
    Exploration {
        potential: StagedFile,
        active_set: StagedFile,
        parameters: String,
        parameter_file: String,
        seed: Structure,
        seed_file: String,
        flagged_sink: PathBuf,
        output: String,
    },
    /// 结构筛选：势函数 + 数据集 + 候选池 → 接受的子集
    StructureSelection {
        potential: StagedFile,
        dataset: StagedFile,
        candidates: StagedFile,
        output: String,
    },
    /// 通用任务：只运行作业模板，可选地回收一个产出文件
    Generic { output: Option<String> },
}

impl TaskPayload {
    pub fn kind(&self) -> TaskKind {
        match self {
            TaskPayload::Labeling { .. } => TaskKind::Labeling,
            TaskPayload::Training { .. } => TaskKind::Training,
            TaskPayload::ActiveSetSelection { .. } => TaskKind::ActiveSetSelection,
            TaskPayload::Exploration { .. } => TaskKind::Exploration,
            TaskPayload::StructureSelection { .. } => TaskKind::StructureSelection,
            TaskPayload::Generic { .. } => TaskKind::Generic,
        }
    }

    /// 期望在工作目录中出现的产出文件名
    pub fn output_artifact(&self) -> Option<&str> {
        match self {
            TaskPayload::Labeling { output, .. }
            | TaskPayload::Training { output, .. }
            | TaskPayload::ActiveSetSelection { output, .. }
            | TaskPayload::Exploration { output, .. }
            | TaskPayload::StructureSelection { output, .. } => Some(output),
            TaskPayload::Generic { output } => output.as_deref(),
        }
    }

    /// 复制进工作目录的文件
    pub fn staged_files(&self) -> Vec<&StagedFile> {
        match self {
            TaskPayload::Training { dataset, .. } => vec![dataset],
            TaskPayload::ActiveSetSelection {
                potential, dataset, ..
            } => vec![potential, dataset],
            TaskPayload::Exploration {
                potential,
                active_set,
                ..
            } => vec![potential, active_set],
            TaskPayload::StructureSelection {
                potential,
                dataset,
                candidates,
                ..
            } => vec![potential, dataset, candidates],
            _ => Vec::new(),
        }
    }

    pub fn validate(&self) -> MlipResult<()> {
        let mut names: Vec<&str> = self.staged_files().iter().map(|f| f.name.as_str()).collect();
        match self {
            TaskPayload::Labeling {
                structure,
                structure_file,
                ..
            } => {
                if structure.atom_count().is_none() {
                    return Err(MlipError::Structure(
                        "标注任务的构型缺少原子数行".to_string(),
                    ));
                }
                names.push(structure_file);
            }
            TaskPayload::Exploration {
                parameters,
                parameter_file,
                seed_file,
                ..
            } => {
                if parameters.trim().is_empty() {
                    return Err(MlipError::config_error("探索任务的动力学参数为空"));
                }
                names.push(parameter_file);
                names.push(seed_file);
            }
            _ => {}
        }
        if let Some(output) = self.output_artifact() {
            names.push(output);
        }

        for name in &names {
            if !is_plain_file_name(name) {
                return Err(MlipError::config_error(format!(
                    "{} 任务的文件名不合法: '{name}'",
                    self.kind()
                )));
            }
        }
        let mut sorted = names.clone();
        sorted.sort_unstable();
        sorted.dedup();
        if sorted.len() != names.len() {
            return Err(MlipError::config_error(format!(
                "{} 任务的工作目录文件名重复: {names:?}",
                self.kind()
            )));
        }
        Ok(())
    }
}

pub fn is_plain_file_name(name: &str) -> bool {
    !name.trim().is_empty()
        && !name.contains('/')
        && !name.contains('\\')
        && name != "."
        && name != ".."
}

/// 任务生命周期状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Created,
    Submitted,
    Finished,
}

impl TaskState {
    /// 状态只能向前推进；提交失败的任务可以直接从 Created 结束
    pub fn can_transition_to(&self, next: TaskState) -> bool {
        matches!(
            (self, next),
            (TaskState::Created, TaskState::Submitted)
                | (TaskState::Created, TaskState::Finished)
                | (TaskState::Submitted, TaskState::Finished)
        )
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TaskState::Created => "created",
            TaskState::Submitted => "submitted",
            TaskState::Finished => "finished",
        };
        f.write_str(name)
    }
}

/// 回收得到的任务结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskOutput {
    Labeled { structures: Vec<Structure> },
    Potential { path: PathBuf },
    ActiveSet { path: PathBuf },
    /// 已追加到共享累积文件中的被标记构型数
    Flagged { count: usize },
    Selected { structures: Vec<Structure> },
    Artifact { path: Option<PathBuf> },
}

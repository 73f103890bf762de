use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Structure;

/// 迭代状态机中的阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Labeling,
    Training,
    ActiveSetSelection,
    Exploring,
    StructureSelection,
    Converged,
    Failed,
}

impl Stage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Converged | Stage::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Labeling => "labeling",
            Stage::Training => "training",
            Stage::ActiveSetSelection => "active_set_selection",
            Stage::Exploring => "exploring",
            Stage::StructureSelection => "structure_selection",
            Stage::Converged => "converged",
            Stage::Failed => "failed",
        }
    }

    /// 阶段在迭代目录下的编号子目录名，终止状态没有目录
    pub fn dir_name(&self) -> Option<&'static str> {
        match self {
            Stage::Labeling => Some("01_labeling"),
            Stage::Training => Some("02_training"),
            Stage::ActiveSetSelection => Some("03_active_set"),
            Stage::Exploring => Some("04_exploration"),
            Stage::StructureSelection => Some("05_selection"),
            Stage::Converged | Stage::Failed => None,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 迭代状态
///
/// 在阶段调用之间显式传递的值，每次转换后写入检查点文件。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationState {
    pub iteration: usize,
    pub stage: Stage,
    pub converged: bool,
    /// 等待下一轮标注的候选构型
    pub candidates: Vec<Structure>,
    /// 进入 Failed 时记录的原因
    pub failure: Option<String>,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl IterationState {
    pub fn initial() -> Self {
        let now = Utc::now();
        Self {
            iteration: 0,
            stage: Stage::Labeling,
            converged: false,
            candidates: Vec::new(),
            failure: None,
            started_at: now,
            updated_at: now,
        }
    }

    pub fn advance(mut self, stage: Stage) -> Self {
        self.stage = stage;
        self.updated_at = Utc::now();
        self
    }

    /// 进入下一轮迭代的标注阶段
    pub fn next_iteration(mut self, candidates: Vec<Structure>) -> Self {
        self.iteration += 1;
        self.candidates = candidates;
        self.advance(Stage::Labeling)
    }

    pub fn converge(mut self) -> Self {
        self.converged = true;
        self.candidates.clear();
        self.advance(Stage::Converged)
    }

    pub fn fail<S: Into<String>>(mut self, reason: S) -> Self {
        self.failure = Some(reason.into());
        self.advance(Stage::Failed)
    }

    pub fn is_terminal(&self) -> bool {
        self.stage.is_terminal()
    }
}

//! 主动学习迭代调度
//!
//! [`IterationController`] 驱动 标注 → 训练 → 活跃集选择 → 探索 → 结构筛选 的循环，
//! 每个阶段通过 [`StageRunner`] 交给作业池执行。

pub mod controller;
pub mod dataset;
pub mod inputs;
pub mod selection;
pub mod stage_runner;

pub use controller::{IterationController, RunOutcome};
pub use dataset::CumulativeDataset;
pub use inputs::{RunInputs, StageInputs};
pub use selection::cap_candidates;
pub use stage_runner::{ExplorationSummary, StageOutcome, StageRunner};

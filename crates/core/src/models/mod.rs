//! # 数据模型
//!
//! 主动学习工作流中的核心数据结构。
//!
//! ## 核心模型
//!
//! ### Structure - 原子构型
//! 一个不透明的原子构型帧。格式细节由 [`crate::traits::StructureIo`] 的实现负责，
//! 调度层只负责搬运、计数和拼接。
//!
//! ### Task 相关
//! - [`TaskId`]：全局唯一的任务标识，同时决定任务工作目录名
//! - [`TaskKind`]：任务种类（标注、训练、活跃集选择、探索、结构筛选、通用）
//! - [`TaskPayload`]：按种类封闭的载荷，每个变体只携带它准备与回收所需的字段
//! - [`TaskState`]：`Created → Submitted → Finished`
//! - [`TaskOutput`]：回收得到的结果句柄
//!
//! ### IterationState - 迭代状态
//! 显式的、可序列化的迭代状态值，在各阶段调用之间传递：
//!
//! ```text
//! Labeling → Training → ActiveSetSelection → Exploring ─┬→ StructureSelection → Labeling(下一轮)
//!                                                       └→ Converged
//! 任意阶段致命错误 → Failed
//! ```

pub mod iteration;
pub mod structure;
pub mod task;

pub use iteration::*;
pub use structure::*;
pub use task::*;

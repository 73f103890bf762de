//! 调度核心的接缝接口
//!
//! - [`JobSubmitter`]：不透明的外部作业提交接口
//! - [`CompletionSignal`]：作业完成信号（默认基于完成标记文件轮询）
//! - [`StructureIo`]：构型文件的不透明读写
//! - [`PollTimer`]：作业池两次轮询之间的等待
//! - [`PoolCancellation`]：作业池的取消/超时扩展点

pub mod cancellation;
pub mod completion;
pub mod structure_io;
pub mod submitter;
pub mod timer;

pub use cancellation::*;
pub use completion::*;
pub use structure_io::*;
pub use submitter::*;
pub use timer::*;

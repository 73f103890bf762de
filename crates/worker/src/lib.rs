pub mod completion;
pub mod pool;
pub mod submitter;
pub mod task;
pub mod timer;

pub use completion::SentinelFile;
pub use pool::{PoolOutcome, PoolReport, PoolRun, WorkerPool, WorkerPoolBuilder};
pub use submitter::CommandSubmitter;
pub use task::Task;
pub use timer::TokioTimer;

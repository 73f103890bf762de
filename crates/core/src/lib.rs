pub mod io;
pub mod models;
pub mod traits;

pub use io::XyzStructureIo;
pub use models::{
    is_plain_file_name, IterationState, Stage, StagedFile, Structure, TaskId, TaskKind,
    TaskOutput, TaskPayload, TaskState,
};
pub use traits::{
    CompletionSignal, JobSubmitter, NeverCancel, PollTimer, PoolCancellation, StructureIo,
};

pub use mlip_errors::{MlipError, MlipResult};

use std::path::PathBuf;

use thiserror::Error;

#[cfg(test)]
mod tests;

#[derive(Debug, Error)]
pub enum MlipError {
    #[error("配置错误: {0}")]
    Configuration(String),
    #[error("文件操作失败: {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("任务准备失败: task={task_id} - {message}")]
    TaskPreparation { task_id: String, message: String },
    #[error("任务提交失败: task={task_id} - {message}")]
    Submission { task_id: String, message: String },
    #[error("任务产出缺失或不可读: task={task_id}, artifact={artifact}")]
    MissingArtifact { task_id: String, artifact: String },
    #[error("非法的任务状态转换: task={task_id}, {from} -> {to}")]
    InvalidTaskState {
        task_id: String,
        from: String,
        to: String,
    },
    #[error("阶段必需输入缺失: stage={stage}, input={input}")]
    MissingStageInput { stage: String, input: String },
    #[error("阶段没有产生任何可用结果: stage={stage} - {message}")]
    StageExhausted { stage: String, message: String },
    #[error("结构数据解析失败: {0}")]
    Structure(String),
    #[error("序列化错误: {0}")]
    Serialization(String),
    #[error("运行已被取消")]
    Cancelled,
    #[error("内部错误: {0}")]
    Internal(String),
}

pub type MlipResult<T> = Result<T, MlipError>;

impl MlipError {
    pub fn config_error<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }
    pub fn io<P: Into<PathBuf>>(path: P, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
    pub fn missing_artifact<T: ToString, A: Into<String>>(task_id: T, artifact: A) -> Self {
        Self::MissingArtifact {
            task_id: task_id.to_string(),
            artifact: artifact.into(),
        }
    }
    pub fn missing_stage_input<S: Into<String>, I: Into<String>>(stage: S, input: I) -> Self {
        Self::MissingStageInput {
            stage: stage.into(),
            input: input.into(),
        }
    }
    pub fn stage_exhausted<S: Into<String>, M: Into<String>>(stage: S, message: M) -> Self {
        Self::StageExhausted {
            stage: stage.into(),
            message: message.into(),
        }
    }

    /// 会终止整个运行的错误
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            MlipError::Configuration(_)
                | MlipError::MissingStageInput { .. }
                | MlipError::StageExhausted { .. }
                | MlipError::Cancelled
                | MlipError::Internal(_)
        )
    }

    /// 单个任务范围内的失败，记录日志后跳过即可
    pub fn is_task_level(&self) -> bool {
        matches!(
            self,
            MlipError::TaskPreparation { .. }
                | MlipError::Submission { .. }
                | MlipError::MissingArtifact { .. }
                | MlipError::Structure(_)
        )
    }
}

impl From<serde_json::Error> for MlipError {
    fn from(err: serde_json::Error) -> Self {
        MlipError::Serialization(err.to_string())
    }
}

impl From<anyhow::Error> for MlipError {
    fn from(err: anyhow::Error) -> Self {
        MlipError::Internal(err.to_string())
    }
}

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use mlip_config::PoolConfig;
use mlip_core::JobSubmitter;
use mlip_errors::{MlipError, MlipResult};
use tokio::process::Command;
use tracing::{debug, warn};

/// 提交命令标准输出的记录文件
pub const SUBMIT_STDOUT: &str = "submit.out";
/// 提交命令标准错误的记录文件
pub const SUBMIT_STDERR: &str = "submit.err";

/// 通过外部命令提交作业
///
/// 在任务工作目录下执行 `<shell> -c <command>`，默认命令为 `bsub < job.sh`。
/// 命令只负责把作业交给集群调度器，作业本身的完成由完成标记判断。
#[derive(Debug, Clone)]
pub struct CommandSubmitter {
    shell: String,
    command: String,
}

impl CommandSubmitter {
    pub fn new<S: Into<String>, C: Into<String>>(shell: S, command: C) -> Self {
        Self {
            shell: shell.into(),
            command: command.into(),
        }
    }

    pub fn from_config(config: &PoolConfig) -> Self {
        Self::new(config.shell.clone(), config.submit_command.clone())
    }

    pub fn command(&self) -> &str {
        &self.command
    }
}

#[async_trait]
impl JobSubmitter for CommandSubmitter {
    async fn submit(&self, workspace: &Path, script: &Path) -> MlipResult<()> {
        let submission_error = |message: String| MlipError::Submission {
            task_id: workspace.display().to_string(),
            message,
        };
        // 输出写入文件而不是管道，后台运行的作业不会让提交步骤一直等待
        let stdout = log_file(&workspace.join(SUBMIT_STDOUT)).await?;
        let stderr = log_file(&workspace.join(SUBMIT_STDERR)).await?;

        let status = Command::new(&self.shell)
            .arg("-c")
            .arg(&self.command)
            .current_dir(workspace)
            .env("MLIP_JOB_SCRIPT", script)
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(stderr)
            .status()
            .await
            .map_err(|e| submission_error(format!("启动提交命令失败: {e}")))?;

        // 提交命令的退出码不作为作业失败的依据，只有完成标记决定作业是否结束
        if status.success() {
            debug!("提交命令完成: workspace={}", workspace.display());
        } else {
            warn!(
                "提交命令返回非零状态: workspace={}, status={status}, 详见 {SUBMIT_STDERR}",
                workspace.display()
            );
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "command"
    }
}

async fn log_file(path: &Path) -> MlipResult<std::fs::File> {
    let file = tokio::fs::File::create(path)
        .await
        .map_err(|e| MlipError::io(path, e))?;
    Ok(file.into_std().await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_submit_runs_in_workspace() {
        let temp_dir = TempDir::new().unwrap();
        let script = temp_dir.path().join("job.sh");
        std::fs::write(&script, "echo labeled > out.txt\n").unwrap();

        let submitter = CommandSubmitter::new("sh", "sh job.sh");
        submitter.submit(temp_dir.path(), &script).await.unwrap();

        let out = std::fs::read_to_string(temp_dir.path().join("out.txt")).unwrap();
        assert_eq!(out.trim(), "labeled");
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_not_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let script = temp_dir.path().join("job.sh");
        let submitter = CommandSubmitter::new("sh", "exit 3");
        assert!(submitter.submit(temp_dir.path(), &script).await.is_ok());
    }

    #[tokio::test]
    async fn test_missing_shell_is_submission_error() {
        let temp_dir = TempDir::new().unwrap();
        let script = temp_dir.path().join("job.sh");
        let submitter = CommandSubmitter::new("/nonexistent/shell", "true");
        let err = submitter.submit(temp_dir.path(), &script).await.unwrap_err();
        assert!(matches!(err, MlipError::Submission { .. }));
    }

    #[tokio::test]
    async fn test_submit_output_is_recorded_in_workspace() {
        let temp_dir = TempDir::new().unwrap();
        let script = temp_dir.path().join("job.sh");
        let submitter = CommandSubmitter::new("sh", "echo 'Job <42> is submitted'; echo oops >&2");

        submitter.submit(temp_dir.path(), &script).await.unwrap();

        let out = std::fs::read_to_string(temp_dir.path().join(SUBMIT_STDOUT)).unwrap();
        let err = std::fs::read_to_string(temp_dir.path().join(SUBMIT_STDERR)).unwrap();
        assert_eq!(out.trim(), "Job <42> is submitted");
        assert_eq!(err.trim(), "oops");
    }

    #[tokio::test]
    async fn test_backgrounded_job_does_not_block_submission() {
        let temp_dir = TempDir::new().unwrap();
        let script = temp_dir.path().join("job.sh");
        std::fs::write(&script, "sleep 10\n").unwrap();
        let submitter = CommandSubmitter::new("sh", "sh job.sh &");

        let result =
            tokio::time::timeout(Duration::from_secs(5), submitter.submit(temp_dir.path(), &script))
                .await;

        assert!(matches!(result, Ok(Ok(()))));
    }

    #[test]
    fn test_from_config_uses_bsub_default() {
        let submitter = CommandSubmitter::from_config(&PoolConfig::default());
        assert_eq!(submitter.command(), "bsub < job.sh");
    }
}

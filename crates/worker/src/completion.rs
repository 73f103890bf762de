use std::path::Path;

use async_trait::async_trait;
use mlip_core::CompletionSignal;
use tokio::fs;

/// 基于完成标记文件的完成信号
///
/// 作业脚本最后一步在工作目录中创建标记文件，标记出现即视为作业结束，
/// 不区分作业成功与失败，结果是否可用在回收阶段判断。
#[derive(Debug, Clone)]
pub struct SentinelFile {
    name: String,
}

impl SentinelFile {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Default for SentinelFile {
    fn default() -> Self {
        Self::new("DONE")
    }
}

#[async_trait]
impl CompletionSignal for SentinelFile {
    fn completion_step(&self, workspace: &Path) -> Option<String> {
        // 作业可能在其他目录中启动，使用绝对路径
        let path = workspace.join(&self.name);
        let quoted = path.display().to_string().replace('\'', r"'\''");
        Some(format!("touch '{quoted}'"))
    }

    async fn is_complete(&self, workspace: &Path) -> bool {
        fs::try_exists(workspace.join(&self.name))
            .await
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_completion_step_quotes_path() {
        let signal = SentinelFile::default();
        assert_eq!(
            signal.completion_step(Path::new("/work/iter_0/task_a")),
            Some("touch '/work/iter_0/task_a/DONE'".to_string())
        );
        assert_eq!(
            signal.completion_step(Path::new("/work/it's")),
            Some(r"touch '/work/it'\''s/DONE'".to_string())
        );
    }

    #[tokio::test]
    async fn test_is_complete_follows_sentinel() {
        let temp_dir = TempDir::new().unwrap();
        let signal = SentinelFile::new("FINISHED");
        assert!(!signal.is_complete(temp_dir.path()).await);

        std::fs::write(temp_dir.path().join("FINISHED"), "").unwrap();
        assert!(signal.is_complete(temp_dir.path()).await);
    }
}

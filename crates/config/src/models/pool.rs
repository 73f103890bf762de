use crate::validation::{ConfigValidator, ValidationUtils};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 作业池配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PoolConfig {
    /// 同时在途的外部作业上限
    pub capacity: usize,
    /// 完成标记轮询间隔（秒）
    pub poll_interval_seconds: u64,
    /// 提交命令，在任务工作目录中通过 shell 执行
    pub submit_command: String,
    /// 执行提交命令的 shell
    pub shell: String,
    /// 生成的作业脚本文件名
    pub script_name: String,
    /// 作业结束时创建的完成标记文件名
    pub sentinel_name: String,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            capacity: 9999,
            poll_interval_seconds: 30,
            submit_command: "bsub < job.sh".to_string(),
            shell: "sh".to_string(),
            script_name: "job.sh".to_string(),
            sentinel_name: "DONE".to_string(),
        }
    }
}

impl PoolConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds)
    }
}

impl ConfigValidator for PoolConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        ValidationUtils::validate_count(self.capacity, "pool.capacity")?;
        ValidationUtils::validate_interval_seconds(
            self.poll_interval_seconds,
            "pool.poll_interval_seconds",
        )?;
        ValidationUtils::validate_not_empty(&self.submit_command, "pool.submit_command")?;
        ValidationUtils::validate_not_empty(&self.shell, "pool.shell")?;
        ValidationUtils::validate_file_name(&self.script_name, "pool.script_name")?;
        ValidationUtils::validate_file_name(&self.sentinel_name, "pool.sentinel_name")?;
        Ok(())
    }
}

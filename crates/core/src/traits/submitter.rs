use std::path::Path;

use async_trait::async_trait;

use crate::MlipResult;

/// 外部作业提交接口
///
/// 提交后作业在本系统之外异步运行。实现方不返回作业状态，
/// 完成与否只通过 [`crate::traits::CompletionSignal`] 判断。
///
/// # 参数
///
/// * `workspace` - 任务的独占工作目录，提交命令在此目录下执行
/// * `script` - 已追加完成步骤的作业脚本
#[async_trait]
pub trait JobSubmitter: Send + Sync {
    async fn submit(&self, workspace: &Path, script: &Path) -> MlipResult<()>;

    /// 提交器名称，用于日志
    fn name(&self) -> &str;
}

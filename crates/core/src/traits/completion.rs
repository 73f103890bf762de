use std::path::Path;

use async_trait::async_trait;

/// 作业完成信号
///
/// 当前的实现基于完成标记文件轮询：作业脚本末尾追加一步创建标记文件，
/// 调度端反复检查该文件是否存在。若将来换成可推送通知的调度后端，
/// 只需替换该接口的实现，控制器无需改动。
#[async_trait]
pub trait CompletionSignal: Send + Sync {
    /// 需要追加到作业脚本末尾的完成步骤；推送式后端可以返回 `None`
    fn completion_step(&self, workspace: &Path) -> Option<String>;

    /// 非阻塞地检查工作目录对应的作业是否已经结束
    async fn is_complete(&self, workspace: &Path) -> bool;
}

/// 作业池取消扩展点
///
/// 作业池每轮轮询前检查一次。返回 `true` 时作业池停止等待并返回，
/// 已提交的外部作业不会被终止。默认实现 [`NeverCancel`] 从不触发，
/// 即作业池会无限期等待完成标记。
pub trait PoolCancellation: Send + Sync {
    fn is_cancelled(&self) -> bool;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NeverCancel;

impl PoolCancellation for NeverCancel {
    fn is_cancelled(&self) -> bool {
        false
    }
}

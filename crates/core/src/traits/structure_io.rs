use std::path::Path;

use async_trait::async_trait;

use crate::models::Structure;
use crate::MlipResult;

/// 构型文件读写
///
/// 文件格式对调度层不透明。`append` 只在文件末尾追加，
/// 累积数据集依赖这一点保证既有条目不被截断或重排。
#[async_trait]
pub trait StructureIo: Send + Sync {
    async fn read(&self, path: &Path) -> MlipResult<Vec<Structure>>;

    async fn write(&self, path: &Path, structures: &[Structure]) -> MlipResult<()>;

    async fn append(&self, path: &Path, structures: &[Structure]) -> MlipResult<()>;
}

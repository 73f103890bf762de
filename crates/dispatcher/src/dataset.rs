use std::path::{Path, PathBuf};
use std::sync::Arc;

use mlip_core::{Structure, StructureIo};
use mlip_errors::MlipResult;
use tokio::fs;
use tracing::info;

/// 跨迭代累积的参考数据集
///
/// 只支持追加：已写入的条目既不会被截断也不会被重排。
/// 只由控制器在阶段之间写入，不存在并发写者。
#[derive(Clone)]
pub struct CumulativeDataset {
    path: PathBuf,
    io: Arc<dyn StructureIo>,
}

impl std::fmt::Debug for CumulativeDataset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CumulativeDataset")
            .field("path", &self.path)
            .finish()
    }
}

impl CumulativeDataset {
    pub fn new<P: Into<PathBuf>>(path: P, io: Arc<dyn StructureIo>) -> Self {
        Self {
            path: path.into(),
            io,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn exists(&self) -> bool {
        fs::metadata(&self.path)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false)
    }

    /// 读取全部条目；文件尚不存在时为空
    pub async fn load(&self) -> MlipResult<Vec<Structure>> {
        if !self.exists().await {
            return Ok(Vec::new());
        }
        self.io.read(&self.path).await
    }

    pub async fn append(&self, structures: &[Structure]) -> MlipResult<()> {
        if structures.is_empty() {
            return Ok(());
        }
        self.io.append(&self.path, structures).await?;
        info!(
            "数据集追加 {} 个构型: {}",
            structures.len(),
            self.path.display()
        );
        Ok(())
    }
}

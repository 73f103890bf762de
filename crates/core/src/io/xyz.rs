use std::path::Path;

use async_trait::async_trait;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

use crate::models::Structure;
use crate::traits::StructureIo;
use crate::{MlipError, MlipResult};

/// 多帧 (extended) XYZ 文件读写
///
/// 只按帧切分：原子数行、注释行、随后的原子行。帧内容原样保留。
#[derive(Debug, Clone, Copy, Default)]
pub struct XyzStructureIo;

impl XyzStructureIo {
    pub fn new() -> Self {
        Self
    }
}

/// 把多帧文本切分为构型
pub fn parse_frames(text: &str) -> MlipResult<Vec<Structure>> {
    let lines: Vec<&str> = text.lines().collect();
    let mut structures = Vec::new();
    let mut index = 0;

    while index < lines.len() {
        let header = lines[index].trim();
        if header.is_empty() {
            index += 1;
            continue;
        }

        let atom_count: usize = header.parse().map_err(|_| {
            MlipError::Structure(format!(
                "第 {} 行应为原子数，实际为: '{header}'",
                index + 1
            ))
        })?;

        let end = index
            .checked_add(2)
            .and_then(|n| n.checked_add(atom_count))
            .ok_or_else(|| {
                MlipError::Structure(format!(
                    "第 {} 行声明的原子数过大: {atom_count}",
                    index + 1
                ))
            })?;
        if end > lines.len() {
            return Err(MlipError::Structure(format!(
                "第 {} 行开始的帧被截断: 声明 {atom_count} 个原子，文件只剩 {} 行",
                index + 1,
                lines.len() - index
            )));
        }

        let mut frame = lines[index..end].join("\n");
        frame.push('\n');
        structures.push(Structure::from_frame(frame));
        index = end;
    }

    Ok(structures)
}

pub fn render_frames(structures: &[Structure]) -> String {
    structures.iter().map(Structure::as_frame).collect()
}

#[async_trait]
impl StructureIo for XyzStructureIo {
    async fn read(&self, path: &Path) -> MlipResult<Vec<Structure>> {
        let text = fs::read_to_string(path)
            .await
            .map_err(|e| MlipError::io(path, e))?;
        parse_frames(&text)
    }

    async fn write(&self, path: &Path, structures: &[Structure]) -> MlipResult<()> {
        fs::write(path, render_frames(structures))
            .await
            .map_err(|e| MlipError::io(path, e))
    }

    async fn append(&self, path: &Path, structures: &[Structure]) -> MlipResult<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .map_err(|e| MlipError::io(path, e))?;
        file.write_all(render_frames(structures).as_bytes())
            .await
            .map_err(|e| MlipError::io(path, e))?;
        file.flush().await.map_err(|e| MlipError::io(path, e))
    }
}

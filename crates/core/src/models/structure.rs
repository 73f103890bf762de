use serde::{Deserialize, Serialize};

/// 原子构型
///
/// 以完整的帧文本保存（原子数行、注释行、原子行），调度层不解释其中的物理内容。
/// 帧文本总是以换行结尾，便于直接拼接写出。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Structure {
    frame: String,
}

impl Structure {
    pub fn from_frame<S: Into<String>>(frame: S) -> Self {
        let mut frame = frame.into();
        if !frame.ends_with('\n') {
            frame.push('\n');
        }
        Self { frame }
    }

    pub fn as_frame(&self) -> &str {
        &self.frame
    }

    /// 帧首行声明的原子数
    pub fn atom_count(&self) -> Option<usize> {
        self.frame
            .lines()
            .next()
            .and_then(|line| line.trim().parse().ok())
    }

    /// 帧的注释行（extended XYZ 中的晶格、能量等信息）
    pub fn comment(&self) -> Option<&str> {
        self.frame.lines().nth(1)
    }
}

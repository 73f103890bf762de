use anyhow::{Context, Result};
use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::{
    logging::LogConfig,
    pool::PoolConfig,
    run::RunConfig,
    stages::{ExplorationConfig, StagesConfig},
};
use crate::validation::ConfigValidator;

/// 默认的配置文件搜索路径
pub const DEFAULT_CONFIG_PATHS: [&str; 2] = ["config/mlip.toml", "mlip.toml"];

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AppConfig {
    pub run: RunConfig,
    pub pool: PoolConfig,
    pub stages: StagesConfig,
    pub exploration: ExplorationConfig,
    pub logging: LogConfig,
}

impl AppConfig {
    /// 加载配置：TOML 文件叠加 `MLIP_` 前缀的环境变量（层级分隔符 `__`），
    /// 例如 `MLIP_POOL__CAPACITY=4`
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut builder = ConfigBuilder::builder();

        if let Some(path) = config_path {
            if Path::new(path).exists() {
                builder = builder.add_source(File::new(path, FileFormat::Toml));
            } else {
                return Err(anyhow::anyhow!("配置文件不存在: {}", path));
            }
        } else if let Some(path) = DEFAULT_CONFIG_PATHS
            .iter()
            .find(|path| Path::new(path).exists())
        {
            builder = builder.add_source(File::new(path, FileFormat::Toml));
        }

        builder = builder.add_source(
            Environment::with_prefix("MLIP")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: AppConfig = builder
            .build()
            .context("构建配置失败")?
            .try_deserialize()
            .context("反序列化配置失败")?;

        config.validate()?;

        Ok(config)
    }

    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(toml_str).context("解析TOML配置失败")?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("序列化配置为TOML失败")
    }

    /// 覆盖工作目录
    pub fn with_work_dir<P: Into<PathBuf>>(mut self, work_dir: P) -> Self {
        self.run.work_dir = work_dir.into();
        self
    }

    /// 将相对路径解析到工作目录下
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.run.work_dir.join(path)
        }
    }
}

impl ConfigValidator for AppConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        self.run.validate()?;
        self.pool.validate()?;
        self.stages.validate()?;
        self.exploration.validate()?;
        self.logging.validate()?;
        Ok(())
    }
}

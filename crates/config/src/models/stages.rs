use crate::validation::{ConfigValidator, ValidationUtils};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// 单个阶段的作业配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StageConfig {
    /// 作业脚本模板文件（提交系统相关的头部与计算命令）
    pub job_template: PathBuf,
    /// 作业结束后应当出现在工作目录中的产出文件名
    pub output_artifact: String,
    /// 需要写入每个任务工作目录的输入文件：工作目录内文件名 -> 源文件
    #[serde(default)]
    pub input_files: BTreeMap<String, PathBuf>,
}

impl StageConfig {
    fn new(job_template: &str, output_artifact: &str) -> Self {
        Self {
            job_template: PathBuf::from(job_template),
            output_artifact: output_artifact.to_string(),
            input_files: BTreeMap::new(),
        }
    }

    fn with_input(mut self, name: &str, source: &str) -> Self {
        self.input_files
            .insert(name.to_string(), PathBuf::from(source));
        self
    }

    fn validate_named(&self, stage: &str) -> crate::ConfigResult<()> {
        ValidationUtils::validate_not_empty(
            &self.job_template.to_string_lossy(),
            &format!("stages.{stage}.job_template"),
        )?;
        ValidationUtils::validate_file_name(
            &self.output_artifact,
            &format!("stages.{stage}.output_artifact"),
        )?;
        for name in self.input_files.keys() {
            ValidationUtils::validate_file_name(name, &format!("stages.{stage}.input_files"))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StagesConfig {
    pub labeling: StageConfig,
    pub training: StageConfig,
    pub active_set: StageConfig,
    pub exploration: StageConfig,
    pub selection: StageConfig,
}

impl Default for StagesConfig {
    fn default() -> Self {
        Self {
            labeling: StageConfig::new("job/job_vasp.sh", "labeled.xyz"),
            training: StageConfig::new("job/job_nep.sh", "nep.txt")
                .with_input("nep.in", "input/nep.in"),
            active_set: StageConfig::new("job/job_maxvol.sh", "active_set.asi"),
            exploration: StageConfig::new("job/job_gpumd.sh", "extrapolation_dump.xyz"),
            selection: StageConfig::new("job/job_select.sh", "to_add.xyz"),
        }
    }
}

impl ConfigValidator for StagesConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        self.labeling.validate_named("labeling")?;
        self.training.validate_named("training")?;
        self.active_set.validate_named("active_set")?;
        self.exploration.validate_named("exploration")?;
        self.selection.validate_named("selection")?;
        Ok(())
    }
}

/// 探索阶段的载荷来源
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ExplorationConfig {
    /// 动力学参数文件目录，每个文件对应一个探索任务
    pub inputs_dir: PathBuf,
    /// 动力学参数在任务工作目录中的文件名
    pub parameter_file_name: String,
    /// 初始构型文件，按顺序循环分配给各探索任务
    pub seed_structures: PathBuf,
    /// 初始构型在任务工作目录中的文件名
    pub seed_file_name: String,
}

impl Default for ExplorationConfig {
    fn default() -> Self {
        Self {
            inputs_dir: PathBuf::from("input/gpumd"),
            parameter_file_name: "run.in".to_string(),
            seed_structures: PathBuf::from("input/model.xyz"),
            seed_file_name: "model.xyz".to_string(),
        }
    }
}

impl ConfigValidator for ExplorationConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        ValidationUtils::validate_file_name(
            &self.parameter_file_name,
            "exploration.parameter_file_name",
        )?;
        ValidationUtils::validate_file_name(&self.seed_file_name, "exploration.seed_file_name")?;
        if self.parameter_file_name == self.seed_file_name {
            return Err(crate::ConfigError::Validation(
                "exploration.parameter_file_name and exploration.seed_file_name must differ"
                    .to_string(),
            ));
        }
        Ok(())
    }
}

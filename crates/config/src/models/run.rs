use crate::validation::{ConfigValidator, ValidationUtils};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// 迭代循环配置以及工作目录下持久化文件的命名
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RunConfig {
    pub work_dir: PathBuf,
    /// 迭代次数上限，达到后无论是否收敛都停止
    pub max_iterations: usize,
    /// 每轮送去标注的候选结构上限
    pub max_structures_per_iteration: usize,
    /// 候选结构截断抽样使用的固定种子
    pub selection_seed: u64,
    pub dataset_file: String,
    pub initial_structures_file: String,
    pub potential_file: String,
    pub active_set_file: String,
    pub flagged_file: String,
    pub candidates_file: String,
    pub labeled_file: String,
    pub state_file: String,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("."),
            max_iterations: 100,
            max_structures_per_iteration: 9999,
            selection_seed: 42,
            dataset_file: "train.xyz".to_string(),
            initial_structures_file: "init_structures.xyz".to_string(),
            potential_file: "nep.txt".to_string(),
            active_set_file: "active_set.asi".to_string(),
            flagged_file: "large_gamma.xyz".to_string(),
            candidates_file: "to_add.xyz".to_string(),
            labeled_file: "scf.xyz".to_string(),
            state_file: "state.json".to_string(),
        }
    }
}

impl RunConfig {
    pub fn dataset_path(&self) -> PathBuf {
        self.work_dir.join(&self.dataset_file)
    }

    pub fn initial_structures_path(&self) -> PathBuf {
        self.work_dir.join(&self.initial_structures_file)
    }

    pub fn potential_path(&self) -> PathBuf {
        self.work_dir.join(&self.potential_file)
    }

    pub fn active_set_path(&self) -> PathBuf {
        self.work_dir.join(&self.active_set_file)
    }

    pub fn candidates_path(&self) -> PathBuf {
        self.work_dir.join(&self.candidates_file)
    }

    pub fn state_path(&self) -> PathBuf {
        self.work_dir.join(&self.state_file)
    }

    /// 第 `iteration` 轮的迭代目录
    pub fn iteration_dir(&self, iteration: usize) -> PathBuf {
        iteration_dir_in(&self.work_dir, iteration)
    }
}

pub fn iteration_dir_in(work_dir: &Path, iteration: usize) -> PathBuf {
    work_dir.join(format!("iter_{iteration}"))
}

impl ConfigValidator for RunConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        ValidationUtils::validate_count(self.max_iterations, "run.max_iterations")?;
        ValidationUtils::validate_count(
            self.max_structures_per_iteration,
            "run.max_structures_per_iteration",
        )?;

        let names = [
            (&self.dataset_file, "run.dataset_file"),
            (&self.initial_structures_file, "run.initial_structures_file"),
            (&self.potential_file, "run.potential_file"),
            (&self.active_set_file, "run.active_set_file"),
            (&self.flagged_file, "run.flagged_file"),
            (&self.candidates_file, "run.candidates_file"),
            (&self.labeled_file, "run.labeled_file"),
            (&self.state_file, "run.state_file"),
        ];
        for (value, field) in names {
            ValidationUtils::validate_file_name(value, field)?;
        }

        Ok(())
    }
}

//! A scripted stand-in for the batch cluster
//!
//! Each submitted job is recognised by its stage directory
//! (`iter_<n>/<NN>_<stage>/task_*`) and produces the artifact that stage
//! expects, then creates the `DONE` sentinel. Behaviour is configured up
//! front so controller tests can script failures and exploration results.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use mlip_core::io::parse_frames;
use mlip_core::Structure;

use crate::builders::{index_of, labeled, structure, write_structures};
use crate::helpers::touch_sentinel;
use crate::mocks::ScriptedSubmitter;

/// Default layout files of a run directory, matching the default configuration.
pub const JOB_TEMPLATES: [&str; 5] = [
    "job/job_vasp.sh",
    "job/job_nep.sh",
    "job/job_maxvol.sh",
    "job/job_gpumd.sh",
    "job/job_select.sh",
];

/// First index handed out to structures discovered during exploration
pub const FLAGGED_INDEX_BASE: usize = 1000;

#[derive(Debug, Clone, Default)]
pub struct FakeCluster {
    failing_labels: HashSet<usize>,
    flagged_per_iteration: Vec<usize>,
    reject_candidates: bool,
    sentinel: String,
}

impl FakeCluster {
    pub fn new() -> Self {
        Self {
            sentinel: "DONE".to_string(),
            ..Self::default()
        }
    }

    /// Labeling jobs for these structure indices finish without output.
    pub fn fail_labeling_of<I: IntoIterator<Item = usize>>(mut self, indices: I) -> Self {
        self.failing_labels.extend(indices);
        self
    }

    /// Each exploration job of iteration `n` flags `counts[n]` new structures;
    /// iterations past the end flag nothing.
    pub fn flag_per_iteration(mut self, counts: Vec<usize>) -> Self {
        self.flagged_per_iteration = counts;
        self
    }

    /// Selection jobs accept none of the flagged structures.
    pub fn reject_all_candidates(mut self) -> Self {
        self.reject_candidates = true;
        self
    }

    pub fn submitter(self) -> ScriptedSubmitter {
        let next_index = Arc::new(AtomicUsize::new(FLAGGED_INDEX_BASE));
        ScriptedSubmitter::new(move |workspace| {
            let result = self.run_job(workspace, &next_index);
            touch_sentinel(workspace, &self.sentinel)?;
            result
        })
    }

    fn run_job(&self, workspace: &Path, next_index: &AtomicUsize) -> std::io::Result<()> {
        let stage_dir = workspace.parent().unwrap_or(workspace);
        let stage = dir_name(stage_dir);
        let iteration = stage_dir
            .parent()
            .map(dir_name)
            .and_then(|name| name.strip_prefix("iter_").and_then(|n| n.parse().ok()))
            .unwrap_or(0usize);

        match stage.as_str() {
            "01_labeling" => {
                let frames = read_frames(&workspace.join("structure.xyz"))?;
                let input = frames.first().ok_or_else(|| invalid("empty structure"))?;
                if index_of(input).is_some_and(|i| self.failing_labels.contains(&i)) {
                    return Ok(());
                }
                write_structures(&workspace.join("labeled.xyz"), &[labeled(input, -1.0)])
            }
            "02_training" => {
                let frames = read_frames(&workspace.join("train.xyz"))?;
                std::fs::write(
                    workspace.join("nep.txt"),
                    format!("nep4 trained_on={}\n", frames.len()),
                )
            }
            "03_active_set" => std::fs::write(workspace.join("active_set.asi"), "asi\n"),
            "04_exploration" => {
                let count = self
                    .flagged_per_iteration
                    .get(iteration)
                    .copied()
                    .unwrap_or(0);
                if count == 0 {
                    return Ok(());
                }
                let flagged: Vec<Structure> = (0..count)
                    .map(|_| structure(next_index.fetch_add(1, Ordering::SeqCst)))
                    .collect();
                write_structures(&workspace.join("extrapolation_dump.xyz"), &flagged)
            }
            "05_selection" if self.reject_candidates => {
                write_structures(&workspace.join("to_add.xyz"), &[])
            }
            "05_selection" => std::fs::copy(
                workspace.join("large_gamma.xyz"),
                workspace.join("to_add.xyz"),
            )
            .map(|_| ()),
            _ => Ok(()),
        }
    }
}

/// Write the job templates, training input, one exploration parameter file
/// per entry of `parameter_files`, and the exploration seed.
pub fn write_run_layout(root: &Path, parameter_files: &[&str]) -> std::io::Result<()> {
    std::fs::create_dir_all(root.join("job"))?;
    std::fs::create_dir_all(root.join("input/gpumd"))?;
    for template in JOB_TEMPLATES {
        std::fs::write(root.join(template), "#BSUB -q normal\nrun\n")?;
    }
    std::fs::write(root.join("input/nep.in"), "type 1 Na\n")?;
    for name in parameter_files {
        std::fs::write(root.join("input/gpumd").join(name), "run 1000\n")?;
    }
    write_structures(&root.join("input/model.xyz"), &[structure(999)])
}

/// Stage directory of every submitted workspace, e.g. `01_labeling`
pub fn submitted_stages(submissions: &[PathBuf]) -> Vec<String> {
    submissions
        .iter()
        .filter_map(|workspace| workspace.parent().map(dir_name))
        .collect()
}

fn read_frames(path: &Path) -> std::io::Result<Vec<Structure>> {
    let text = std::fs::read_to_string(path)?;
    parse_frames(&text).map_err(|e| invalid(&e.to_string()))
}

fn invalid(message: &str) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::InvalidData, message.to_string())
}

fn dir_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

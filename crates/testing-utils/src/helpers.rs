//! Helpers for scripted job behaviour

use std::path::{Path, PathBuf};

/// Create the completion sentinel in a task workspace, as the appended
/// completion step of a job script would.
pub fn touch_sentinel(workspace: &Path, name: &str) -> std::io::Result<()> {
    std::fs::write(workspace.join(name), "")
}

/// Copy a staged input to the output artifact name. Useful for jobs whose
/// "result" only needs to exist.
pub fn copy_through(workspace: &Path, input: &str, output: &str) -> std::io::Result<u64> {
    std::fs::copy(workspace.join(input), workspace.join(output))
}

/// All task workspaces (`task_*`) directly under a stage directory, sorted.
pub fn task_workspaces(stage_dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    for entry in std::fs::read_dir(stage_dir)? {
        let entry = entry?;
        let is_task = entry
            .file_name()
            .to_str()
            .map(|name| name.starts_with("task_"))
            .unwrap_or(false);
        if is_task && entry.file_type()?.is_dir() {
            dirs.push(entry.path());
        }
    }
    dirs.sort();
    Ok(dirs)
}

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use mlip_core::{
    is_plain_file_name, CompletionSignal, JobSubmitter, StructureIo, TaskId, TaskKind,
    TaskOutput, TaskPayload, TaskState,
};
use mlip_errors::{MlipError, MlipResult};
use tokio::fs;
use tracing::{debug, info};

/// 一个在外部执行的工作单元
///
/// 每个任务拥有 `<父目录>/task_<uuid>` 这一独占工作目录。生命周期：
///
/// ```text
/// Created --submit--> Submitted --poll(标记出现)--> Finished
///    └──────────── 启动失败 ──────────────────────────┘
/// ```
#[derive(Debug)]
pub struct Task {
    id: TaskId,
    payload: TaskPayload,
    job_template: String,
    inputs: BTreeMap<String, String>,
    workspace: PathBuf,
    state: TaskState,
    result: Option<TaskOutput>,
    launch_error: Option<String>,
}

impl Task {
    /// 创建任务，载荷在此处校验
    pub fn new<S: Into<String>>(
        payload: TaskPayload,
        job_template: S,
        parent_dir: &Path,
    ) -> MlipResult<Self> {
        payload.validate()?;
        let id = TaskId::new();
        Ok(Self {
            id,
            workspace: parent_dir.join(id.workspace_name()),
            payload,
            job_template: job_template.into(),
            inputs: BTreeMap::new(),
            state: TaskState::Created,
            result: None,
            launch_error: None,
        })
    }

    /// 附加直接写入工作目录的输入文件（文件名 -> 内容）
    pub fn with_inputs(mut self, inputs: BTreeMap<String, String>) -> MlipResult<Self> {
        let reserved: Vec<&str> = self
            .payload
            .staged_files()
            .iter()
            .map(|f| f.name.as_str())
            .chain(self.payload.output_artifact())
            .collect();
        for name in inputs.keys() {
            if !is_plain_file_name(name) || reserved.contains(&name.as_str()) {
                return Err(MlipError::config_error(format!(
                    "{} 任务的输入文件名不合法或与载荷冲突: '{name}'",
                    self.kind()
                )));
            }
        }
        self.inputs = inputs;
        Ok(self)
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn kind(&self) -> TaskKind {
        self.payload.kind()
    }

    pub fn payload(&self) -> &TaskPayload {
        &self.payload
    }

    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    pub fn result(&self) -> Option<&TaskOutput> {
        self.result.as_ref()
    }

    pub fn launch_error(&self) -> Option<&str> {
        self.launch_error.as_deref()
    }

    /// 作业模板加上完成步骤
    pub fn render_script(&self, completion_step: Option<&str>) -> String {
        let mut script = self.job_template.trim_end().to_string();
        script.push('\n');
        if let Some(step) = completion_step {
            script.push_str(step);
            script.push('\n');
        }
        script
    }

    /// 把载荷写入工作目录。只依赖载荷，可重复执行，不做任何提交。
    pub async fn prepare(&self, io: &dyn StructureIo) -> MlipResult<()> {
        fs::create_dir_all(&self.workspace)
            .await
            .map_err(|e| MlipError::io(&self.workspace, e))?;

        for (name, content) in &self.inputs {
            let path = self.workspace.join(name);
            fs::write(&path, content)
                .await
                .map_err(|e| MlipError::io(path, e))?;
        }

        for staged in self.payload.staged_files() {
            let target = self.workspace.join(&staged.name);
            fs::copy(&staged.source, &target)
                .await
                .map_err(|e| MlipError::TaskPreparation {
                    task_id: self.id.to_string(),
                    message: format!("复制 {} 失败: {e}", staged.source.display()),
                })?;
        }

        match &self.payload {
            TaskPayload::Labeling {
                structure,
                structure_file,
                ..
            } => {
                io.write(&self.workspace.join(structure_file), std::slice::from_ref(structure))
                    .await?;
            }
            TaskPayload::Exploration {
                parameters,
                parameter_file,
                seed,
                seed_file,
                ..
            } => {
                let path = self.workspace.join(parameter_file);
                fs::write(&path, parameters)
                    .await
                    .map_err(|e| MlipError::io(path, e))?;
                io.write(&self.workspace.join(seed_file), std::slice::from_ref(seed))
                    .await?;
            }
            _ => {}
        }

        debug!("任务 {} ({}) 输入已准备", self.id, self.kind());
        Ok(())
    }

    /// 生成作业脚本并通过外部接口提交：Created -> Submitted
    pub async fn submit(
        &mut self,
        submitter: &dyn JobSubmitter,
        signal: &dyn CompletionSignal,
        script_name: &str,
    ) -> MlipResult<()> {
        self.ensure_state(TaskState::Created, TaskState::Submitted)?;

        let script_path = self.workspace.join(script_name);
        let script = self.render_script(signal.completion_step(&self.workspace).as_deref());
        fs::write(&script_path, script)
            .await
            .map_err(|e| MlipError::io(&script_path, e))?;

        submitter.submit(&self.workspace, &script_path).await?;
        self.state = TaskState::Submitted;

        info!(
            "任务已提交: task={}, kind={}, submitter={}",
            self.id,
            self.kind(),
            submitter.name()
        );
        Ok(())
    }

    /// 准备或提交失败时直接结束任务，回收时会报告该失败
    pub fn mark_launch_failed<S: Into<String>>(&mut self, reason: S) {
        self.launch_error = Some(reason.into());
        self.state = TaskState::Finished;
    }

    /// 非阻塞检查完成标记。首次观察到完成后转为 Finished，之后不再检查。
    pub async fn poll(&mut self, signal: &dyn CompletionSignal) -> bool {
        match self.state {
            TaskState::Finished => true,
            TaskState::Created => false,
            TaskState::Submitted => {
                if signal.is_complete(&self.workspace).await {
                    self.state = TaskState::Finished;
                    debug!("任务 {} 已完成", self.id);
                    true
                } else {
                    false
                }
            }
        }
    }

    /// 从工作目录读回产出。产出缺失或不可读时返回任务级错误，由调用方记录并跳过。
    pub async fn harvest(&mut self, io: &dyn StructureIo) -> MlipResult<TaskOutput> {
        if self.state != TaskState::Finished {
            return Err(MlipError::InvalidTaskState {
                task_id: self.id.to_string(),
                from: self.state.to_string(),
                to: "harvested".to_string(),
            });
        }
        if let Some(reason) = &self.launch_error {
            return Err(MlipError::Submission {
                task_id: self.id.to_string(),
                message: reason.clone(),
            });
        }

        let output = match &self.payload {
            TaskPayload::Labeling { output, .. } => {
                let structures = self.read_artifact(io, output).await?;
                if structures.is_empty() {
                    return Err(MlipError::missing_artifact(self.id, output.as_str()));
                }
                TaskOutput::Labeled { structures }
            }
            TaskPayload::Training { output, .. } => TaskOutput::Potential {
                path: self.require_artifact(output).await?,
            },
            TaskPayload::ActiveSetSelection { output, .. } => TaskOutput::ActiveSet {
                path: self.require_artifact(output).await?,
            },
            TaskPayload::Exploration {
                output,
                flagged_sink,
                ..
            } => {
                let path = self.workspace.join(output);
                if !artifact_exists(&path).await {
                    debug!("任务 {} 没有外推构型输出", self.id);
                    TaskOutput::Flagged { count: 0 }
                } else {
                    let structures = self.read_artifact(io, output).await?;
                    if !structures.is_empty() {
                        io.append(flagged_sink, &structures).await?;
                    }
                    TaskOutput::Flagged {
                        count: structures.len(),
                    }
                }
            }
            TaskPayload::StructureSelection { output, .. } => TaskOutput::Selected {
                structures: self.read_artifact(io, output).await?,
            },
            TaskPayload::Generic { output } => match output {
                Some(name) => TaskOutput::Artifact {
                    path: Some(self.require_artifact(name).await?),
                },
                None => TaskOutput::Artifact { path: None },
            },
        };

        self.result = Some(output.clone());
        Ok(output)
    }

    async fn require_artifact(&self, name: &str) -> MlipResult<PathBuf> {
        let path = self.workspace.join(name);
        if artifact_exists(&path).await {
            Ok(path)
        } else {
            Err(MlipError::missing_artifact(self.id, name))
        }
    }

    async fn read_artifact(
        &self,
        io: &dyn StructureIo,
        name: &str,
    ) -> MlipResult<Vec<mlip_core::Structure>> {
        let path = self.require_artifact(name).await?;
        io.read(&path).await.map_err(|e| match e {
            MlipError::Io { .. } => MlipError::missing_artifact(self.id, name),
            other => other,
        })
    }

    fn ensure_state(&self, expected: TaskState, next: TaskState) -> MlipResult<()> {
        if self.state != expected || !self.state.can_transition_to(next) {
            return Err(MlipError::InvalidTaskState {
                task_id: self.id.to_string(),
                from: self.state.to_string(),
                to: next.to_string(),
            });
        }
        Ok(())
    }
}

async fn artifact_exists(path: &Path) -> bool {
    fs::metadata(path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
}

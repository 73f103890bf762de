//! Fake implementations of the worker seams
//!
//! None of these sleep or spawn processes; they are driven entirely by the
//! pool's own polling loop.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use mlip_core::{
    CompletionSignal, JobSubmitter, MlipError, MlipResult, PollTimer, PoolCancellation,
};

type Behavior = dyn Fn(&Path) -> std::io::Result<()> + Send + Sync;

/// Submitter that runs a closure in the workspace instead of a cluster command
///
/// The closure plays the role of the external job: it may write output
/// artifacts and the sentinel. An `Err` from the closure is reported as a
/// submission failure.
#[derive(Clone)]
pub struct ScriptedSubmitter {
    behavior: Arc<Behavior>,
    submissions: Arc<Mutex<Vec<PathBuf>>>,
}

impl ScriptedSubmitter {
    pub fn new<F>(behavior: F) -> Self
    where
        F: Fn(&Path) -> std::io::Result<()> + Send + Sync + 'static,
    {
        Self {
            behavior: Arc::new(behavior),
            submissions: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Records submissions and does nothing else; the test writes outputs itself.
    pub fn manual() -> Self {
        Self::new(|_| Ok(()))
    }

    /// Always fails to submit.
    pub fn failing() -> Self {
        Self::new(|_| Err(std::io::Error::other("bsub: command not found")))
    }

    /// Workspaces in submission order
    pub fn submissions(&self) -> Vec<PathBuf> {
        self.submissions.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.submissions.lock().unwrap().len()
    }
}

impl std::fmt::Debug for ScriptedSubmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedSubmitter")
            .field("submissions", &self.count())
            .finish()
    }
}

#[async_trait]
impl JobSubmitter for ScriptedSubmitter {
    async fn submit(&self, workspace: &Path, _script: &Path) -> MlipResult<()> {
        self.submissions.lock().unwrap().push(workspace.to_path_buf());
        (self.behavior)(workspace).map_err(|e| MlipError::Submission {
            task_id: workspace.display().to_string(),
            message: e.to_string(),
        })
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

#[derive(Debug, Default)]
struct LatencyState {
    /// polls observed per live workspace
    live: HashMap<PathBuf, usize>,
    max_live: usize,
    polls: usize,
    completed: Vec<PathBuf>,
}

/// Completion signal with a deterministic latency
///
/// A job is reported complete on the `latency`-th poll after its submission
/// (`latency = 1`: complete at the first poll). `None` never completes.
/// Registration happens in `completion_step`, which the task calls exactly
/// once while submitting, so the signal also observes the true number of
/// jobs in flight at every instant.
#[derive(Debug, Clone)]
pub struct LatencySignal {
    latency: Option<usize>,
    state: Arc<Mutex<LatencyState>>,
}

impl LatencySignal {
    pub fn after_polls(latency: usize) -> Self {
        Self {
            latency: Some(latency.max(1)),
            state: Arc::default(),
        }
    }

    pub fn never() -> Self {
        Self {
            latency: None,
            state: Arc::default(),
        }
    }

    pub fn max_live(&self) -> usize {
        self.state.lock().unwrap().max_live
    }

    pub fn live(&self) -> usize {
        self.state.lock().unwrap().live.len()
    }

    pub fn polls(&self) -> usize {
        self.state.lock().unwrap().polls
    }

    /// Workspaces in completion order
    pub fn completed(&self) -> Vec<PathBuf> {
        self.state.lock().unwrap().completed.clone()
    }
}

#[async_trait]
impl CompletionSignal for LatencySignal {
    fn completion_step(&self, workspace: &Path) -> Option<String> {
        let mut state = self.state.lock().unwrap();
        state.live.insert(workspace.to_path_buf(), 0);
        state.max_live = state.max_live.max(state.live.len());
        None
    }

    async fn is_complete(&self, workspace: &Path) -> bool {
        let mut state = self.state.lock().unwrap();
        state.polls += 1;
        let Some(seen) = state.live.get_mut(workspace) else {
            return false;
        };
        *seen += 1;
        let done = matches!(self.latency, Some(latency) if *seen >= latency);
        if done {
            state.live.remove(workspace);
            state.completed.push(workspace.to_path_buf());
        }
        done
    }
}

/// Poll timer that returns immediately and counts the waits
#[derive(Debug, Clone, Default)]
pub struct CountingTimer {
    waits: Arc<AtomicUsize>,
    total_millis: Arc<AtomicUsize>,
}

impl CountingTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn waits(&self) -> usize {
        self.waits.load(Ordering::SeqCst)
    }

    /// Simulated time spent waiting
    pub fn elapsed(&self) -> Duration {
        Duration::from_millis(self.total_millis.load(Ordering::SeqCst) as u64)
    }
}

#[async_trait]
impl PollTimer for CountingTimer {
    async fn wait(&self, interval: Duration) {
        self.waits.fetch_add(1, Ordering::SeqCst);
        self.total_millis
            .fetch_add(interval.as_millis() as usize, Ordering::SeqCst);
    }
}

/// Cancellation hook that fires once it has been checked more than `checks` times
#[derive(Debug, Clone)]
pub struct CancelAfter {
    checks: usize,
    seen: Arc<AtomicUsize>,
}

impl CancelAfter {
    pub fn new(checks: usize) -> Self {
        Self {
            checks,
            seen: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn checks_seen(&self) -> usize {
        self.seen.load(Ordering::SeqCst)
    }
}

impl PoolCancellation for CancelAfter {
    fn is_cancelled(&self) -> bool {
        self.seen.fetch_add(1, Ordering::SeqCst) >= self.checks
    }
}

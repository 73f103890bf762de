use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use mlip_core::{MlipError, TaskOutput, TaskPayload, TaskState};
use mlip_testing_utils::{
    touch_sentinel, CancelAfter, CountingTimer, LatencySignal, ScriptedSubmitter,
};
use mlip_worker::{PoolOutcome, SentinelFile, Task, TokioTimer, WorkerPool};
use tempfile::TempDir;

fn generic_tasks(parent: &Path, count: usize) -> Vec<Task> {
    (0..count)
        .map(|_| Task::new(TaskPayload::Generic { output: None }, "echo run", parent).unwrap())
        .collect()
}

struct Harness {
    pool: WorkerPool,
    submitter: ScriptedSubmitter,
    signal: LatencySignal,
    timer: CountingTimer,
}

fn harness(capacity: usize, signal: LatencySignal) -> Harness {
    let submitter = ScriptedSubmitter::manual();
    let timer = CountingTimer::new();
    let pool = WorkerPool::builder(capacity, Duration::from_secs(30))
        .submitter(Arc::new(submitter.clone()))
        .signal(Arc::new(signal.clone()))
        .timer(Arc::new(timer.clone()))
        .build()
        .unwrap();
    Harness {
        pool,
        submitter,
        signal,
        timer,
    }
}

#[tokio::test]
async fn test_submission_rounds_match_ceiling_division() {
    for capacity in 1..=4 {
        for count in 0..=7 {
            let temp_dir = TempDir::new().unwrap();
            let h = harness(capacity, LatencySignal::after_polls(1));

            let run = h.pool.run(generic_tasks(temp_dir.path(), count)).await;

            assert_eq!(run.outcome, PoolOutcome::Completed);
            assert_eq!(
                run.report.submission_rounds,
                count.div_ceil(capacity),
                "capacity={capacity}, count={count}"
            );
            assert_eq!(run.tasks.len(), count);
            assert!(run.tasks.iter().all(|t| t.state() == TaskState::Finished));
            assert_eq!(h.submitter.count(), count);
        }
    }
}

#[tokio::test]
async fn test_in_flight_never_exceeds_capacity() {
    let temp_dir = TempDir::new().unwrap();
    let h = harness(3, LatencySignal::after_polls(4));

    let run = h.pool.run(generic_tasks(temp_dir.path(), 10)).await;

    assert!(run.is_completed());
    assert_eq!(h.signal.max_live(), 3);
    assert_eq!(run.report.max_in_flight, 3);
    assert_eq!(h.signal.live(), 0);
    assert_eq!(run.report.submission_rounds, 4);
}

#[tokio::test]
async fn test_empty_batch_returns_without_sleeping() {
    let h = harness(2, LatencySignal::after_polls(1));

    let run = h.pool.run(Vec::new()).await;

    assert!(run.is_completed());
    assert_eq!(h.timer.waits(), 0);
    assert_eq!(run.report.sleeps, 0);
    assert_eq!(run.report.submission_rounds, 0);
}

#[tokio::test]
async fn test_submission_follows_fifo_order() {
    let temp_dir = TempDir::new().unwrap();
    let h = harness(2, LatencySignal::after_polls(2));
    let tasks = generic_tasks(temp_dir.path(), 5);
    let expected: Vec<_> = tasks.iter().map(|t| t.workspace().to_path_buf()).collect();

    let run = h.pool.run(tasks).await;

    assert_eq!(h.submitter.submissions(), expected);
    let returned: Vec<_> = run
        .tasks
        .iter()
        .map(|t| t.workspace().to_path_buf())
        .collect();
    assert_eq!(returned, expected);
    // 完成延迟一致时，完成顺序与提交顺序相同
    assert_eq!(h.signal.completed(), expected);
    assert_eq!(
        h.timer.elapsed(),
        Duration::from_secs(30) * run.report.sleeps as u32
    );
}

#[tokio::test]
async fn test_missing_sentinel_keeps_pool_waiting() {
    let temp_dir = TempDir::new().unwrap();
    let signal = LatencySignal::never();
    let timer = CountingTimer::new();
    let cancel = CancelAfter::new(50);
    let pool = WorkerPool::builder(2, Duration::from_secs(30))
        .submitter(Arc::new(ScriptedSubmitter::manual()))
        .signal(Arc::new(signal.clone()))
        .timer(Arc::new(timer.clone()))
        .cancellation(Arc::new(cancel.clone()))
        .build()
        .unwrap();

    let run = pool.run(generic_tasks(temp_dir.path(), 1)).await;

    // 50 个轮询周期后仍未结束，只能由取消钩子中止
    assert_eq!(run.outcome, PoolOutcome::Cancelled);
    assert_eq!(timer.waits(), 50);
    assert_eq!(cancel.checks_seen(), 51);
    // 第一轮只提交，之后每轮轮询一次
    assert_eq!(signal.polls(), 49);
    assert!(signal.completed().is_empty());
    assert_eq!(run.tasks[0].state(), TaskState::Submitted);
    assert_eq!(signal.live(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_missing_sentinel_file_never_returns() {
    let temp_dir = TempDir::new().unwrap();
    let pool = WorkerPool::builder(1, Duration::from_secs(30))
        .submitter(Arc::new(ScriptedSubmitter::manual()))
        .signal(Arc::new(SentinelFile::default()))
        .timer(Arc::new(TokioTimer))
        .build()
        .unwrap();

    let result = tokio::time::timeout(
        Duration::from_secs(3600),
        pool.run(generic_tasks(temp_dir.path(), 1)),
    )
    .await;

    assert!(result.is_err());
}

#[tokio::test]
async fn test_sentinel_written_by_job_completes_task() {
    let temp_dir = TempDir::new().unwrap();
    let submitter = ScriptedSubmitter::new(|workspace| {
        std::fs::write(workspace.join("result.txt"), "ok")?;
        touch_sentinel(workspace, "DONE")
    });
    let pool = WorkerPool::builder(2, Duration::from_secs(30))
        .submitter(Arc::new(submitter))
        .timer(Arc::new(CountingTimer::new()))
        .build()
        .unwrap();
    let tasks = (0..3)
        .map(|_| {
            Task::new(
                TaskPayload::Generic {
                    output: Some("result.txt".to_string()),
                },
                "echo ok > result.txt",
                temp_dir.path(),
            )
            .unwrap()
        })
        .collect();

    let mut run = pool.run(tasks).await;

    assert!(run.is_completed());
    let io = pool.io();
    for task in run.tasks.iter_mut() {
        let output = task.harvest(io.as_ref()).await.unwrap();
        assert!(matches!(output, TaskOutput::Artifact { path: Some(_) }));
        let script = std::fs::read_to_string(task.workspace().join("job.sh")).unwrap();
        assert!(script.starts_with("echo ok > result.txt\ntouch '"));
    }
}

#[tokio::test]
async fn test_launch_failures_do_not_block_the_pool() {
    let temp_dir = TempDir::new().unwrap();
    let timer = CountingTimer::new();
    let pool = WorkerPool::builder(2, Duration::from_secs(30))
        .submitter(Arc::new(ScriptedSubmitter::failing()))
        .signal(Arc::new(LatencySignal::never()))
        .timer(Arc::new(timer.clone()))
        .build()
        .unwrap();

    let mut run = pool.run(generic_tasks(temp_dir.path(), 3)).await;

    assert!(run.is_completed());
    assert_eq!(run.report.launch_failures, 3);
    assert_eq!(run.report.submitted, 0);
    assert_eq!(timer.waits(), 0);
    let io = pool.io();
    for task in run.tasks.iter_mut() {
        assert_eq!(task.state(), TaskState::Finished);
        let err = task.harvest(io.as_ref()).await.unwrap_err();
        assert!(matches!(err, MlipError::Submission { .. }));
        assert!(err.is_task_level());
    }
}

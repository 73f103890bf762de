use std::path::Path;
use std::sync::Arc;

use mlip_config::AppConfig;
use mlip_core::{IterationState, MlipError, Stage, Structure, StructureIo, XyzStructureIo};
use mlip_dispatcher::{cap_candidates, IterationController, RunInputs, RunOutcome, StageRunner};
use mlip_testing_utils::{
    labeled, structures, submitted_stages, write_run_layout, write_structures, CountingTimer,
    FakeCluster, ScriptedSubmitter, FLAGGED_INDEX_BASE,
};
use mlip_worker::WorkerPool;
use tempfile::TempDir;

fn test_config(root: &Path) -> AppConfig {
    let mut config = AppConfig::default().with_work_dir(root);
    config.pool.capacity = 2;
    config
}

async fn controller(config: AppConfig, submitter: ScriptedSubmitter) -> IterationController {
    let config = Arc::new(config);
    let pool = WorkerPool::builder(config.pool.capacity, config.pool.poll_interval())
        .submitter(Arc::new(submitter))
        .timer(Arc::new(CountingTimer::new()))
        .build()
        .unwrap();
    let inputs = RunInputs::load(&config, &XyzStructureIo::new())
        .await
        .unwrap();
    let runner = StageRunner::new(Arc::clone(&config), Arc::new(inputs), pool);
    IterationController::new(config, runner)
}

fn labeled_all(structures: &[Structure]) -> Vec<Structure> {
    structures.iter().map(|s| labeled(s, -1.0)).collect()
}

fn read_state(root: &Path) -> IterationState {
    let json = std::fs::read_to_string(root.join("state.json")).unwrap();
    serde_json::from_str(&json).unwrap()
}

#[tokio::test]
async fn test_converges_when_exploration_flags_nothing() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    write_run_layout(root, &["300K.in"]).unwrap();
    write_structures(&root.join("init_structures.xyz"), &structures(0, 3)).unwrap();
    let submitter = FakeCluster::new().submitter();

    let mut controller = controller(test_config(root), submitter.clone()).await;
    let outcome = controller.run().await.unwrap();

    assert_eq!(outcome, RunOutcome::Converged { iterations: 1 });
    assert!(root.join("iter_0").is_dir());
    assert!(!root.join("iter_1").exists());
    assert!(root.join("nep.txt").is_file());
    assert!(root.join("active_set.asi").is_file());
    assert!(!submitted_stages(&submitter.submissions()).contains(&"05_selection".to_string()));

    let state = read_state(root);
    assert_eq!(state.stage, Stage::Converged);
    assert!(state.converged);
    assert_eq!(controller.state(), &state);
}

#[tokio::test]
async fn test_dataset_is_ordered_concatenation_of_labeled_batches() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    write_run_layout(root, &["300K.in"]).unwrap();
    write_structures(&root.join("init_structures.xyz"), &structures(0, 3)).unwrap();
    let submitter = FakeCluster::new().flag_per_iteration(vec![2, 3]).submitter();

    let mut controller = controller(test_config(root), submitter).await;
    let outcome = controller.run().await.unwrap();

    assert_eq!(outcome, RunOutcome::Converged { iterations: 3 });
    let mut expected = labeled_all(&structures(0, 3));
    expected.extend(labeled_all(&structures(FLAGGED_INDEX_BASE, 2)));
    expected.extend(labeled_all(&structures(FLAGGED_INDEX_BASE + 2, 3)));
    assert_eq!(controller.dataset().load().await.unwrap(), expected);

    // 每轮的 scf.xyz 只包含该轮新标注的构型
    let io = XyzStructureIo::new();
    let scf_1 = io.read(&root.join("iter_1/scf.xyz")).await.unwrap();
    assert_eq!(scf_1, labeled_all(&structures(FLAGGED_INDEX_BASE, 2)));
}

#[tokio::test]
async fn test_candidates_are_capped_with_fixed_seed() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    write_run_layout(root, &["300K.in"]).unwrap();
    write_structures(&root.join("init_structures.xyz"), &structures(0, 2)).unwrap();
    let submitter = FakeCluster::new().flag_per_iteration(vec![6]).submitter();
    let mut config = test_config(root);
    config.run.max_structures_per_iteration = 2;
    config.run.selection_seed = 7;

    let mut controller = controller(config, submitter).await;
    let outcome = controller.run().await.unwrap();

    assert_eq!(outcome, RunOutcome::Converged { iterations: 2 });
    let expected = cap_candidates(structures(FLAGGED_INDEX_BASE, 6), 2, 7);
    let io = XyzStructureIo::new();
    assert_eq!(io.read(&root.join("to_add.xyz")).await.unwrap(), expected);
    assert_eq!(io.read(&root.join("iter_0/to_add.xyz")).await.unwrap(), expected);
    assert_eq!(
        io.read(&root.join("iter_1/scf.xyz")).await.unwrap(),
        labeled_all(&expected)
    );
}

#[tokio::test]
async fn test_iteration_ceiling_stops_without_convergence() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    write_run_layout(root, &["300K.in"]).unwrap();
    write_structures(&root.join("init_structures.xyz"), &structures(0, 1)).unwrap();
    let submitter = FakeCluster::new().flag_per_iteration(vec![1; 10]).submitter();
    let mut config = test_config(root);
    config.run.max_iterations = 2;

    let mut controller = controller(config, submitter).await;
    let outcome = controller.run().await.unwrap();

    assert_eq!(outcome, RunOutcome::IterationLimit { iterations: 2 });
    assert!(root.join("iter_1").is_dir());
    assert!(!root.join("iter_2").exists());
    let state = read_state(root);
    assert_eq!(state.iteration, 2);
    assert!(!state.converged);
    assert_eq!(state.candidates.len(), 1);
}

#[tokio::test]
async fn test_missing_initial_structures_fails_before_any_job() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    write_run_layout(root, &["300K.in"]).unwrap();
    let submitter = FakeCluster::new().submitter();

    let mut controller = controller(test_config(root), submitter.clone()).await;
    let err = controller.run().await.unwrap_err();

    assert!(matches!(err, MlipError::MissingStageInput { .. }));
    assert!(err.is_fatal());
    assert_eq!(submitter.count(), 0);
    let state = read_state(root);
    assert_eq!(state.stage, Stage::Failed);
    assert!(state.failure.is_some());
}

#[tokio::test]
async fn test_iteration_zero_skips_existing_dataset_and_potential() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    write_run_layout(root, &["300K.in"]).unwrap();
    write_structures(&root.join("train.xyz"), &labeled_all(&structures(0, 4))).unwrap();
    std::fs::write(root.join("nep.txt"), "nep4 pretrained\n").unwrap();
    let submitter = FakeCluster::new().submitter();

    let mut controller = controller(test_config(root), submitter.clone()).await;
    let outcome = controller.run().await.unwrap();

    assert_eq!(outcome, RunOutcome::Converged { iterations: 1 });
    assert_eq!(
        submitted_stages(&submitter.submissions()),
        vec!["03_active_set", "04_exploration"]
    );
    assert_eq!(
        std::fs::read_to_string(root.join("nep.txt")).unwrap(),
        "nep4 pretrained\n"
    );
    assert_eq!(controller.dataset().load().await.unwrap().len(), 4);
}

#[tokio::test]
async fn test_all_labeling_failures_are_fatal() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    write_run_layout(root, &["300K.in"]).unwrap();
    write_structures(&root.join("init_structures.xyz"), &structures(0, 3)).unwrap();
    let submitter = FakeCluster::new().fail_labeling_of(0..3).submitter();

    let mut controller = controller(test_config(root), submitter).await;
    let err = controller.run().await.unwrap_err();

    assert!(matches!(err, MlipError::StageExhausted { .. }));
    assert!(!root.join("train.xyz").exists());
    assert_eq!(read_state(root).stage, Stage::Failed);
}

#[tokio::test]
async fn test_exploration_without_parameter_files_is_fatal() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    write_run_layout(root, &[]).unwrap();
    write_structures(&root.join("init_structures.xyz"), &structures(0, 1)).unwrap();
    let submitter = FakeCluster::new().submitter();

    let mut controller = controller(test_config(root), submitter).await;
    let err = controller.run().await.unwrap_err();

    assert!(matches!(err, MlipError::MissingStageInput { ref stage, .. } if stage == "exploring"));
    assert_eq!(controller.state().stage, Stage::Failed);
}

#[tokio::test]
async fn test_exploration_fans_out_per_parameter_file() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    write_run_layout(root, &["300K.in", "600K.in", "900K.in"]).unwrap();
    write_structures(&root.join("init_structures.xyz"), &structures(0, 1)).unwrap();
    let submitter = FakeCluster::new().flag_per_iteration(vec![1]).submitter();

    let mut controller = controller(test_config(root), submitter.clone()).await;
    controller.run().await.unwrap();

    let stages = submitted_stages(&submitter.submissions());
    let explorations = stages.iter().filter(|s| *s == "04_exploration").count();
    assert_eq!(explorations, 6);
    // 三个探索任务各标记一个构型，下一轮标注三个
    let scf_1 = XyzStructureIo::new()
        .read(&root.join("iter_1/scf.xyz"))
        .await
        .unwrap();
    assert_eq!(scf_1.len(), 3);
}

#[tokio::test]
async fn test_selection_accepting_nothing_fails_before_next_iteration() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    write_run_layout(root, &["300K.in"]).unwrap();
    write_structures(&root.join("init_structures.xyz"), &structures(0, 2)).unwrap();
    let submitter = FakeCluster::new()
        .flag_per_iteration(vec![2, 0])
        .reject_all_candidates()
        .submitter();

    let mut controller = controller(test_config(root), submitter).await;
    let err = controller.run().await.unwrap_err();

    assert!(
        matches!(err, MlipError::StageExhausted { ref stage, .. } if stage == "structure_selection")
    );
    assert!(!root.join("iter_1").exists());
    let state = read_state(root);
    assert_eq!(state.iteration, 0);
    assert_eq!(state.stage, Stage::Failed);
}

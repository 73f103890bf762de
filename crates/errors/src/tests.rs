use crate::*;

#[test]
fn test_error_display() {
    let config_error = MlipError::config_error("pool.capacity must be greater than 0");
    assert_eq!(
        config_error.to_string(),
        "配置错误: pool.capacity must be greater than 0"
    );

    let artifact_error = MlipError::missing_artifact("task_1", "labeled.xyz");
    assert_eq!(
        artifact_error.to_string(),
        "任务产出缺失或不可读: task=task_1, artifact=labeled.xyz"
    );

    let input_error = MlipError::missing_stage_input("training", "/tmp/train.xyz");
    assert_eq!(
        input_error.to_string(),
        "阶段必需输入缺失: stage=training, input=/tmp/train.xyz"
    );

    assert_eq!(MlipError::Cancelled.to_string(), "运行已被取消");
}

#[test]
fn test_io_error_keeps_path() {
    let err = MlipError::io(
        "/work/iter_0",
        std::io::Error::new(std::io::ErrorKind::AlreadyExists, "exists"),
    );
    let message = err.to_string();
    assert!(message.contains("/work/iter_0"));
    assert!(message.contains("exists"));
}

#[test]
fn test_error_classification() {
    // 阶段级与配置级错误是致命的
    assert!(MlipError::config_error("x").is_fatal());
    assert!(MlipError::stage_exhausted("labeling", "0 of 5").is_fatal());
    assert!(MlipError::missing_stage_input("training", "train.xyz").is_fatal());
    assert!(MlipError::Cancelled.is_fatal());

    // 任务级错误只影响单个任务
    let task_error = MlipError::missing_artifact("t", "nep.txt");
    assert!(task_error.is_task_level());
    assert!(!task_error.is_fatal());

    let submit_error = MlipError::Submission {
        task_id: "t".to_string(),
        message: "sh: not found".to_string(),
    };
    assert!(submit_error.is_task_level());
}

#[test]
fn test_error_conversions() {
    let json_err = serde_json::from_str::<serde_json::Value>("{invalid").unwrap_err();
    let err: MlipError = json_err.into();
    assert!(matches!(err, MlipError::Serialization(_)));

    let err: MlipError = anyhow::anyhow!("boom").into();
    assert!(matches!(err, MlipError::Internal(ref m) if m == "boom"));
}

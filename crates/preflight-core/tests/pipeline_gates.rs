//! Integration tests for the gated preflight pipeline with in-memory fakes.

use preflight_core::fakes::{RecordingProcessRunner, ScriptedProbe};
use preflight_core::{
    DeploymentPipeline, LivenessChecker, PreflightError, RegistryAvailabilityChecker,
    PipelineRequest, RetryPolicy, RunMode, Stage, TestRunInvoker,
};
use serde_json::json;
use std::path::Path;
use std::sync::Arc;

const APP_URL: &str = "https://my-app.example.test";
const REGISTRY: &str = "https://registry.test";
const PKG_A: &str = "https://registry.test/@internal/a/1.4.0";
const PKG_B: &str = "https://registry.test/@internal/b/2.0.0";

fn write_app(dir: &Path) {
    let manifest = json!({
        "name": "generated-app",
        "dependencies": { "@internal/a": "^1.4.0", "react": "^18.2.0" },
        "devDependencies": { "@internal/b": "~2.0.0", "typescript": "^5.1.0" }
    });
    std::fs::write(
        dir.join("package.json"),
        serde_json::to_string_pretty(&manifest).unwrap(),
    )
    .unwrap();
}

fn pipeline(probe: Arc<ScriptedProbe>, runner: Arc<RecordingProcessRunner>) -> DeploymentPipeline {
    DeploymentPipeline::new(
        RegistryAvailabilityChecker::new(probe.clone(), REGISTRY, "@internal"),
        LivenessChecker::new(probe),
        TestRunInvoker::new(runner),
    )
}

fn request(dir: &Path, mode: RunMode) -> PipelineRequest {
    PipelineRequest {
        app_dir: dir.to_path_buf(),
        target_url: APP_URL.to_string(),
        mode,
        skip_tests: false,
    }
}

/// Test: all gates pass and the test runner receives the URL
#[tokio::test(start_paused = true)]
async fn test_all_stages_pass() {
    let dir = tempfile::tempdir().unwrap();
    write_app(dir.path());

    let probe = Arc::new(
        ScriptedProbe::new()
            .route(PKG_A, [200])
            .route(PKG_B, [200])
            .route(APP_URL, [502, 200]),
    );
    let runner = Arc::new(RecordingProcessRunner::exiting_with(0));

    let report = pipeline(probe.clone(), runner.clone())
        .run(&request(dir.path(), RunMode::Production))
        .await
        .expect("pipeline passes");

    assert_eq!(report.dependencies_checked, 2);
    assert!(report.ran(Stage::RegistryAvailability));
    assert!(report.ran(Stage::Liveness));
    assert!(report.ran(Stage::TestRun));
    assert!(report.finished_at >= report.started_at);
    assert_eq!(probe.call_count(APP_URL), 2);

    let commands = runner.commands();
    assert_eq!(commands.len(), 1);
    assert_eq!(commands[0].args, vec!["run", "cy:run"]);
    assert_eq!(commands[0].working_dir, dir.path());
    assert!(commands[0]
        .env
        .contains(&("CYPRESS_BASE_URL".to_string(), APP_URL.to_string())));
}

/// Test: a missing package halts before liveness and tests
#[tokio::test(start_paused = true)]
async fn test_registry_failure_halts_pipeline() {
    let dir = tempfile::tempdir().unwrap();
    write_app(dir.path());

    let probe = Arc::new(
        ScriptedProbe::new()
            .route(PKG_A, [200])
            .route(PKG_B, [404])
            .route(APP_URL, [200]),
    );
    let runner = Arc::new(RecordingProcessRunner::exiting_with(0));

    let err = pipeline(probe.clone(), runner.clone())
        .run(&request(dir.path(), RunMode::Production))
        .await
        .unwrap_err();

    assert!(matches!(err, PreflightError::Availability(ref failures) if failures.len() == 1));
    assert_eq!(probe.call_count(PKG_A), 1);
    assert_eq!(probe.call_count(APP_URL), 0, "liveness must not run");
    assert!(runner.commands().is_empty(), "tests must not run");
}

/// Test: a server that never comes up prevents the test run
#[tokio::test(start_paused = true)]
async fn test_liveness_failure_halts_pipeline() {
    let dir = tempfile::tempdir().unwrap();
    write_app(dir.path());

    let probe = Arc::new(
        ScriptedProbe::new()
            .route(PKG_A, [200])
            .route(PKG_B, [200])
            .route(APP_URL, [503]),
    );
    let runner = Arc::new(RecordingProcessRunner::exiting_with(0));

    let err = pipeline(probe.clone(), runner.clone())
        .run(&request(dir.path(), RunMode::Production))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        PreflightError::LivenessTimeout { attempts: 10, .. }
    ));
    assert_eq!(probe.call_count(APP_URL), 10);
    assert!(runner.commands().is_empty(), "tests must not run");
}

/// Test: failing tests in development surface as TestRunFailure
#[tokio::test(start_paused = true)]
async fn test_development_test_failure_propagates() {
    let dir = tempfile::tempdir().unwrap();
    write_app(dir.path());

    let probe = Arc::new(
        ScriptedProbe::new()
            .route(PKG_A, [200])
            .route(PKG_B, [200])
            .route(APP_URL, [200]),
    );
    let runner = Arc::new(RecordingProcessRunner::exiting_with(1));

    let err = pipeline(probe, runner.clone())
        .run(&request(dir.path(), RunMode::Development))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        PreflightError::TestRunFailure {
            mode: RunMode::Development,
            exit_code: Some(1)
        }
    ));
    assert!(err.to_string().contains("development"));
    assert_eq!(runner.commands()[0].args, vec!["run", "test:e2e:run"]);
}

/// Test: skip_tests stops after liveness
#[tokio::test(start_paused = true)]
async fn test_skip_tests_stops_after_liveness() {
    let dir = tempfile::tempdir().unwrap();
    write_app(dir.path());

    let probe = Arc::new(
        ScriptedProbe::new()
            .route(PKG_A, [200])
            .route(PKG_B, [200])
            .route(APP_URL, [200]),
    );
    let runner = Arc::new(RecordingProcessRunner::exiting_with(1));

    let mut req = request(dir.path(), RunMode::Production);
    req.skip_tests = true;
    let report = pipeline(probe, runner.clone()).run(&req).await.unwrap();

    assert!(report.ran(Stage::Liveness));
    assert!(!report.ran(Stage::TestRun));
    assert!(runner.commands().is_empty());
}

/// Test: custom policies shorten the liveness window
#[tokio::test(start_paused = true)]
async fn test_custom_liveness_policy() {
    let dir = tempfile::tempdir().unwrap();
    write_app(dir.path());

    let probe = Arc::new(
        ScriptedProbe::new()
            .route(PKG_A, [200])
            .route(PKG_B, [200])
            .route(APP_URL, [503]),
    );
    let runner = Arc::new(RecordingProcessRunner::exiting_with(0));
    let pipeline = DeploymentPipeline::new(
        RegistryAvailabilityChecker::new(probe.clone(), REGISTRY, "@internal"),
        LivenessChecker::new(probe.clone()).with_policy(RetryPolicy::from_millis(100, 3).unwrap()),
        TestRunInvoker::new(runner),
    );

    let err = pipeline
        .run(&request(dir.path(), RunMode::Production))
        .await
        .unwrap_err();
    assert!(matches!(err, PreflightError::LivenessTimeout { attempts: 3, .. }));
}

/// Test: missing manifest fails before any probe
#[tokio::test]
async fn test_missing_manifest_fails_early() {
    let dir = tempfile::tempdir().unwrap();
    let probe = Arc::new(ScriptedProbe::new());
    let runner = Arc::new(RecordingProcessRunner::exiting_with(0));

    let err = pipeline(probe.clone(), runner)
        .run(&request(dir.path(), RunMode::Production))
        .await
        .unwrap_err();
    assert!(matches!(err, PreflightError::Io(_)));
    assert!(!err.is_gate_failure());
    assert!(probe.calls().is_empty());
}

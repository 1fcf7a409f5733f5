//! Gated preflight pipeline: registry, then liveness, then tests.
//!
//! Each stage is a hard gate. The first failing stage ends the run and its
//! error is returned as-is; later stages never start.

use std::path::PathBuf;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, Instrument};

use crate::error::{PreflightError, Result};
use crate::liveness::LivenessChecker;
use crate::manifest::PackageManifest;
use crate::obs;
use crate::registry::RegistryAvailabilityChecker;
use crate::test_run::{RunMode, TestRunInvoker};

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    RegistryAvailability,
    Liveness,
    TestRun,
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::RegistryAvailability => "registry_availability",
            Stage::Liveness => "liveness",
            Stage::TestRun => "test_run",
        }
    }
}

/// One pipeline invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineRequest {
    /// Generated app directory (holds `package.json`; tests run here).
    pub app_dir: PathBuf,
    /// Deployed (or dev-server) URL under test.
    pub target_url: String,
    pub mode: RunMode,
    /// Stop after liveness; used when only the deployment is being verified.
    pub skip_tests: bool,
}

/// A stage that ran and passed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageOutcome {
    pub stage: Stage,
    pub duration_ms: u64,
}

/// Summary of a successful pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineReport {
    pub target_url: String,
    pub stages: Vec<StageOutcome>,
    pub dependencies_checked: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl PipelineReport {
    /// Whether `stage` ran (every recorded stage passed).
    pub fn ran(&self, stage: Stage) -> bool {
        self.stages.iter().any(|s| s.stage == stage)
    }
}

/// Runs the three gates in order.
#[derive(Clone)]
pub struct DeploymentPipeline {
    registry: RegistryAvailabilityChecker,
    liveness: LivenessChecker,
    tests: TestRunInvoker,
}

impl DeploymentPipeline {
    pub fn new(
        registry: RegistryAvailabilityChecker,
        liveness: LivenessChecker,
        tests: TestRunInvoker,
    ) -> Self {
        Self {
            registry,
            liveness,
            tests,
        }
    }

    pub async fn run(&self, request: &PipelineRequest) -> Result<PipelineReport> {
        let started_at = Utc::now();
        let start = Instant::now();

        let result = self
            .run_stages(request)
            .instrument(obs::pipeline_span(&request.target_url))
            .await;

        let duration_ms = start.elapsed().as_millis() as u64;
        obs::emit_pipeline_finished(&request.target_url, duration_ms, result.is_ok());

        let (stages, dependencies_checked) = result?;
        Ok(PipelineReport {
            target_url: request.target_url.clone(),
            stages,
            dependencies_checked,
            started_at,
            finished_at: Utc::now(),
        })
    }

    async fn run_stages(&self, request: &PipelineRequest) -> Result<(Vec<StageOutcome>, usize)> {
        let mut stages = Vec::new();

        let deps = PackageManifest::read(&request.app_dir)?.dependency_specs();
        let checked = gate(
            &mut stages,
            Stage::RegistryAvailability,
            self.registry.validate_package_versions(&deps),
        )
        .await?;
        info!(checked, "internal dependencies available");

        gate(
            &mut stages,
            Stage::Liveness,
            self.liveness.check_up(&request.target_url),
        )
        .await?;

        if request.skip_tests {
            info!("skipping end-to-end tests");
            return Ok((stages, checked));
        }

        let tests = self.tests.clone();
        let app_dir = request.app_dir.clone();
        let mode = request.mode;
        let url = request.target_url.clone();
        gate(&mut stages, Stage::TestRun, async move {
            tokio::task::spawn_blocking(move || tests.run_tests(&app_dir, mode, &url))
                .await
                .map_err(|e| PreflightError::Io(std::io::Error::other(e)))?
        })
        .await?;

        Ok((stages, checked))
    }
}

async fn gate<T, F>(stages: &mut Vec<StageOutcome>, stage: Stage, fut: F) -> Result<T>
where
    F: std::future::Future<Output = Result<T>>,
{
    obs::emit_stage_started(stage.name());
    let start = Instant::now();
    let result = fut.await;
    let duration_ms = start.elapsed().as_millis() as u64;

    match &result {
        Ok(_) => {
            obs::emit_stage_passed(stage.name(), duration_ms);
            stages.push(StageOutcome { stage, duration_ms });
        }
        Err(e) => obs::emit_stage_failed(stage.name(), duration_ms, e),
    }
    result
}

//! Preflight Core - deployment gate for generated applications
//!
//! Before end-to-end browser tests run against a freshly generated or
//! deployed app, this crate confirms:
//! - every internal package the app declares is published on the registry
//! - the app's HTTP server is actually serving
//!
//! and only then hands the URL to the test runner. Each stage is a hard
//! gate; see [`DeploymentPipeline`].

pub mod app_name;
pub mod config;
pub mod error;
pub mod fakes;
pub mod liveness;
pub mod manifest;
pub mod obs;
pub mod pipeline;
pub mod probe;
pub mod registry;
pub mod retry;
pub mod telemetry;
pub mod test_run;

// Re-export key types
pub use app_name::{app_name, capture_head_sha};
pub use config::PreflightConfig;
pub use error::{AvailabilityError, PreflightError, ProbeError, Result};
pub use liveness::LivenessChecker;
pub use manifest::PackageManifest;
pub use obs::{
    emit_pipeline_finished, emit_probe_attempt_failed, emit_stage_failed, emit_stage_passed,
    emit_stage_started, pipeline_span,
};
pub use pipeline::{DeploymentPipeline, PipelineReport, PipelineRequest, Stage, StageOutcome};
pub use probe::{is_available, HttpProbe, ReqwestProbe};
pub use registry::{coerce_version, DependencySpec, RegistryAvailabilityChecker};
pub use retry::{retry, RetryExhausted, RetryPolicy, RetrySettings};
pub use telemetry::init_tracing;
pub use test_run::{
    CommandSpec, ProcessRunner, RunConfig, RunMode, SystemProcessRunner, TestRunInvoker,
    TestRunnerConfig,
};

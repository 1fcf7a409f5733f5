//! Structured observability hooks for preflight pipeline events.
//!
//! This module provides:
//! - A pipeline-scoped tracing span via [`pipeline_span`]
//! - Emission functions for stage start/pass/fail, probe attempts, and
//!   pipeline completion
//!
//! Events are emitted at `info!` level (failures at `warn!`). Filter with
//! `RUST_LOG`; pass `--json` to the CLI for JSON lines.

use tracing::{info, warn};

/// Span tagged with the deployment URL, for instrumenting a pipeline run.
///
/// # Example
///
/// ```ignore
/// pipeline.run_stages(&request)
///     .instrument(pipeline_span("https://my-app.fly.dev"))
///     .await;
/// ```
pub fn pipeline_span(target_url: &str) -> tracing::Span {
    tracing::info_span!("preflight.pipeline", target_url = %target_url)
}

/// Emit event: a pipeline stage started.
pub fn emit_stage_started(stage: &str) {
    info!(event = "stage.started", stage = %stage);
}

/// Emit event: a pipeline stage passed.
pub fn emit_stage_passed(stage: &str, duration_ms: u64) {
    info!(event = "stage.passed", stage = %stage, duration_ms = duration_ms);
}

/// Emit event: a pipeline stage failed and the pipeline halts.
pub fn emit_stage_failed(stage: &str, duration_ms: u64, error: &dyn std::fmt::Display) {
    warn!(
        event = "stage.failed",
        stage = %stage,
        duration_ms = duration_ms,
        error = %error,
    );
}

/// Emit event: one probe attempt failed (will be retried if budget remains).
pub fn emit_probe_attempt_failed(url: &str, attempt: u32, error: &dyn std::fmt::Display) {
    info!(event = "probe.attempt_failed", url = %url, attempt = attempt, error = %error);
}

/// Emit event: pipeline finished.
pub fn emit_pipeline_finished(target_url: &str, duration_ms: u64, success: bool) {
    info!(
        event = "pipeline.finished",
        target_url = %target_url,
        duration_ms = duration_ms,
        success = success,
    );
}

//! Preflight - deployment gate for generated applications
//!
//! The `preflight` command verifies a deployed app before its end-to-end
//! tests run.
//!
//! ## Commands
//!
//! - `check`: registry availability, liveness, then the test suite
//! - `liveness`: wait for a URL to serve
//! - `registry`: confirm internal dependencies are published
//! - `test`: run the end-to-end suite against a URL
//! - `install-test-runner`: wire the test runner into an app's package.json
//! - `app-name`: print a unique name for a new deployment

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, Level};

use preflight_core::{
    app_name, DeploymentPipeline, PackageManifest, PipelineRequest, PreflightConfig, RunMode,
    SystemProcessRunner,
};

#[derive(Parser)]
#[command(name = "preflight")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Deployment preflight checks for generated apps", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// JSON config file (defaults apply for missing fields)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the package registry base URL
    #[arg(long, global = true)]
    registry_url: Option<String>,

    /// Override the internal package scope
    #[arg(long, global = true)]
    internal_scope: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every gate: registry, liveness, then end-to-end tests
    Check {
        /// Generated app directory
        #[arg(default_value = ".")]
        dir: PathBuf,

        /// URL of the deployed app
        #[arg(long)]
        url: String,

        /// Run the development test script instead of production
        #[arg(long)]
        dev: bool,

        /// Stop after the liveness gate
        #[arg(long)]
        skip_tests: bool,
    },

    /// Wait until a URL answers with a 2xx/3xx status
    Liveness {
        /// URL to probe
        url: String,
    },

    /// Confirm the app's internal dependencies exist on the registry
    Registry {
        /// Generated app directory
        #[arg(default_value = ".")]
        dir: PathBuf,
    },

    /// Run the end-to-end test suite against a URL
    Test {
        /// Generated app directory
        #[arg(default_value = ".")]
        dir: PathBuf,

        /// URL of the app under test
        #[arg(long)]
        url: String,

        /// Run the development test script instead of production
        #[arg(long)]
        dev: bool,
    },

    /// Add the test runner packages and scripts to an app's package.json
    InstallTestRunner {
        /// Generated app directory
        #[arg(default_value = ".")]
        dir: PathBuf,

        /// URL the dev-server test scripts wait on
        #[arg(long, default_value = "http://localhost:3000")]
        url: String,

        /// Directory holding the shared package.json with pinned versions
        #[arg(long)]
        shared: PathBuf,
    },

    /// Print a unique app name tagged with the current commit
    AppName {
        /// Deployment target, e.g. `vercel` or `fly`
        target: String,

        /// Repository whose HEAD is used
        #[arg(long, default_value = ".")]
        repo: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    preflight_core::init_tracing(cli.json, level);

    let config = load_config(&cli)?;

    match cli.command {
        Commands::Check {
            dir,
            url,
            dev,
            skip_tests,
        } => cmd_check(&config, dir, url, dev, skip_tests).await,
        Commands::Liveness { url } => cmd_liveness(&config, &url).await,
        Commands::Registry { dir } => cmd_registry(&config, &dir).await,
        Commands::Test { dir, url, dev } => cmd_test(&config, dir, url, dev).await,
        Commands::InstallTestRunner { dir, url, shared } => {
            cmd_install_test_runner(&dir, &url, &shared)
        }
        Commands::AppName { target, repo } => cmd_app_name(&config, &target, &repo),
    }
}

/// Config file, then `PREFLIGHT_*` env vars, then command-line flags.
fn load_config(cli: &Cli) -> Result<PreflightConfig> {
    let mut config = PreflightConfig::load(cli.config.as_deref())
        .context("Failed to load preflight config")?;
    if let Some(url) = &cli.registry_url {
        config.registry_url = url.clone();
    }
    if let Some(scope) = &cli.internal_scope {
        config.internal_scope = scope.clone();
    }
    Ok(config)
}

fn build_pipeline(config: &PreflightConfig) -> Result<DeploymentPipeline> {
    let probe = config.http_probe()?;
    Ok(DeploymentPipeline::new(
        config.registry_checker(probe.clone())?,
        config.liveness_checker(probe)?,
        config.test_invoker(Arc::new(SystemProcessRunner)),
    ))
}

/// Run all gates and print the report
async fn cmd_check(
    config: &PreflightConfig,
    dir: PathBuf,
    url: String,
    dev: bool,
    skip_tests: bool,
) -> Result<()> {
    let pipeline = build_pipeline(config)?;
    let request = PipelineRequest {
        app_dir: dir,
        target_url: url,
        mode: RunMode::from_dev_flag(dev),
        skip_tests,
    };

    let report = pipeline.run(&request).await?;

    println!("Preflight passed for {}", report.target_url);
    println!(
        "  internal dependencies checked: {}",
        report.dependencies_checked
    );
    for outcome in &report.stages {
        println!("  {:<22} {} ms", outcome.stage.name(), outcome.duration_ms);
    }
    info!(report = %serde_json::to_string(&report)?, "preflight report");
    Ok(())
}

async fn cmd_liveness(config: &PreflightConfig, url: &str) -> Result<()> {
    let checker = config.liveness_checker(config.http_probe()?)?;
    checker.check_up(url).await?;
    println!("{url} is up");
    Ok(())
}

async fn cmd_registry(config: &PreflightConfig, dir: &Path) -> Result<()> {
    let deps = PackageManifest::read(dir)
        .with_context(|| format!("Failed to read package.json in {}", dir.display()))?
        .dependency_specs();
    let checker = config.registry_checker(config.http_probe()?)?;
    let checked = checker.validate_package_versions(&deps).await?;
    println!(
        "{checked} {} package(s) available on {}",
        config.internal_scope, config.registry_url
    );
    Ok(())
}

async fn cmd_test(config: &PreflightConfig, dir: PathBuf, url: String, dev: bool) -> Result<()> {
    let invoker = config.test_invoker(Arc::new(SystemProcessRunner));
    let mode = RunMode::from_dev_flag(dev);
    tokio::task::spawn_blocking(move || invoker.run_tests(&dir, mode, &url))
        .await
        .context("Test runner task panicked")??;
    println!("End-to-end tests passed ({mode})");
    Ok(())
}

fn cmd_install_test_runner(dir: &Path, url: &str, shared: &Path) -> Result<()> {
    let shared = PackageManifest::read(shared)
        .with_context(|| format!("Failed to read shared package.json in {}", shared.display()))?;
    let manifest = PackageManifest::update(dir, |m| m.install_test_runner(url, &shared))?;
    println!("Installed test runner into {}", manifest.path().display());
    Ok(())
}

fn cmd_app_name(config: &PreflightConfig, target: &str, repo: &Path) -> Result<()> {
    let name = app_name(&config.app_name_prefix, target, repo)?;
    println!("{name}");
    Ok(())
}

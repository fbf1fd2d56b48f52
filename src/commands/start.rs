use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, ValueEnum};
use serde::Serialize;

use start_pipeline::config::{self, ConfigResolution, DeploymentConfig};
use start_pipeline::executor::{self, LaunchContext, StageOutcome};
use start_pipeline::log_status;
use start_pipeline::mode::{
    self, DeploymentContext, DirectoryContext, ModeResolution, NamedContext, PipelineMode,
};
use start_pipeline::runner::SystemRunner;
use start_pipeline::strategy::{self, DeploymentMethod, Strategy};
use start_pipeline::{Error, Result};

use super::CmdResult;

#[derive(Args, Debug)]
pub struct StartArgs {
    /// Config file name inside the config directory (default: most recent config_*.yaml)
    pub config: Option<String>,

    /// Directory holding config_*.yaml files
    #[arg(long, default_value = config::DEFAULT_CONFIG_DIR)]
    pub config_dir: String,

    /// Stages to launch (default: inferred from the deployment context)
    #[arg(long, value_enum)]
    pub mode: Option<ModeArg>,

    /// Deployment identity used for mode inference (default: name of the current checkout)
    #[arg(long, value_name = "NAME")]
    pub context: Option<String>,

    /// Directory where Slurm job scripts are staged (default: current directory)
    #[arg(long, value_name = "DIR")]
    pub staging_dir: Option<String>,

    /// Kill any external command that runs longer than this
    #[arg(long, value_name = "SECONDS")]
    pub timeout: Option<u64>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum ModeArg {
    /// Only the PySpark transform
    #[value(alias = "pyspark-only")]
    TransformOnly,
    /// Only the Ray tuner
    #[value(alias = "ray-only")]
    TuningOnly,
    /// Transform, then tuning
    Full,
}

impl From<ModeArg> for PipelineMode {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::TransformOnly => PipelineMode::TransformOnly,
            ModeArg::TuningOnly => PipelineMode::TuningOnly,
            ModeArg::Full => PipelineMode::Full,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartOutput {
    pub command: String,
    pub config: ConfigResolution,
    pub deployment_method: DeploymentMethod,
    pub mode: ModeResolution,
    pub strategy: Strategy,
    pub stages: Vec<StageOutcome>,
}

pub fn run(args: StartArgs, _global: &crate::commands::GlobalArgs) -> CmdResult<StartOutput> {
    let config_dir = expand_path(&args.config_dir);
    let resolution = config::resolve(&config_dir, args.config.as_deref())?;
    let config = DeploymentConfig::load(&resolution.path)?;

    let deployment_method = config.deployment_method()?;
    let timeout = command_timeout(args.timeout, &config)?;
    let context = deployment_context(args.context.as_deref())?;
    let mode = mode::resolve_mode(
        args.mode.map(PipelineMode::from),
        config.project.pipeline_mode,
        context.as_ref(),
    );

    log_status!(
        "start",
        "Starting pipeline with deployment method: {}",
        deployment_method
    );
    log_status!("start", "Pipeline mode: {}", mode.mode);

    let strategy = strategy::select(deployment_method, mode.mode);
    let runner = SystemRunner::with_timeout(timeout);

    let ctx = LaunchContext {
        config_path: &resolution.path,
        config: &config,
        staging_dir: staging_dir(args.staging_dir.as_deref()),
    };
    let report = executor::execute(strategy, &ctx, &runner)?;

    log_status!("start", "Pipeline launched ({})", report.strategy);

    Ok((
        StartOutput {
            command: "start".to_string(),
            config: resolution,
            deployment_method,
            mode,
            strategy: report.strategy,
            stages: report.stages,
        },
        0,
    ))
}

fn expand_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).into_owned())
}

/// `--context` when given, otherwise the checkout the launcher runs from.
fn deployment_context(name: Option<&str>) -> Result<Box<dyn DeploymentContext>> {
    match name {
        Some(name) => Ok(Box::new(NamedContext(name.to_string()))),
        None => Ok(Box::new(DirectoryContext::current()?)),
    }
}

fn staging_dir(dir: Option<&str>) -> PathBuf {
    dir.map(expand_path).unwrap_or_else(|| PathBuf::from("."))
}

/// `--timeout` wins over `project.command_timeout_secs`; zero is rejected.
fn command_timeout(flag: Option<u64>, config: &DeploymentConfig) -> Result<Option<Duration>> {
    match flag {
        Some(0) => Err(Error::validation_invalid_argument(
            "timeout",
            "--timeout must be at least 1 second",
            Some("0".to_string()),
            None,
        )
        .with_hint("Omit --timeout to run without a deadline")),
        Some(secs) => Ok(Some(Duration::from_secs(secs))),
        None => config.command_timeout(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use start_pipeline::ErrorCode;

    fn config(yaml: &str) -> DeploymentConfig {
        DeploymentConfig::parse(yaml, "inline").unwrap()
    }

    #[test]
    fn timeout_flag_beats_config() {
        let cfg = config("project:\n  command_timeout_secs: 3600\n");
        assert_eq!(
            command_timeout(Some(30), &cfg).unwrap(),
            Some(Duration::from_secs(30))
        );
        assert_eq!(
            command_timeout(None, &cfg).unwrap(),
            Some(Duration::from_secs(3600))
        );
        assert_eq!(command_timeout(None, &DeploymentConfig::default()).unwrap(), None);
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let err = command_timeout(Some(0), &DeploymentConfig::default()).unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationInvalidArgument);

        let cfg = config("project:\n  command_timeout_secs: 0\n");
        let err = command_timeout(None, &cfg).unwrap_err();
        assert_eq!(err.code, ErrorCode::ConfigInvalidValue);
    }

    #[test]
    fn context_flag_replaces_directory_identity() {
        let context = deployment_context(Some("eeg-pyspark-pipeline")).unwrap();
        assert_eq!(context.identity().as_deref(), Some("eeg-pyspark-pipeline"));

        let resolved = mode::resolve_mode(None, None, context.as_ref());
        assert_eq!(resolved.mode, PipelineMode::TransformOnly);
    }

    #[test]
    fn staging_dir_defaults_to_current_directory() {
        assert_eq!(staging_dir(None), PathBuf::from("."));
        assert_eq!(staging_dir(Some("/scratch/jobs")), PathBuf::from("/scratch/jobs"));
    }

    #[test]
    fn staging_dir_expands_tilde() {
        let expanded = staging_dir(Some("~/jobs"));
        assert!(!expanded.starts_with("~"));
        if let Ok(home) = std::env::var("HOME") {
            assert_eq!(expanded, PathBuf::from(home).join("jobs"));
        }
    }

    #[test]
    fn mode_flag_accepts_legacy_aliases() {
        let parse = |value: &str| ModeArg::from_str(value, false).map(PipelineMode::from);
        assert_eq!(parse("transform-only"), Ok(PipelineMode::TransformOnly));
        assert_eq!(parse("pyspark-only"), Ok(PipelineMode::TransformOnly));
        assert_eq!(parse("ray-only"), Ok(PipelineMode::TuningOnly));
        assert_eq!(parse("full"), Ok(PipelineMode::Full));
        assert!(parse("half").is_err());
    }
}

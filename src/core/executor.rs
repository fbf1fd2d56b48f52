//! Runs a selected strategy: direct container invocations or Slurm submissions.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::command::require_success;
use crate::config::DeploymentConfig;
use crate::container::{self, ContainerRuntime};
use crate::error::Result;
use crate::mode::{PipelineMode, Stage};
use crate::runner::{OutputMode, ProcessRunner};
use crate::slurm::{JobChainBuilder, SubmittedJob};
use crate::strategy::{Launch, Strategy};

/// Everything a strategy needs besides the runner.
pub struct LaunchContext<'a> {
    pub config_path: &'a Path,
    pub config: &'a DeploymentConfig,
    /// Where Slurm scripts are written before submission.
    pub staging_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum StageOutcome {
    /// A container ran to completion.
    Container { stage: Stage, command: String },
    /// A job was accepted by Slurm.
    SlurmJob(SubmittedJob),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchReport {
    pub strategy: Strategy,
    pub stages: Vec<StageOutcome>,
}

/// Run every stage of `strategy`, stopping at the first failure.
pub fn execute(
    strategy: Strategy,
    ctx: &LaunchContext<'_>,
    runner: &dyn ProcessRunner,
) -> Result<LaunchReport> {
    let stages = match strategy.launch() {
        Launch::Direct(runtime) => run_containers(runtime, strategy.mode(), ctx, runner)?,
        Launch::Slurm => submit_jobs(strategy.mode(), ctx, runner)?,
    };

    Ok(LaunchReport { strategy, stages })
}

fn run_containers(
    runtime: ContainerRuntime,
    mode: PipelineMode,
    ctx: &LaunchContext<'_>,
    runner: &dyn ProcessRunner,
) -> Result<Vec<StageOutcome>> {
    let mut outcomes = Vec::new();

    for &stage in mode.stages() {
        let invocation =
            container::invocation(runtime, stage, ctx.config_path, &ctx.config.containers);
        let command = invocation.command_line();

        match runtime {
            ContainerRuntime::Docker => {
                log_status!("docker", "Running {} container...", stage.label());
            }
            ContainerRuntime::Singularity => {
                log_status!(
                    "singularity",
                    "Running {} Singularity container...",
                    stage.label()
                );
            }
        }

        let output = runner.run(&invocation.program, &invocation.args, OutputMode::Inherit)?;
        require_success(&output, &command)?;

        outcomes.push(StageOutcome::Container { stage, command });
    }

    Ok(outcomes)
}

fn submit_jobs(
    mode: PipelineMode,
    ctx: &LaunchContext<'_>,
    runner: &dyn ProcessRunner,
) -> Result<Vec<StageOutcome>> {
    let builder = JobChainBuilder::new(runner, ctx.staging_dir.clone(), &ctx.config.containers);

    match mode {
        PipelineMode::Full => {
            let chain = builder.submit_chain(
                ctx.config_path,
                ctx.config.slurm_options(Stage::Transform),
                ctx.config.slurm_options(Stage::Tuning),
            )?;
            Ok(vec![
                StageOutcome::SlurmJob(chain.first),
                StageOutcome::SlurmJob(chain.second),
            ])
        }
        PipelineMode::TransformOnly | PipelineMode::TuningOnly => {
            let mut outcomes = Vec::new();
            for &stage in mode.stages() {
                let job = builder.submit_stage(
                    stage,
                    ctx.config_path,
                    ctx.config.slurm_options(stage),
                )?;
                outcomes.push(StageOutcome::SlurmJob(job));
            }
            Ok(outcomes)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CommandOutput;
    use crate::error::ErrorCode;
    use crate::runner::fake::FakeRunner;
    use crate::strategy::{select, DeploymentMethod};
    use tempfile::TempDir;

    const CONFIG: &str = "/srv/eeg/config/config_1.yaml";

    fn slurm_config() -> DeploymentConfig {
        DeploymentConfig::parse(
            r#"
project:
  deployment_method: Singularity with Slurm
  slurm_options: "--time=01:00:00"
  slurm_options_ray: "--gres=gpu:1"
"#,
            "inline",
        )
        .unwrap()
    }

    #[test]
    fn docker_full_runs_transform_then_tuning() {
        let config = DeploymentConfig::default();
        let staging = TempDir::new().unwrap();
        let ctx = LaunchContext {
            config_path: Path::new(CONFIG),
            config: &config,
            staging_dir: staging.path().to_path_buf(),
        };
        let runner = FakeRunner::new();

        let report = execute(Strategy::DockerFull, &ctx, &runner).unwrap();

        let calls = runner.calls();
        assert_eq!(calls.len(), 2);
        assert!(calls.iter().all(|c| c.program == "docker" && c.mode == OutputMode::Inherit));
        assert_eq!(
            calls[0].args.last().map(String::as_str),
            Some("nour333/eeg-spark-pipeline:latest")
        );
        assert_eq!(
            calls[1].args.last().map(String::as_str),
            Some("nour333/eeg-ray-tuner:latest")
        );
        assert_eq!(report.stages.len(), 2);
    }

    #[test]
    fn failed_container_stops_the_run() {
        let config = DeploymentConfig::default();
        let ctx = LaunchContext {
            config_path: Path::new(CONFIG),
            config: &config,
            staging_dir: PathBuf::from("."),
        };
        let runner = FakeRunner::new().respond(Ok(CommandOutput::failed(137, "")));

        let err = execute(Strategy::SingularityFull, &ctx, &runner).unwrap_err();

        assert_eq!(err.code, ErrorCode::ExternalCommandFailure);
        assert_eq!(err.command_exit_code(), Some(137));
        assert_eq!(runner.calls().len(), 1);
        assert_eq!(runner.calls()[0].program, "singularity");
    }

    #[test]
    fn single_stage_direct_strategies_run_one_container() {
        let config = DeploymentConfig::default();
        let ctx = LaunchContext {
            config_path: Path::new(CONFIG),
            config: &config,
            staging_dir: PathBuf::from("."),
        };
        let runner = FakeRunner::new();

        execute(Strategy::SingularityTuningOnly, &ctx, &runner).unwrap();
        execute(Strategy::DockerTransformOnly, &ctx, &runner).unwrap();

        let calls = runner.calls();
        assert_eq!(calls.len(), 2);
        assert!(calls[0].args.contains(&"eeg-ray-tuner.sif".to_string()));
        assert!(calls[1]
            .args
            .contains(&"nour333/eeg-spark-pipeline:latest".to_string()));
    }

    #[test]
    fn slurm_full_chains_jobs_with_per_stage_options() {
        let config = slurm_config();
        let staging = TempDir::new().unwrap();
        let ctx = LaunchContext {
            config_path: Path::new(CONFIG),
            config: &config,
            staging_dir: staging.path().to_path_buf(),
        };
        let runner = FakeRunner::new()
            .respond(Ok(CommandOutput::succeeded("Submitted batch job 4821")))
            .respond(Ok(CommandOutput::succeeded("Submitted batch job 4822")));

        let strategy = select(config.deployment_method().unwrap(), PipelineMode::Full);
        let report = execute(strategy, &ctx, &runner).unwrap();

        assert_eq!(report.strategy, Strategy::SlurmFull);
        let calls = runner.calls();
        assert!(calls[0].script.as_deref().unwrap().contains("#SBATCH --time=01:00:00"));
        let second = calls[1].script.as_deref().unwrap();
        assert!(second.contains("#SBATCH --gres=gpu:1"));
        assert!(second.contains("afterok:4821"));
        assert_eq!(std::fs::read_dir(staging.path()).unwrap().count(), 0);
    }

    #[test]
    fn slurm_tuning_only_uses_ray_options() {
        let config = slurm_config();
        let staging = TempDir::new().unwrap();
        let ctx = LaunchContext {
            config_path: Path::new(CONFIG),
            config: &config,
            staging_dir: staging.path().to_path_buf(),
        };
        let runner = FakeRunner::new().respond(Ok(CommandOutput::succeeded("Submitted batch job 9")));

        let strategy = select(DeploymentMethod::SingularityWithSlurm, PipelineMode::TuningOnly);
        let report = execute(strategy, &ctx, &runner).unwrap();

        assert_eq!(report.stages.len(), 1);
        let calls = runner.calls();
        assert_eq!(calls.len(), 1);
        let script = calls[0].script.as_deref().unwrap();
        assert!(script.contains("#SBATCH --gres=gpu:1"));
        assert!(!script.contains("--time=01:00:00"));
        assert!(!script.contains("--dependency"));
    }
}

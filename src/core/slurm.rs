//! Slurm job scripts, submission and `afterok` chaining.
//!
//! Each stage is rendered into a short-lived batch script, handed to `sbatch`,
//! and removed again as soon as the submission attempt returns. The tuning job
//! of a full run depends on the transform job's id, so it can only be rendered
//! once that id has been parsed out of `sbatch`'s output.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tempfile::NamedTempFile;

use crate::command::require_success;
use crate::container::{self, ContainerImages, ContainerRuntime, Invocation};
use crate::error::{Error, Result};
use crate::io;
use crate::mode::Stage;
use crate::parser;
use crate::runner::{OutputMode, ProcessRunner};
use crate::utils::template::{self, TemplateVars};

pub const SBATCH: &str = "sbatch";

const SHEBANG: &str = "#!/bin/bash";
const DIRECTIVE: &str = "#SBATCH";
const STAGE_DIRECTIVES: &str = "#SBATCH --job-name={{jobName}}
#SBATCH --output={{logPrefix}}_%j.out
#SBATCH --error={{logPrefix}}_%j.err";
const DEPENDENCY_DIRECTIVE: &str = "#SBATCH --dependency=afterok:{{jobId}}";

/// Numeric job id, optionally followed by `;cluster` as printed by `sbatch --parsable`.
const JOB_ID_PATTERN: &str = r"^(\d+)(?:;[\w.-]+)?$";

/// Scheduler-assigned job identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Pull the job id out of `sbatch` output.
///
/// The id is the last whitespace-separated token (`Submitted batch job 4821`).
/// Empty output, or a last token that is not a job id, is an error.
pub fn extract_job_id(output: &str) -> Result<JobId> {
    parser::last_token(output)
        .and_then(|token| parser::extract_first(token, JOB_ID_PATTERN))
        .map(JobId)
        .ok_or_else(|| Error::job_id_extraction(output.trim()))
}

/// A batch script for one stage.
#[derive(Debug, Clone)]
pub struct JobScript {
    stage: Stage,
    options: String,
    dependency: Option<JobId>,
    command: Invocation,
}

impl JobScript {
    pub fn new(stage: Stage, options: impl Into<String>, command: Invocation) -> Self {
        Self {
            stage,
            options: options.into(),
            dependency: None,
            command,
        }
    }

    /// Run only after `prerequisite` completes successfully.
    pub fn after(mut self, prerequisite: &JobId) -> Self {
        self.dependency = Some(prerequisite.clone());
        self
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn dependency(&self) -> Option<&JobId> {
        self.dependency.as_ref()
    }

    pub fn render(&self) -> String {
        let mut lines = vec![SHEBANG.to_string()];

        // One directive per non-empty option line; nothing for an empty string.
        lines.extend(
            parser::lines(&self.options).map(|line| format!("{} {}", DIRECTIVE, line.trim())),
        );

        lines.push(template::render(
            STAGE_DIRECTIVES,
            &[
                (TemplateVars::JOB_NAME, self.stage.job_name()),
                (TemplateVars::LOG_PREFIX, self.stage.log_prefix()),
            ],
        ));

        if let Some(job_id) = &self.dependency {
            lines.push(template::render(
                DEPENDENCY_DIRECTIVE,
                &[(TemplateVars::JOB_ID, job_id.as_str())],
            ));
        }

        lines.push(String::new());
        lines.push(self.command.command_line());

        let mut body = lines.join("\n");
        body.push('\n');
        body
    }
}

/// A rendered script on disk for the duration of one submission.
///
/// The file is removed when the guard drops, whichever way the submission ends.
pub struct EphemeralScript {
    file: NamedTempFile,
}

impl EphemeralScript {
    pub fn create(staging_dir: &Path, script: &JobScript) -> Result<Self> {
        let prefix = format!("temp_{}.", script.stage().log_prefix());
        let mut file = tempfile::Builder::new()
            .prefix(&prefix)
            .suffix(".slurm")
            .tempfile_in(staging_dir)
            .map_err(|e| {
                Error::internal_io(
                    e.to_string(),
                    Some(format!("create job script in {}", staging_dir.display())),
                )
            })?;

        io::write_all(file.as_file_mut(), &script.render(), "write job script")?;

        Ok(Self { file })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmittedJob {
    pub stage: Stage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<JobId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub depends_on: Option<JobId>,
    pub submission_output: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobChain {
    pub first: SubmittedJob,
    pub second: SubmittedJob,
}

/// Renders, submits and chains Slurm jobs from an explicit staging directory.
pub struct JobChainBuilder<'a> {
    runner: &'a dyn ProcessRunner,
    staging_dir: PathBuf,
    images: &'a ContainerImages,
}

impl<'a> JobChainBuilder<'a> {
    pub fn new(
        runner: &'a dyn ProcessRunner,
        staging_dir: impl Into<PathBuf>,
        images: &'a ContainerImages,
    ) -> Self {
        Self {
            runner,
            staging_dir: staging_dir.into(),
            images,
        }
    }

    /// Script that runs `stage` under Singularity against `config_path`.
    pub fn script(&self, stage: Stage, config_path: &Path, options: &str) -> JobScript {
        let command = container::invocation(
            ContainerRuntime::Singularity,
            stage,
            config_path,
            self.images,
        );
        JobScript::new(stage, options, command)
    }

    /// Submit one script with no dependents.
    ///
    /// The job id is reported when `sbatch` printed one, but nothing needs it.
    pub fn submit_stage(
        &self,
        stage: Stage,
        config_path: &Path,
        options: &str,
    ) -> Result<SubmittedJob> {
        log_status!("slurm", "Submitting {} SLURM job...", stage.label());
        self.submit(&self.script(stage, config_path, options))
    }

    /// Submit the transform job, then the tuning job with `afterok` on it.
    pub fn submit_chain(
        &self,
        config_path: &Path,
        transform_options: &str,
        tuning_options: &str,
    ) -> Result<JobChain> {
        log_status!("slurm", "Submitting {} SLURM job...", Stage::Transform.label());
        let first = self.submit(&self.script(Stage::Transform, config_path, transform_options))?;
        let first_id = extract_job_id(&first.submission_output)?;

        log_status!(
            "slurm",
            "Submitting {} SLURM job (after {} job {})...",
            Stage::Tuning.label(),
            Stage::Transform.label(),
            first_id
        );
        let second_script = self
            .script(Stage::Tuning, config_path, tuning_options)
            .after(&first_id);
        let second = self.submit(&second_script)?;

        Ok(JobChain { first, second })
    }

    /// Write `script` to the staging directory and hand it to `sbatch`.
    ///
    /// The script file is gone when this returns.
    fn submit(&self, script: &JobScript) -> Result<SubmittedJob> {
        let ephemeral = EphemeralScript::create(&self.staging_dir, script)?;
        let args = vec![ephemeral.path().display().to_string()];

        let output = self.runner.run(SBATCH, &args, OutputMode::Capture)?;
        require_success(&output, &format!("{} {}", SBATCH, args[0]))?;

        let stdout = output.stdout.trim().to_string();
        if !stdout.is_empty() {
            log_status!("slurm", "{}", stdout);
        }
        Ok(SubmittedJob {
            stage: script.stage(),
            job_id: extract_job_id(&stdout).ok(),
            depends_on: script.dependency().cloned(),
            submission_output: stdout,
        })
    }
}

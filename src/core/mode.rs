//! Pipeline stages and mode inference.
//!
//! A launcher checked out as one of the single-stage repositories only starts
//! that stage; anywhere else it launches the whole pipeline.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Deployment identity that launches only the transform stage.
pub const TRANSFORM_IDENTITY: &str = "eeg-pyspark-pipeline";
/// Deployment identity that launches only the tuning stage.
pub const TUNING_IDENTITY: &str = "eeg-ray-tuner";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Stage one: the distributed PySpark transform.
    Transform,
    /// Stage two: the Ray hyperparameter tuner.
    Tuning,
}

impl Stage {
    pub fn label(&self) -> &'static str {
        match self {
            Stage::Transform => "PySpark",
            Stage::Tuning => "Ray tuner",
        }
    }

    /// Slurm `--job-name`.
    pub fn job_name(&self) -> &'static str {
        match self {
            Stage::Transform => "eeg-pyspark",
            Stage::Tuning => "eeg-ray-tuner",
        }
    }

    /// Prefix of the Slurm stdout/stderr files and of the ephemeral script.
    pub fn log_prefix(&self) -> &'static str {
        match self {
            Stage::Transform => "pyspark",
            Stage::Tuning => "ray",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PipelineMode {
    #[serde(alias = "pyspark-only")]
    TransformOnly,
    #[serde(alias = "ray-only")]
    TuningOnly,
    Full,
}

impl PipelineMode {
    pub const ALL: [PipelineMode; 3] = [
        PipelineMode::TransformOnly,
        PipelineMode::TuningOnly,
        PipelineMode::Full,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineMode::TransformOnly => "transform-only",
            PipelineMode::TuningOnly => "tuning-only",
            PipelineMode::Full => "full",
        }
    }

    /// Stages this mode launches, in execution order.
    pub fn stages(&self) -> &'static [Stage] {
        match self {
            PipelineMode::TransformOnly => &[Stage::Transform],
            PipelineMode::TuningOnly => &[Stage::Tuning],
            PipelineMode::Full => &[Stage::Transform, Stage::Tuning],
        }
    }
}

impl fmt::Display for PipelineMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PipelineMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "transform-only" | "pyspark-only" => Ok(PipelineMode::TransformOnly),
            "tuning-only" | "ray-only" => Ok(PipelineMode::TuningOnly),
            "full" => Ok(PipelineMode::Full),
            other => Err(Error::validation_invalid_argument(
                "mode",
                format!("Unknown pipeline mode '{}'", other),
                Some(other.to_string()),
                Some(
                    PipelineMode::ALL
                        .iter()
                        .map(|mode| mode.as_str().to_string())
                        .collect(),
                ),
            )),
        }
    }
}

/// Map a deployment identity to the stages it is responsible for.
///
/// Total: unrecognized identities launch the full pipeline.
pub fn infer_mode(identity: &str) -> PipelineMode {
    match identity {
        TRANSFORM_IDENTITY => PipelineMode::TransformOnly,
        TUNING_IDENTITY => PipelineMode::TuningOnly,
        _ => PipelineMode::Full,
    }
}

/// Source of the identity that [`infer_mode`] keys on.
pub trait DeploymentContext {
    fn identity(&self) -> Option<String>;
}

/// Identity taken from the name of the repository checkout the launcher runs in.
#[derive(Debug, Clone)]
pub struct DirectoryContext {
    dir: PathBuf,
}

impl DirectoryContext {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Context for the checkout containing `start`: the nearest ancestor
    /// holding a `.git` entry, or `start` itself outside any checkout.
    pub fn for_checkout(start: &Path) -> Self {
        let root = start
            .ancestors()
            .find(|dir| dir.join(".git").exists())
            .unwrap_or(start);
        Self::new(root)
    }

    /// Context for the working directory's checkout, so launching from a
    /// subdirectory keeps the repository's identity.
    pub fn current() -> Result<Self> {
        let dir = std::env::current_dir().map_err(|e| {
            Error::internal_io(e.to_string(), Some("read current directory".to_string()))
        })?;
        Ok(Self::for_checkout(&dir))
    }
}

impl DeploymentContext for DirectoryContext {
    fn identity(&self) -> Option<String> {
        self.dir
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
    }
}

/// Identity fixed at startup (e.g. from `--context`).
#[derive(Debug, Clone)]
pub struct NamedContext(pub String);

impl DeploymentContext for NamedContext {
    fn identity(&self) -> Option<String> {
        Some(self.0.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum ModeSource {
    /// `--mode` on the command line.
    Flag,
    /// `project.pipeline_mode` in the config file.
    Config,
    /// A recognized deployment identity.
    Context(String),
    /// Unrecognized or missing identity.
    Default(Option<String>),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModeResolution {
    pub mode: PipelineMode,
    pub source: ModeSource,
}

/// Pick the pipeline mode: flag, then config, then deployment context.
pub fn resolve_mode(
    flag: Option<PipelineMode>,
    configured: Option<PipelineMode>,
    context: &dyn DeploymentContext,
) -> ModeResolution {
    if let Some(mode) = flag {
        return ModeResolution {
            mode,
            source: ModeSource::Flag,
        };
    }
    if let Some(mode) = configured {
        return ModeResolution {
            mode,
            source: ModeSource::Config,
        };
    }

    let identity = context.identity();
    match identity.as_deref().map(infer_mode) {
        Some(mode) if mode != PipelineMode::Full => ModeResolution {
            mode,
            source: ModeSource::Context(identity.unwrap_or_default()),
        },
        _ => {
            log_status!(
                "mode",
                "Deployment context '{}' is not a single-stage repository; launching the full pipeline",
                identity.as_deref().unwrap_or("<unknown>")
            );
            ModeResolution {
                mode: PipelineMode::Full,
                source: ModeSource::Default(identity),
            }
        }
    }
}

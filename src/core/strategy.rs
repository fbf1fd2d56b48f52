//! Deployment method × pipeline mode → execution strategy.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::container::ContainerRuntime;
use crate::error::{Error, Result};
use crate::mode::PipelineMode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DeploymentMethod {
    #[serde(rename = "Docker")]
    Docker,
    #[serde(rename = "Singularity without Slurm")]
    SingularityWithoutSlurm,
    #[serde(rename = "Singularity with Slurm")]
    SingularityWithSlurm,
}

impl DeploymentMethod {
    pub const ALL: [DeploymentMethod; 3] = [
        DeploymentMethod::Docker,
        DeploymentMethod::SingularityWithoutSlurm,
        DeploymentMethod::SingularityWithSlurm,
    ];

    /// The literal accepted in `project.deployment_method`.
    pub fn as_str(&self) -> &'static str {
        match self {
            DeploymentMethod::Docker => "Docker",
            DeploymentMethod::SingularityWithoutSlurm => "Singularity without Slurm",
            DeploymentMethod::SingularityWithSlurm => "Singularity with Slurm",
        }
    }

    /// Parse the config literal. Unknown methods are an error, never a default.
    pub fn parse(value: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|method| method.as_str() == value.trim())
            .ok_or_else(|| {
                let supported: Vec<&str> = Self::ALL.iter().map(|m| m.as_str()).collect();
                Error::unsupported_deployment_method(value, &supported)
            })
    }
}

impl fmt::Display for DeploymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeploymentMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    DockerTransformOnly,
    DockerTuningOnly,
    DockerFull,
    SingularityTransformOnly,
    SingularityTuningOnly,
    SingularityFull,
    SlurmTransformOnly,
    SlurmTuningOnly,
    SlurmFull,
}

/// How a strategy starts its stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Launch {
    /// Blocking container invocation per stage.
    Direct(ContainerRuntime),
    /// Singularity wrapped in Slurm job scripts.
    Slurm,
}

/// Pick the strategy for a deployment method and pipeline mode.
pub fn select(method: DeploymentMethod, mode: PipelineMode) -> Strategy {
    use DeploymentMethod::*;
    use PipelineMode::*;

    match (method, mode) {
        (Docker, TransformOnly) => Strategy::DockerTransformOnly,
        (Docker, TuningOnly) => Strategy::DockerTuningOnly,
        (Docker, Full) => Strategy::DockerFull,
        (SingularityWithoutSlurm, TransformOnly) => Strategy::SingularityTransformOnly,
        (SingularityWithoutSlurm, TuningOnly) => Strategy::SingularityTuningOnly,
        (SingularityWithoutSlurm, Full) => Strategy::SingularityFull,
        (SingularityWithSlurm, TransformOnly) => Strategy::SlurmTransformOnly,
        (SingularityWithSlurm, TuningOnly) => Strategy::SlurmTuningOnly,
        (SingularityWithSlurm, Full) => Strategy::SlurmFull,
    }
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::DockerTransformOnly => "docker_transform_only",
            Strategy::DockerTuningOnly => "docker_tuning_only",
            Strategy::DockerFull => "docker_full",
            Strategy::SingularityTransformOnly => "singularity_transform_only",
            Strategy::SingularityTuningOnly => "singularity_tuning_only",
            Strategy::SingularityFull => "singularity_full",
            Strategy::SlurmTransformOnly => "slurm_transform_only",
            Strategy::SlurmTuningOnly => "slurm_tuning_only",
            Strategy::SlurmFull => "slurm_full",
        }
    }

    pub fn method(&self) -> DeploymentMethod {
        match self {
            Strategy::DockerTransformOnly | Strategy::DockerTuningOnly | Strategy::DockerFull => {
                DeploymentMethod::Docker
            }
            Strategy::SingularityTransformOnly
            | Strategy::SingularityTuningOnly
            | Strategy::SingularityFull => DeploymentMethod::SingularityWithoutSlurm,
            Strategy::SlurmTransformOnly | Strategy::SlurmTuningOnly | Strategy::SlurmFull => {
                DeploymentMethod::SingularityWithSlurm
            }
        }
    }

    pub fn mode(&self) -> PipelineMode {
        match self {
            Strategy::DockerTransformOnly
            | Strategy::SingularityTransformOnly
            | Strategy::SlurmTransformOnly => PipelineMode::TransformOnly,
            Strategy::DockerTuningOnly
            | Strategy::SingularityTuningOnly
            | Strategy::SlurmTuningOnly => PipelineMode::TuningOnly,
            Strategy::DockerFull | Strategy::SingularityFull | Strategy::SlurmFull => {
                PipelineMode::Full
            }
        }
    }

    pub fn launch(&self) -> Launch {
        match self.method() {
            DeploymentMethod::Docker => Launch::Direct(ContainerRuntime::Docker),
            DeploymentMethod::SingularityWithoutSlurm => {
                Launch::Direct(ContainerRuntime::Singularity)
            }
            DeploymentMethod::SingularityWithSlurm => Launch::Slurm,
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

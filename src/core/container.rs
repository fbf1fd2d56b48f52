//! Container runtime invocations for each pipeline stage.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::mode::Stage;
use crate::shell;

/// Where the resolved config file is mounted inside every container.
pub const CONTAINER_CONFIG_PATH: &str = "/app/config.yaml";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerRuntime {
    Docker,
    Singularity,
}

impl ContainerRuntime {
    pub fn program(&self) -> &'static str {
        match self {
            ContainerRuntime::Docker => "docker",
            ContainerRuntime::Singularity => "singularity",
        }
    }
}

/// Image references per runtime and stage; the `containers` config section overrides them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerImages {
    pub docker_transform: String,
    pub docker_tuning: String,
    pub singularity_transform: String,
    pub singularity_tuning: String,
}

impl Default for ContainerImages {
    fn default() -> Self {
        Self {
            docker_transform: "nour333/eeg-spark-pipeline:latest".to_string(),
            docker_tuning: "nour333/eeg-ray-tuner:latest".to_string(),
            singularity_transform: "eeg-pyspark.sif".to_string(),
            singularity_tuning: "eeg-ray-tuner.sif".to_string(),
        }
    }
}

impl ContainerImages {
    pub fn image(&self, runtime: ContainerRuntime, stage: Stage) -> &str {
        match (runtime, stage) {
            (ContainerRuntime::Docker, Stage::Transform) => &self.docker_transform,
            (ContainerRuntime::Docker, Stage::Tuning) => &self.docker_tuning,
            (ContainerRuntime::Singularity, Stage::Transform) => &self.singularity_transform,
            (ContainerRuntime::Singularity, Stage::Tuning) => &self.singularity_tuning,
        }
    }
}

/// A fully resolved command: program plus arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
}

impl Invocation {
    pub fn command_line(&self) -> String {
        shell::command_line(&self.program, &self.args)
    }
}

/// Build the container invocation that runs `stage` against `config_path`.
pub fn invocation(
    runtime: ContainerRuntime,
    stage: Stage,
    config_path: &Path,
    images: &ContainerImages,
) -> Invocation {
    let mount = format!("{}:{}", config_path.display(), CONTAINER_CONFIG_PATH);
    let image = images.image(runtime, stage).to_string();

    let args = match runtime {
        ContainerRuntime::Docker => vec![
            "run".to_string(),
            "--rm".to_string(),
            "-v".to_string(),
            mount,
            image,
        ],
        ContainerRuntime::Singularity => vec![
            "run".to_string(),
            "--bind".to_string(),
            mount,
            image,
            "--config".to_string(),
            CONTAINER_CONFIG_PATH.to_string(),
        ],
    };

    Invocation {
        program: runtime.program().to_string(),
        args,
    }
}

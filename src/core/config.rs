//! Config discovery and loading.
//!
//! Configs live in a directory as `config_*.yaml`. Without an explicit name the
//! most recently modified one wins.

use std::path::{Component, Path, PathBuf};
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::container::ContainerImages;
use crate::error::{Error, Result};
use crate::io;
use crate::mode::{PipelineMode, Stage};
use crate::strategy::DeploymentMethod;

pub const DEFAULT_CONFIG_DIR: &str = "config";
pub const CONFIG_PATTERN: &str = "config_*.yaml";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigCandidate {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigResolution {
    /// Canonical path of the chosen config.
    pub path: PathBuf,
    pub explicit: bool,
    /// Every discovered candidate, newest first. Empty when `explicit`.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub candidates: Vec<ConfigCandidate>,
}

/// Resolve the config file to use.
///
/// An explicit name must exist inside `config_dir`; discovery is never used as
/// a fallback. Otherwise the newest `config_*.yaml` is chosen, ties going to
/// the lexicographically greatest file name.
pub fn resolve(config_dir: &Path, explicit: Option<&str>) -> Result<ConfigResolution> {
    if !config_dir.is_dir() {
        return Err(Error::config_directory_missing(
            config_dir.display().to_string(),
        ));
    }

    if let Some(name) = explicit {
        let path = explicit_path(config_dir, name)?;
        if !path.is_file() {
            return Err(Error::config_not_found(path.display().to_string()));
        }
        let path = canonicalize(&path)?;
        log_status!("config", "Using specified config: {}", path.display());
        return Ok(ConfigResolution {
            path,
            explicit: true,
            candidates: Vec::new(),
        });
    }

    let mut found = discover(config_dir)?;
    if found.is_empty() {
        return Err(Error::no_config_found(
            config_dir.display().to_string(),
            CONFIG_PATTERN,
        ));
    }

    // Newest first; equal timestamps fall back to descending name.
    found.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| b.0.cmp(&a.0)));

    let candidates: Vec<ConfigCandidate> = found
        .iter()
        .map(|(path, modified)| ConfigCandidate {
            name: file_name(path),
            modified: modified.map(|time| DateTime::<Utc>::from(time).to_rfc3339()),
        })
        .collect();

    let chosen = &found[0].0;
    log_status!("config", "Using most recent config: {}", file_name(chosen));
    if candidates.len() > 1 {
        let names: Vec<&str> = candidates.iter().map(|c| c.name.as_str()).collect();
        log_status!("config", "Available configs: {}", names.join(", "));
    }

    Ok(ConfigResolution {
        path: canonicalize(chosen)?,
        explicit: false,
        candidates,
    })
}

/// Join an explicit config name onto the directory, refusing names that
/// would leave it (absolute paths, `..`).
fn explicit_path(config_dir: &Path, name: &str) -> Result<PathBuf> {
    let inside = Path::new(name)
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    if !inside {
        return Err(Error::validation_invalid_argument(
            "config",
            format!(
                "Config name must be a file inside {}",
                config_dir.display()
            ),
            Some(name.to_string()),
            None,
        )
        .with_hint("Use --config-dir to read configs from another directory"));
    }
    Ok(config_dir.join(name))
}

fn discover(config_dir: &Path) -> Result<Vec<(PathBuf, Option<SystemTime>)>> {
    let dir = glob::Pattern::escape(&config_dir.to_string_lossy());
    let pattern = Path::new(&dir).join(CONFIG_PATTERN);
    let pattern = pattern.to_string_lossy();

    let entries = glob::glob(&pattern).map_err(|e| {
        Error::validation_invalid_argument(
            "config_dir",
            format!("Invalid glob pattern '{}': {}", pattern, e),
            Some(pattern.to_string()),
            None,
        )
    })?;

    Ok(entries
        .filter_map(|entry| entry.ok())
        .filter(|p| p.is_file())
        .map(|p| {
            let modified = p.metadata().and_then(|m| m.modified()).ok();
            (p, modified)
        })
        .collect())
}

fn canonicalize(path: &Path) -> Result<PathBuf> {
    path.canonicalize().map_err(|e| {
        Error::internal_io(
            e.to_string(),
            Some(format!("resolve config path {}", path.display())),
        )
    })
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// `project` section of the config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectSettings {
    pub deployment_method: Option<String>,
    /// `#SBATCH` options for the transform job.
    pub slurm_options: Option<String>,
    /// `#SBATCH` options for the tuning job.
    pub slurm_options_ray: Option<String>,
    pub pipeline_mode: Option<PipelineMode>,
    pub command_timeout_secs: Option<u64>,
}

/// The parts of the pipeline config the launcher reads. Other keys are left
/// for the pipeline containers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DeploymentConfig {
    pub project: ProjectSettings,
    pub containers: ContainerImages,
}

impl DeploymentConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = io::read_file(path, "read config")?;
        Self::parse(&content, &path.display().to_string())
    }

    /// Parse YAML content; `source` names it in errors.
    pub fn parse(content: &str, source: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yml::from_str(content).map_err(|e| Error::config_invalid_yaml(source, e))
    }

    /// Configured deployment method; `Docker` when the key is absent.
    pub fn deployment_method(&self) -> Result<DeploymentMethod> {
        match self.project.deployment_method.as_deref() {
            None => Ok(DeploymentMethod::Docker),
            Some(value) => DeploymentMethod::parse(value),
        }
    }

    /// Operator-supplied `#SBATCH` options for a stage, empty when unset.
    pub fn slurm_options(&self, stage: Stage) -> &str {
        let options = match stage {
            Stage::Transform => &self.project.slurm_options,
            Stage::Tuning => &self.project.slurm_options_ray,
        };
        options.as_deref().unwrap_or("")
    }

    /// Per-command deadline from `project.command_timeout_secs`.
    ///
    /// Zero is rejected: it would kill every command before it could finish.
    pub fn command_timeout(&self) -> Result<Option<Duration>> {
        match self.project.command_timeout_secs {
            Some(0) => Err(Error::config_invalid_value(
                "project.command_timeout_secs",
                Some("0".to_string()),
                "must be at least 1 second",
            )
            .with_hint("Remove project.command_timeout_secs to run without a deadline")),
            secs => Ok(secs.map(Duration::from_secs)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use std::fs::{self, File};
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str, modified: SystemTime) -> PathBuf {
        let path = dir.join(name);
        let file = File::create(&path).unwrap();
        file.set_modified(modified).unwrap();
        path
    }

    fn at(secs: u64) -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(secs)
    }

    #[test]
    fn resolve_picks_most_recent_config() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "config_b.yaml", at(1_700_000_100));
        let newest = touch(dir.path(), "config_a.yaml", at(1_700_000_300));
        touch(dir.path(), "config_c.yaml", at(1_700_000_200));

        let resolution = resolve(dir.path(), None).unwrap();

        assert_eq!(resolution.path, newest.canonicalize().unwrap());
        assert!(!resolution.explicit);
        let names: Vec<&str> = resolution.candidates.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["config_a.yaml", "config_c.yaml", "config_b.yaml"]);
    }

    #[test]
    fn resolve_breaks_timestamp_ties_by_greatest_name() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "config_20240101.yaml", at(1_700_000_000));
        let winner = touch(dir.path(), "config_20240102.yaml", at(1_700_000_000));

        for _ in 0..3 {
            let resolution = resolve(dir.path(), None).unwrap();
            assert_eq!(resolution.path, winner.canonicalize().unwrap());
        }
    }

    #[test]
    fn resolve_ignores_files_outside_pattern() {
        let dir = TempDir::new().unwrap();
        let config = touch(dir.path(), "config_main.yaml", at(1_700_000_000));
        touch(dir.path(), "notes.yaml", at(1_800_000_000));
        touch(dir.path(), "config_new.yml", at(1_800_000_000));
        fs::create_dir(dir.path().join("config_dir.yaml")).unwrap();

        let resolution = resolve(dir.path(), None).unwrap();
        assert_eq!(resolution.path, config.canonicalize().unwrap());
        assert_eq!(resolution.candidates.len(), 1);
    }

    #[test]
    fn resolve_explicit_name() {
        let dir = TempDir::new().unwrap();
        let older = touch(dir.path(), "config_old.yaml", at(1_600_000_000));
        touch(dir.path(), "config_new.yaml", at(1_700_000_000));

        let resolution = resolve(dir.path(), Some("config_old.yaml")).unwrap();
        assert_eq!(resolution.path, older.canonicalize().unwrap());
        assert!(resolution.explicit);
        assert!(resolution.candidates.is_empty());
    }

    #[test]
    fn resolve_explicit_missing_never_falls_back() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "config_new.yaml", at(1_700_000_000));

        let err = resolve(dir.path(), Some("config_missing.yaml")).unwrap_err();
        assert_eq!(err.code, ErrorCode::ConfigNotFound);
    }

    #[test]
    fn resolve_explicit_name_must_stay_inside_config_dir() {
        let root = TempDir::new().unwrap();
        let config_dir = root.path().join("config");
        fs::create_dir(&config_dir).unwrap();
        let outside = touch(root.path(), "elsewhere.yaml", at(1_700_000_000));

        let absolute = outside.to_string_lossy().into_owned();
        let err = resolve(&config_dir, Some(absolute.as_str())).unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationInvalidArgument);

        let err = resolve(&config_dir, Some("../elsewhere.yaml")).unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationInvalidArgument);
        assert_eq!(err.details["id"], "../elsewhere.yaml");
    }

    #[test]
    fn resolve_missing_directory() {
        let dir = TempDir::new().unwrap();
        let err = resolve(&dir.path().join("config"), None).unwrap_err();
        assert_eq!(err.code, ErrorCode::ConfigDirectoryMissing);
    }

    #[test]
    fn resolve_empty_directory() {
        let dir = TempDir::new().unwrap();
        let err = resolve(dir.path(), None).unwrap_err();
        assert_eq!(err.code, ErrorCode::NoConfigFound);
    }

    #[test]
    fn parse_reads_project_section() {
        let config = DeploymentConfig::parse(
            r#"
project:
  name: eeg
  deployment_method: Singularity with Slurm
  slurm_options: "--time=02:00:00 --mem=16G"
  slurm_options_ray: "--gres=gpu:1"
spark:
  executors: 4
"#,
            "inline",
        )
        .unwrap();

        assert_eq!(
            config.deployment_method().unwrap(),
            DeploymentMethod::SingularityWithSlurm
        );
        assert_eq!(config.slurm_options(Stage::Transform), "--time=02:00:00 --mem=16G");
        assert_eq!(config.slurm_options(Stage::Tuning), "--gres=gpu:1");
        assert_eq!(config.containers, ContainerImages::default());
    }

    #[test]
    fn parse_reads_mode_timeout_and_images() {
        let config = DeploymentConfig::parse(
            r#"
project:
  pipeline_mode: ray-only
  command_timeout_secs: 3600
containers:
  singularity_tuning: /images/ray.sif
"#,
            "inline",
        )
        .unwrap();

        assert_eq!(config.project.pipeline_mode, Some(PipelineMode::TuningOnly));
        assert_eq!(config.project.command_timeout_secs, Some(3600));
        assert_eq!(config.containers.singularity_tuning, "/images/ray.sif");
        assert_eq!(config.containers.singularity_transform, "eeg-pyspark.sif");
    }

    #[test]
    fn command_timeout_rejects_zero() {
        let config =
            DeploymentConfig::parse("project:\n  command_timeout_secs: 0\n", "inline").unwrap();
        let err = config.command_timeout().unwrap_err();
        assert_eq!(err.code, ErrorCode::ConfigInvalidValue);
        assert_eq!(err.details["key"], "project.command_timeout_secs");
    }

    #[test]
    fn command_timeout_is_optional() {
        let config =
            DeploymentConfig::parse("project:\n  command_timeout_secs: 90\n", "inline").unwrap();
        assert_eq!(config.command_timeout().unwrap(), Some(Duration::from_secs(90)));
        assert_eq!(DeploymentConfig::default().command_timeout().unwrap(), None);
    }

    #[test]
    fn missing_method_defaults_to_docker() {
        let config = DeploymentConfig::parse("project:\n  name: eeg\n", "inline").unwrap();
        assert_eq!(config.deployment_method().unwrap(), DeploymentMethod::Docker);
        assert_eq!(config.slurm_options(Stage::Transform), "");
    }

    #[test]
    fn unknown_method_is_rejected() {
        let config =
            DeploymentConfig::parse("project:\n  deployment_method: Kubernetes\n", "inline")
                .unwrap();
        let err = config.deployment_method().unwrap_err();
        assert_eq!(err.code, ErrorCode::UnsupportedDeploymentMethod);
    }

    #[test]
    fn invalid_yaml_is_reported() {
        let err = DeploymentConfig::parse("project: [unclosed", "config_x.yaml").unwrap_err();
        assert_eq!(err.code, ErrorCode::ConfigInvalidYaml);
        assert_eq!(err.details["path"], "config_x.yaml");
    }

    #[test]
    fn load_reads_file_from_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config_1.yaml");
        fs::write(&path, "project:\n  deployment_method: Docker\n").unwrap();

        let config = DeploymentConfig::load(&path).unwrap();
        assert_eq!(config.deployment_method().unwrap(), DeploymentMethod::Docker);
    }
}

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConfigDirectoryMissing,
    ConfigNotFound,
    NoConfigFound,
    ConfigInvalidYaml,
    ConfigInvalidValue,

    ValidationInvalidArgument,

    UnsupportedDeploymentMethod,

    JobIdExtractionError,

    ExternalCommandFailure,
    ExternalCommandTimeout,

    InternalIoError,
    InternalJsonError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ConfigDirectoryMissing => "config.directory_missing",
            ErrorCode::ConfigNotFound => "config.not_found",
            ErrorCode::NoConfigFound => "config.none_found",
            ErrorCode::ConfigInvalidYaml => "config.invalid_yaml",
            ErrorCode::ConfigInvalidValue => "config.invalid_value",

            ErrorCode::ValidationInvalidArgument => "validation.invalid_argument",

            ErrorCode::UnsupportedDeploymentMethod => "deploy.unsupported_method",

            ErrorCode::JobIdExtractionError => "slurm.job_id_extraction_failed",

            ErrorCode::ExternalCommandFailure => "external.command_failed",
            ErrorCode::ExternalCommandTimeout => "external.command_timeout",

            ErrorCode::InternalIoError => "internal.io_error",
            ErrorCode::InternalJsonError => "internal.json_error",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hint {
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct Error {
    pub code: ErrorCode,
    pub message: String,
    pub details: Value,
    pub hints: Vec<Hint>,
}

pub type Result<T> = std::result::Result<T, Error>;

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for Error {}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PathDetails {
    pub path: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NoConfigFoundDetails {
    pub directory: String,
    pub pattern: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigInvalidYamlDetails {
    pub path: String,
    pub error: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigInvalidValueDetails {
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    pub problem: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidArgumentDetails {
    pub field: String,
    pub problem: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tried: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnsupportedMethodDetails {
    pub method: String,
    pub supported: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobIdExtractionDetails {
    pub output: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalCommandFailedDetails {
    pub command: String,
    /// Exit status of the process, `-1` when it never ran or was killed by a signal.
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalCommandTimeoutDetails {
    pub command: String,
    pub timeout_secs: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InternalIoErrorDetails {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InternalJsonErrorDetails {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

fn to_details<T: Serialize>(details: T) -> Value {
    serde_json::to_value(details).unwrap_or_else(|_| Value::Object(serde_json::Map::new()))
}

impl Error {
    pub fn new(code: ErrorCode, message: impl Into<String>, details: Value) -> Self {
        Self {
            code,
            message: message.into(),
            details,
            hints: Vec::new(),
        }
    }

    pub fn config_directory_missing(path: impl Into<String>) -> Self {
        let path = path.into();
        Self::new(
            ErrorCode::ConfigDirectoryMissing,
            format!("Config directory not found at {}", path),
            to_details(PathDetails { path }),
        )
    }

    pub fn config_not_found(path: impl Into<String>) -> Self {
        let path = path.into();
        Self::new(
            ErrorCode::ConfigNotFound,
            format!("Specified config file not found: {}", path),
            to_details(PathDetails { path }),
        )
    }

    pub fn no_config_found(directory: impl Into<String>, pattern: impl Into<String>) -> Self {
        let directory = directory.into();
        let pattern = pattern.into();
        let hint = format!(
            "Create a configuration file matching '{}' in {} first",
            pattern, directory
        );
        Self::new(
            ErrorCode::NoConfigFound,
            format!("No config files found in {}", directory),
            to_details(NoConfigFoundDetails { directory, pattern }),
        )
        .with_hint(hint)
    }

    pub fn config_invalid_yaml(path: impl Into<String>, err: serde_yml::Error) -> Self {
        let path = path.into();
        Self::new(
            ErrorCode::ConfigInvalidYaml,
            format!("Invalid YAML in configuration {}", path),
            to_details(ConfigInvalidYamlDetails {
                path,
                error: err.to_string(),
            }),
        )
    }

    pub fn config_invalid_value(
        key: impl Into<String>,
        value: Option<String>,
        problem: impl Into<String>,
    ) -> Self {
        let details = to_details(ConfigInvalidValueDetails {
            key: key.into(),
            value,
            problem: problem.into(),
        });

        Self::new(
            ErrorCode::ConfigInvalidValue,
            "Invalid configuration value",
            details,
        )
    }

    pub fn validation_invalid_argument(
        field: impl Into<String>,
        problem: impl Into<String>,
        id: Option<String>,
        tried: Option<Vec<String>>,
    ) -> Self {
        let details = to_details(InvalidArgumentDetails {
            field: field.into(),
            problem: problem.into(),
            id,
            tried,
        });

        Self::new(
            ErrorCode::ValidationInvalidArgument,
            "Invalid argument",
            details,
        )
    }

    pub fn unsupported_deployment_method(method: impl Into<String>, supported: &[&str]) -> Self {
        let method = method.into();
        let hint = format!("Supported methods: {}", supported.join(", "));
        Self::new(
            ErrorCode::UnsupportedDeploymentMethod,
            format!("Unknown deployment method: {}", method),
            to_details(UnsupportedMethodDetails {
                method,
                supported: supported.iter().map(|s| s.to_string()).collect(),
            }),
        )
        .with_hint(hint)
    }

    pub fn job_id_extraction(output: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::JobIdExtractionError,
            "Failed to get job ID from sbatch output",
            to_details(JobIdExtractionDetails {
                output: output.into(),
            }),
        )
    }

    pub fn external_command_failed(details: ExternalCommandFailedDetails) -> Self {
        let message = if details.exit_code < 0 {
            format!("Command did not complete: {}", details.command)
        } else {
            format!(
                "Command exited with status {}: {}",
                details.exit_code, details.command
            )
        };
        Self::new(ErrorCode::ExternalCommandFailure, message, to_details(details))
    }

    pub fn external_command_timeout(command: impl Into<String>, timeout: std::time::Duration) -> Self {
        let command = command.into();
        Self::new(
            ErrorCode::ExternalCommandTimeout,
            format!(
                "Command exceeded its {}s deadline and was killed: {}",
                timeout.as_secs_f64(),
                command
            ),
            to_details(ExternalCommandTimeoutDetails {
                command,
                timeout_secs: timeout.as_secs_f64(),
            }),
        )
    }

    pub fn internal_io(error: impl Into<String>, context: Option<String>) -> Self {
        let details = to_details(InternalIoErrorDetails {
            error: error.into(),
            context,
        });

        Self::new(ErrorCode::InternalIoError, "IO error", details)
    }

    pub fn internal_json(error: impl Into<String>, context: Option<String>) -> Self {
        let details = to_details(InternalJsonErrorDetails {
            error: error.into(),
            context,
        });

        Self::new(ErrorCode::InternalJsonError, "JSON error", details)
    }

    pub fn with_hint(mut self, message: impl Into<String>) -> Self {
        self.hints.push(Hint {
            message: message.into(),
        });
        self
    }

    /// Exit status reported by a failed external command, if this error carries one.
    pub fn command_exit_code(&self) -> Option<i32> {
        if self.code != ErrorCode::ExternalCommandFailure {
            return None;
        }
        self.details
            .get("exitCode")
            .and_then(Value::as_i64)
            .map(|code| code as i32)
    }
}

//! Configuration loading via `ortho-config`.

use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

use crate::provision::ProvisionPolicy;

/// Default client timeout for Docker API calls, in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Default manifest consumed by `run-all`.
pub const DEFAULT_MANIFEST_PATH: &str = "containers.yaml";

/// Host URL schemes understood by the Docker client.
pub const SUPPORTED_HOST_SCHEMES: [&str; 3] = ["unix://", "tcp://", "http://"];

/// Settings for the hiveden CLI, merged from defaults, configuration files,
/// environment variables, and CLI flags.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(
    prefix = "HIVEDEN",
    discovery(
        app_name = "hiveden",
        env_var = "HIVEDEN_CONFIG_PATH",
        config_file_name = "hiveden.toml",
        dotfile_name = ".hiveden.toml",
        project_file_name = "hiveden.toml"
    )
)]
pub struct HivedenConfig {
    /// Docker daemon address such as `unix:///var/run/docker.sock` or
    /// `tcp://10.0.0.5:2375`. Local defaults (including `DOCKER_HOST`) apply
    /// when unset.
    pub docker_host: Option<String>,
    /// Client timeout for each Docker API call.
    #[ortho_config(default = DEFAULT_TIMEOUT_SECS)]
    pub timeout_secs: u64,
    /// Manifest used by `run-all` when no file is passed.
    #[ortho_config(default = DEFAULT_MANIFEST_PATH.to_owned())]
    pub manifest_path: String,
    /// Roll back the whole batch when any entry fails.
    #[ortho_config(default = false)]
    pub all_or_nothing: bool,
    /// Log filter used when `RUST_LOG` is not set.
    #[ortho_config(default = "info".to_owned())]
    pub log_level: String,
}

impl Default for HivedenConfig {
    fn default() -> Self {
        Self {
            docker_host: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            manifest_path: DEFAULT_MANIFEST_PATH.to_owned(),
            all_or_nothing: false,
            log_level: String::from("info"),
        }
    }
}

/// Metadata for a configuration field, used to generate actionable error messages.
struct FieldMetadata {
    description: &'static str,
    env_var: &'static str,
    toml_key: &'static str,
}

impl FieldMetadata {
    const fn new(description: &'static str, env_var: &'static str, toml_key: &'static str) -> Self {
        Self {
            description,
            env_var,
            toml_key,
        }
    }
}

impl HivedenConfig {
    fn require_field(value: &str, metadata: &FieldMetadata) -> Result<(), ConfigError> {
        if value.trim().is_empty() {
            return Err(ConfigError::MissingField(format!(
                "missing {}: set {} or add {} to hiveden.toml",
                metadata.description, metadata.env_var, metadata.toml_key
            )));
        }
        Ok(())
    }

    /// Loads configuration using the `ortho-config` derive, parsing CLI
    /// arguments as the highest-precedence layer.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the loader fails to merge sources.
    pub fn load_from_sources() -> Result<Self, ConfigError> {
        Self::load().map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Loads configuration without attempting to parse CLI arguments. Values
    /// still merge defaults, configuration files, and environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([std::ffi::OsString::from("hiveden")])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Client timeout as a [`Duration`].
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Batch policy selected by `all_or_nothing`.
    #[must_use]
    pub const fn provision_policy(&self) -> ProvisionPolicy {
        if self.all_or_nothing {
            ProvisionPolicy::AllOrNothing
        } else {
            ProvisionPolicy::ContinueOnError
        }
    }

    /// Configured Docker host with surrounding whitespace removed, or `None`
    /// when local defaults should be used.
    #[must_use]
    pub fn docker_host(&self) -> Option<&str> {
        self.docker_host
            .as_deref()
            .map(str::trim)
            .filter(|host| !host.is_empty())
    }

    /// Performs semantic validation. Error messages name the environment
    /// variable and TOML key that supply the offending value.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when a required field is empty
    /// and [`ConfigError::InvalidValue`] when a value is out of range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        Self::require_field(
            &self.manifest_path,
            &FieldMetadata::new("manifest path", "HIVEDEN_MANIFEST_PATH", "manifest_path"),
        )?;
        Self::require_field(
            &self.log_level,
            &FieldMetadata::new("log level", "HIVEDEN_LOG_LEVEL", "log_level"),
        )?;
        if self.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue(String::from(
                "timeout_secs must be greater than zero (HIVEDEN_TIMEOUT_SECS)",
            )));
        }
        if let Some(host) = self.docker_host() {
            if !SUPPORTED_HOST_SCHEMES
                .iter()
                .any(|scheme| host.starts_with(scheme))
            {
                return Err(ConfigError::InvalidValue(format!(
                    "docker_host '{host}' must start with one of {} (HIVEDEN_DOCKER_HOST)",
                    SUPPORTED_HOST_SCHEMES.join(", ")
                )));
            }
        }
        Ok(())
    }
}

/// Errors raised during configuration loading and validation.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// Indicates a required configuration field is empty or missing.
    #[error("missing configuration field: {0}")]
    MissingField(String),
    /// Indicates a field holds a value that cannot be used.
    #[error("invalid configuration value: {0}")]
    InvalidValue(String),
    /// Surfaces errors from the `ortho-config` loader.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
}

impl From<ortho_config::OrthoError> for ConfigError {
    fn from(value: ortho_config::OrthoError) -> Self {
        Self::Parse(value.to_string())
    }
}

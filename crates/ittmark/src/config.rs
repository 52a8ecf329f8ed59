//! Instrumentation configuration

use core::fmt;
use core::str::FromStr;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{RegionError, RegionResult};

/// Environment variable toggling instrumentation on or off
pub const ENV_ENABLED: &str = "ITTMARK_ENABLED";
/// Environment variable selecting the backend
pub const ENV_BACKEND: &str = "ITTMARK_BACKEND";
/// Environment variable naming the default domain
pub const ENV_DOMAIN: &str = "ITTMARK_DOMAIN";
/// Environment variable overriding the trace_marker path
pub const ENV_TRACE_MARKER: &str = "ITTMARK_TRACE_MARKER";

/// Default domain name used when a task is created without one
pub const DEFAULT_DOMAIN: &str = "ittmark";
/// Default ftrace marker file
pub const DEFAULT_TRACE_MARKER_PATH: &str = "/sys/kernel/debug/tracing/trace_marker";

/// Which backend receives region primitives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Native backend for the current platform
    #[default]
    Platform,
    /// Structured logging through `tracing`
    Log,
    /// Linux ftrace `trace_marker`
    TraceMarker,
    /// In-process recorder
    Memory,
    /// Discard everything
    Null,
}

impl BackendKind {
    /// Lowercase identifier as used in configuration files
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Platform => "platform",
            BackendKind::Log => "log",
            BackendKind::TraceMarker => "trace_marker",
            BackendKind::Memory => "memory",
            BackendKind::Null => "null",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = RegionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "platform" => Ok(BackendKind::Platform),
            "log" => Ok(BackendKind::Log),
            "trace_marker" | "trace-marker" => Ok(BackendKind::TraceMarker),
            "memory" => Ok(BackendKind::Memory),
            "null" | "none" => Ok(BackendKind::Null),
            other => Err(RegionError::invalid_configuration(format!(
                "unknown backend `{other}`"
            ))),
        }
    }
}

/// Instrumentation configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkupConfig {
    /// Record regions at all; when false every primitive is a no-op
    pub enabled: bool,
    /// Backend receiving the primitives
    pub backend: BackendKind,
    /// Domain used by tasks created without one
    pub default_domain: String,
    /// ftrace marker file written by the trace_marker backend
    pub trace_marker_path: PathBuf,
}

impl Default for MarkupConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            backend: BackendKind::Platform,
            default_domain: DEFAULT_DOMAIN.to_owned(),
            trace_marker_path: PathBuf::from(DEFAULT_TRACE_MARKER_PATH),
        }
    }
}

impl MarkupConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> RegionResult<()> {
        if self.default_domain.trim().is_empty() {
            return Err(RegionError::invalid_configuration(
                "default_domain must not be empty",
            ));
        }
        if self.backend == BackendKind::TraceMarker && self.trace_marker_path.as_os_str().is_empty()
        {
            return Err(RegionError::invalid_configuration(
                "trace_marker_path must be set for the trace_marker backend",
            ));
        }
        Ok(())
    }

    /// Create a configuration builder.
    #[must_use]
    pub fn builder() -> MarkupConfigBuilder {
        MarkupConfigBuilder::default()
    }

    /// Read the configuration from `ITTMARK_*` environment variables
    ///
    /// Unset variables keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable holds an unparseable value or the
    /// result fails validation.
    pub fn from_env() -> RegionResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary variable lookup
    ///
    /// # Errors
    ///
    /// See [`MarkupConfig::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> RegionResult<Self> {
        let mut config = Self::default();

        if let Some(value) = lookup(ENV_ENABLED) {
            config.enabled = parse_flag(&value)?;
        }
        if let Some(value) = lookup(ENV_BACKEND) {
            config.backend = value.parse()?;
        }
        if let Some(value) = lookup(ENV_DOMAIN) {
            config.default_domain = value;
        }
        if let Some(value) = lookup(ENV_TRACE_MARKER) {
            config.trace_marker_path = PathBuf::from(value);
        }

        config.validate()?;
        Ok(config)
    }
}

fn parse_flag(value: &str) -> RegionResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(RegionError::invalid_configuration(format!(
            "{ENV_ENABLED} must be a boolean, got `{other}`"
        ))),
    }
}

/// Builder for `MarkupConfig`.
#[derive(Debug, Default)]
pub struct MarkupConfigBuilder {
    config: MarkupConfig,
}

impl MarkupConfigBuilder {
    /// Enable or disable instrumentation.
    #[must_use]
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.config.enabled = enabled;
        self
    }

    /// Select the backend.
    #[must_use]
    pub fn backend(mut self, backend: BackendKind) -> Self {
        self.config.backend = backend;
        self
    }

    /// Set the default domain name.
    #[must_use]
    pub fn default_domain(mut self, name: impl Into<String>) -> Self {
        self.config.default_domain = name.into();
        self
    }

    /// Set the trace_marker path.
    #[must_use]
    pub fn trace_marker_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.trace_marker_path = path.into();
        self
    }

    /// Build the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn build(self) -> RegionResult<MarkupConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

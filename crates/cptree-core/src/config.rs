//! Profiler configuration.
//!
//! Configuration is read from JSON (every field optional) and can be
//! overridden from the environment:
//!
//! | Variable | Field |
//! |----------|-------|
//! | `CPTREE_MIN_SEPARATION` | `layout.min_separation` |
//! | `CPTREE_RESERVE_BATCH` | `builder.reserve_batch` |
//! | `CPTREE_CHANNEL_CAPACITY` | `builder.channel_capacity` |
//!
//! A missing configuration file is not an error; defaults are used.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Geometry parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Minimum horizontal gap between sibling subtrees at every shared depth.
    pub min_separation: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            min_separation: 1.0,
        }
    }
}

/// Tree builder parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuilderConfig {
    /// Nodes reserved at a time in structure and layout storage.
    pub reserve_batch: usize,
    /// Bound of the event channel feeding a builder worker.
    pub channel_capacity: usize,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            reserve_batch: 1024,
            channel_capacity: 4096,
        }
    }
}

/// Merge worker parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    pub thread_name: String,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            thread_name: "cptree-merge".into(),
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfilerConfig {
    pub layout: LayoutConfig,
    pub builder: BuilderConfig,
    pub merge: MergeConfig,
}

impl ProfilerConfig {
    /// Parse and validate a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a JSON file. A file that does not exist yields defaults.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(text) if text.trim().is_empty() => {
                tracing::debug!(path = %path.display(), "config file is empty, using defaults");
                Ok(Self::default())
            }
            Ok(text) => Self::from_json_str(&text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "config file not found, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(ConfigError::Io(e)),
        }
    }

    /// Apply `CPTREE_*` environment overrides and re-validate.
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup.
    pub fn with_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(v) = parse_override(&lookup, "CPTREE_MIN_SEPARATION")? {
            self.layout.min_separation = v;
        }
        if let Some(v) = parse_override(&lookup, "CPTREE_RESERVE_BATCH")? {
            self.builder.reserve_batch = v;
        }
        if let Some(v) = parse_override(&lookup, "CPTREE_CHANNEL_CAPACITY")? {
            self.builder.channel_capacity = v;
        }
        self.validate()?;
        Ok(self)
    }

    /// Reject values the core cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let sep = self.layout.min_separation;
        if !sep.is_finite() || sep < 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "layout.min_separation",
                reason: format!("must be finite and non-negative, got {sep}"),
            });
        }
        if self.builder.reserve_batch == 0 {
            return Err(ConfigError::InvalidValue {
                field: "builder.reserve_batch",
                reason: "must be at least 1".into(),
            });
        }
        if self.builder.channel_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                field: "builder.channel_capacity",
                reason: "must be at least 1".into(),
            });
        }
        Ok(())
    }
}

fn parse_override<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<T>, ConfigError> {
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    raw.trim()
        .parse()
        .map(Some)
        .map_err(|_| ConfigError::InvalidValue {
            field: key,
            reason: format!("cannot parse {raw:?}"),
        })
}

/// Failure to load configuration.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(String),
    InvalidValue { field: &'static str, reason: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error reading config: {e}"),
            Self::Parse(msg) => write!(f, "invalid config: {msg}"),
            Self::InvalidValue { field, reason } => write!(f, "invalid {field}: {reason}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

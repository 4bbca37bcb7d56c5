//! Exporter configuration
//!
//! [`ExportConfig`] is the resolved set of knobs a conversion run uses.
//! [`ConfigFile`] is its on-disk TOML form, where every field is optional and
//! CLI flags take precedence.
//!
//! # Config File Locations
//!
//! Searched in order:
//! 1. Path given with `--config`
//! 2. `./elichika-onnx.toml` (current directory)
//! 3. `~/.config/elichika/onnx-exporter.toml` (user config)
//!
//! # Example Config File
//!
//! ```toml
//! [exporter]
//! # ONNX IR version written to the model (default: 3)
//! ir_version = 3
//!
//! # Default-domain opset version (default: 8)
//! opset_version = 8
//!
//! producer_name = "elichika"
//! producer_version = "0.1"
//! graph_name = "main"
//!
//! # Base value names on `name_<location>` (default: false)
//! qualify_value_names = false
//!
//! # `dump` hides initializer payloads with at least this many elements
//! strip_threshold = 20
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_IR_VERSION: i64 = 3;
pub const DEFAULT_OPSET_VERSION: i64 = 8;
pub const DEFAULT_PRODUCER_NAME: &str = "elichika";
pub const DEFAULT_PRODUCER_VERSION: &str = "0.1";
pub const DEFAULT_GRAPH_NAME: &str = "main";
pub const DEFAULT_STRIP_THRESHOLD: usize = 20;

/// File name looked up in the current directory
pub const LOCAL_CONFIG_FILE: &str = "elichika-onnx.toml";

/// Resolved exporter settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportConfig {
    pub ir_version: i64,
    pub opset_version: i64,
    pub producer_name: String,
    pub producer_version: String,
    pub graph_name: String,
    pub qualify_value_names: bool,
    pub strip_threshold: usize,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            ir_version: DEFAULT_IR_VERSION,
            opset_version: DEFAULT_OPSET_VERSION,
            producer_name: DEFAULT_PRODUCER_NAME.to_string(),
            producer_version: DEFAULT_PRODUCER_VERSION.to_string(),
            graph_name: DEFAULT_GRAPH_NAME.to_string(),
            qualify_value_names: false,
            strip_threshold: DEFAULT_STRIP_THRESHOLD,
        }
    }
}

impl ExportConfig {
    pub fn with_producer_name(mut self, name: impl Into<String>) -> Self {
        self.producer_name = name.into();
        self
    }

    pub fn with_opset_version(mut self, version: i64) -> Self {
        self.opset_version = version;
        self
    }

    pub fn with_graph_name(mut self, name: impl Into<String>) -> Self {
        self.graph_name = name.into();
        self
    }

    pub fn with_qualified_value_names(mut self, enabled: bool) -> Self {
        self.qualify_value_names = enabled;
        self
    }
}

/// Root of a config file: an `[exporter]` section or the same keys at top level
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct RootConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    exporter: Option<ConfigFile>,

    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    direct: Option<ConfigFile>,
}

/// Exporter settings as written in TOML; all fields optional
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct ConfigFile {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ir_version: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub opset_version: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub producer_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub producer_version: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub graph_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub qualify_value_names: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub strip_threshold: Option<usize>,
}

impl ConfigFile {
    /// Load a config file in either layout; the `[exporter]` section wins
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents =
            std::fs::read_to_string(path).map_err(|e| ConfigError::IoError(path.to_path_buf(), e))?;
        let root: RootConfig =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError(path.to_path_buf(), e))?;
        Ok(root.exporter.or(root.direct).unwrap_or_default())
    }

    /// Standard locations, most specific first
    pub fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(".").join(LOCAL_CONFIG_FILE)];
        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".config/elichika/onnx-exporter.toml"));
        }
        paths
    }

    /// Load the first config file found in the standard locations
    pub fn find_and_load() -> Result<Option<Self>, ConfigError> {
        for path in Self::search_paths() {
            if path.exists() {
                tracing::debug!("Loading config from {}", path.display());
                return Self::load(&path).map(Some);
            }
        }
        Ok(None)
    }

    /// Save in the sectioned layout
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let root = RootConfig {
            exporter: Some(self.clone()),
            direct: None,
        };
        let contents = toml::to_string_pretty(&root).map_err(ConfigError::SerializeError)?;
        std::fs::write(path.as_ref(), contents)
            .map_err(|e| ConfigError::IoError(path.as_ref().to_path_buf(), e))?;
        Ok(())
    }

    /// Resolve against defaults; CLI values take precedence over the file
    pub fn merge_with_cli(&self, producer_name: Option<String>, opset_version: Option<i64>) -> ExportConfig {
        let defaults = ExportConfig::default();
        ExportConfig {
            ir_version: self.ir_version.unwrap_or(defaults.ir_version),
            opset_version: opset_version
                .or(self.opset_version)
                .unwrap_or(defaults.opset_version),
            producer_name: producer_name
                .or_else(|| self.producer_name.clone())
                .unwrap_or(defaults.producer_name),
            producer_version: self
                .producer_version
                .clone()
                .unwrap_or(defaults.producer_version),
            graph_name: self.graph_name.clone().unwrap_or(defaults.graph_name),
            qualify_value_names: self
                .qualify_value_names
                .unwrap_or(defaults.qualify_value_names),
            strip_threshold: self.strip_threshold.unwrap_or(defaults.strip_threshold),
        }
    }
}

impl From<ConfigFile> for ExportConfig {
    fn from(file: ConfigFile) -> Self {
        file.merge_with_cli(None, None)
    }
}

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {0}: {1}")]
    IoError(PathBuf, #[source] std::io::Error),

    #[error("Failed to parse config file {0}: {1}")]
    ParseError(PathBuf, #[source] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    SerializeError(#[source] toml::ser::Error),
}

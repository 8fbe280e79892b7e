//! Configuration loading and typed settings structures for the engine.
//!
//! The canonical configuration lives in `costscope.yaml` at the deployment
//! root; the `COSTSCOPE_CONFIG` environment variable points the loader at
//! an alternative path. This module defines strongly-typed structs that
//! mirror the YAML structure and a loader that reads and validates the
//! file. Every field has a default, so a missing file section simply means
//! built-in behavior.
//!
//! ```yaml
//! pipeline:
//!   normalize: true
//! normalization:
//!   baseline_chars_per_token: "4.0"
//!   entries:
//!     - provider: acme
//!       average_chars_per_token: "3.5"
//! ```

use std::path::Path;

use rust_decimal::Decimal;
use serde::Deserialize;

use crate::normalizer::TokenCountingConfig;

/// Environment variable naming the settings file to load.
pub const CONFIG_ENV_VAR: &str = "COSTSCOPE_CONFIG";

/// Settings file consulted when [`CONFIG_ENV_VAR`] is unset.
const DEFAULT_CONFIG_FILE: &str = "costscope.yaml";

/// Errors that can occur when loading settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    /// Failed to read the settings file from disk.
    #[error("failed to read settings file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse settings YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },
}

impl From<serde_yml::Error> for SettingsError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level engine settings document.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct EngineSettings {
    /// Pipeline behavior toggles.
    #[serde(default)]
    pub pipeline: PipelineSettings,

    /// Token normalization registry overrides.
    #[serde(default)]
    pub normalization: NormalizationSettings,
}

impl EngineSettings {
    /// Load settings from a YAML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::Io`] if the file cannot be read, or
    /// [`SettingsError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, SettingsError> {
        let contents = std::fs::read_to_string(path)?;
        let settings: Self = serde_yml::from_str(&contents)?;
        Ok(settings)
    }

    /// Parse settings from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, SettingsError> {
        let settings: Self = serde_yml::from_str(yaml)?;
        Ok(settings)
    }

    /// Load settings from the file named by [`CONFIG_ENV_VAR`], falling
    /// back to `costscope.yaml` in the working directory.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`EngineSettings::from_file`].
    pub fn load() -> Result<Self, SettingsError> {
        let path =
            std::env::var(CONFIG_ENV_VAR).unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_owned());
        Self::from_file(Path::new(&path))
    }
}

/// Pipeline behavior toggles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct PipelineSettings {
    /// Normalize token counts before calculating costs.
    #[serde(default = "default_normalize")]
    pub normalize: bool,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            normalize: default_normalize(),
        }
    }
}

/// Token normalization registry overrides.
///
/// Entries listed here merge over the built-in provider table; an entry
/// with the same provider and model replaces the built-in one.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NormalizationSettings {
    /// Tokenizer density that character estimates rescale onto.
    #[serde(default = "default_baseline_chars_per_token")]
    pub baseline_chars_per_token: Decimal,

    /// Registry entries to merge over the built-in defaults.
    #[serde(default)]
    pub entries: Vec<TokenCountingConfig>,
}

impl Default for NormalizationSettings {
    fn default() -> Self {
        Self {
            baseline_chars_per_token: default_baseline_chars_per_token(),
            entries: Vec::new(),
        }
    }
}

const fn default_normalize() -> bool {
    false
}

fn default_baseline_chars_per_token() -> Decimal {
    Decimal::new(40, 1)
}

//! Configuration via `asof.toml`
//!
//! Every field has a default, so an empty or missing file yields the stock
//! behavior: the session variable is `asof.snapshot`, the set-time path is
//! enabled and descriptors may list up to 65536 in-progress ids.

use asof_core::{AsOfError, Result, DEFAULT_MAX_IN_PROGRESS};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Config file name
pub const CONFIG_FILE_NAME: &str = "asof.toml";

/// Default name of the session variable
pub const DEFAULT_VARIABLE: &str = "asof.snapshot";

/// Settings for a [`Session`](crate::Session).
///
/// # Example
///
/// ```toml
/// variable = "asof.snapshot"
/// session_variable = true
/// max_in_progress = 65536
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AsOfConfig {
    /// Name of the session variable that stages a snapshot
    #[serde(default = "default_variable")]
    pub variable: String,
    /// Enable installing snapshots through the session variable
    #[serde(default = "default_session_variable")]
    pub session_variable: bool,
    /// Upper bound on in-progress ids accepted in one descriptor
    #[serde(default = "default_max_in_progress")]
    pub max_in_progress: usize,
}

fn default_variable() -> String {
    DEFAULT_VARIABLE.to_string()
}

fn default_session_variable() -> bool {
    true
}

fn default_max_in_progress() -> usize {
    DEFAULT_MAX_IN_PROGRESS
}

impl Default for AsOfConfig {
    fn default() -> Self {
        Self {
            variable: default_variable(),
            session_variable: default_session_variable(),
            max_in_progress: default_max_in_progress(),
        }
    }
}

impl AsOfConfig {
    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# asof configuration
#
# Session variable that stages a snapshot for the current transaction.
# Must be a qualified name ("<prefix>.<name>").
variable = "asof.snapshot"

# Allow installing snapshots through the session variable (default: true).
# exec_as_of works either way.
session_variable = true

# Largest number of in-progress ids accepted in one snapshot descriptor.
max_in_progress = 65536
"#
    }

    /// Parse config from TOML text and validate it.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: AsOfConfig = toml::from_str(content)
            .map_err(|e| AsOfError::config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate config from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            AsOfError::config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let config = Self::from_toml_str(&content).map_err(|e| match e {
            AsOfError::Config { reason } => {
                AsOfError::config(format!("{} ({})", reason, path.display()))
            }
            other => other,
        })?;
        info!(
            target: "asof::config",
            path = %path.display(),
            variable = %config.variable,
            "Loaded config"
        );
        Ok(config)
    }

    /// Write the default config file if it does not already exist.
    pub fn write_default_if_missing(path: &Path) -> Result<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml()).map_err(|e| {
                AsOfError::config(format!(
                    "Failed to write default config file '{}': {}",
                    path.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }

    /// Check field values.
    ///
    /// The variable name must be `prefix.name`, both parts non-empty and
    /// made of ASCII alphanumerics or `_`. `max_in_progress` must be positive.
    pub fn validate(&self) -> Result<()> {
        let mut parts = self.variable.split('.');
        let well_formed = match (parts.next(), parts.next(), parts.next()) {
            (Some(prefix), Some(name), None) => [prefix, name].iter().all(|p| {
                !p.is_empty() && p.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
            }),
            _ => false,
        };
        if !well_formed {
            return Err(AsOfError::config(format!(
                "Invalid variable name '{}'. Expected \"<prefix>.<name>\".",
                self.variable
            )));
        }
        if self.max_in_progress == 0 {
            return Err(AsOfError::config("max_in_progress must be at least 1"));
        }
        Ok(())
    }
}

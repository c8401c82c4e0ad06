//! Runtime limits and protocol strictness configuration.
//!
//! Supports TOML config files, environment variable overrides, and defaults.

use crate::error::{Result, RiftError};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

/// Decoder limits and protocol strictness knobs.
///
/// A single instance is shared by protocols, transports, and the resolver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Maximum decoded string or binary length in bytes (default: 64 MiB)
    #[serde(default = "default_string_length_limit")]
    pub string_length_limit: usize,
    /// Maximum decoded container element count (default: 1 << 24)
    #[serde(default = "default_container_length_limit")]
    pub container_length_limit: usize,
    /// Maximum nesting depth while decoding or skipping (default: 64)
    #[serde(default = "default_recursion_depth_limit")]
    pub recursion_depth_limit: usize,
    /// Maximum framed-transport frame length in bytes (default: 16 MiB)
    #[serde(default = "default_frame_size_limit")]
    pub frame_size_limit: usize,
    /// Binary protocol requires the versioned message header when reading (default: true)
    #[serde(default = "default_true")]
    pub strict_read: bool,
    /// Binary protocol emits the versioned message header when writing (default: true)
    #[serde(default = "default_true")]
    pub strict_write: bool,
    /// Accept explicit negative field ids in IDL sources (default: false)
    #[serde(default)]
    pub allow_legacy_negative_ids: bool,
    /// Directories searched for `include`d files after the including file's own directory
    #[serde(default)]
    pub include_search_paths: Vec<PathBuf>,
}

fn default_string_length_limit() -> usize {
    64 * 1024 * 1024 // 64 MiB
}

fn default_container_length_limit() -> usize {
    1 << 24
}

fn default_recursion_depth_limit() -> usize {
    64
}

fn default_frame_size_limit() -> usize {
    16 * 1024 * 1024 // 16 MiB
}

fn default_true() -> bool {
    true
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            string_length_limit: default_string_length_limit(),
            container_length_limit: default_container_length_limit(),
            recursion_depth_limit: default_recursion_depth_limit(),
            frame_size_limit: default_frame_size_limit(),
            strict_read: true,
            strict_write: true,
            allow_legacy_negative_ids: false,
            include_search_paths: Vec::new(),
        }
    }
}

impl RuntimeConfig {
    /// Creates a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| RiftError::Config(format!("Failed to read config file: {}", e)))?;
        Self::from_toml(&content)
    }

    /// Parses configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str).map_err(|e| RiftError::Config(format!("Invalid TOML: {}", e)))
    }

    /// Applies environment variable overrides.
    /// Environment variables are prefixed with `RIFT_`.
    /// Example: `RIFT_FRAME_SIZE_LIMIT=1048576` overrides `frame_size_limit`.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(val) = env::var("RIFT_STRING_LENGTH_LIMIT") {
            self.string_length_limit = val.parse().map_err(|_| {
                RiftError::Config(format!("Invalid string_length_limit: {}", val))
            })?;
        }
        if let Ok(val) = env::var("RIFT_CONTAINER_LENGTH_LIMIT") {
            self.container_length_limit = val.parse().map_err(|_| {
                RiftError::Config(format!("Invalid container_length_limit: {}", val))
            })?;
        }
        if let Ok(val) = env::var("RIFT_RECURSION_DEPTH_LIMIT") {
            self.recursion_depth_limit = val.parse().map_err(|_| {
                RiftError::Config(format!("Invalid recursion_depth_limit: {}", val))
            })?;
        }
        if let Ok(val) = env::var("RIFT_FRAME_SIZE_LIMIT") {
            self.frame_size_limit = val
                .parse()
                .map_err(|_| RiftError::Config(format!("Invalid frame_size_limit: {}", val)))?;
        }
        if let Ok(val) = env::var("RIFT_STRICT_READ") {
            self.strict_read = val
                .parse()
                .map_err(|_| RiftError::Config(format!("Invalid strict_read: {}", val)))?;
        }
        if let Ok(val) = env::var("RIFT_STRICT_WRITE") {
            self.strict_write = val
                .parse()
                .map_err(|_| RiftError::Config(format!("Invalid strict_write: {}", val)))?;
        }
        if let Ok(val) = env::var("RIFT_ALLOW_LEGACY_NEGATIVE_IDS") {
            self.allow_legacy_negative_ids = val.parse().map_err(|_| {
                RiftError::Config(format!("Invalid allow_legacy_negative_ids: {}", val))
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RuntimeConfig::default();
        assert_eq!(config.string_length_limit, 64 * 1024 * 1024);
        assert_eq!(config.container_length_limit, 1 << 24);
        assert_eq!(config.recursion_depth_limit, 64);
        assert_eq!(config.frame_size_limit, 16 * 1024 * 1024);
        assert!(config.strict_read);
        assert!(config.strict_write);
        assert!(!config.allow_legacy_negative_ids);
    }

    #[test]
    fn test_from_toml() {
        let toml = r#"
            string_length_limit = 1024
            frame_size_limit = 4096
            strict_read = false
        "#;
        let config = RuntimeConfig::from_toml(toml).unwrap();
        assert_eq!(config.string_length_limit, 1024);
        assert_eq!(config.frame_size_limit, 4096);
        assert!(!config.strict_read);
        // Unset keys fall back to defaults.
        assert_eq!(config.recursion_depth_limit, 64);
        assert!(config.strict_write);
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rift.toml");
        std::fs::write(&path, "container_length_limit = 99\n").unwrap();
        let config = RuntimeConfig::from_file(&path).unwrap();
        assert_eq!(config.container_length_limit, 99);
    }
}

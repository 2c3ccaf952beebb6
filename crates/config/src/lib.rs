//! Configuration loading and validation for wallcost.
//!
//! Loads configuration from `~/.wallcost/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.wallcost/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Where catalog and assembly records live
    #[serde(default)]
    pub storage: StorageConfig,

    /// Assembly defaults
    #[serde(default)]
    pub assemblies: AssemblyConfig,

    /// Price-list upload settings
    #[serde(default)]
    pub price_list: PriceListConfig,
}

/// Record store backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Sqlite,
    File,
    Memory,
}

impl std::str::FromStr for StorageBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sqlite" => Ok(Self::Sqlite),
            "file" => Ok(Self::File),
            "memory" | "in_memory" => Ok(Self::Memory),
            other => Err(ConfigError::ValidationError(format!(
                "unknown storage backend '{other}' (expected sqlite, file or memory)"
            ))),
        }
    }
}

impl std::fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Sqlite => "sqlite",
            Self::File => "file",
            Self::Memory => "memory",
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,

    /// Database file (sqlite) or directory (file). Defaults under `~/.wallcost/data`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl StorageConfig {
    /// The path the selected backend should use.
    pub fn resolved_path(&self) -> PathBuf {
        if let Some(path) = &self.path {
            return path.clone();
        }
        match self.backend {
            StorageBackend::Sqlite => AppConfig::data_dir().join("wallcost.db"),
            StorageBackend::File | StorageBackend::Memory => AppConfig::data_dir(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssemblyConfig {
    /// Prefix for auto-named assemblies (`WT-01`, `WT-02`, ...)
    #[serde(default = "default_name_prefix")]
    pub name_prefix: String,
}

fn default_name_prefix() -> String {
    "WT-".into()
}

impl Default for AssemblyConfig {
    fn default() -> Self {
        Self {
            name_prefix: default_name_prefix(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceListConfig {
    /// How many leading rows are searched for the header row
    #[serde(default = "default_header_scan_rows")]
    pub header_scan_rows: usize,
}

fn default_header_scan_rows() -> usize {
    10
}

impl Default for PriceListConfig {
    fn default() -> Self {
        Self {
            header_scan_rows: default_header_scan_rows(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.wallcost/config.toml).
    ///
    /// Environment overrides:
    /// - `WALLCOST_STORAGE_BACKEND` (`sqlite`, `file`, `memory`)
    /// - `WALLCOST_DATA_DIR` (storage path)
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;

        if let Ok(backend) = std::env::var("WALLCOST_STORAGE_BACKEND") {
            config.storage.backend = backend.parse()?;
        }

        if let Ok(dir) = std::env::var("WALLCOST_DATA_DIR") {
            config.storage.path = Some(PathBuf::from(dir));
        }

        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".wallcost")
    }

    /// Default directory for stored records.
    pub fn data_dir() -> PathBuf {
        Self::config_dir().join("data")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.price_list.header_scan_rows == 0 {
            return Err(ConfigError::ValidationError(
                "price_list.header_scan_rows must be at least 1".into(),
            ));
        }

        if self.assemblies.name_prefix.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "assemblies.name_prefix must not be empty".into(),
            ));
        }

        Ok(())
    }

    /// Generate a default config TOML string (for `onboard` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert_eq!(config.storage.backend, StorageBackend::Sqlite);
        assert_eq!(config.assemblies.name_prefix, "WT-");
        assert_eq!(config.price_list.header_scan_rows, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig {
            storage: StorageConfig {
                backend: StorageBackend::File,
                path: Some(PathBuf::from("/srv/wallcost")),
            },
            ..AppConfig::default()
        };
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn zero_scan_window_rejected() {
        let config = AppConfig {
            price_list: PriceListConfig { header_scan_rows: 0 },
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[storage]\nbackend = \"memory\"\n").unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert_eq!(config.assemblies.name_prefix, "WT-");
    }

    #[test]
    fn unknown_backend_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[storage]\nbackend = \"postgres\"\n").unwrap();

        assert!(matches!(
            AppConfig::load_from(&path),
            Err(ConfigError::ParseError { .. })
        ));
        assert!("postgres".parse::<StorageBackend>().is_err());
        assert_eq!("SQLite".parse::<StorageBackend>().unwrap(), StorageBackend::Sqlite);
    }

    #[test]
    fn resolved_path_defaults_per_backend() {
        let sqlite = StorageConfig::default();
        assert!(sqlite.resolved_path().ends_with("data/wallcost.db"));
        let file = StorageConfig {
            backend: StorageBackend::File,
            path: None,
        };
        assert!(file.resolved_path().ends_with(".wallcost/data"));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("sqlite"));
        assert!(toml_str.contains("WT-"));
    }
}

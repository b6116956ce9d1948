//! Configuration loading and management

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

/// Directory under the base directory holding both stores
const CACHE_DIR_NAME: &str = "SKCache";

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CacheConfig {
    /// SQLite database file of the table store
    #[serde(default = "default_table_path")]
    pub table_path: PathBuf,
    /// Directory of the file store
    #[serde(default = "default_file_dir")]
    pub file_dir: PathBuf,
    /// Payloads larger than this many bytes go to the file store under `Auto`
    #[serde(default = "default_size_threshold")]
    pub size_threshold: usize,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// "pretty" or "json"
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

// Default value functions
fn default_table_path() -> PathBuf {
    Path::new(".")
        .join(CACHE_DIR_NAME)
        .join("Database")
        .join("cache.sqlite")
}

fn default_file_dir() -> PathBuf {
    Path::new(".").join(CACHE_DIR_NAME).join("File")
}

fn default_size_threshold() -> usize {
    1024
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            table_path: default_table_path(),
            file_dir: default_file_dir(),
            size_threshold: default_size_threshold(),
            logging: LoggingConfig::default(),
        }
    }
}

impl CacheConfig {
    /// Default layout rooted at `base_dir`
    pub fn with_base_dir(base_dir: impl AsRef<Path>) -> Self {
        let root = base_dir.as_ref().join(CACHE_DIR_NAME);
        Self {
            table_path: root.join("Database").join("cache.sqlite"),
            file_dir: root.join("File"),
            ..Self::default()
        }
    }

    /// Load configuration from a TOML file, defaults if it doesn't exist
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            info!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let config: CacheConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Save configuration to a file atomically
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content =
            toml::to_string_pretty(self).with_context(|| "Failed to serialize configuration")?;

        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let temp_file = tempfile::NamedTempFile::new_in(parent)
            .with_context(|| format!("Failed to create temp file in {:?}", parent))?;

        {
            let mut file = temp_file.as_file();
            file.write_all(content.as_bytes())
                .with_context(|| "Failed to write to temp file")?;
            file.sync_all().with_context(|| "Failed to sync temp file")?;
        }

        temp_file
            .persist(path)
            .with_context(|| format!("Failed to persist config file: {:?}", path))?;

        info!("Saved configuration to {:?}", path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = CacheConfig::default();
        assert_eq!(config.size_threshold, 1024);
        assert!(config.table_path.ends_with("SKCache/Database/cache.sqlite"));
        assert!(config.file_dir.ends_with("SKCache/File"));
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_with_base_dir() {
        let config = CacheConfig::with_base_dir("/var/app");
        assert_eq!(
            config.table_path,
            PathBuf::from("/var/app/SKCache/Database/cache.sqlite")
        );
        assert_eq!(config.file_dir, PathBuf::from("/var/app/SKCache/File"));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: CacheConfig = toml::from_str(
            r#"
            size_threshold = 4096

            [logging]
            format = "json"
            "#,
        )
        .unwrap();

        assert_eq!(config.size_threshold, 4096);
        assert_eq!(config.file_dir, default_file_dir());
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = CacheConfig::load(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, CacheConfig::default());
    }

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.toml");

        let mut config = CacheConfig::with_base_dir(dir.path());
        config.size_threshold = 64;
        config.save(&path).unwrap();

        assert_eq!(CacheConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_load_rejects_invalid_toml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "size_threshold = \"lots\"").unwrap();

        let err = CacheConfig::load(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }
}

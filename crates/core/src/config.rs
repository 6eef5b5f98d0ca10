use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::language::Language;

/// Local-area quota of the host store, in bytes.
pub const DEFAULT_QUOTA_BYTES: u64 = 10 * 1024 * 1024;

/// Settings shared by every execution context. Passed explicitly; there is no
/// global instance.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct SyncConfig {
    /// Value of the enabled flag when nothing is stored or the read fails.
    #[serde(default)]
    pub enabled_default: bool,

    #[serde(default)]
    pub default_language: Language,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub store: StoreConfig,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct StoreConfig {
    /// Largest total serialized size the store accepts. `None` disables the check.
    #[serde(default = "default_quota_bytes")]
    pub quota_bytes: Option<u64>,

    /// Where the SQLite store keeps its file. `None` means in-memory.
    #[serde(default)]
    pub sqlite_path: Option<PathBuf>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_quota_bytes() -> Option<u64> {
    Some(DEFAULT_QUOTA_BYTES)
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            enabled_default: false,
            default_language: Language::default(),
            log_level: default_log_level(),
            store: StoreConfig::default(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            quota_bytes: default_quota_bytes(),
            sqlite_path: None,
        }
    }
}

impl SyncConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: SyncConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.store.quota_bytes == Some(0) {
            return Err(ConfigError::Invalid {
                field: "store.quota_bytes",
                reason: "must be greater than zero".into(),
            });
        }
        if self.log_level.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "log_level",
                reason: "must not be empty".into(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config = SyncConfig::from_toml_str("").unwrap();
        assert_eq!(config, SyncConfig::default());
        assert!(!config.enabled_default);
        assert_eq!(config.store.quota_bytes, Some(DEFAULT_QUOTA_BYTES));
    }

    #[test]
    fn fields_override_defaults() {
        let config = SyncConfig::from_toml_str(
            r#"
            enabled_default = true
            default_language = "pt-BR"
            log_level = "siteblock_engine=debug"

            [store]
            quota_bytes = 4096
            sqlite_path = "/tmp/siteblock.db"
            "#,
        )
        .unwrap();
        assert!(config.enabled_default);
        assert_eq!(config.default_language, Language::Portuguese);
        assert_eq!(config.store.quota_bytes, Some(4096));
        assert_eq!(config.store.sqlite_path, Some(PathBuf::from("/tmp/siteblock.db")));
    }

    #[test]
    fn zero_quota_is_rejected() {
        let err = SyncConfig::from_toml_str("[store]\nquota_bytes = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "store.quota_bytes", .. }));
    }

    #[test]
    fn unknown_language_is_a_parse_error() {
        let err = SyncConfig::from_toml_str("default_language = \"fr-FR\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("siteblock.toml");
        std::fs::write(&path, "enabled_default = true\n").unwrap();
        assert!(SyncConfig::load(&path).unwrap().enabled_default);
        assert!(matches!(SyncConfig::load(dir.path().join("missing.toml")), Err(ConfigError::Io(_))));
    }
}

//! Configuration management.

use serde::Deserialize;
use std::path::PathBuf;

use crate::observability::LogFormat;

/// Main configuration for custodian.
#[derive(Debug, Clone)]
pub struct CustodianConfig {
    /// Directory holding the custody database.
    pub data_dir: PathBuf,
    /// Directory holding dump artifact payloads.
    pub dump_dir: PathBuf,
    /// Feature flags.
    pub features: FeatureFlags,
    /// Default page size for listings.
    pub page_size: usize,
    /// Logging settings.
    pub logging: LoggingSettings,
}

/// Feature flags.
#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureFlags {
    /// Reject ingestion of content already held by a live evidence item.
    pub dedup_on_ingest: bool,
}

/// Logging settings.
#[derive(Debug, Clone, Default)]
pub struct LoggingSettings {
    /// Output format.
    pub format: LogFormat,
    /// Optional log file (stderr when unset).
    pub file: Option<PathBuf>,
    /// Default filter directives when `RUST_LOG` is unset.
    pub directives: String,
}

/// Configuration file structure (for TOML parsing).
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    /// Data directory.
    pub data_dir: Option<String>,
    /// Dump directory.
    pub dump_dir: Option<String>,
    /// Default page size.
    pub page_size: Option<usize>,
    /// Feature flags.
    pub features: Option<ConfigFileFeatures>,
    /// Logging section.
    pub logging: Option<ConfigFileLogging>,
}

/// Features section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileFeatures {
    /// Dedup on ingest.
    pub dedup_on_ingest: Option<bool>,
}

/// Logging section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileLogging {
    /// Format: "pretty" or "json".
    pub format: Option<String>,
    /// Log file path.
    pub file: Option<String>,
    /// Filter directives (e.g. `custodian=debug`).
    pub directives: Option<String>,
}

impl Default for CustodianConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".custodian"),
            dump_dir: PathBuf::from(".custodian").join("dumps"),
            features: FeatureFlags::default(),
            page_size: 20,
            logging: LoggingSettings {
                format: LogFormat::Pretty,
                file: None,
                directives: "custodian=info".to_string(),
            },
        }
    }
}

impl CustodianConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Path of the custody database inside the data directory.
    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("custody.db")
    }

    /// Loads configuration from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file(path: &std::path::Path) -> crate::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| crate::Error::storage("read_config_file", e))?;

        let file: ConfigFile = toml::from_str(&contents)
            .map_err(|e| crate::Error::storage("parse_config_file", e))?;

        Ok(Self::from_config_file(file))
    }

    /// Loads configuration from the default location.
    ///
    /// Checks `CUSTODIAN_CONFIG_PATH`, then the platform config dir
    /// (`~/.config/custodian/config.toml` and the OS-specific equivalent).
    /// Returns defaults if no config file is found.
    #[must_use]
    pub fn load_default() -> Self {
        if let Ok(path) = std::env::var("CUSTODIAN_CONFIG_PATH") {
            if !path.trim().is_empty() {
                if let Ok(config) = Self::load_from_file(std::path::Path::new(&path)) {
                    return config;
                }
            }
        }

        let Some(base_dirs) = directories::BaseDirs::new() else {
            return Self::default();
        };

        let platform_config = base_dirs.config_dir().join("custodian").join("config.toml");
        if platform_config.exists() {
            if let Ok(config) = Self::load_from_file(&platform_config) {
                return config;
            }
        }

        let xdg_config = base_dirs
            .home_dir()
            .join(".config")
            .join("custodian")
            .join("config.toml");
        if xdg_config.exists() {
            if let Ok(config) = Self::load_from_file(&xdg_config) {
                return config;
            }
        }

        Self::default()
    }

    /// Converts a `ConfigFile` to a `CustodianConfig`.
    fn from_config_file(file: ConfigFile) -> Self {
        let mut config = Self::default();

        if let Some(data_dir) = file.data_dir {
            config.data_dir = PathBuf::from(&data_dir);
            // The dump dir follows the data dir unless set explicitly.
            config.dump_dir = PathBuf::from(data_dir).join("dumps");
        }
        if let Some(dump_dir) = file.dump_dir {
            config.dump_dir = PathBuf::from(dump_dir);
        }
        if let Some(page_size) = file.page_size {
            config.page_size = page_size.max(1);
        }
        if let Some(features) = file.features {
            if let Some(v) = features.dedup_on_ingest {
                config.features.dedup_on_ingest = v;
            }
        }
        if let Some(logging) = file.logging {
            if let Some(format) = logging.format {
                config.logging.format = LogFormat::parse(&format);
            }
            config.logging.file = logging.file.map(PathBuf::from);
            if let Some(directives) = logging.directives {
                config.logging.directives = directives;
            }
        }

        config
    }

    /// Sets the data directory (dump dir follows).
    #[must_use]
    pub fn with_data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        self.dump_dir = path.join("dumps");
        self.data_dir = path;
        self
    }

    /// Sets the dump directory.
    #[must_use]
    pub fn with_dump_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.dump_dir = path.into();
        self
    }
}

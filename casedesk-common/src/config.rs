//! Configuration loading and root folder resolution
//!
//! Resolution priority for every setting:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. OS-dependent compiled default (fallback)
//!
//! Missing or unreadable TOML never aborts startup; it is logged and skipped.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Environment variable naming the root folder
pub const ROOT_FOLDER_ENV: &str = "CASEDESK_ROOT_FOLDER";
/// Environment variable naming the HTTP bind address
pub const BIND_ADDRESS_ENV: &str = "CASEDESK_BIND";
/// Environment variable naming the log level
pub const LOG_LEVEL_ENV: &str = "CASEDESK_LOG_LEVEL";

/// Database file name inside the root folder
pub const DATABASE_FILE: &str = "casedesk.db";
/// Default HTTP bind address
pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:5740";

/// Compiled-in defaults used when nothing else is configured
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub root_folder: PathBuf,
    pub bind_address: String,
    pub log_level: String,
}

impl CompiledDefaults {
    pub fn for_current_platform() -> Self {
        let root_folder = if cfg!(target_os = "linux") {
            // ~/.local/share/casedesk (or /var/lib/casedesk for system-wide)
            dirs::data_local_dir()
                .map(|d| d.join("casedesk"))
                .unwrap_or_else(|| PathBuf::from("/var/lib/casedesk"))
        } else if cfg!(target_os = "macos") {
            dirs::data_dir()
                .map(|d| d.join("casedesk"))
                .unwrap_or_else(|| PathBuf::from("/Library/Application Support/casedesk"))
        } else if cfg!(target_os = "windows") {
            dirs::data_local_dir()
                .map(|d| d.join("casedesk"))
                .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\casedesk"))
        } else {
            PathBuf::from("./casedesk_data")
        };

        Self {
            root_folder,
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// `[logging]` table of the TOML file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: Option<String>,
}

/// Contents of `config.toml`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TomlConfig {
    pub root_folder: Option<PathBuf>,
    pub bind_address: Option<String>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Invalid TOML in {}: {}", path.display(), e)))
}

/// Candidate config file locations, most specific first
pub fn default_config_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("casedesk").join("config.toml"));
    }
    if cfg!(unix) {
        paths.push(PathBuf::from("/etc/casedesk/config.toml"));
    }
    paths
}

/// Values supplied on the command line
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub root_folder: Option<PathBuf>,
    pub bind_address: Option<String>,
    pub log_level: Option<String>,
    /// Explicit config file, replacing the default search path
    pub config_file: Option<PathBuf>,
}

/// Fully resolved service configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    pub root_folder: PathBuf,
    pub bind_address: String,
    pub log_level: String,
}

/// Resolves [`ServiceConfig`] from all four tiers
pub struct ConfigResolver {
    cli: CliOverrides,
}

impl ConfigResolver {
    pub fn new(cli: CliOverrides) -> Self {
        Self { cli }
    }

    pub fn resolve(&self) -> ServiceConfig {
        let toml_config = self.load_toml().unwrap_or_default();
        let defaults = CompiledDefaults::for_current_platform();

        let root_folder = self
            .cli
            .root_folder
            .clone()
            .or_else(|| env_value(ROOT_FOLDER_ENV).map(PathBuf::from))
            .or(toml_config.root_folder)
            .unwrap_or(defaults.root_folder);

        let bind_address = self
            .cli
            .bind_address
            .clone()
            .or_else(|| env_value(BIND_ADDRESS_ENV))
            .or(toml_config.bind_address)
            .unwrap_or(defaults.bind_address);

        let log_level = self
            .cli
            .log_level
            .clone()
            .or_else(|| env_value(LOG_LEVEL_ENV))
            .or(toml_config.logging.level)
            .unwrap_or(defaults.log_level);

        ServiceConfig {
            root_folder,
            bind_address,
            log_level,
        }
    }

    fn load_toml(&self) -> Option<TomlConfig> {
        let candidates = match &self.cli.config_file {
            Some(path) => vec![path.clone()],
            None => default_config_paths(),
        };

        for path in candidates {
            if !path.exists() {
                debug!("No config file at {}", path.display());
                continue;
            }
            match load_toml_config(&path) {
                Ok(config) => return Some(config),
                Err(e) => {
                    warn!("Ignoring config file {}: {}", path.display(), e);
                    return None;
                }
            }
        }
        None
    }
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Prepares the root folder and names the files inside it
pub struct RootFolderInitializer {
    root_folder: PathBuf,
}

impl RootFolderInitializer {
    pub fn new(root_folder: PathBuf) -> Self {
        Self { root_folder }
    }

    /// Create the root folder if missing (idempotent)
    pub fn ensure_directory_exists(&self) -> Result<()> {
        std::fs::create_dir_all(&self.root_folder)?;
        Ok(())
    }

    pub fn database_path(&self) -> PathBuf {
        self.root_folder.join(DATABASE_FILE)
    }

    pub fn database_exists(&self) -> bool {
        self.database_path().exists()
    }
}

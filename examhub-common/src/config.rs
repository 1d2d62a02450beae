//! Bootstrap configuration loading and root folder resolution
//!
//! Settings sources, highest priority first:
//! 1. Command-line arguments
//! 2. Environment variables
//! 3. TOML configuration file
//! 4. Built-in defaults

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// Environment variable naming the root folder
pub const ROOT_FOLDER_ENV: &str = "EXAMHUB_ROOT_FOLDER";

/// Default HTTP port
pub const DEFAULT_PORT: u16 = 5000;

/// Database file name inside the root folder
pub const DATABASE_FILE: &str = "examhub.db";

/// Blob storage directory inside the root folder
pub const BLOB_DIR: &str = "blobs";

/// Bootstrap configuration loaded from TOML
///
/// Every key is optional; missing keys fall back to built-in defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TomlConfig {
    pub port: u16,
    pub bind_address: String,
    pub root_folder: Option<PathBuf>,
    pub database_path: Option<PathBuf>,
    /// Production mode: store connectivity loss at startup is fatal
    pub production: bool,
    pub storage: StorageConfig,
    pub identity: IdentityConfig,
    pub admin: Option<AdminConfig>,
    pub http: HttpConfig,
    pub logging: LoggingConfig,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind_address: "0.0.0.0".to_string(),
            root_folder: None,
            database_path: None,
            production: false,
            storage: StorageConfig::default(),
            identity: IdentityConfig::default(),
            admin: None,
            http: HttpConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Blob storage settings
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding uploaded objects (default `<root>/blobs`)
    pub root: Option<PathBuf>,
    /// URL prefix under which objects are publicly reachable
    pub public_base_url: Option<String>,
}

impl StorageConfig {
    /// Public base URL, defaulting to the service's own `/files` mount
    pub fn public_base_url_or_default(&self, port: u16) -> String {
        self.public_base_url
            .clone()
            .unwrap_or_else(|| format!("http://localhost:{}/files", port))
            .trim_end_matches('/')
            .to_string()
    }
}

/// Identity provider settings
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IdentityConfig {
    /// REST endpoint of the identity provider; in-process accounts when absent
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
}

/// Administrator account created at startup
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AdminConfig {
    pub email: String,
    pub password: String,
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HttpConfig {
    pub allowed_origins: Vec<String>,
    pub max_body_bytes: usize,
    pub request_timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "https://ueexam.vercel.app".to_string(),
                "https://ueexams.com".to_string(),
            ],
            max_body_bytes: 50 * 1024 * 1024,
            request_timeout_secs: 30,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl TomlConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
    }

    /// Load the explicitly named file, else the default location if present,
    /// else built-in defaults
    ///
    /// An explicitly named file that does not exist is an error; a missing
    /// default file is not.
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }

        match default_config_path() {
            Some(path) if path.exists() => {
                info!("Loading configuration from {}", path.display());
                Self::load(&path)
            }
            _ => {
                info!("No configuration file found, using built-in defaults");
                Ok(Self::default())
            }
        }
    }
}

/// Default configuration file location (`<config dir>/examhub/config.toml`)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("examhub").join("config.toml"))
}

/// Root folder resolution: CLI argument, environment, TOML, compiled default
#[derive(Debug, Clone, Default)]
pub struct RootFolderResolver {
    cli_arg: Option<PathBuf>,
    toml_value: Option<PathBuf>,
}

impl RootFolderResolver {
    pub fn new(cli_arg: Option<PathBuf>, toml_value: Option<PathBuf>) -> Self {
        Self {
            cli_arg,
            toml_value,
        }
    }

    pub fn resolve(&self) -> PathBuf {
        if let Some(path) = &self.cli_arg {
            return path.clone();
        }

        if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
            if !path.trim().is_empty() {
                return PathBuf::from(path);
            }
        }

        if let Some(path) = &self.toml_value {
            return path.clone();
        }

        default_root_folder()
    }
}

/// OS-dependent default root folder
pub fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("examhub"))
        .unwrap_or_else(|| PathBuf::from("./examhub_data"))
}

/// Creates the root folder and derives the paths that live inside it
#[derive(Debug, Clone)]
pub struct RootFolderInitializer {
    root: PathBuf,
}

impl RootFolderInitializer {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn ensure_directory_exists(&self) -> Result<()> {
        if !self.root.exists() {
            std::fs::create_dir_all(&self.root)?;
            info!("Created root folder: {}", self.root.display());
        }
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn database_path(&self) -> PathBuf {
        self.root.join(DATABASE_FILE)
    }

    pub fn blob_root(&self) -> PathBuf {
        self.root.join(BLOB_DIR)
    }
}

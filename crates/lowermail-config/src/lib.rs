use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use lowermail_core::{FlushPolicy, DEFAULT_PAGE_SIZE};
use serde::Deserialize;
use thiserror::Error;

pub mod credentials;

pub use credentials::{
    load_env_file, resolve_connection, resolve_connection_from_env, Connection, ServiceAccount,
    ENV_CLIENT_EMAIL, ENV_CLIENT_ID, ENV_EMULATOR_HOST, ENV_PRIVATE_KEY, ENV_PRIVATE_KEY_ID,
    ENV_PROJECT_ID,
};

const APP_DIR: &str = "lowermail";
const CONFIG_FILENAME: &str = "config.toml";

pub const DEFAULT_COLLECTION: &str = "users";
pub const MAX_PAGE_SIZE: usize = 10_000;
pub const DEFAULT_DATABASE: &str = "(default)";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub collection: String,
    pub page_size: usize,
    pub flush: FlushPolicy,
    pub firestore: FirestoreConfig,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirestoreConfig {
    pub project_id: Option<String>,
    pub database: String,
    pub emulator_host: Option<String>,
    pub credentials_file: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            collection: DEFAULT_COLLECTION.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            flush: FlushPolicy::default(),
            firestore: FirestoreConfig {
                project_id: None,
                database: DEFAULT_DATABASE.to_string(),
                emulator_host: None,
                credentials_file: None,
            },
        }
    }
}

/// Values given on the command line; they win over the settings file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub collection: Option<String>,
    pub page_size: Option<usize>,
    pub flush: Option<FlushPolicy>,
    pub credentials_file: Option<PathBuf>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing home directory")]
    MissingHomeDir,
    #[error("invalid config path: {0}")]
    InvalidConfigPath(PathBuf),
    #[error("config file not found: {0}")]
    MissingConfigFile(PathBuf),
    #[error("config file permissions too permissive: {0}")]
    InsecurePermissions(PathBuf),
    #[error("invalid collection name: {0:?}")]
    InvalidCollection(String),
    #[error("invalid page_size value: {0} (expected 1..={max})", max = MAX_PAGE_SIZE)]
    InvalidPageSize(usize),
    #[error("invalid firestore.{field} value: {value:?}")]
    InvalidFirestoreField { field: &'static str, value: String },
    #[error("missing required environment variable {0}")]
    MissingCredential(&'static str),
    #[error("env file not found: {0}")]
    MissingEnvFile(PathBuf),
    #[error("failed to load env file {path}: {source}")]
    EnvFile {
        path: PathBuf,
        #[source]
        source: dotenvy::Error,
    },
    #[error("credentials file not found: {0}")]
    MissingCredentialsFile(PathBuf),
    #[error("credentials file {path} is missing field {field}")]
    MissingCredentialField { path: PathBuf, field: &'static str },
    #[error("credentials file {path} is not a service account key (type {kind:?})")]
    UnsupportedCredentialType { path: PathBuf, kind: String },
    #[error("failed to read credentials file {path}: {source}")]
    ReadCredentials {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse credentials file {path}: {source}")]
    ParseCredentials {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    collection: Option<String>,
    page_size: Option<usize>,
    flush: Option<FlushPolicy>,
    firestore: Option<FirestoreFile>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FirestoreFile {
    project_id: Option<String>,
    database: Option<String>,
    emulator_host: Option<String>,
    credentials_file: Option<PathBuf>,
}

pub fn load(config_path: Option<PathBuf>) -> Result<AppConfig> {
    let required = config_path.is_some();
    let path = match resolve_config_path(config_path) {
        Ok(path) => path,
        Err(ConfigError::MissingHomeDir) if !required => return Ok(AppConfig::default()),
        Err(ConfigError::InvalidConfigPath(_)) if !required => return Ok(AppConfig::default()),
        Err(err) => return Err(err),
    };
    match load_at_path(&path, required)? {
        Some(config) => Ok(config),
        None => Ok(AppConfig::default()),
    }
}

pub fn resolve_config_path(custom: Option<PathBuf>) -> Result<PathBuf> {
    match custom {
        Some(path) => {
            if path.as_os_str().is_empty() {
                return Err(ConfigError::InvalidConfigPath(path));
            }
            Ok(path)
        }
        None => {
            let base = if let Some(dir) = env::var_os("XDG_CONFIG_HOME") {
                let path = PathBuf::from(dir);
                if path.as_os_str().is_empty() {
                    return Err(ConfigError::InvalidConfigPath(path));
                }
                path
            } else {
                let home = dirs::home_dir().ok_or(ConfigError::MissingHomeDir)?;
                home.join(".config")
            };
            Ok(base.join(APP_DIR).join(CONFIG_FILENAME))
        }
    }
}

impl AppConfig {
    pub fn apply(mut self, overrides: Overrides) -> Result<Self> {
        if let Some(collection) = overrides.collection {
            self.collection = validate_collection(collection)?;
        }
        if let Some(page_size) = overrides.page_size {
            self.page_size = validate_page_size(page_size)?;
        }
        if let Some(flush) = overrides.flush {
            self.flush = flush;
        }
        if let Some(path) = overrides.credentials_file {
            self.firestore.credentials_file = Some(path);
        }
        Ok(self)
    }
}

fn load_at_path(path: &Path, required: bool) -> Result<Option<AppConfig>> {
    if !path.exists() {
        if required {
            return Err(ConfigError::MissingConfigFile(path.to_path_buf()));
        }
        return Ok(None);
    }

    ensure_permissions(path)?;
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let parsed: ConfigFile = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(Some(merge_config(parsed)?))
}

fn merge_config(parsed: ConfigFile) -> Result<AppConfig> {
    let mut config = AppConfig::default();

    if let Some(collection) = parsed.collection {
        config.collection = validate_collection(collection)?;
    }
    if let Some(page_size) = parsed.page_size {
        config.page_size = validate_page_size(page_size)?;
    }
    if let Some(flush) = parsed.flush {
        config.flush = flush;
    }

    if let Some(firestore) = parsed.firestore {
        if let Some(project_id) = firestore.project_id {
            config.firestore.project_id =
                Some(require_non_empty("project_id", project_id)?);
        }
        if let Some(database) = firestore.database {
            config.firestore.database = require_non_empty("database", database)?;
        }
        if let Some(host) = firestore.emulator_host {
            config.firestore.emulator_host = Some(require_non_empty("emulator_host", host)?);
        }
        if let Some(path) = firestore.credentials_file {
            if path.as_os_str().is_empty() {
                return Err(ConfigError::InvalidFirestoreField {
                    field: "credentials_file",
                    value: String::new(),
                });
            }
            config.firestore.credentials_file = Some(path);
        }
    }

    Ok(config)
}

fn validate_collection(value: String) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed.contains('/') {
        return Err(ConfigError::InvalidCollection(value));
    }
    Ok(trimmed.to_string())
}

fn validate_page_size(value: usize) -> Result<usize> {
    if value == 0 || value > MAX_PAGE_SIZE {
        return Err(ConfigError::InvalidPageSize(value));
    }
    Ok(value)
}

fn require_non_empty(field: &'static str, value: String) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::InvalidFirestoreField { field, value });
    }
    Ok(trimmed.to_string())
}

#[cfg(unix)]
fn ensure_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let metadata = fs::metadata(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let mode = metadata.permissions().mode();
    if mode & 0o077 != 0 {
        return Err(ConfigError::InsecurePermissions(path.to_path_buf()));
    }
    Ok(())
}

#[cfg(not(unix))]
fn ensure_permissions(_path: &Path) -> Result<()> {
    Ok(())
}

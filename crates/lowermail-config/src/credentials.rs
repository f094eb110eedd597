use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::{AppConfig, ConfigError, Result};

pub const ENV_PROJECT_ID: &str = "GCLOUD_PROJECT_ID";
pub const ENV_PRIVATE_KEY_ID: &str = "SERVICE_ACCOUNT_PRIVATE_KEY_ID";
pub const ENV_PRIVATE_KEY: &str = "SERVICE_ACCOUNT_PRIVATE_KEY";
pub const ENV_CLIENT_EMAIL: &str = "SERVICE_ACCOUNT_CLIENT_EMAIL";
pub const ENV_CLIENT_ID: &str = "SERVICE_ACCOUNT_CLIENT_ID";
pub const ENV_EMULATOR_HOST: &str = "FIRESTORE_EMULATOR_HOST";

const DEFAULT_ENV_FILE: &str = ".env";
const SERVICE_ACCOUNT_TYPE: &str = "service_account";

/// Identity material for a service account. The private key never appears
/// in `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct ServiceAccount {
    pub project_id: String,
    pub private_key_id: String,
    pub private_key: String,
    pub client_email: String,
    pub client_id: String,
}

impl fmt::Debug for ServiceAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccount")
            .field("project_id", &self.project_id)
            .field("private_key_id", &self.private_key_id)
            .field("private_key", &"<redacted>")
            .field("client_email", &self.client_email)
            .field("client_id", &self.client_id)
            .finish()
    }
}

impl ServiceAccount {
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let require = |name: &'static str| -> Result<String> {
            lookup(name)
                .filter(|value| !value.trim().is_empty())
                .ok_or(ConfigError::MissingCredential(name))
        };
        Ok(Self {
            project_id: require(ENV_PROJECT_ID)?.trim().to_string(),
            private_key_id: require(ENV_PRIVATE_KEY_ID)?.trim().to_string(),
            private_key: expand_key_escapes(&require(ENV_PRIVATE_KEY)?),
            client_email: require(ENV_CLIENT_EMAIL)?.trim().to_string(),
            client_id: require(ENV_CLIENT_ID)?.trim().to_string(),
        })
    }

    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Reads a downloaded service-account JSON key.
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ConfigError::MissingCredentialsFile(path.to_path_buf()));
        }
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::ReadCredentials {
            path: path.to_path_buf(),
            source,
        })?;
        let parsed: CredentialsFile =
            serde_json::from_str(&contents).map_err(|source| ConfigError::ParseCredentials {
                path: path.to_path_buf(),
                source,
            })?;

        if let Some(kind) = parsed.kind.as_deref() {
            if kind != SERVICE_ACCOUNT_TYPE {
                return Err(ConfigError::UnsupportedCredentialType {
                    path: path.to_path_buf(),
                    kind: kind.to_string(),
                });
            }
        }

        let require = |field: &'static str, value: Option<String>| -> Result<String> {
            value
                .filter(|value| !value.trim().is_empty())
                .ok_or_else(|| ConfigError::MissingCredentialField {
                    path: path.to_path_buf(),
                    field,
                })
        };
        Ok(Self {
            project_id: require("project_id", parsed.project_id)?,
            private_key_id: require("private_key_id", parsed.private_key_id)?,
            private_key: require("private_key", parsed.private_key)?,
            client_email: require("client_email", parsed.client_email)?,
            client_id: require("client_id", parsed.client_id)?,
        })
    }
}

#[derive(Debug, Deserialize)]
struct CredentialsFile {
    #[serde(rename = "type")]
    kind: Option<String>,
    project_id: Option<String>,
    private_key_id: Option<String>,
    private_key: Option<String>,
    client_email: Option<String>,
    client_id: Option<String>,
}

/// How to reach the database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Connection {
    ServiceAccount {
        project_id: String,
        account: ServiceAccount,
    },
    Emulator {
        project_id: String,
        host: String,
    },
}

impl Connection {
    pub fn project_id(&self) -> &str {
        match self {
            Connection::ServiceAccount { project_id, .. } => project_id,
            Connection::Emulator { project_id, .. } => project_id,
        }
    }
}

/// Picks the connection mode and validates every credential it needs.
///
/// An emulator host (settings file first, then the environment) only needs a
/// project id. Otherwise a credentials file wins over the environment
/// variables. `firestore.project_id` overrides the account's project.
pub fn resolve_connection(
    config: &AppConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<Connection> {
    let non_empty = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

    let emulator_host = config
        .firestore
        .emulator_host
        .clone()
        .or_else(|| non_empty(ENV_EMULATOR_HOST));
    if let Some(host) = emulator_host {
        let project_id = config
            .firestore
            .project_id
            .clone()
            .or_else(|| non_empty(ENV_PROJECT_ID))
            .ok_or(ConfigError::MissingCredential(ENV_PROJECT_ID))?;
        return Ok(Connection::Emulator {
            project_id: project_id.trim().to_string(),
            host: host.trim().to_string(),
        });
    }

    let account = match &config.firestore.credentials_file {
        Some(path) => ServiceAccount::from_file(path)?,
        None => ServiceAccount::from_lookup(&lookup)?,
    };
    let project_id = config
        .firestore
        .project_id
        .clone()
        .unwrap_or_else(|| account.project_id.clone());
    Ok(Connection::ServiceAccount {
        project_id,
        account,
    })
}

pub fn resolve_connection_from_env(config: &AppConfig) -> Result<Connection> {
    resolve_connection(config, |name| env::var(name).ok())
}

/// Loads `KEY=value` pairs into the process environment without replacing
/// variables that are already set. An explicit path must exist; otherwise
/// `./.env` is read when present. Returns the file that was loaded.
pub fn load_env_file(path: Option<&Path>) -> Result<Option<PathBuf>> {
    let (path, required) = match path {
        Some(path) => (path.to_path_buf(), true),
        None => (PathBuf::from(DEFAULT_ENV_FILE), false),
    };
    if !path.exists() {
        if required {
            return Err(ConfigError::MissingEnvFile(path));
        }
        return Ok(None);
    }
    dotenvy::from_path(&path).map_err(|source| ConfigError::EnvFile {
        path: path.clone(),
        source,
    })?;
    Ok(Some(path))
}

// Keys pasted into env files often carry literal `\n` sequences.
fn expand_key_escapes(value: &str) -> String {
    value.replace("\\n", "\n")
}

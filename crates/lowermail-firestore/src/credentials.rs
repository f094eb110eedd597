use crate::error::Result;
use lowermail_config::ServiceAccount;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
pub const TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
pub const AUTH_PROVIDER_CERT_URL: &str = "https://www.googleapis.com/oauth2/v1/certs";
pub const CLIENT_CERT_URL_BASE: &str = "https://www.googleapis.com/robot/v1/metadata/x509/";

const SERVICE_ACCOUNT_TYPE: &str = "service_account";

/// The service-account key document, as Google issues it.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceAccountKey {
    #[serde(rename = "type")]
    pub kind: String,
    pub project_id: String,
    pub private_key_id: String,
    pub private_key: String,
    pub client_email: String,
    pub client_id: String,
    pub auth_uri: String,
    pub token_uri: String,
    pub auth_provider_x509_cert_url: String,
    pub client_x509_cert_url: String,
}

impl ServiceAccountKey {
    pub fn from_account(account: &ServiceAccount) -> Self {
        Self {
            kind: SERVICE_ACCOUNT_TYPE.to_string(),
            project_id: account.project_id.clone(),
            private_key_id: account.private_key_id.clone(),
            private_key: account.private_key.clone(),
            client_email: account.client_email.clone(),
            client_id: account.client_id.clone(),
            auth_uri: AUTH_URI.to_string(),
            token_uri: TOKEN_URI.to_string(),
            auth_provider_x509_cert_url: AUTH_PROVIDER_CERT_URL.to_string(),
            client_x509_cert_url: format!("{CLIENT_CERT_URL_BASE}{}", account.client_email),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(data: &str) -> Result<Self> {
        Ok(serde_json::from_str(data)?)
    }
}

impl fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("project_id", &self.project_id)
            .field("private_key_id", &self.private_key_id)
            .field("private_key", &"<redacted>")
            .field("client_email", &self.client_email)
            .field("token_uri", &self.token_uri)
            .finish_non_exhaustive()
    }
}

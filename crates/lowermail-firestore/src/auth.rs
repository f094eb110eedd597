use crate::credentials::ServiceAccountKey;
use crate::error::{FirestoreError, Result};
use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use tracing::debug;

pub const DATASTORE_SCOPE: &str = "https://www.googleapis.com/auth/datastore";

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
const REFRESH_MARGIN_SECS: i64 = 60;
const EMULATOR_TOKEN: &str = "owner";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Claims {
    pub iss: String,
    pub scope: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn for_key(key: &ServiceAccountKey, now_utc: i64) -> Self {
        Self {
            iss: key.client_email.clone(),
            scope: DATASTORE_SCOPE.to_string(),
            aud: key.token_uri.clone(),
            iat: now_utc,
            exp: now_utc + ASSERTION_LIFETIME_SECS,
        }
    }
}

#[derive(Debug, Clone)]
struct AccessToken {
    value: String,
    expires_at: i64,
}

impl AccessToken {
    fn is_fresh(&self, now_utc: i64) -> bool {
        now_utc < self.expires_at - REFRESH_MARGIN_SECS
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct TokenError {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Source of bearer tokens for API requests.
pub struct Auth {
    mode: AuthMode,
}

enum AuthMode {
    ServiceAccount {
        key: ServiceAccountKey,
        signing_key: EncodingKey,
        cached: RefCell<Option<AccessToken>>,
    },
    Emulator,
}

impl Auth {
    /// Parses the private key up front so a bad key fails before any request.
    pub fn service_account(key: ServiceAccountKey) -> Result<Self> {
        let signing_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())?;
        Ok(Self {
            mode: AuthMode::ServiceAccount {
                key,
                signing_key,
                cached: RefCell::new(None),
            },
        })
    }

    pub fn emulator() -> Self {
        Self {
            mode: AuthMode::Emulator,
        }
    }

    pub fn is_emulator(&self) -> bool {
        matches!(self.mode, AuthMode::Emulator)
    }

    pub fn bearer(&self, http: &Client) -> Result<String> {
        match &self.mode {
            AuthMode::Emulator => Ok(EMULATOR_TOKEN.to_string()),
            AuthMode::ServiceAccount {
                key,
                signing_key,
                cached,
            } => {
                let now = Utc::now().timestamp();
                if let Some(token) = cached.borrow().as_ref().filter(|token| token.is_fresh(now)) {
                    return Ok(token.value.clone());
                }
                let token = exchange_token(http, key, signing_key, now)?;
                let value = token.value.clone();
                *cached.borrow_mut() = Some(token);
                Ok(value)
            }
        }
    }
}

pub fn signed_assertion(
    key: &ServiceAccountKey,
    signing_key: &EncodingKey,
    now_utc: i64,
) -> Result<String> {
    let header = Header {
        kid: Some(key.private_key_id.clone()),
        ..Header::new(Algorithm::RS256)
    };
    Ok(jsonwebtoken::encode(
        &header,
        &Claims::for_key(key, now_utc),
        signing_key,
    )?)
}

fn exchange_token(
    http: &Client,
    key: &ServiceAccountKey,
    signing_key: &EncodingKey,
    now_utc: i64,
) -> Result<AccessToken> {
    let assertion = signed_assertion(key, signing_key, now_utc)?;
    let body = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("grant_type", JWT_BEARER_GRANT)
        .append_pair("assertion", &assertion)
        .finish();

    debug!(token_uri = %key.token_uri, client_email = %key.client_email, "requesting access token");
    let response = http
        .post(&key.token_uri)
        .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(body)
        .send()?;
    let status = response.status();
    let text = response.text()?;
    if !status.is_success() {
        return Err(FirestoreError::Auth(describe_token_error(status.as_u16(), &text)));
    }

    let parsed: TokenResponse = serde_json::from_str(&text)?;
    Ok(AccessToken {
        value: parsed.access_token,
        expires_at: now_utc + parsed.expires_in.unwrap_or(ASSERTION_LIFETIME_SECS),
    })
}

fn describe_token_error(status: u16, body: &str) -> String {
    match serde_json::from_str::<TokenError>(body) {
        Ok(TokenError {
            error,
            error_description: Some(description),
        }) => format!("{status} {error}: {description}"),
        Ok(TokenError { error, .. }) => format!("{status} {error}"),
        Err(_) => format!("{status} {}", body.trim()),
    }
}

#[cfg(test)]
mod tests {
    use super::{describe_token_error, AccessToken, Auth, Claims, DATASTORE_SCOPE};
    use crate::credentials::{ServiceAccountKey, TOKEN_URI};
    use crate::error::FirestoreError;
    use lowermail_config::ServiceAccount;

    fn key(private_key: &str) -> ServiceAccountKey {
        ServiceAccountKey::from_account(&ServiceAccount {
            project_id: "demo-project".to_string(),
            private_key_id: "key-1".to_string(),
            private_key: private_key.to_string(),
            client_email: "migrator@demo-project.iam.gserviceaccount.com".to_string(),
            client_id: "1234567890".to_string(),
        })
    }

    #[test]
    fn claims_target_token_endpoint_for_one_hour() {
        let claims = Claims::for_key(&key("unused"), 1_700_000_000);
        assert_eq!(claims.iss, "migrator@demo-project.iam.gserviceaccount.com");
        assert_eq!(claims.aud, TOKEN_URI);
        assert_eq!(claims.scope, DATASTORE_SCOPE);
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn invalid_private_key_is_rejected_up_front() {
        let result = Auth::service_account(key("not a pem key"));
        assert!(matches!(result, Err(FirestoreError::Jwt(_))));
    }

    #[test]
    fn tokens_refresh_before_expiry() {
        let token = AccessToken {
            value: "t".to_string(),
            expires_at: 1_000,
        };
        assert!(token.is_fresh(900));
        assert!(!token.is_fresh(940));
        assert!(!token.is_fresh(1_000));
    }

    #[test]
    fn token_errors_include_description() {
        let message = describe_token_error(
            400,
            r#"{"error":"invalid_grant","error_description":"Invalid JWT Signature."}"#,
        );
        assert_eq!(message, "400 invalid_grant: Invalid JWT Signature.");
        assert_eq!(describe_token_error(502, " bad gateway "), "502 bad gateway");
    }
}

use crate::auth::Auth;
use crate::collection::{BulkWriter, FirestoreCollection};
use crate::credentials::ServiceAccountKey;
use crate::error::{FirestoreError, Result};
use crate::wire::{
    BatchWriteRequest, BatchWriteResponse, ErrorBody, RunQueryRequest, RunQueryResponse,
};
use lowermail_config::Connection;
use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://firestore.googleapis.com/v1/";
pub const USER_AGENT: &str = "lowermail";

/// Blocking client for one Firestore database.
pub struct FirestoreClient {
    http: Client,
    base_url: Url,
    project_id: String,
    database: String,
    auth: Auth,
}

impl FirestoreClient {
    pub fn connect(connection: &Connection, database: &str) -> Result<Self> {
        let (base_url, auth) = match connection {
            Connection::Emulator { host, .. } => {
                (Url::parse(&format!("http://{host}/v1/"))?, Auth::emulator())
            }
            Connection::ServiceAccount { account, .. } => {
                let key = ServiceAccountKey::from_account(account);
                (Url::parse(DEFAULT_BASE_URL)?, Auth::service_account(key)?)
            }
        };
        Self::with_auth(base_url, connection.project_id(), database, auth)
    }

    pub fn with_auth(base_url: Url, project_id: &str, database: &str, auth: Auth) -> Result<Self> {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            http,
            base_url,
            project_id: project_id.to_string(),
            database: database.to_string(),
            auth,
        })
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn is_emulator(&self) -> bool {
        self.auth.is_emulator()
    }

    pub fn documents_path(&self) -> String {
        format!(
            "projects/{}/databases/{}/documents",
            self.project_id, self.database
        )
    }

    pub fn document_name(&self, collection: &str, id: &str) -> String {
        format!("{}/{}/{}", self.documents_path(), collection, id)
    }

    pub fn collection(&self, name: &str) -> FirestoreCollection<'_> {
        FirestoreCollection::new(self, name)
    }

    pub fn bulk_writer(&self, collection: &str) -> BulkWriter<'_> {
        BulkWriter::new(self, collection)
    }

    pub fn run_query(&self, request: &RunQueryRequest) -> Result<Vec<RunQueryResponse>> {
        let elements: Vec<RunQueryResponse> = self.post("runQuery", request)?;
        check_query_stream(elements)
    }

    pub fn batch_write(&self, request: &BatchWriteRequest) -> Result<BatchWriteResponse> {
        self.post("batchWrite", request)
    }

    fn endpoint(&self, method: &str) -> Result<Url> {
        Ok(self
            .base_url
            .join(&format!("{}:{}", self.documents_path(), method))?)
    }

    fn post<T: Serialize, R: DeserializeOwned>(&self, method: &str, body: &T) -> Result<R> {
        let url = self.endpoint(method)?;
        let token = self.auth.bearer(&self.http)?;
        let payload = serde_json::to_vec(body)?;
        debug!(%url, bytes = payload.len(), "firestore request");

        let response = self
            .http
            .post(url)
            .bearer_auth(token)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json")
            .body(payload)
            .send()?;
        let status = response.status();
        let text = response.text()?;
        if !status.is_success() {
            return Err(api_error(status.as_u16(), &text));
        }
        Ok(serde_json::from_str(&text)?)
    }
}

/// A `runQuery` stream can carry an error element after a 200 status.
fn check_query_stream(elements: Vec<RunQueryResponse>) -> Result<Vec<RunQueryResponse>> {
    if let Some(status) = elements.iter().find_map(|element| element.error.as_ref()) {
        return Err(FirestoreError::Api {
            status: 200,
            message: format!("query stream error {}: {}", status.code, status.message),
        });
    }
    Ok(elements)
}

fn api_error(status: u16, body: &str) -> FirestoreError {
    let message = match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) if !parsed.error.status.is_empty() => {
            format!("{}: {}", parsed.error.status, parsed.error.message)
        }
        Ok(parsed) => parsed.error.message,
        Err(_) => body.trim().to_string(),
    };
    FirestoreError::Api { status, message }
}

#[cfg(test)]
mod tests {
    use super::{api_error, check_query_stream, FirestoreClient};
    use crate::error::FirestoreError;
    use crate::wire::RunQueryResponse;
    use lowermail_config::Connection;
    use serde_json::json;

    fn emulator_client() -> FirestoreClient {
        FirestoreClient::connect(
            &Connection::Emulator {
                project_id: "demo-project".to_string(),
                host: "localhost:8080".to_string(),
            },
            "(default)",
        )
        .expect("client")
    }

    #[test]
    fn emulator_connection_uses_plain_http() {
        let client = emulator_client();
        assert!(client.is_emulator());
        assert_eq!(client.base_url().as_str(), "http://localhost:8080/v1/");
        assert_eq!(client.project_id(), "demo-project");
    }

    #[test]
    fn endpoints_address_the_documents_root() {
        let client = emulator_client();
        assert_eq!(
            client.endpoint("runQuery").expect("url").as_str(),
            "http://localhost:8080/v1/projects/demo-project/databases/(default)/documents:runQuery"
        );
        assert_eq!(
            client.document_name("users", "u1"),
            "projects/demo-project/databases/(default)/documents/users/u1"
        );
    }

    #[test]
    fn api_errors_surface_server_message() {
        let err = api_error(
            403,
            r#"{"error":{"code":403,"message":"Missing or insufficient permissions.","status":"PERMISSION_DENIED"}}"#,
        );
        match err {
            FirestoreError::Api { status, message } => {
                assert_eq!(status, 403);
                assert_eq!(
                    message,
                    "PERMISSION_DENIED: Missing or insufficient permissions."
                );
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn query_stream_error_element_is_fatal() {
        let elements: Vec<RunQueryResponse> = serde_json::from_value(json!([
            {
                "document": {
                    "name": "projects/demo-project/databases/(default)/documents/users/u1",
                    "fields": {}
                },
                "readTime": "2024-02-01T00:00:00Z"
            },
            { "error": { "code": 4, "message": "Deadline exceeded." } }
        ]))
        .expect("parse stream");

        match check_query_stream(elements) {
            Err(FirestoreError::Api { status, message }) => {
                assert_eq!(status, 200);
                assert_eq!(message, "query stream error 4: Deadline exceeded.");
            }
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn query_stream_without_errors_passes_through() {
        let elements: Vec<RunQueryResponse> = serde_json::from_value(json!([
            {
                "document": {
                    "name": "projects/demo-project/databases/(default)/documents/users/u1"
                }
            },
            { "readTime": "2024-02-01T00:00:00Z" }
        ]))
        .expect("parse stream");

        let checked = check_query_stream(elements).expect("no error");
        assert_eq!(checked.len(), 2);
        assert!(checked[0].document.is_some());
        assert!(checked[1].document.is_none());
    }
}

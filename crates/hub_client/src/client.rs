//! Persistence backend HTTP client.
//!
//! Blocking reqwest client (no Tokio runtime required).
//! Covers the document lifecycle: check-and-load → save → rename → rollback.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use sheetpilot_protocol::rest::{
    LoadQuery, LoadResponse, RenameRequest, RenameResponse, RollbackRequest, RollbackResponse,
    SaveRequest, SaveResponse, CHECK_AND_LOAD_PATH, CREATE_PATH, RENAME_PATH, ROLLBACK_PATH,
};

use crate::auth::{load_auth, AuthCredentials};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Persistence API client (blocking).
#[derive(Clone)]
pub struct HubClient {
    http: reqwest::blocking::Client,
    api_base: String,
    token: String,
    user_id: Option<String>,
}

/// Error type for hub operations.
#[derive(Debug)]
pub enum HubError {
    /// No auth credentials configured
    NotAuthenticated,
    /// Network error
    Network(String),
    /// HTTP error with status code
    Http(u16, String),
    /// JSON parsing error
    Parse(String),
    /// Server returned a validation error (4xx with message)
    Validation(String),
    /// Request did not complete within the client timeout
    Timeout(String),
    /// Write rejected because the server holds a newer lock version (HTTP 409)
    Conflict { server_lock_version: Option<u64> },
    /// Server answered 2xx with `success: false`
    Rejected(String),
}

impl std::fmt::Display for HubError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HubError::NotAuthenticated => write!(f, "Not authenticated, run `sheetpilot login` first"),
            HubError::Network(msg) => write!(f, "Network error: {}", msg),
            HubError::Http(code, msg) => write!(f, "HTTP {}: {}", code, msg),
            HubError::Parse(msg) => write!(f, "Parse error: {}", msg),
            HubError::Validation(msg) => write!(f, "{}", msg),
            HubError::Timeout(msg) => write!(f, "Timeout: {}", msg),
            HubError::Conflict { server_lock_version: Some(v) } => {
                write!(f, "Version conflict: server is at lock version {}", v)
            }
            HubError::Conflict { server_lock_version: None } => {
                write!(f, "Version conflict: document was changed elsewhere")
            }
            HubError::Rejected(msg) => write!(f, "Rejected by server: {}", msg),
        }
    }
}

impl std::error::Error for HubError {}

impl HubClient {
    /// Create a new client using saved auth credentials.
    pub fn from_saved_auth() -> Result<Self, HubError> {
        let creds = load_auth().ok_or(HubError::NotAuthenticated)?;
        Self::new(creds)
    }

    /// Create a new client with explicit credentials.
    pub fn new(creds: AuthCredentials) -> Result<Self, HubError> {
        Self::with_timeout(creds, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(creds: AuthCredentials, timeout: Duration) -> Result<Self, HubError> {
        let http = reqwest::blocking::Client::builder()
            .user_agent(format!("sheetpilot/{}", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| HubError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            api_base: creds.api_base.trim_end_matches('/').to_string(),
            token: creds.token,
            user_id: creds.user_id,
        })
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// User identity from the saved credentials, if any.
    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    /// Fetch the stored document (and chat session) for a document/chat pair.
    pub fn check_and_load(&self, query: &LoadQuery) -> Result<LoadResponse, HubError> {
        let url = format!("{}{}", self.api_base, CHECK_AND_LOAD_PATH);
        let resp = self.get(&url, query)?;
        parse(resp)
    }

    /// Persist a document snapshot. The request carries the last observed lock version.
    pub fn save(&self, req: &SaveRequest) -> Result<SaveResponse, HubError> {
        let url = format!("{}{}", self.api_base, CREATE_PATH);
        let resp: SaveResponse = parse(self.post_json(&url, req)?)?;
        if !resp.success {
            return Err(HubError::Rejected(resp.message));
        }
        Ok(resp)
    }

    pub fn rename(&self, req: &RenameRequest) -> Result<RenameResponse, HubError> {
        let url = format!("{}{}", self.api_base, RENAME_PATH);
        let resp: RenameResponse = parse(self.post_json(&url, req)?)?;
        if !resp.success {
            return Err(HubError::Rejected(resp.message));
        }
        Ok(resp)
    }

    /// Ask the server to revert the document to the state at `target_branch_id`.
    pub fn rollback(&self, req: &RollbackRequest) -> Result<RollbackResponse, HubError> {
        let url = format!("{}{}", self.api_base, ROLLBACK_PATH);
        let resp = self.post_json(&url, req)?;
        parse(resp)
    }

    // ── Internal helpers ────────────────────────────────────────────

    fn get<Q: Serialize + ?Sized>(
        &self,
        url: &str,
        query: &Q,
    ) -> Result<reqwest::blocking::Response, HubError> {
        let response = self.http.get(url)
            .bearer_auth(&self.token)
            .query(query)
            .send()
            .map_err(send_error)?;
        check_status(response)
    }

    fn post_json<B: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<reqwest::blocking::Response, HubError> {
        let response = self.http.post(url)
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .map_err(send_error)?;
        check_status(response)
    }
}

fn send_error(e: reqwest::Error) -> HubError {
    if e.is_timeout() {
        HubError::Timeout(e.to_string())
    } else {
        HubError::Network(e.to_string())
    }
}

fn check_status(response: reqwest::blocking::Response) -> Result<reqwest::blocking::Response, HubError> {
    let status = response.status().as_u16();
    if response.status().is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    match status {
        409 => Err(HubError::Conflict {
            server_lock_version: conflict_lock_version(&body),
        }),
        400 | 422 => Err(HubError::Validation(body)),
        _ => Err(HubError::Http(status, body)),
    }
}

fn parse<T: DeserializeOwned>(response: reqwest::blocking::Response) -> Result<T, HubError> {
    response.json::<T>().map_err(|e| HubError::Parse(e.to_string()))
}

/// Servers report the authoritative version in a 409 body as `lockVersion`
/// (or `currentLockVersion`). Either may be a number or a numeric string.
fn conflict_lock_version(body: &str) -> Option<u64> {
    let json: serde_json::Value = serde_json::from_str(body).ok()?;
    ["lockVersion", "currentLockVersion"].iter().find_map(|key| {
        json[*key]
            .as_u64()
            .or_else(|| json[*key].as_str().and_then(|s| s.parse().ok()))
    })
}

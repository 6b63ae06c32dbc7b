//! Outbound gateway to the Taskboard REST backend.
//!
//! Every backend call goes through [`ApiClient::execute`], which attaches the
//! session's bearer credential and recovers from one authorization failure
//! per request by refreshing the session and re-issuing the request.
//!
//! Endpoint wrappers live in the submodules, grouped by resource.

pub mod account;
pub mod auth;
pub mod lists;
pub mod tasks;

use std::sync::Arc;

use reqwest::{Method, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

use taskboard_proto::codec::{self, CodecError};

use crate::auth::SessionManager;

/// Errors surfaced by backend calls.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The backend refused the credential and no refresh could recover it.
    #[error("not authorized: {message}")]
    Unauthorized {
        /// Message reported by the backend.
        message: String,
    },

    /// The backend rejected the request (validation, conflict, not found...).
    #[error("request rejected ({status}): {message}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Message reported by the backend, verbatim.
        message: String,
    },

    /// The backend could not be reached at all.
    #[error("cannot reach backend at {url}: {source}")]
    Connectivity {
        /// Request URL.
        url: String,
        /// Underlying transport error.
        source: reqwest::Error,
    },

    /// The response body did not have the expected shape.
    #[error("unexpected response: {0}")]
    Decode(#[from] CodecError),

    /// A request body could not be serialized.
    #[error("failed to encode request body: {0}")]
    Encode(#[from] serde_json::Error),

    /// A login-style response carried no usable, unexpired credential.
    #[error("backend returned no usable credential")]
    InvalidCredential,

    /// The request was rejected locally before reaching the network.
    #[error("invalid request: {0}")]
    Invalid(String),

    /// A request URL could not be built from the base URL.
    #[error("invalid request url: {0}")]
    Url(#[from] url::ParseError),
}

impl ApiError {
    /// HTTP status of a backend rejection, if this is one.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Unauthorized { .. } => Some(401),
            Self::Rejected { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the backend was unreachable.
    #[must_use]
    pub const fn is_connectivity(&self) -> bool {
        matches!(self, Self::Connectivity { .. })
    }
}

/// Root URL of the backend API (for example `http://localhost:8080/api`).
///
/// Always stored with a trailing slash so that relative endpoint paths
/// extend it instead of replacing its last segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseUrl(Url);

impl BaseUrl {
    /// Parses a base URL.
    ///
    /// # Errors
    ///
    /// Returns [`url::ParseError`] if `raw` is not an absolute URL.
    pub fn parse(raw: &str) -> Result<Self, url::ParseError> {
        let mut normalized = raw.trim().to_string();
        if !normalized.ends_with('/') {
            normalized.push('/');
        }
        Url::parse(&normalized).map(Self)
    }

    /// Resolves an endpoint path (`"tasks/7"` or `"/tasks/7"`) under the base.
    ///
    /// # Errors
    ///
    /// Returns [`url::ParseError`] if the joined URL is invalid.
    pub fn join(&self, path: &str) -> Result<Url, url::ParseError> {
        self.0.join(path.trim_start_matches('/'))
    }

    /// The underlying URL.
    #[must_use]
    pub const fn as_url(&self) -> &Url {
        &self.0
    }
}

impl std::fmt::Display for BaseUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// One logical backend request, replayable for the post-refresh retry.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    path: String,
    query: Vec<(&'static str, String)>,
    body: Option<Value>,
}

impl ApiRequest {
    fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    /// `GET path`.
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    /// `POST path`.
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    /// `PATCH path`.
    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    /// `DELETE path`.
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Appends query parameters.
    #[must_use]
    pub fn with_query(mut self, params: impl IntoIterator<Item = (&'static str, String)>) -> Self {
        self.query.extend(params);
        self
    }

    /// Sets a JSON body.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Encode`] if `body` cannot be serialized.
    pub fn with_json(mut self, body: &impl Serialize) -> Result<Self, ApiError> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }

    /// Endpoint path relative to the base URL.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }
}

/// Which transmission of a logical request this is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Attempt {
    Initial,
    AfterRefresh,
}

/// The single outbound channel to the backend.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base: BaseUrl,
    session: Arc<SessionManager>,
}

impl ApiClient {
    /// Creates a gateway sharing `http` (and its cookie jar) with `session`.
    #[must_use]
    pub const fn new(http: reqwest::Client, base: BaseUrl, session: Arc<SessionManager>) -> Self {
        Self {
            http,
            base,
            session,
        }
    }

    /// The session this gateway authenticates with.
    #[must_use]
    pub const fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    /// The backend base URL.
    #[must_use]
    pub const fn base_url(&self) -> &BaseUrl {
        &self.base
    }

    /// Sends `request` and returns the raw success body.
    ///
    /// On a 401 the session is refreshed and the request re-sent once with
    /// the new credential. A 401 on the re-sent request is returned as
    /// [`ApiError::Unauthorized`] without refreshing again. If the refresh
    /// fails, local session state is cleared, and the presentation layer is
    /// told to show the login surface only if a credential had been attached.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] for connectivity failures and non-success
    /// responses; rejection messages are passed through verbatim.
    pub async fn execute(&self, request: &ApiRequest) -> Result<Vec<u8>, ApiError> {
        let mut attempt = Attempt::Initial;
        let mut credential = self.session.credential();
        loop {
            let response = self.dispatch(request, credential.as_deref(), attempt).await?;
            if response.status() != StatusCode::UNAUTHORIZED || attempt == Attempt::AfterRefresh {
                return read_body(response).await;
            }

            tracing::debug!(path = %request.path, "authorization failed, refreshing session");
            if let Some(fresh) = self.session.refresh_after(credential.as_deref()).await {
                credential = Some(fresh);
                attempt = Attempt::AfterRefresh;
                continue;
            }

            self.session.clear_local();
            if credential.is_some() {
                self.session.require_login();
            }
            return read_body(response).await;
        }
    }

    /// Sends `request` and decodes the (possibly enveloped) response entity.
    ///
    /// # Errors
    ///
    /// As [`execute`](Self::execute), plus [`ApiError::Decode`].
    pub async fn fetch<T: DeserializeOwned>(&self, request: &ApiRequest) -> Result<T, ApiError> {
        let body = self.execute(request).await?;
        Ok(codec::decode_payload(&body)?)
    }

    /// Sends `request`, discarding any response body.
    ///
    /// # Errors
    ///
    /// As [`execute`](Self::execute).
    pub async fn send(&self, request: &ApiRequest) -> Result<(), ApiError> {
        self.execute(request).await.map(drop)
    }

    async fn dispatch(
        &self,
        request: &ApiRequest,
        credential: Option<&str>,
        attempt: Attempt,
    ) -> Result<Response, ApiError> {
        let url = self.base.join(&request.path)?;
        let mut builder = self.http.request(request.method.clone(), url.clone());
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(credential) = credential {
            builder = builder.bearer_auth(credential);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        tracing::debug!(method = %request.method, %url, ?attempt, "sending request");
        builder.send().await.map_err(|e| connectivity(&url, e))
    }
}

/// Reads a response, mapping non-success statuses to [`ApiError`].
pub(crate) async fn read_body(response: Response) -> Result<Vec<u8>, ApiError> {
    let status = response.status();
    let url = response.url().clone();
    let body = response.bytes().await.map_err(|e| connectivity(&url, e))?;
    if status.is_success() {
        return Ok(body.to_vec());
    }

    let message = rejection_message(status, &body);
    tracing::debug!(%url, status = status.as_u16(), %message, "request rejected");
    if status == StatusCode::UNAUTHORIZED {
        Err(ApiError::Unauthorized { message })
    } else {
        Err(ApiError::Rejected {
            status: status.as_u16(),
            message,
        })
    }
}

/// Logs an unreachable-backend failure with enough context to diagnose it.
pub(crate) fn connectivity(url: &Url, source: reqwest::Error) -> ApiError {
    let kind = if source.is_timeout() {
        "timeout"
    } else if source.is_connect() {
        "connect"
    } else {
        "transport"
    };
    tracing::error!(
        %url,
        kind,
        error = %source,
        "backend unreachable, check the configured base URL and that the server is running"
    );
    ApiError::Connectivity {
        url: url.to_string(),
        source,
    }
}

/// Extracts the backend's human-readable message from an error body.
///
/// Prefers a JSON `message` or `error` field, then the plain-text body,
/// then the status reason phrase.
fn rejection_message(status: StatusCode, body: &[u8]) -> String {
    if let Ok(Value::Object(fields)) = serde_json::from_slice::<Value>(body) {
        for key in ["message", "error"] {
            if let Some(Value::String(message)) = fields.get(key) {
                return message.clone();
            }
        }
    }
    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    if text.is_empty() || text.starts_with('{') {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    } else {
        text.to_string()
    }
}

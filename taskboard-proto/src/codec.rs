//! Response-body decoding for the Taskboard REST API.
//!
//! Endpoints answer either with the bare entity or wrapped in an
//! `{"data": ..., "message": ...}` envelope. [`decode_payload`] accepts
//! both so callers never care which one a given backend build uses.

use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::auth::CredentialResponse;

/// Error type for response decoding.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The body is not valid JSON for the expected shape.
    #[error("malformed response body: {0}")]
    Malformed(String),
    /// The body was empty where an entity was expected.
    #[error("empty response body")]
    Empty,
}

/// The two response shapes an endpoint may use.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum Envelope<T> {
    /// `{"data": T, "message"?: string}`.
    Wrapped {
        /// The entity.
        data: T,
        /// Optional human-readable note from the backend.
        #[serde(default)]
        message: Option<String>,
    },
    /// The entity itself.
    Bare(T),
}

impl<T> Envelope<T> {
    /// Unwraps the entity regardless of shape.
    pub fn into_inner(self) -> T {
        match self {
            Self::Wrapped { data, .. } | Self::Bare(data) => data,
        }
    }
}

/// Decodes an entity from a response body, enveloped or not.
///
/// # Errors
///
/// Returns [`CodecError::Empty`] for an empty body and
/// [`CodecError::Malformed`] when neither shape matches.
pub fn decode_payload<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Err(CodecError::Empty);
    }
    serde_json::from_slice::<Envelope<T>>(bytes)
        .map(Envelope::into_inner)
        .map_err(|e| CodecError::Malformed(e.to_string()))
}

/// Extracts a credential from a login-style response body.
///
/// Accepts any [`CredentialResponse`] shape, optionally enveloped, or a
/// plain-text body holding just the token. Returns `None` when nothing
/// usable is present.
#[must_use]
pub fn decode_credential(bytes: &[u8]) -> Option<String> {
    if let Ok(parsed) = decode_payload::<CredentialResponse>(bytes) {
        return parsed.into_credential();
    }
    let text = std::str::from_utf8(bytes).ok()?.trim();
    let looks_like_token = !text.is_empty()
        && !text.starts_with(['{', '[', '"'])
        && !text.chars().any(char::is_whitespace);
    looks_like_token.then(|| text.to_string())
}

//! Bearer credential decoding, validation and persistence.
//!
//! The credential is a compact three-part token (`header.payload.signature`).
//! Only the payload is read, and the signature is never checked: the issuing
//! backend is the trust boundary. Decoding is infallible from the caller's
//! point of view: anything malformed simply decodes to `None`.

use std::sync::Arc;

use base64::Engine as _;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use serde_json::Value;

use super::storage::{CredentialStorage, StorageError};

/// Storage key for the raw credential.
pub const CREDENTIAL_KEY: &str = "authToken";

/// Storage key for the cached display name.
pub const DISPLAY_NAME_KEY: &str = "name";

/// base64url, padded or not.
const PAYLOAD_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

/// Claims read from a credential payload.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Claims {
    /// `sub`: the account identifier.
    pub subject: Option<String>,
    /// `name`: display name of the account holder.
    pub name: Option<String>,
    /// `exp`: expiry in whole seconds since the Unix epoch.
    pub expiry: Option<i64>,
}

/// Decodes the payload of a compact token.
///
/// Returns `None` unless `raw` has exactly three `.`-separated segments and
/// the middle one is base64url-encoded JSON object.
#[must_use]
pub fn decode(raw: &str) -> Option<Claims> {
    let segments: Vec<&str> = raw.trim().split('.').collect();
    let [_, payload, _] = segments.as_slice() else {
        return None;
    };
    let bytes = PAYLOAD_ENGINE.decode(payload).ok()?;
    let value: Value = serde_json::from_slice(&bytes).ok()?;
    let object = value.as_object()?;

    Some(Claims {
        subject: object.get("sub").and_then(scalar_to_string),
        name: object
            .get("name")
            .and_then(Value::as_str)
            .map(str::to_string),
        expiry: object.get("exp").and_then(seconds),
    })
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[allow(clippy::cast_possible_truncation)]
fn seconds(value: &Value) -> Option<i64> {
    value.as_i64().or_else(|| {
        value
            .as_f64()
            .filter(|f| f.is_finite() && f.abs() < 9.0e15)
            .map(|f| f.floor() as i64)
    })
}

/// Whether the credential is unusable at `now` (seconds since epoch).
///
/// True when the credential is absent, undecodable, carries no expiry, or
/// its expiry is not strictly in the future.
#[must_use]
pub fn is_expired_at(raw: Option<&str>, now: i64) -> bool {
    raw.and_then(decode)
        .and_then(|claims| claims.expiry)
        .is_none_or(|expiry| expiry <= now)
}

/// [`is_expired_at`] against the system clock.
#[must_use]
pub fn is_expired(raw: Option<&str>) -> bool {
    is_expired_at(raw, chrono::Utc::now().timestamp())
}

/// Display name carried in the credential, if any.
#[must_use]
pub fn display_name(raw: &str) -> Option<String> {
    decode(raw).and_then(|claims| claims.name)
}

/// Persists the credential and its display name in durable storage.
///
/// All writes go to two fixed keys ([`CREDENTIAL_KEY`], [`DISPLAY_NAME_KEY`]);
/// no network access happens here.
#[derive(Clone)]
pub struct TokenStore {
    storage: Arc<dyn CredentialStorage>,
}

impl std::fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenStore").finish_non_exhaustive()
    }
}

impl TokenStore {
    /// Wraps a storage backend.
    #[must_use]
    pub fn new(storage: Arc<dyn CredentialStorage>) -> Self {
        Self { storage }
    }

    /// The persisted credential, if any. Not validated.
    #[must_use]
    pub fn load(&self) -> Option<String> {
        self.storage
            .get(CREDENTIAL_KEY)
            .filter(|raw| !raw.trim().is_empty())
    }

    /// The persisted display name, if any.
    #[must_use]
    pub fn cached_display_name(&self) -> Option<String> {
        self.storage.get(DISPLAY_NAME_KEY)
    }

    /// Stores `raw` and the display name decoded from it.
    ///
    /// Returns the decoded display name. A credential without a name
    /// clears any stale cached name.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if either key could not be written.
    pub fn persist(&self, raw: &str) -> Result<Option<String>, StorageError> {
        self.storage.set(CREDENTIAL_KEY, raw)?;
        let name = display_name(raw);
        match &name {
            Some(name) => self.storage.set(DISPLAY_NAME_KEY, name)?,
            None => self.storage.remove(DISPLAY_NAME_KEY)?,
        }
        Ok(name)
    }

    /// Removes both the credential and the cached display name.
    ///
    /// Both removals are attempted even if the first one fails.
    ///
    /// # Errors
    ///
    /// Returns the first [`StorageError`] encountered.
    pub fn clear(&self) -> Result<(), StorageError> {
        let credential = self.storage.remove(CREDENTIAL_KEY);
        let name = self.storage.remove(DISPLAY_NAME_KEY);
        credential.and(name)
    }
}

//! Access credentials and the refresh cookie.
//!
//! Access credentials are three base64url segments shaped like a JWT. The
//! payload carries `sub`, `name`, `iat`, `exp` and a generation counter;
//! bumping the generation invalidates every credential issued before it
//! without changing their expiry, which is how tests force a refresh.

use std::sync::atomic::{AtomicU64, Ordering};

use axum::http::HeaderMap;
use axum::http::header::COOKIE;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};

use crate::error::MockError;
use crate::store::User;

/// Name of the HttpOnly refresh cookie.
pub const REFRESH_COOKIE: &str = "refreshToken";

/// Default access credential lifetime (15 minutes).
pub const DEFAULT_ACCESS_TTL_SECS: u64 = 15 * 60;

const HEADER: &str = r#"{"alg":"HS256","typ":"JWT"}"#;
const SIGNATURE: &[u8] = b"taskboard-mock";

#[derive(Debug, Serialize, Deserialize)]
struct AccessClaims {
    sub: u64,
    name: String,
    iat: i64,
    exp: i64,
    #[serde(rename = "gen")]
    generation: u64,
}

/// Issues and checks access credentials.
#[derive(Debug)]
pub struct TokenIssuer {
    ttl_secs: u64,
    generation: AtomicU64,
}

impl Default for TokenIssuer {
    fn default() -> Self {
        Self::new(DEFAULT_ACCESS_TTL_SECS)
    }
}

impl TokenIssuer {
    /// Creates an issuer whose credentials live `ttl_secs` seconds.
    #[must_use]
    pub const fn new(ttl_secs: u64) -> Self {
        Self {
            ttl_secs,
            generation: AtomicU64::new(0),
        }
    }

    /// Issues an access credential for `user`.
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub fn issue(&self, user: &User) -> String {
        let now = chrono::Utc::now().timestamp();
        let claims = AccessClaims {
            sub: user.id,
            name: user.name.clone(),
            iat: now,
            exp: now + self.ttl_secs as i64,
            generation: self.generation.load(Ordering::SeqCst),
        };
        let payload = serde_json::to_vec(&claims).unwrap_or_default();
        format!(
            "{}.{}.{}",
            URL_SAFE_NO_PAD.encode(HEADER),
            URL_SAFE_NO_PAD.encode(payload),
            URL_SAFE_NO_PAD.encode(SIGNATURE)
        )
    }

    /// Checks a raw credential and returns the user id it was issued to.
    ///
    /// # Errors
    ///
    /// Returns [`MockError::Unauthorized`] if the credential is malformed,
    /// carries a foreign signature, has expired or predates the last
    /// [`invalidate_all`](Self::invalidate_all).
    pub fn verify(&self, raw: &str) -> Result<u64, MockError> {
        let invalid = || MockError::Unauthorized("Invalid or expired token".into());

        let segments: Vec<&str> = raw.split('.').collect();
        let [_, payload, signature] = segments.as_slice() else {
            return Err(invalid());
        };
        if URL_SAFE_NO_PAD.decode(signature).ok().as_deref() != Some(SIGNATURE) {
            return Err(invalid());
        }
        let bytes = URL_SAFE_NO_PAD.decode(payload).map_err(|_| invalid())?;
        let claims: AccessClaims = serde_json::from_slice(&bytes).map_err(|_| invalid())?;

        if claims.exp <= chrono::Utc::now().timestamp() {
            return Err(invalid());
        }
        if claims.generation != self.generation.load(Ordering::SeqCst) {
            return Err(invalid());
        }
        Ok(claims.sub)
    }

    /// Invalidates every access credential issued so far.
    pub fn invalidate_all(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }
}

/// Extracts the bearer credential from an `Authorization` header.
#[must_use]
pub fn bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(axum::http::header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|raw| !raw.is_empty())
}

/// Extracts the refresh token from the `Cookie` header(s).
#[must_use]
pub fn refresh_cookie(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == REFRESH_COOKIE)
        .map(|(_, value)| value.to_string())
}

/// `Set-Cookie` value that installs `token` as the refresh cookie.
#[must_use]
pub fn set_refresh_cookie(token: &str) -> String {
    format!("{REFRESH_COOKIE}={token}; HttpOnly; Path=/api/auth; SameSite=Strict")
}

/// `Set-Cookie` value that removes the refresh cookie.
#[must_use]
pub fn clear_refresh_cookie() -> String {
    format!("{REFRESH_COOKIE}=; HttpOnly; Path=/api/auth; SameSite=Strict; Max-Age=0")
}

//! Authentication request and response bodies.
//!
//! The credential itself is opaque at this layer; decoding its claims is
//! the client's token store concern.

use serde::{Deserialize, Serialize};

/// Body for `POST /auth/login`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Body for `POST /auth/register`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// Body for `POST /auth/verify`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyRequest {
    pub email: String,
    pub code: String,
}

/// Body for `POST /auth/resend` and `POST /auth/forgot-password`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailRequest {
    pub email: String,
}

/// Body for `POST /auth/google`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleSignInRequest {
    /// OAuth id-token issued by the identity provider.
    pub id_token: String,
}

/// Body for `POST /auth/reset-password`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    /// One-time token from the recovery email.
    pub token: String,
    pub new_password: String,
}

/// `{"accessToken": ...}` as answered by `POST /auth/refresh`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessTokenResponse {
    pub access_token: String,
}

/// `{"jwt": ...}` as answered by `POST /auth/google`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtResponse {
    pub jwt: String,
}

/// Any of the shapes an endpoint may use to hand out a credential.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum CredentialResponse {
    /// A bare JSON string.
    Bare(String),
    /// An object carrying the credential under one of the known keys.
    Object {
        #[serde(alias = "accessToken", alias = "jwt")]
        token: String,
    },
}

impl CredentialResponse {
    /// Returns the raw credential, rejecting blank values.
    #[must_use]
    pub fn into_credential(self) -> Option<String> {
        let raw = match self {
            Self::Bare(raw) | Self::Object { token: raw } => raw,
        };
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_response_shapes() {
        for json in [
            r#""abc.def.ghi""#,
            r#"{"token":"abc.def.ghi"}"#,
            r#"{"accessToken":"abc.def.ghi"}"#,
            r#"{"jwt":"abc.def.ghi"}"#,
        ] {
            let parsed: CredentialResponse = serde_json::from_str(json).unwrap();
            assert_eq!(parsed.into_credential().as_deref(), Some("abc.def.ghi"));
        }
    }

    #[test]
    fn blank_credential_is_rejected() {
        let parsed: CredentialResponse = serde_json::from_str(r#""  ""#).unwrap();
        assert!(parsed.into_credential().is_none());
    }

    #[test]
    fn google_request_uses_camel_case() {
        let body = GoogleSignInRequest {
            id_token: "id".to_string(),
        };
        assert_eq!(
            serde_json::to_value(body).unwrap(),
            serde_json::json!({"idToken": "id"})
        );
    }
}

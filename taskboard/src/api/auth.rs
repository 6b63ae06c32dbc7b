//! Sign-in, registration and password-recovery endpoints.

use taskboard_proto::auth::{
    EmailRequest, GoogleSignInRequest, LoginRequest, RegisterRequest, ResetPasswordRequest,
    VerifyRequest,
};
use taskboard_proto::codec;

use super::{ApiClient, ApiError, ApiRequest};
use crate::auth::Session;

impl ApiClient {
    /// Exchanges email and password for a credential and installs it.
    ///
    /// # Errors
    ///
    /// Returns the backend's rejection verbatim (wrong password, unverified
    /// account...), or [`ApiError::InvalidCredential`] if the response held
    /// no usable, unexpired credential.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session, ApiError> {
        let request = ApiRequest::post("auth/login").with_json(&LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        })?;
        self.exchange_credential(&request).await
    }

    /// Exchanges an OAuth identity token for a credential and installs it.
    ///
    /// # Errors
    ///
    /// As [`sign_in`](Self::sign_in).
    pub async fn sign_in_with_google(&self, id_token: &str) -> Result<Session, ApiError> {
        let request = ApiRequest::post("auth/google").with_json(&GoogleSignInRequest {
            id_token: id_token.to_string(),
        })?;
        self.exchange_credential(&request).await
    }

    async fn exchange_credential(&self, request: &ApiRequest) -> Result<Session, ApiError> {
        self.session().begin_authentication();
        let body = match self.execute(request).await {
            Ok(body) => body,
            Err(e) => {
                self.session().abort_authentication();
                return Err(e);
            }
        };

        let Some(raw) = codec::decode_credential(&body) else {
            self.session().abort_authentication();
            tracing::warn!(path = request.path(), "sign-in response carried no credential");
            return Err(ApiError::InvalidCredential);
        };
        if self.session().login(&raw).await {
            Ok(self.session().snapshot())
        } else {
            Err(ApiError::InvalidCredential)
        }
    }

    /// Creates an account; the backend then emails a verification code.
    ///
    /// # Errors
    ///
    /// Returns backend validation failures (duplicate email, weak password)
    /// verbatim.
    pub async fn register(&self, name: &str, email: &str, password: &str) -> Result<(), ApiError> {
        let request = ApiRequest::post("auth/register").with_json(&RegisterRequest {
            name: name.to_string(),
            email: email.to_string(),
            password: password.to_string(),
        })?;
        self.send(&request).await
    }

    /// Confirms an email address with the emailed code.
    ///
    /// # Errors
    ///
    /// Returns the backend's rejection for a wrong or expired code.
    pub async fn verify_email(&self, email: &str, code: &str) -> Result<(), ApiError> {
        let request = ApiRequest::post("auth/verify").with_json(&VerifyRequest {
            email: email.to_string(),
            code: code.trim().to_string(),
        })?;
        self.send(&request).await
    }

    /// Asks the backend to email a fresh verification code.
    ///
    /// # Errors
    ///
    /// Returns the backend's rejection verbatim.
    pub async fn resend_code(&self, email: &str) -> Result<(), ApiError> {
        let request = ApiRequest::post("auth/resend").with_json(&EmailRequest {
            email: email.to_string(),
        })?;
        self.send(&request).await
    }

    /// Starts password recovery for `email`.
    ///
    /// # Errors
    ///
    /// Returns the backend's rejection verbatim.
    pub async fn forgot_password(&self, email: &str) -> Result<(), ApiError> {
        let request = ApiRequest::post("auth/forgot-password").with_json(&EmailRequest {
            email: email.to_string(),
        })?;
        self.send(&request).await
    }

    /// Sets a new password using the emailed reset token.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Invalid`] without contacting the backend when
    /// `token` is blank, otherwise the backend's rejection verbatim.
    pub async fn reset_password(&self, token: &str, new_password: &str) -> Result<(), ApiError> {
        if token.trim().is_empty() {
            return Err(ApiError::Invalid("reset token is missing".into()));
        }
        let request = ApiRequest::post("auth/reset-password").with_json(&ResetPasswordRequest {
            token: token.trim().to_string(),
            new_password: new_password.to_string(),
        })?;
        self.send(&request).await
    }

    /// Ends the session. Always succeeds locally.
    pub async fn sign_out(&self) {
        self.session().logout().await;
    }
}

//! Account endpoints.

use super::{ApiClient, ApiError, ApiRequest};

impl ApiClient {
    /// Deletes the signed-in account, then ends the local session.
    ///
    /// # Errors
    ///
    /// Returns the backend's rejection; the session is left intact in that
    /// case.
    pub async fn delete_account(&self) -> Result<(), ApiError> {
        self.send(&ApiRequest::delete("account")).await?;
        tracing::info!("account deleted");
        self.session().logout().await;
        Ok(())
    }
}

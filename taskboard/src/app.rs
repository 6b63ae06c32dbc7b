//! Application context: builds and owns the client's long-lived services.
//!
//! One [`App`] exists per process. It wires durable storage, the session,
//! the gateway and the caches together so that all of them share one HTTP
//! client and therefore one cookie jar.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::api::{ApiClient, BaseUrl};
use crate::auth::{CredentialStorage, FileStorage, SessionEvent, SessionManager, TokenStore};
use crate::board::Board;
use crate::cache::{ListCache, TaskCache};
use crate::config::{ClientConfig, ConfigError};

/// Errors that can occur while building the application context.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The configured backend URL is not a valid absolute URL.
    #[error("invalid backend url {url:?}: {source}")]
    BaseUrl {
        /// The configured value.
        url: String,
        /// Parse failure.
        source: url::ParseError,
    },

    /// The HTTP client could not be constructed.
    #[error("failed to build http client: {0}")]
    Http(#[from] reqwest::Error),
}

/// The client's service graph.
#[derive(Debug)]
pub struct App {
    session: Arc<SessionManager>,
    api: ApiClient,
    tasks: Arc<TaskCache>,
    lists: ListCache,
}

impl App {
    /// Builds the context with file-backed credential storage at
    /// `config.storage_path`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError`] if the base URL is invalid or the HTTP client
    /// cannot be built.
    pub fn new(config: &ClientConfig) -> Result<(Self, mpsc::Receiver<SessionEvent>), AppError> {
        let storage = Arc::new(FileStorage::new(&config.storage_path));
        Self::with_storage(config, storage)
    }

    /// Builds the context over the given credential storage.
    ///
    /// # Errors
    ///
    /// As [`new`](Self::new).
    pub fn with_storage(
        config: &ClientConfig,
        storage: Arc<dyn CredentialStorage>,
    ) -> Result<(Self, mpsc::Receiver<SessionEvent>), AppError> {
        let base = BaseUrl::parse(&config.base_url).map_err(|source| AppError::BaseUrl {
            url: config.base_url.clone(),
            source,
        })?;
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(config.request_timeout)
            .build()?;

        let (session, events) = SessionManager::new(
            http.clone(),
            base.clone(),
            TokenStore::new(storage),
            config.event_buffer,
        );
        let session = Arc::new(session);
        let api = ApiClient::new(http, base, Arc::clone(&session));
        let app = Self {
            tasks: Arc::new(TaskCache::new(api.clone())),
            lists: ListCache::new(api.clone()),
            session,
            api,
        };

        tracing::debug!(base_url = %config.base_url, "application context ready");
        Ok((app, events))
    }

    /// Startup reconciliation; see [`SessionManager::restore`].
    pub async fn restore_session(&self) -> bool {
        self.session.restore().await
    }

    /// The session manager.
    #[must_use]
    pub const fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    /// The backend gateway.
    #[must_use]
    pub const fn api(&self) -> &ApiClient {
        &self.api
    }

    /// The shared task cache.
    #[must_use]
    pub const fn tasks(&self) -> &Arc<TaskCache> {
        &self.tasks
    }

    /// The list cache.
    #[must_use]
    pub const fn lists(&self) -> &ListCache {
        &self.lists
    }

    /// A fresh board view over the shared task cache.
    #[must_use]
    pub fn board(&self) -> Board {
        Board::new(Arc::clone(&self.tasks))
    }
}

//! The task-list cache.

use taskboard_proto::list::{ListId, ListUpdate, NewList, TaskList, TaskListComplete};

use super::{Collection, FetchOutcome};
use crate::api::{ApiClient, ApiError};

/// Cached list collection backed by the task-list endpoints.
#[derive(Debug)]
pub struct ListCache {
    api: ApiClient,
    lists: Collection<TaskList>,
}

impl ListCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new(api: ApiClient) -> Self {
        Self {
            api,
            lists: Collection::new(),
        }
    }

    /// Replaces the cache with `GET /task-lists`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`]; the cache is unchanged on error.
    pub async fn fetch_lists(&self) -> Result<FetchOutcome, ApiError> {
        let ticket = self.lists.issue();
        let lists = self.api.list_lists().await?;
        Ok(self.lists.replace_all(ticket, lists))
    }

    /// Fetches a list with its tasks. The result is not cached.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on any backend failure.
    pub async fn get_list(&self, id: &ListId) -> Result<TaskListComplete, ApiError> {
        self.api.get_list(id).await
    }

    /// Creates a list and appends the backend's entity.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Invalid`] for a blank name without contacting the
    /// backend, otherwise any backend failure verbatim.
    pub async fn create_list(&self, list: &NewList) -> Result<TaskList, ApiError> {
        if list.name.trim().is_empty() {
            return Err(ApiError::Invalid("list name is empty".into()));
        }
        let ticket = self.lists.issue();
        let created = self.api.create_list(list).await?;
        self.lists.upsert(ticket, created.clone());
        tracing::info!(id = %created.id, name = %created.name, "list created");
        Ok(created)
    }

    /// Updates a list and replaces the cached entry by id.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`]; the cache is unchanged on error.
    pub async fn update_list(&self, id: &ListId, update: &ListUpdate) -> Result<TaskList, ApiError> {
        let ticket = self.lists.issue();
        let updated = self.api.update_list(id, update).await?;
        self.lists.replace_existing(ticket, updated.clone());
        Ok(updated)
    }

    /// Deletes a list once the backend confirms. Its tasks are removed by
    /// the backend; refetch tasks to observe that.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`]; the cache is unchanged on error.
    pub async fn delete_list(&self, id: &ListId) -> Result<(), ApiError> {
        let ticket = self.lists.issue();
        self.api.delete_list(id).await?;
        self.lists.remove(ticket, id);
        tracing::info!(%id, "list deleted");
        Ok(())
    }

    /// All cached lists, in cache order.
    #[must_use]
    pub fn lists(&self) -> Vec<TaskList> {
        self.lists.snapshot()
    }

    /// The cached list with `id`.
    #[must_use]
    pub fn list(&self, id: &ListId) -> Option<TaskList> {
        self.lists.get(id)
    }
}

//! Task-list endpoints.

use taskboard_proto::list::{ListId, ListUpdate, NewList, TaskList, TaskListComplete};

use super::{ApiClient, ApiError, ApiRequest};

impl ApiClient {
    /// `GET /task-lists`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on transport, status or decode failure.
    pub async fn list_lists(&self) -> Result<Vec<TaskList>, ApiError> {
        self.fetch(&ApiRequest::get("task-lists")).await
    }

    /// `GET /task-lists/{id}`, with the list's tasks resolved.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on transport, status or decode failure.
    pub async fn get_list(&self, id: &ListId) -> Result<TaskListComplete, ApiError> {
        self.fetch(&ApiRequest::get(format!("task-lists/{id}"))).await
    }

    /// `POST /task-lists`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on transport, status or decode failure.
    pub async fn create_list(&self, list: &NewList) -> Result<TaskList, ApiError> {
        self.fetch(&ApiRequest::post("task-lists").with_json(list)?).await
    }

    /// `PATCH /task-lists/{id}`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on transport, status or decode failure.
    pub async fn update_list(&self, id: &ListId, update: &ListUpdate) -> Result<TaskList, ApiError> {
        self.fetch(&ApiRequest::patch(format!("task-lists/{id}")).with_json(update)?)
            .await
    }

    /// `DELETE /task-lists/{id}`. The backend cascades to the list's tasks.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on transport or status failure.
    pub async fn delete_list(&self, id: &ListId) -> Result<(), ApiError> {
        self.send(&ApiRequest::delete(format!("task-lists/{id}"))).await
    }
}

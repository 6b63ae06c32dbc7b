//! Task endpoints. These are plain wire calls; caching lives in
//! [`crate::cache`].

use taskboard_proto::task::{
    CalendarRange, NewTask, StateChange, Task, TaskFilter, TaskId, TaskStatus, TaskUpdate,
};

use super::{ApiClient, ApiError, ApiRequest};

impl ApiClient {
    /// `GET /tasks`, optionally filtered server-side.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on transport, status or decode failure.
    pub async fn list_tasks(&self, filter: Option<&TaskFilter>) -> Result<Vec<Task>, ApiError> {
        let query = filter.map(TaskFilter::to_query).unwrap_or_default();
        self.fetch(&ApiRequest::get("tasks").with_query(query)).await
    }

    /// `GET /tasks/my-day`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on transport, status or decode failure.
    pub async fn my_day_tasks(&self) -> Result<Vec<Task>, ApiError> {
        self.fetch(&ApiRequest::get("tasks/my-day")).await
    }

    /// `GET /tasks/calendar` for the given window.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on transport, status or decode failure.
    pub async fn calendar_tasks(&self, range: &CalendarRange) -> Result<Vec<Task>, ApiError> {
        self.fetch(&ApiRequest::get("tasks/calendar").with_query(range.to_query()))
            .await
    }

    /// `GET /tasks/{id}`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on transport, status or decode failure.
    pub async fn get_task(&self, id: &TaskId) -> Result<Task, ApiError> {
        self.fetch(&ApiRequest::get(format!("tasks/{id}"))).await
    }

    /// `POST /tasks`; returns the entity as created by the backend.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on transport, status or decode failure.
    pub async fn create_task(&self, task: &NewTask) -> Result<Task, ApiError> {
        self.fetch(&ApiRequest::post("tasks").with_json(task)?).await
    }

    /// `PATCH /tasks/{id}`; returns the updated entity.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on transport, status or decode failure.
    pub async fn update_task(&self, id: &TaskId, update: &TaskUpdate) -> Result<Task, ApiError> {
        self.fetch(&ApiRequest::patch(format!("tasks/{id}")).with_json(update)?)
            .await
    }

    /// `PATCH /tasks/{id}/state`; returns the updated entity.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on transport, status or decode failure.
    pub async fn change_task_state(&self, id: &TaskId, status: TaskStatus) -> Result<Task, ApiError> {
        let request = ApiRequest::patch(format!("tasks/{id}/state")).with_json(&StateChange { status })?;
        self.fetch(&request).await
    }

    /// `DELETE /tasks/{id}`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on transport or status failure.
    pub async fn delete_task(&self, id: &TaskId) -> Result<(), ApiError> {
        self.send(&ApiRequest::delete(format!("tasks/{id}"))).await
    }
}

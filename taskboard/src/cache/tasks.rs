//! The task cache.

use taskboard_proto::list::ListId;
use taskboard_proto::task::{
    CalendarRange, MAX_TASK_TITLE_LENGTH, NewTask, Task, TaskFilter, TaskId, TaskStatus, TaskUpdate,
};

use super::{Collection, FetchOutcome};
use crate::api::{ApiClient, ApiError};

/// Fetches [`TaskCache::reload_tasks`] makes before forcing the result in.
const RELOAD_ATTEMPTS: u32 = 3;

/// Cached task collection backed by the task endpoints.
///
/// Fetches replace the whole collection; confirmed mutations splice the
/// backend's entity in. The cache holds whatever the last applied request
/// (or local optimistic edit) produced, whichever view that was for.
#[derive(Debug)]
pub struct TaskCache {
    api: ApiClient,
    tasks: Collection<Task>,
}

impl TaskCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new(api: ApiClient) -> Self {
        Self {
            api,
            tasks: Collection::new(),
        }
    }

    // --- fetches ---

    /// Replaces the cache with `GET /tasks` (optionally filtered).
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`]; the cache is unchanged on error.
    pub async fn fetch_tasks(&self, filter: Option<&TaskFilter>) -> Result<FetchOutcome, ApiError> {
        let ticket = self.tasks.issue();
        let tasks = self.api.list_tasks(filter).await?;
        Ok(self.tasks.replace_all(ticket, tasks))
    }

    /// Reloads every task so the cache matches the backend.
    ///
    /// Unlike [`fetch_tasks`](Self::fetch_tasks) the result is never
    /// dropped: a fetch overtaken by a newer request is re-issued, and the
    /// last attempt is applied regardless of newer tickets.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`]; the cache is unchanged on error.
    pub async fn reload_tasks(&self) -> Result<usize, ApiError> {
        for attempt in 1..RELOAD_ATTEMPTS {
            if let FetchOutcome::Applied { count } = self.fetch_tasks(None).await? {
                return Ok(count);
            }
            tracing::debug!(attempt, "reload overtaken by a newer request, fetching again");
        }
        let ticket = self.tasks.issue();
        let tasks = self.api.list_tasks(None).await?;
        Ok(self.tasks.force_replace_all(ticket, tasks))
    }

    /// Replaces the cache with the "My Day" tasks.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`]; the cache is unchanged on error.
    pub async fn fetch_my_day_tasks(&self) -> Result<FetchOutcome, ApiError> {
        let ticket = self.tasks.issue();
        let tasks = self.api.my_day_tasks().await?;
        Ok(self.tasks.replace_all(ticket, tasks))
    }

    /// Replaces the cache with the tasks inside `range`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`]; the cache is unchanged on error.
    pub async fn fetch_calendar_tasks(&self, range: &CalendarRange) -> Result<FetchOutcome, ApiError> {
        let ticket = self.tasks.issue();
        let tasks = self.api.calendar_tasks(range).await?;
        Ok(self.tasks.replace_all(ticket, tasks))
    }

    /// Fetches one task, refreshing its cached copy if there is one.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`]; the cache is unchanged on error.
    pub async fn get_task(&self, id: &TaskId) -> Result<Task, ApiError> {
        let ticket = self.tasks.issue();
        let task = self.api.get_task(id).await?;
        self.tasks.replace_existing(ticket, task.clone());
        Ok(task)
    }

    // --- mutations ---

    /// Creates a task and appends the backend's entity.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Invalid`] for an empty or overlong title without
    /// contacting the backend, otherwise any backend failure.
    pub async fn create_task(&self, task: &NewTask) -> Result<Task, ApiError> {
        validate_title(&task.title)?;
        let ticket = self.tasks.issue();
        let created = self.api.create_task(task).await?;
        if self.tasks.upsert(ticket, created.clone()) {
            tracing::debug!(id = %created.id, "created task was already cached");
        }
        tracing::info!(id = %created.id, "task created");
        Ok(created)
    }

    /// Applies a partial update and replaces the cached entry by id.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`]; the cache is unchanged on error.
    pub async fn update_task(&self, id: &TaskId, update: &TaskUpdate) -> Result<Task, ApiError> {
        if let Some(title) = &update.title {
            validate_title(title)?;
        }
        let ticket = self.tasks.issue();
        let updated = self.api.update_task(id, update).await?;
        self.tasks.replace_existing(ticket, updated.clone());
        Ok(updated)
    }

    /// Deletes a task, removing it locally only once the backend confirms.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`]; the cache is unchanged on error.
    pub async fn delete_task(&self, id: &TaskId) -> Result<(), ApiError> {
        let ticket = self.tasks.issue();
        self.api.delete_task(id).await?;
        self.tasks.remove(ticket, id);
        tracing::info!(%id, "task deleted");
        Ok(())
    }

    /// Status-only mutation; the returned entity replaces the cached one.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`]; the cache is unchanged on error.
    pub async fn change_state(&self, id: &TaskId, status: TaskStatus) -> Result<Task, ApiError> {
        let ticket = self.tasks.issue();
        let updated = self.api.change_task_state(id, status).await?;
        self.tasks.replace_existing(ticket, updated.clone());
        Ok(updated)
    }

    // --- local views ---

    /// All cached tasks, in cache order.
    #[must_use]
    pub fn tasks(&self) -> Vec<Task> {
        self.tasks.snapshot()
    }

    /// The cached task with `id`.
    #[must_use]
    pub fn task(&self, id: &TaskId) -> Option<Task> {
        self.tasks.get(id)
    }

    /// Cached tasks belonging to `list`, in cache order.
    #[must_use]
    pub fn tasks_for_list(&self, list: &ListId) -> Vec<Task> {
        self.tasks.filtered(|task| task.in_list(list))
    }

    /// Number of cached tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// The gateway this cache fetches through.
    #[must_use]
    pub const fn api(&self) -> &ApiClient {
        &self.api
    }

    // --- optimistic edits ---

    /// Sets a task's status locally, before any backend confirmation.
    pub(crate) fn set_status_local(&self, id: &TaskId, status: TaskStatus) -> bool {
        self.tasks.modify(id, |task| task.status = Some(status))
    }

    /// Permutes the cached tasks locally.
    pub(crate) fn reorder_local<R>(&self, reorder: impl FnOnce(&mut [Task]) -> R) -> R {
        self.tasks.rearrange(reorder)
    }
}

fn validate_title(title: &str) -> Result<(), ApiError> {
    let length = title.trim().chars().count();
    if length == 0 {
        return Err(ApiError::Invalid("task title is empty".into()));
    }
    if length > MAX_TASK_TITLE_LENGTH {
        return Err(ApiError::Invalid(format!(
            "task title is {length} characters (max {MAX_TASK_TITLE_LENGTH})"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::tests::client_for;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn task_json(id: u64, title: &str, status: &str, list: Option<u64>) -> serde_json::Value {
        let mut task = serde_json::json!({
            "id": id,
            "title": title,
            "status": status,
            "createdAt": "2024-05-01T08:00:00Z"
        });
        if let Some(list) = list {
            task["listId"] = list.into();
        }
        task
    }

    async fn seeded(server: &MockServer, tasks: serde_json::Value) -> TaskCache {
        let (api, _events) = client_for(server);
        let cache = TaskCache::new(api);
        Mock::given(method("GET"))
            .and(path("/api/tasks"))
            .respond_with(ResponseTemplate::new(200).set_body_json(tasks))
            .up_to_n_times(1)
            .mount(server)
            .await;
        cache.fetch_tasks(None).await.unwrap();
        cache
    }

    fn ids(cache: &TaskCache) -> Vec<String> {
        cache.tasks().into_iter().map(|t| t.id.to_string()).collect()
    }

    #[tokio::test]
    async fn fetch_replaces_instead_of_merging() {
        let server = MockServer::start().await;
        let cache = seeded(&server, serde_json::json!([task_json(1, "a", "TODO", None)])).await;

        Mock::given(method("GET"))
            .and(path("/api/tasks/my-day"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([task_json(
                2, "b", "DONE", None
            )])))
            .mount(&server)
            .await;

        let outcome = cache.fetch_my_day_tasks().await.unwrap();
        assert_eq!(outcome, FetchOutcome::Applied { count: 1 });
        assert_eq!(ids(&cache), ["2"]);
    }

    #[tokio::test]
    async fn create_appends_backend_entity() {
        let server = MockServer::start().await;
        let cache = seeded(&server, serde_json::json!([task_json(1, "a", "TODO", Some(4))])).await;

        Mock::given(method("POST"))
            .and(path("/api/tasks"))
            .and(body_json(serde_json::json!({"title": "Buy milk", "status": "TODO", "listId": "4"})))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "data": task_json(77, "Buy milk", "TODO", Some(4))
            })))
            .expect(1)
            .mount(&server)
            .await;

        let new = NewTask::new("Buy milk")
            .with_list(ListId::new("4"))
            .with_status(TaskStatus::Todo);
        let created = cache.create_task(&new).await.unwrap();

        assert_eq!(created.id.as_str(), "77");
        assert_eq!(ids(&cache), ["1", "77"]);
        assert_eq!(cache.tasks_for_list(&ListId::new("4")).len(), 2);
    }

    #[tokio::test]
    async fn create_rejects_blank_title_locally() {
        let server = MockServer::start().await;
        let (api, _events) = client_for(&server);
        let cache = TaskCache::new(api);
        Mock::given(method("POST"))
            .and(path("/api/tasks"))
            .respond_with(ResponseTemplate::new(201))
            .expect(0)
            .mount(&server)
            .await;

        assert!(matches!(cache.create_task(&NewTask::new("   ")).await, Err(ApiError::Invalid(_))));
        let long = "x".repeat(MAX_TASK_TITLE_LENGTH + 1);
        assert!(matches!(cache.create_task(&NewTask::new(long)).await, Err(ApiError::Invalid(_))));
    }

    #[tokio::test]
    async fn update_replaces_by_id() {
        let server = MockServer::start().await;
        let cache = seeded(
            &server,
            serde_json::json!([task_json(1, "a", "TODO", None), task_json(2, "b", "TODO", None)]),
        )
        .await;

        Mock::given(method("PATCH"))
            .and(path("/api/tasks/2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(task_json(2, "server title", "TODO", None)))
            .expect(1)
            .mount(&server)
            .await;

        let update = TaskUpdate {
            title: Some("local title".into()),
            ..TaskUpdate::default()
        };
        cache.update_task(&TaskId::new("2"), &update).await.unwrap();
        assert_eq!(cache.task(&TaskId::new("2")).unwrap().title, "server title");
        assert_eq!(ids(&cache), ["1", "2"]);
    }

    #[tokio::test]
    async fn failed_delete_leaves_cache() {
        let server = MockServer::start().await;
        let cache = seeded(&server, serde_json::json!([task_json(1, "a", "TODO", None)])).await;

        Mock::given(method("DELETE"))
            .and(path("/api/tasks/1"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .expect(1)
            .mount(&server)
            .await;

        assert!(cache.delete_task(&TaskId::new("1")).await.is_err());
        assert_eq!(ids(&cache), ["1"]);
    }

    #[tokio::test]
    async fn confirmed_delete_removes() {
        let server = MockServer::start().await;
        let cache = seeded(
            &server,
            serde_json::json!([task_json(1, "a", "TODO", None), task_json(2, "b", "DONE", None)]),
        )
        .await;

        Mock::given(method("DELETE"))
            .and(path("/api/tasks/1"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        cache.delete_task(&TaskId::new("1")).await.unwrap();
        assert_eq!(ids(&cache), ["2"]);
    }

    #[tokio::test]
    async fn change_state_replaces_entry() {
        let server = MockServer::start().await;
        let cache = seeded(&server, serde_json::json!([task_json(1, "a", "TODO", None)])).await;

        Mock::given(method("PATCH"))
            .and(path("/api/tasks/1/state"))
            .respond_with(ResponseTemplate::new(200).set_body_json(task_json(1, "a", "DONE", None)))
            .expect(1)
            .mount(&server)
            .await;

        cache.change_state(&TaskId::new("1"), TaskStatus::Done).await.unwrap();
        assert_eq!(cache.task(&TaskId::new("1")).unwrap().status, Some(TaskStatus::Done));
    }

    #[tokio::test]
    async fn slow_fetch_does_not_undo_newer_create() {
        let server = MockServer::start().await;
        let (api, _events) = client_for(&server);
        let cache = TaskCache::new(api);

        Mock::given(method("GET"))
            .and(path("/api/tasks"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!([]))
                    .set_delay(std::time::Duration::from_millis(300)),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/tasks"))
            .respond_with(ResponseTemplate::new(201).set_body_json(task_json(5, "fresh", "TODO", None)))
            .mount(&server)
            .await;

        let fetch = cache.fetch_tasks(None);
        let create = async {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            cache.create_task(&NewTask::new("fresh")).await
        };
        let (fetched, created) = tokio::join!(fetch, create);

        created.unwrap();
        assert_eq!(fetched.unwrap(), FetchOutcome::Stale);
        assert_eq!(ids(&cache), ["5"]);
    }

    #[tokio::test]
    async fn reload_is_reissued_when_overtaken() {
        let server = MockServer::start().await;
        let (api, _events) = client_for(&server);
        let cache = TaskCache::new(api);

        Mock::given(method("GET"))
            .and(path("/api/tasks"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!([task_json(5, "fresh", "TODO", None)]))
                    .set_delay(std::time::Duration::from_millis(200)),
            )
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/tasks"))
            .respond_with(ResponseTemplate::new(201).set_body_json(task_json(5, "fresh", "TODO", None)))
            .mount(&server)
            .await;

        let reload = cache.reload_tasks();
        let create = async {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            cache.create_task(&NewTask::new("fresh")).await
        };
        let (reloaded, created) = tokio::join!(reload, create);

        created.unwrap();
        assert_eq!(reloaded.unwrap(), 1);
        assert_eq!(ids(&cache), ["5"]);
    }
}

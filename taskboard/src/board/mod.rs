//! Drag-and-drop status board over the task cache.
//!
//! A drag within a column (in manual order mode) is a local permutation of
//! the cache and never reaches the backend. A drag across columns is an
//! optimistic status change: the cache is updated first, then the backend
//! is told, and a rejection is healed by refetching every task.

pub mod order;

use std::sync::Arc;

use taskboard_proto::list::ListId;
use taskboard_proto::task::{Task, TaskId, TaskStatus};

use crate::api::ApiError;
use crate::cache::TaskCache;

pub use order::{Columns, OrderMode, ParseOrderModeError, group_columns, reorder_column};

/// Where a dragged task was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DropTarget {
    /// Destination column.
    pub status: TaskStatus,
    /// Position within the destination column.
    pub index: usize,
}

/// A completed drag gesture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DragGesture {
    /// The dragged task.
    pub task_id: TaskId,
    /// Column the drag started in.
    pub source: TaskStatus,
    /// Drop location; `None` when dropped outside any column.
    pub destination: Option<DropTarget>,
}

impl DragGesture {
    /// A drag of `task_id` from `source` dropped at `index` in `status`.
    pub fn new(task_id: impl Into<TaskId>, source: TaskStatus, status: TaskStatus, index: usize) -> Self {
        Self {
            task_id: task_id.into(),
            source,
            destination: Some(DropTarget { status, index }),
        }
    }

    /// A drag that ended outside any column.
    pub fn cancelled(task_id: impl Into<TaskId>, source: TaskStatus) -> Self {
        Self {
            task_id: task_id.into(),
            source,
            destination: None,
        }
    }
}

/// What a drag did.
#[derive(Debug)]
pub enum DropOutcome {
    /// Nothing changed.
    Ignored,
    /// The column was reordered locally.
    Reordered,
    /// The backend accepted the status change.
    Moved(Task),
    /// The backend rejected the status change; the cache was reloaded.
    RolledBack(ApiError),
}

/// Board view state: ordering mode and list filter over a shared cache.
#[derive(Debug, Clone)]
pub struct Board {
    cache: Arc<TaskCache>,
    mode: OrderMode,
    list_filter: Option<ListId>,
}

impl Board {
    /// A manually ordered, unfiltered board.
    #[must_use]
    pub const fn new(cache: Arc<TaskCache>) -> Self {
        Self {
            cache,
            mode: OrderMode::Manual,
            list_filter: None,
        }
    }

    /// Builder form of [`set_mode`](Self::set_mode).
    #[must_use]
    pub fn with_mode(mut self, mode: OrderMode) -> Self {
        self.mode = mode;
        self
    }

    /// Builder form of [`set_list_filter`](Self::set_list_filter).
    #[must_use]
    pub fn with_list_filter(mut self, list: Option<ListId>) -> Self {
        self.list_filter = list;
        self
    }

    /// Current ordering mode.
    #[must_use]
    pub const fn mode(&self) -> OrderMode {
        self.mode
    }

    /// Switches ordering mode. Sorted modes ignore the manual order without
    /// discarding it.
    pub const fn set_mode(&mut self, mode: OrderMode) {
        self.mode = mode;
    }

    /// Current list filter.
    #[must_use]
    pub const fn list_filter(&self) -> Option<&ListId> {
        self.list_filter.as_ref()
    }

    /// Restricts the board to one list, or clears the restriction.
    pub fn set_list_filter(&mut self, list: Option<ListId>) {
        self.list_filter = list;
    }

    /// The shared task cache.
    #[must_use]
    pub const fn cache(&self) -> &Arc<TaskCache> {
        &self.cache
    }

    /// Columns as currently displayed. Sorted modes are recomputed on
    /// every call.
    #[must_use]
    pub fn columns(&self) -> Columns {
        let tasks = match &self.list_filter {
            Some(list) => self.cache.tasks_for_list(list),
            None => self.cache.tasks(),
        };
        group_columns(tasks, self.mode)
    }

    /// Applies a finished drag.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] only if a status change was rejected *and* the
    /// reload that should have healed the cache failed too; the cache then
    /// still shows the optimistic status.
    pub async fn on_drag_end(&self, gesture: &DragGesture) -> Result<DropOutcome, ApiError> {
        let Some(target) = gesture.destination else {
            return Ok(DropOutcome::Ignored);
        };

        if target.status == gesture.source {
            return Ok(self.reorder(gesture, target));
        }
        self.move_across(&gesture.task_id, target.status).await
    }

    fn reorder(&self, gesture: &DragGesture, target: DropTarget) -> DropOutcome {
        if self.mode != OrderMode::Manual {
            tracing::debug!(mode = %self.mode, "same-column drag ignored in sorted mode");
            return DropOutcome::Ignored;
        }
        let list = self.list_filter.as_ref();
        let reordered = self.cache.reorder_local(|tasks| {
            reorder_column(tasks, target.status, list, &gesture.task_id, target.index)
        });
        if reordered {
            DropOutcome::Reordered
        } else {
            tracing::debug!(id = %gesture.task_id, "dragged task not in its column");
            DropOutcome::Ignored
        }
    }

    async fn move_across(&self, id: &TaskId, status: TaskStatus) -> Result<DropOutcome, ApiError> {
        if !self.cache.set_status_local(id, status) {
            tracing::debug!(%id, "dragged task not cached, sending status change anyway");
        }

        match self.cache.change_state(id, status).await {
            Ok(task) => {
                tracing::info!(%id, %status, "task moved");
                Ok(DropOutcome::Moved(task))
            }
            Err(cause) => {
                tracing::warn!(%id, %status, error = %cause, "status change rejected, reloading tasks");
                if let Err(reload) = self.cache.reload_tasks().await {
                    tracing::error!(error = %reload, "reload after rejected move failed");
                    return Err(reload);
                }
                Ok(DropOutcome::RolledBack(cause))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::tests::client_for;
    use taskboard_proto::task::NewTask;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn task_json(id: u64, status: &str, due: Option<&str>) -> serde_json::Value {
        let mut task = serde_json::json!({
            "id": id,
            "title": format!("task {id}"),
            "status": status,
            "createdAt": "2024-05-01T08:00:00Z"
        });
        if let Some(due) = due {
            task["dueDate"] = due.into();
        }
        task
    }

    async fn board_with(server: &MockServer, tasks: serde_json::Value) -> Board {
        let (api, _events) = client_for(server);
        let cache = Arc::new(TaskCache::new(api));
        Mock::given(method("GET"))
            .and(path("/api/tasks"))
            .respond_with(ResponseTemplate::new(200).set_body_json(tasks))
            .up_to_n_times(1)
            .mount(server)
            .await;
        cache.fetch_tasks(None).await.unwrap();
        Board::new(cache)
    }

    fn column_ids(board: &Board, status: TaskStatus) -> Vec<String> {
        board
            .columns()
            .column(status)
            .iter()
            .map(|t| t.id.to_string())
            .collect()
    }

    #[tokio::test]
    async fn same_column_drag_reorders_without_backend() {
        let server = MockServer::start().await;
        let board = board_with(
            &server,
            serde_json::json!([
                task_json(1, "TODO", None),
                task_json(2, "DONE", None),
                task_json(3, "TODO", None)
            ]),
        )
        .await;
        Mock::given(method("PATCH"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let outcome = board
            .on_drag_end(&DragGesture::new("3", TaskStatus::Todo, TaskStatus::Todo, 0))
            .await
            .unwrap();

        assert!(matches!(outcome, DropOutcome::Reordered));
        assert_eq!(column_ids(&board, TaskStatus::Todo), ["3", "1"]);
        assert_eq!(column_ids(&board, TaskStatus::Done), ["2"]);
        assert!(board.cache().tasks().iter().all(|t| t.status.is_some()));
        assert_eq!(
            board.cache().task(&TaskId::new("3")).unwrap().status,
            Some(TaskStatus::Todo)
        );
    }

    #[tokio::test]
    async fn same_column_drag_ignored_when_sorted() {
        let server = MockServer::start().await;
        let board = board_with(
            &server,
            serde_json::json!([task_json(1, "TODO", None), task_json(2, "TODO", None)]),
        )
        .await
        .with_mode(OrderMode::Title);

        let outcome = board
            .on_drag_end(&DragGesture::new("2", TaskStatus::Todo, TaskStatus::Todo, 0))
            .await
            .unwrap();
        assert!(matches!(outcome, DropOutcome::Ignored));
        let cached: Vec<String> = board.cache().tasks().iter().map(|t| t.id.to_string()).collect();
        assert_eq!(cached, ["1", "2"]);
    }

    #[tokio::test]
    async fn drop_outside_is_ignored() {
        let server = MockServer::start().await;
        let board = board_with(&server, serde_json::json!([task_json(1, "TODO", None)])).await;
        let outcome = board
            .on_drag_end(&DragGesture::cancelled("1", TaskStatus::Todo))
            .await
            .unwrap();
        assert!(matches!(outcome, DropOutcome::Ignored));
    }

    #[tokio::test]
    async fn cross_column_drag_changes_only_dragged_task() {
        let server = MockServer::start().await;
        let board = board_with(
            &server,
            serde_json::json!([task_json(1, "TODO", None), task_json(2, "TODO", None)]),
        )
        .await;
        Mock::given(method("PATCH"))
            .and(path("/api/tasks/1/state"))
            .respond_with(ResponseTemplate::new(200).set_body_json(task_json(1, "IN_PROGRESS", None)))
            .expect(1)
            .mount(&server)
            .await;

        let outcome = board
            .on_drag_end(&DragGesture::new("1", TaskStatus::Todo, TaskStatus::InProgress, 0))
            .await
            .unwrap();

        assert!(matches!(outcome, DropOutcome::Moved(ref t) if t.status == Some(TaskStatus::InProgress)));
        assert_eq!(column_ids(&board, TaskStatus::InProgress), ["1"]);
        assert_eq!(column_ids(&board, TaskStatus::Todo), ["2"]);
    }

    #[tokio::test]
    async fn rejected_move_reloads_server_state() {
        let server = MockServer::start().await;
        let board = board_with(&server, serde_json::json!([task_json(1, "TODO", None)])).await;
        Mock::given(method("PATCH"))
            .and(path("/api/tasks/1/state"))
            .respond_with(ResponseTemplate::new(409).set_body_string("Task is locked"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/tasks"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                task_json(1, "TODO", None),
                task_json(4, "DONE", None)
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let outcome = board
            .on_drag_end(&DragGesture::new("1", TaskStatus::Todo, TaskStatus::Done, 0))
            .await
            .unwrap();

        assert!(matches!(outcome, DropOutcome::RolledBack(ApiError::Rejected { status: 409, .. })));
        assert_eq!(column_ids(&board, TaskStatus::Todo), ["1"]);
        assert_eq!(column_ids(&board, TaskStatus::Done), ["4"]);
    }

    #[tokio::test]
    async fn rollback_survives_concurrent_create() {
        let server = MockServer::start().await;
        let board = board_with(&server, serde_json::json!([task_json(1, "TODO", None)])).await;
        Mock::given(method("PATCH"))
            .and(path("/api/tasks/1/state"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/tasks"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!([
                        task_json(1, "TODO", None),
                        task_json(5, "TODO", None)
                    ]))
                    .set_delay(std::time::Duration::from_millis(300)),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/tasks"))
            .respond_with(ResponseTemplate::new(201).set_body_json(task_json(5, "TODO", None)))
            .mount(&server)
            .await;

        let gesture = DragGesture::new("1", TaskStatus::Todo, TaskStatus::Done, 0);
        let drag = board.on_drag_end(&gesture);
        let create = async {
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
            board.cache().create_task(&NewTask::new("task 5")).await
        };
        let (outcome, created) = tokio::join!(drag, create);

        created.unwrap();
        assert!(matches!(outcome, Ok(DropOutcome::RolledBack(ApiError::Rejected { status: 500, .. }))));
        assert_eq!(
            board.cache().task(&TaskId::new("1")).unwrap().status,
            Some(TaskStatus::Todo)
        );
        assert_eq!(column_ids(&board, TaskStatus::Todo), ["1", "5"]);
        assert!(column_ids(&board, TaskStatus::Done).is_empty());
    }

    #[tokio::test]
    async fn due_date_mode_sorts_each_render() {
        let server = MockServer::start().await;
        let board = board_with(
            &server,
            serde_json::json!([
                task_json(1, "TODO", Some("2024-05-03")),
                task_json(2, "TODO", None),
                task_json(3, "TODO", Some("2024-05-01"))
            ]),
        )
        .await
        .with_mode(OrderMode::DueDate);

        assert_eq!(column_ids(&board, TaskStatus::Todo), ["3", "1", "2"]);
    }

    #[tokio::test]
    async fn list_filter_restricts_columns() {
        let server = MockServer::start().await;
        let mut first = task_json(1, "TODO", None);
        first["listId"] = 7.into();
        let board = board_with(&server, serde_json::json!([first, task_json(2, "TODO", None)]))
            .await
            .with_list_filter(Some(ListId::new("7")));

        assert_eq!(column_ids(&board, TaskStatus::Todo), ["1"]);
        assert_eq!(board.list_filter().map(ListId::as_str), Some("7"));
    }
}

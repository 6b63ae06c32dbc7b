//! Integration tests for the status board against the mock backend.
//!
//! Drags across columns are persisted with a status change; a rejected
//! change is rolled back by reloading. Same-column drags only reorder the
//! local view.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::Arc;

use chrono::NaiveDate;
use taskboard::app::App;
use taskboard::auth::{CredentialStorage, MemoryStorage};
use taskboard::board::{Board, DragGesture, DropOutcome, OrderMode};
use taskboard::config::ClientConfig;
use taskboard_mock::server::{MockState, start_server_with_state};
use taskboard_proto::list::{ListId, NewList};
use taskboard_proto::task::{NewTask, TaskId, TaskStatus};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

struct Fixture {
    state: Arc<MockState>,
    app: App,
    user: u64,
}

/// Backend with a signed-in client.
async fn fixture() -> Fixture {
    let state = Arc::new(MockState::new());
    let (addr, _handle) = start_server_with_state("127.0.0.1:0", Arc::clone(&state))
        .await
        .expect("failed to start mock backend");
    let user = state
        .store
        .insert_verified("Ada", "ada@example.com", "correct horse")
        .unwrap()
        .id;
    let config = ClientConfig {
        base_url: format!("http://{addr}/api"),
        ..ClientConfig::default()
    };
    let storage: Arc<dyn CredentialStorage> = Arc::new(MemoryStorage::new());
    let (app, _events) = App::with_storage(&config, storage).unwrap();
    app.api().sign_in("ada@example.com", "correct horse").await.unwrap();
    Fixture { state, app, user }
}

impl Fixture {
    fn seed(&self, task: NewTask) -> TaskId {
        self.state.store.create_task(self.user, task).unwrap().id
    }

    async fn loaded_board(&self) -> Board {
        self.app.tasks().fetch_tasks(None).await.unwrap();
        self.app.board()
    }
}

fn column(board: &Board, status: TaskStatus) -> Vec<String> {
    board
        .columns()
        .column(status)
        .iter()
        .map(|task| task.title.clone())
        .collect()
}

fn date(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 5, day).unwrap()
}

// ---------------------------------------------------------------------------
// Cross-column moves
// ---------------------------------------------------------------------------

#[tokio::test]
async fn move_across_columns_is_persisted() {
    let fx = fixture().await;
    let id = fx.seed(NewTask::new("Ship"));
    fx.seed(NewTask::new("Test"));
    let board = fx.loaded_board().await;

    let outcome = board
        .on_drag_end(&DragGesture::new(id.clone(), TaskStatus::Todo, TaskStatus::Done, 0))
        .await
        .unwrap();
    assert!(matches!(outcome, DropOutcome::Moved(ref task) if task.status == Some(TaskStatus::Done)));
    assert_eq!(column(&board, TaskStatus::Done), ["Ship"]);
    assert_eq!(column(&board, TaskStatus::Todo), ["Test"]);
    assert_eq!(
        fx.state.store.task(fx.user, &id).unwrap().status,
        Some(TaskStatus::Done)
    );
}

#[tokio::test]
async fn rejected_move_is_rolled_back() {
    let fx = fixture().await;
    let id = fx.seed(NewTask::new("Ship"));
    let board = fx.loaded_board().await;
    fx.state.reject_state_changes(true);

    let outcome = board
        .on_drag_end(&DragGesture::new(id, TaskStatus::Todo, TaskStatus::InProgress, 0))
        .await
        .unwrap();
    let DropOutcome::RolledBack(cause) = outcome else {
        panic!("expected rollback, got {outcome:?}");
    };
    assert_eq!(cause.status(), Some(500));
    assert_eq!(column(&board, TaskStatus::Todo), ["Ship"]);
    assert!(column(&board, TaskStatus::InProgress).is_empty());
}

#[tokio::test]
async fn cross_column_move_applies_in_sorted_mode() {
    let fx = fixture().await;
    let id = fx.seed(NewTask::new("b"));
    fx.seed(NewTask::new("a").with_status(TaskStatus::Done));
    let board = fx.loaded_board().await.with_mode(OrderMode::Title);

    board
        .on_drag_end(&DragGesture::new(id, TaskStatus::Todo, TaskStatus::Done, 5))
        .await
        .unwrap();
    assert_eq!(column(&board, TaskStatus::Done), ["a", "b"]);
}

// ---------------------------------------------------------------------------
// Ordering and same-column drags
// ---------------------------------------------------------------------------

#[tokio::test]
async fn due_date_order_within_list_filter() {
    let fx = fixture().await;
    let home = fx.state.store.create_list(fx.user, NewList::new("Home")).unwrap();
    fx.seed(NewTask::new("later").with_list(home.id.clone()).with_due_date(date(9)));
    fx.seed(NewTask::new("undated").with_list(home.id.clone()));
    fx.seed(NewTask::new("sooner").with_list(home.id.clone()).with_due_date(date(2)));
    fx.seed(NewTask::new("elsewhere").with_due_date(date(1)));

    let board = fx
        .loaded_board()
        .await
        .with_mode(OrderMode::DueDate)
        .with_list_filter(Some(home.id));
    assert_eq!(column(&board, TaskStatus::Todo), ["sooner", "later", "undated"]);
}

#[tokio::test]
async fn manual_reorder_is_local_until_refetch() {
    let fx = fixture().await;
    fx.seed(NewTask::new("one"));
    fx.seed(NewTask::new("two"));
    let three = fx.seed(NewTask::new("three"));
    let board = fx.loaded_board().await;

    let outcome = board
        .on_drag_end(&DragGesture::new(three, TaskStatus::Todo, TaskStatus::Todo, 0))
        .await
        .unwrap();
    assert!(matches!(outcome, DropOutcome::Reordered));
    assert_eq!(column(&board, TaskStatus::Todo), ["three", "one", "two"]);

    fx.app.tasks().fetch_tasks(None).await.unwrap();
    assert_eq!(column(&board, TaskStatus::Todo), ["one", "two", "three"]);
}

#[tokio::test]
async fn same_column_drag_in_sorted_mode_is_ignored() {
    let fx = fixture().await;
    fx.seed(NewTask::new("a"));
    let b = fx.seed(NewTask::new("b"));
    let board = fx.loaded_board().await.with_mode(OrderMode::Title);

    let outcome = board
        .on_drag_end(&DragGesture::new(b, TaskStatus::Todo, TaskStatus::Todo, 0))
        .await
        .unwrap();
    assert!(matches!(outcome, DropOutcome::Ignored));
    assert_eq!(column(&board, TaskStatus::Todo), ["a", "b"]);
}

#[tokio::test]
async fn cancelled_drag_changes_nothing() {
    let fx = fixture().await;
    let id = fx.seed(NewTask::new("Ship"));
    let board = fx.loaded_board().await;

    let outcome = board
        .on_drag_end(&DragGesture::cancelled(id.clone(), TaskStatus::Todo))
        .await
        .unwrap();
    assert!(matches!(outcome, DropOutcome::Ignored));
    assert_eq!(
        fx.state.store.task(fx.user, &id).unwrap().status,
        Some(TaskStatus::Todo)
    );
}

#[tokio::test]
async fn board_filter_by_unknown_list_is_empty() {
    let fx = fixture().await;
    fx.seed(NewTask::new("Ship"));
    let board = fx
        .loaded_board()
        .await
        .with_list_filter(Some(ListId::new("404")));
    assert!(board.columns().is_empty());
}

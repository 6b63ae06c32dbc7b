//! Integration tests for cache sequencing against the mock backend.
//!
//! A fetch that was issued before a confirmed mutation or a newer fetch
//! must not overwrite their effect when its response arrives late.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveTime, Utc};
use taskboard::api::ApiError;
use taskboard::app::App;
use taskboard::auth::{CredentialStorage, MemoryStorage};
use taskboard::cache::FetchOutcome;
use taskboard::config::ClientConfig;
use taskboard_mock::server::{MockState, start_server_with_state};
use taskboard_proto::list::NewList;
use taskboard_proto::task::{CalendarRange, NewTask, TaskFilter, TaskId, TaskStatus};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn signed_in() -> (Arc<MockState>, App, u64) {
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
    (state, app, user)
}

fn titles(app: &App) -> Vec<String> {
    app.tasks().tasks().into_iter().map(|task| task.title).collect()
}

// ---------------------------------------------------------------------------
// Stale responses
// ---------------------------------------------------------------------------

#[tokio::test]
async fn slow_fetch_does_not_erase_created_task() {
    let (state, app, user) = signed_in().await;
    state.store.create_task(user, NewTask::new("existing")).unwrap();
    state.delay_next_listing(Duration::from_millis(300));

    let (fetched, created) = tokio::join!(app.tasks().fetch_tasks(None), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        app.tasks().create_task(&NewTask::new("fresh")).await
    });

    assert_eq!(fetched.unwrap(), FetchOutcome::Stale);
    created.unwrap();
    assert_eq!(titles(&app), ["fresh"]);

    app.tasks().fetch_tasks(None).await.unwrap();
    assert_eq!(titles(&app), ["existing", "fresh"]);
}

#[tokio::test]
async fn newer_fetch_wins_over_older() {
    let (state, app, user) = signed_in().await;
    state.store.create_task(user, NewTask::new("open")).unwrap();
    state
        .store
        .create_task(user, NewTask::new("finished").with_status(TaskStatus::Done))
        .unwrap();
    state.delay_next_listing(Duration::from_millis(300));

    let done = TaskFilter {
        status: Some(TaskStatus::Done),
        ..TaskFilter::default()
    };
    let (older, newer) = tokio::join!(app.tasks().fetch_tasks(None), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        app.tasks().fetch_tasks(Some(&done)).await
    });

    assert_eq!(newer.unwrap(), FetchOutcome::Applied { count: 1 });
    assert_eq!(older.unwrap(), FetchOutcome::Stale);
    assert_eq!(titles(&app), ["finished"]);
}

// ---------------------------------------------------------------------------
// Confirmed mutations
// ---------------------------------------------------------------------------

#[tokio::test]
async fn failed_delete_leaves_cache_untouched() {
    let (state, app, user) = signed_in().await;
    state.store.create_task(user, NewTask::new("keep")).unwrap();
    app.tasks().fetch_tasks(None).await.unwrap();

    let err = app.tasks().delete_task(&TaskId::new("999")).await.unwrap_err();
    assert_eq!(err.status(), Some(404));
    assert_eq!(titles(&app), ["keep"]);
}

#[tokio::test]
async fn update_and_delete_follow_backend() {
    let (_state, app, _user) = signed_in().await;
    let task = app.tasks().create_task(&NewTask::new("draft")).await.unwrap();

    let update = taskboard_proto::task::TaskUpdate {
        title: Some("final".into()),
        ..Default::default()
    };
    app.tasks().update_task(&task.id, &update).await.unwrap();
    assert_eq!(titles(&app), ["final"]);

    app.tasks().delete_task(&task.id).await.unwrap();
    assert!(app.tasks().is_empty());
}

#[tokio::test]
async fn blank_title_never_reaches_backend() {
    let (state, app, user) = signed_in().await;
    let err = app.tasks().create_task(&NewTask::new("   ")).await.unwrap_err();
    assert!(matches!(err, ApiError::Invalid(_)));
    assert!(state.store.tasks(user).is_empty());
}

#[tokio::test]
async fn deleting_list_drops_its_tasks_on_refetch() {
    let (_state, app, _user) = signed_in().await;
    let list = app.lists().create_list(&NewList::new("Home")).await.unwrap();
    app.tasks()
        .create_task(&NewTask::new("dishes").with_list(list.id.clone()))
        .await
        .unwrap();
    app.tasks().create_task(&NewTask::new("loose")).await.unwrap();

    let complete = app.lists().get_list(&list.id).await.unwrap();
    assert_eq!(complete.tasks.len(), 1);

    app.lists().delete_list(&list.id).await.unwrap();
    assert!(app.lists().lists().is_empty());
    app.tasks().fetch_tasks(None).await.unwrap();
    assert_eq!(titles(&app), ["loose"]);
}

// ---------------------------------------------------------------------------
// Views
// ---------------------------------------------------------------------------

#[tokio::test]
async fn my_day_and_calendar_views() {
    let (state, app, user) = signed_in().await;
    let today = Utc::now().date_naive();
    state
        .store
        .create_task(
            user,
            NewTask {
                moved_to_my_day: Some(true),
                ..NewTask::new("pinned")
            },
        )
        .unwrap();
    state
        .store
        .create_task(user, NewTask::new("due today").with_due_date(today))
        .unwrap();
    state.store.create_task(user, NewTask::new("someday")).unwrap();

    app.tasks().fetch_my_day_tasks().await.unwrap();
    assert_eq!(titles(&app), ["pinned", "due today"]);

    let start = today.and_time(NaiveTime::MIN).and_utc();
    let range = CalendarRange::new(start, start + chrono::Duration::days(1));
    app.tasks().fetch_calendar_tasks(&range).await.unwrap();
    assert_eq!(titles(&app), ["due today"]);
}

//! Integration tests for the session lifecycle against the mock backend.
//!
//! Covers sign-up and verification, sign-in, transparent refresh on 401,
//! single-flight refresh under concurrency, startup restore, and sign-out.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::Arc;

use taskboard::api::ApiError;
use taskboard::app::App;
use taskboard::auth::token::CREDENTIAL_KEY;
use taskboard::auth::{CredentialStorage, MemoryStorage, SessionEvent, SessionPhase};
use taskboard::config::ClientConfig;
use taskboard_mock::server::{MockState, start_server_with_state};
use tokio::sync::mpsc;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const EMAIL: &str = "ada@example.com";
const PASSWORD: &str = "correct horse";

/// Starts a mock backend and returns its state and a client config for it.
async fn backend() -> (Arc<MockState>, ClientConfig) {
    let state = Arc::new(MockState::new());
    let (addr, _handle) = start_server_with_state("127.0.0.1:0", Arc::clone(&state))
        .await
        .expect("failed to start mock backend");
    let config = ClientConfig {
        base_url: format!("http://{addr}/api"),
        ..ClientConfig::default()
    };
    (state, config)
}

fn client(
    config: &ClientConfig,
    storage: &Arc<MemoryStorage>,
) -> (App, mpsc::Receiver<SessionEvent>) {
    App::with_storage(config, Arc::clone(storage) as Arc<dyn CredentialStorage>).unwrap()
}

/// Backend with a verified account and a client signed in to it.
async fn signed_in() -> (Arc<MockState>, App, Arc<MemoryStorage>, mpsc::Receiver<SessionEvent>) {
    let (state, config) = backend().await;
    state.store.insert_verified("Ada", EMAIL, PASSWORD).unwrap();
    let storage = Arc::new(MemoryStorage::new());
    let (app, events) = client(&config, &storage);
    app.api().sign_in(EMAIL, PASSWORD).await.unwrap();
    (state, app, storage, events)
}

fn drain(events: &mut mpsc::Receiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    seen
}

// ---------------------------------------------------------------------------
// Sign-up and sign-in
// ---------------------------------------------------------------------------

#[tokio::test]
async fn register_verify_and_sign_in() {
    let (state, config) = backend().await;
    let storage = Arc::new(MemoryStorage::new());
    let (app, mut events) = client(&config, &storage);

    app.api().register("Ada", EMAIL, PASSWORD).await.unwrap();
    let blocked = app.api().sign_in(EMAIL, PASSWORD).await.unwrap_err();
    assert_eq!(blocked.status(), Some(403));
    assert!(matches!(blocked, ApiError::Rejected { ref message, .. } if message == "Email not verified"));

    let code = state.store.pending_code(EMAIL).expect("code issued");
    app.api().verify_email(EMAIL, &code).await.unwrap();

    let session = app.api().sign_in(EMAIL, PASSWORD).await.unwrap();
    assert_eq!(session.display_name.as_deref(), Some("Ada"));
    assert_eq!(app.session().phase(), SessionPhase::Authenticated);
    assert!(storage.get(CREDENTIAL_KEY).is_some());
    assert!(drain(&mut events).contains(&SessionEvent::SignedIn {
        display_name: Some("Ada".into())
    }));
}

#[tokio::test]
async fn duplicate_registration_is_rejected_verbatim() {
    let (state, config) = backend().await;
    state.store.insert_verified("Ada", EMAIL, PASSWORD).unwrap();
    let (app, _events) = client(&config, &Arc::new(MemoryStorage::new()));

    let err = app.api().register("Ada", EMAIL, PASSWORD).await.unwrap_err();
    assert_eq!(err.status(), Some(409));
    assert!(matches!(err, ApiError::Rejected { ref message, .. } if message == "Email already registered"));
}

#[tokio::test]
async fn wrong_password_does_not_prompt_login() {
    let (state, config) = backend().await;
    state.store.insert_verified("Ada", EMAIL, PASSWORD).unwrap();
    let (app, mut events) = client(&config, &Arc::new(MemoryStorage::new()));

    let err = app.api().sign_in(EMAIL, "wrong password").await.unwrap_err();
    assert!(matches!(err, ApiError::Unauthorized { ref message } if message == "Invalid email or password"));
    assert_eq!(app.session().phase(), SessionPhase::Anonymous);
    assert!(!drain(&mut events).contains(&SessionEvent::LoginRequired));
}

#[tokio::test]
async fn federated_sign_in_uses_provider_identity() {
    let (_state, config) = backend().await;
    let (app, _events) = client(&config, &Arc::new(MemoryStorage::new()));

    let session = app.api().sign_in_with_google("grace@example.com").await.unwrap();
    assert_eq!(session.display_name.as_deref(), Some("grace"));
    app.tasks().fetch_tasks(None).await.unwrap();
}

#[tokio::test]
async fn password_reset_then_sign_in() {
    let (state, config) = backend().await;
    state.store.insert_verified("Ada", EMAIL, PASSWORD).unwrap();
    let (app, _events) = client(&config, &Arc::new(MemoryStorage::new()));

    app.api().forgot_password(EMAIL).await.unwrap();
    let token = state.store.begin_reset(EMAIL).unwrap();
    app.api().reset_password(&token, "battery staple").await.unwrap();

    assert!(app.api().sign_in(EMAIL, PASSWORD).await.is_err());
    assert!(app.api().sign_in(EMAIL, "battery staple").await.is_ok());
}

// ---------------------------------------------------------------------------
// Refresh
// ---------------------------------------------------------------------------

#[tokio::test]
async fn invalidated_credential_is_refreshed_transparently() {
    let (state, app, storage, _events) = signed_in().await;
    let before = app.session().credential().unwrap();

    state.invalidate_access_tokens();
    app.tasks().fetch_tasks(None).await.unwrap();

    let after = app.session().credential().unwrap();
    assert_ne!(before, after);
    assert_eq!(storage.get(CREDENTIAL_KEY).as_deref(), Some(after.as_str()));
    assert_eq!(state.refresh_calls(), 1);
}

#[tokio::test]
async fn concurrent_unauthorized_calls_share_one_refresh() {
    let (state, app, _storage, _events) = signed_in().await;
    state.invalidate_access_tokens();

    let (tasks, lists, raw) = tokio::join!(
        app.tasks().fetch_tasks(None),
        app.lists().fetch_lists(),
        app.api().list_tasks(None),
    );
    tasks.unwrap();
    lists.unwrap();
    raw.unwrap();
    assert_eq!(state.refresh_calls(), 1);
}

#[tokio::test]
async fn failed_refresh_signs_out_and_requests_login() {
    let (state, config) = backend().await;
    state.store.insert_verified("Ada", EMAIL, PASSWORD).unwrap();
    let storage = Arc::new(MemoryStorage::new());
    let (first, _first_events) = client(&config, &storage);
    first.api().sign_in(EMAIL, PASSWORD).await.unwrap();

    // A second client adopts the persisted credential but has no refresh
    // cookie of its own.
    let (second, mut events) = client(&config, &storage);
    assert!(second.restore_session().await);
    state.invalidate_access_tokens();

    let err = second.tasks().fetch_tasks(None).await.unwrap_err();
    assert_eq!(err.status(), Some(401));
    assert!(!second.session().snapshot().is_authenticated());
    assert!(storage.get(CREDENTIAL_KEY).is_none());
    assert!(drain(&mut events).contains(&SessionEvent::LoginRequired));
}

// ---------------------------------------------------------------------------
// Restore and sign-out
// ---------------------------------------------------------------------------

#[tokio::test]
async fn restore_falls_back_to_refresh_cookie() {
    let (state, app, storage, _events) = signed_in().await;
    storage.remove(CREDENTIAL_KEY).unwrap();

    assert!(app.restore_session().await);
    assert_eq!(state.refresh_calls(), 1);
    assert_eq!(app.session().display_name().as_deref(), Some("Ada"));
}

#[tokio::test]
async fn restore_without_anything_stays_anonymous() {
    let (_state, config) = backend().await;
    let (app, _events) = client(&config, &Arc::new(MemoryStorage::new()));
    assert!(!app.restore_session().await);
    assert_eq!(app.session().phase(), SessionPhase::Anonymous);
}

#[tokio::test]
async fn sign_out_clears_everywhere() {
    let (state, app, storage, mut events) = signed_in().await;
    drain(&mut events);

    app.api().sign_out().await;
    assert!(!app.session().snapshot().is_authenticated());
    assert!(storage.get(CREDENTIAL_KEY).is_none());
    assert_eq!(state.logout_calls(), 1);
    assert_eq!(drain(&mut events), [SessionEvent::SignedOut]);

    // The refresh cookie was revoked server-side.
    assert!(!app.restore_session().await);
}

#[tokio::test]
async fn deleting_account_ends_session() {
    let (_state, app, _storage, _events) = signed_in().await;
    app.api().delete_account().await.unwrap();

    assert!(!app.session().snapshot().is_authenticated());
    let err = app.api().sign_in(EMAIL, PASSWORD).await.unwrap_err();
    assert_eq!(err.status(), Some(401));
}

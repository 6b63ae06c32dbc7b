//! HTTP surface: shared state, routing and handlers.
//!
//! Every route lives under `/api`. Task and list routes require a bearer
//! credential; `/api/auth/refresh` authenticates with the refresh cookie
//! instead. List endpoints answer inside a `{data, message}` envelope and
//! task endpoints answer bare, so clients exercise both response shapes.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::header::SET_COOKIE;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use taskboard_proto::auth::{
    AccessTokenResponse, EmailRequest, GoogleSignInRequest, JwtResponse, LoginRequest,
    RegisterRequest, ResetPasswordRequest, VerifyRequest,
};
use taskboard_proto::datetime;
use taskboard_proto::list::{ListId, ListUpdate, NewList};
use taskboard_proto::task::{NewTask, StateChange, Task, TaskId, TaskStatus, TaskUpdate};
use tokio::task::JoinHandle;

use crate::error::MockError;
use crate::store::{Store, User};
use crate::tokens::{self, TokenIssuer};

type Params = Query<HashMap<String, String>>;

/// Shared mock backend state: the store, the credential issuer, and the
/// fault-injection knobs tests use to steer the server.
#[derive(Debug, Default)]
pub struct MockState {
    /// Accounts, tasks and lists.
    pub store: Store,
    tokens: TokenIssuer,
    reject_state_changes: AtomicBool,
    next_listing_delay_ms: AtomicU64,
    refresh_calls: AtomicUsize,
    logout_calls: AtomicUsize,
}

impl MockState {
    /// Creates an empty backend with default credential lifetime.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty backend issuing credentials valid `ttl_secs` seconds.
    #[must_use]
    pub fn with_access_ttl(ttl_secs: u64) -> Self {
        Self {
            tokens: TokenIssuer::new(ttl_secs),
            ..Self::default()
        }
    }

    /// Makes every `PATCH /tasks/{id}/state` fail with a 500 while set.
    pub fn reject_state_changes(&self, reject: bool) {
        self.reject_state_changes.store(reject, Ordering::SeqCst);
    }

    /// Delays the next `GET /tasks` response by `delay`. The listing is
    /// captured before the delay, so it reflects the store at request time.
    #[allow(clippy::cast_possible_truncation)]
    pub fn delay_next_listing(&self, delay: Duration) {
        self.next_listing_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// Invalidates every access credential issued so far. Refresh cookies
    /// stay valid.
    pub fn invalidate_access_tokens(&self) {
        self.tokens.invalidate_all();
    }

    /// Issues an access credential for `user` directly.
    #[must_use]
    pub fn issue_access_token(&self, user: &User) -> String {
        self.tokens.issue(user)
    }

    /// Number of `POST /auth/refresh` calls served so far.
    #[must_use]
    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    /// Number of `POST /auth/logout` calls served so far.
    #[must_use]
    pub fn logout_calls(&self) -> usize {
        self.logout_calls.load(Ordering::SeqCst)
    }

    fn authorize(&self, headers: &HeaderMap) -> Result<u64, MockError> {
        let raw = tokens::bearer(headers)
            .ok_or_else(|| MockError::Unauthorized("Authentication required".into()))?;
        let user = self.tokens.verify(raw)?;
        if self.store.user(user).is_none() {
            return Err(MockError::Unauthorized("Account no longer exists".into()));
        }
        Ok(user)
    }
}

/// `{data, message}` response envelope.
#[derive(Debug, Serialize)]
struct Envelope<T> {
    data: T,
    message: &'static str,
}

fn enveloped<T: Serialize>(data: T, message: &'static str) -> Json<Envelope<T>> {
    Json(Envelope { data, message })
}

/// Builds the `/api` router over `state`.
pub fn router(state: Arc<MockState>) -> Router {
    Router::new()
        .route("/api/auth/register", post(register))
        .route("/api/auth/verify", post(verify))
        .route("/api/auth/resend", post(resend))
        .route("/api/auth/login", post(login))
        .route("/api/auth/google", post(google))
        .route("/api/auth/refresh", post(refresh))
        .route("/api/auth/logout", post(logout))
        .route("/api/auth/forgot-password", post(forgot_password))
        .route("/api/auth/reset-password", post(reset_password))
        .route("/api/account", axum::routing::delete(delete_account))
        .route("/api/tasks", get(list_tasks).post(create_task))
        .route("/api/tasks/my-day", get(my_day_tasks))
        .route("/api/tasks/calendar", get(calendar_tasks))
        .route(
            "/api/tasks/{id}",
            get(get_task).patch(update_task).delete(delete_task),
        )
        .route("/api/tasks/{id}/state", patch(change_state))
        .route("/api/task-lists", get(list_lists).post(create_list))
        .route(
            "/api/task-lists/{id}",
            get(get_list).patch(update_list).delete(delete_list),
        )
        .with_state(state)
}

/// Starts the mock backend on the given address and returns the bound
/// address and a join handle.
///
/// # Errors
///
/// Returns an error if the TCP listener cannot bind to the given address.
pub async fn start_server(
    addr: &str,
) -> Result<(SocketAddr, JoinHandle<()>), Box<dyn std::error::Error + Send + Sync>> {
    start_server_with_state(addr, Arc::new(MockState::new())).await
}

/// Starts the mock backend over a pre-built [`MockState`], so tests can
/// keep a handle to the state for seeding and fault injection.
///
/// # Errors
///
/// Returns an error if the TCP listener cannot bind to the given address.
pub async fn start_server_with_state(
    addr: &str,
    state: Arc<MockState>,
) -> Result<(SocketAddr, JoinHandle<()>), Box<dyn std::error::Error + Send + Sync>> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let bound_addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "mock backend error");
        }
    });

    Ok((bound_addr, handle))
}

// ---------------------------------------------------------------------------
// Auth handlers
// ---------------------------------------------------------------------------

async fn register(
    State(state): State<Arc<MockState>>,
    Json(body): Json<RegisterRequest>,
) -> Result<Response, MockError> {
    let code = state.store.register(&body.name, &body.email, &body.password)?;
    tracing::info!(email = %body.email, %code, "verification code issued");
    Ok((StatusCode::CREATED, Json(json!({ "message": "Verification code sent" }))).into_response())
}

async fn verify(
    State(state): State<Arc<MockState>>,
    Json(body): Json<VerifyRequest>,
) -> Result<Json<serde_json::Value>, MockError> {
    state.store.verify(&body.email, &body.code)?;
    Ok(Json(json!({ "message": "Email verified" })))
}

async fn resend(
    State(state): State<Arc<MockState>>,
    Json(body): Json<EmailRequest>,
) -> Result<Json<serde_json::Value>, MockError> {
    let code = state.store.resend_code(&body.email)?;
    tracing::info!(email = %body.email, %code, "verification code reissued");
    Ok(Json(json!({ "message": "Verification code sent" })))
}

/// Issues a credential plus refresh cookie for `user`.
fn signed_in(state: &MockState, user: &User, body: impl Serialize) -> Response {
    let refresh = state.store.open_refresh(user.id);
    tracing::info!(user = user.id, "signed in");
    (
        [(SET_COOKIE, tokens::set_refresh_cookie(&refresh))],
        Json(body),
    )
        .into_response()
}

async fn login(
    State(state): State<Arc<MockState>>,
    Json(body): Json<LoginRequest>,
) -> Result<Response, MockError> {
    let user = state.store.authenticate(&body.email, &body.password)?;
    let token = state.tokens.issue(&user);
    Ok(signed_in(&state, &user, json!({ "token": token })))
}

async fn google(
    State(state): State<Arc<MockState>>,
    Json(body): Json<GoogleSignInRequest>,
) -> Result<Response, MockError> {
    let user = state.store.federated(&body.id_token)?;
    let jwt = state.tokens.issue(&user);
    Ok(signed_in(&state, &user, JwtResponse { jwt }))
}

async fn refresh(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
) -> Result<Json<AccessTokenResponse>, MockError> {
    state.refresh_calls.fetch_add(1, Ordering::SeqCst);
    let user = tokens::refresh_cookie(&headers)
        .and_then(|token| state.store.refresh_owner(&token))
        .and_then(|id| state.store.user(id))
        .ok_or_else(|| MockError::Unauthorized("Refresh token missing or revoked".into()))?;
    tracing::debug!(user = user.id, "access token refreshed");
    Ok(Json(AccessTokenResponse {
        access_token: state.tokens.issue(&user),
    }))
}

async fn logout(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    state.logout_calls.fetch_add(1, Ordering::SeqCst);
    if let Some(token) = tokens::refresh_cookie(&headers) {
        state.store.revoke_refresh(&token);
    }
    (
        [(SET_COOKIE, tokens::clear_refresh_cookie())],
        Json(json!({ "message": "Signed out" })),
    )
        .into_response()
}

async fn forgot_password(
    State(state): State<Arc<MockState>>,
    Json(body): Json<EmailRequest>,
) -> Json<serde_json::Value> {
    if let Some(token) = state.store.begin_reset(&body.email) {
        tracing::info!(email = %body.email, %token, "password reset token issued");
    }
    Json(json!({ "message": "If the account exists, a reset link was sent" }))
}

async fn reset_password(
    State(state): State<Arc<MockState>>,
    Json(body): Json<ResetPasswordRequest>,
) -> Result<Json<serde_json::Value>, MockError> {
    state.store.reset_password(&body.token, &body.new_password)?;
    Ok(Json(json!({ "message": "Password updated" })))
}

async fn delete_account(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
) -> Result<StatusCode, MockError> {
    let user = state.authorize(&headers)?;
    state.store.delete_user(user);
    tracing::info!(user, "account deleted");
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Task handlers
// ---------------------------------------------------------------------------

fn parse_param<T>(
    query: &HashMap<String, String>,
    key: &str,
    parse: impl Fn(&str) -> Option<T>,
) -> Result<Option<T>, MockError> {
    query
        .get(key)
        .map(|raw| {
            parse(raw).ok_or_else(|| MockError::BadRequest(format!("Invalid {key}: {raw}")))
        })
        .transpose()
}

async fn list_tasks(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Query(query): Params,
) -> Result<Json<Vec<Task>>, MockError> {
    let user = state.authorize(&headers)?;
    let list = query.get("listId").map(|id| ListId::new(id.as_str()));
    let due = parse_param(&query, "dueDate", datetime::parse_date)?;
    let status = parse_param(&query, "status", |raw| raw.parse::<TaskStatus>().ok())?;

    let tasks: Vec<Task> = state
        .store
        .tasks(user)
        .into_iter()
        .filter(|task| list.as_ref().is_none_or(|list| task.in_list(list)))
        .filter(|task| due.is_none_or(|due| task.due_date == Some(due)))
        .filter(|task| status.is_none_or(|status| task.effective_status() == status))
        .collect();

    let delay = state.next_listing_delay_ms.swap(0, Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }
    Ok(Json(tasks))
}

async fn my_day_tasks(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<Task>>, MockError> {
    let user = state.authorize(&headers)?;
    let today = Utc::now().date_naive();
    let tasks = state
        .store
        .tasks(user)
        .into_iter()
        .filter(|task| task.moved_to_my_day == Some(true) || task.due_date == Some(today))
        .collect();
    Ok(Json(tasks))
}

async fn calendar_tasks(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Query(query): Params,
) -> Result<Json<Vec<Task>>, MockError> {
    let user = state.authorize(&headers)?;
    let bound = |key: &str| -> Result<DateTime<Utc>, MockError> {
        parse_param(&query, key, datetime::parse_timestamp)?
            .ok_or_else(|| MockError::BadRequest(format!("{key} is required")))
    };
    let (start, end) = (bound("startDate")?, bound("endDate")?);
    let tasks = state
        .store
        .tasks(user)
        .into_iter()
        .filter(|task| {
            task.due_date
                .is_some_and(|due| due >= start.date_naive() && due <= end.date_naive())
        })
        .collect();
    Ok(Json(tasks))
}

async fn get_task(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Task>, MockError> {
    let user = state.authorize(&headers)?;
    Ok(Json(state.store.task(user, &TaskId::new(id))?))
}

async fn create_task(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Json(body): Json<NewTask>,
) -> Result<(StatusCode, Json<Task>), MockError> {
    let user = state.authorize(&headers)?;
    let task = state.store.create_task(user, body)?;
    tracing::debug!(user, id = %task.id, "task created");
    Ok((StatusCode::CREATED, Json(task)))
}

async fn update_task(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<TaskUpdate>,
) -> Result<Json<Task>, MockError> {
    let user = state.authorize(&headers)?;
    Ok(Json(state.store.update_task(user, &TaskId::new(id), &body)?))
}

async fn change_state(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<StateChange>,
) -> Result<Json<Task>, MockError> {
    let user = state.authorize(&headers)?;
    if state.reject_state_changes.load(Ordering::SeqCst) {
        return Err(MockError::Internal("Failed to update task state".into()));
    }
    Ok(Json(state.store.set_status(user, &TaskId::new(id), body.status)?))
}

async fn delete_task(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<StatusCode, MockError> {
    let user = state.authorize(&headers)?;
    state.store.delete_task(user, &TaskId::new(id))?;
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// List handlers
// ---------------------------------------------------------------------------

async fn list_lists(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, MockError> {
    let user = state.authorize(&headers)?;
    Ok(enveloped(state.store.lists(user), "ok"))
}

async fn get_list(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, MockError> {
    let user = state.authorize(&headers)?;
    Ok(enveloped(state.store.list(user, &ListId::new(id))?, "ok"))
}

async fn create_list(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Json(body): Json<NewList>,
) -> Result<impl IntoResponse, MockError> {
    let user = state.authorize(&headers)?;
    let list = state.store.create_list(user, body)?;
    Ok((StatusCode::CREATED, enveloped(list, "List created")))
}

async fn update_list(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<ListUpdate>,
) -> Result<impl IntoResponse, MockError> {
    let user = state.authorize(&headers)?;
    let list = state.store.update_list(user, &ListId::new(id), &body)?;
    Ok(enveloped(list, "List updated"))
}

async fn delete_list(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<StatusCode, MockError> {
    let user = state.authorize(&headers)?;
    state.store.delete_list(user, &ListId::new(id))?;
    Ok(StatusCode::NO_CONTENT)
}

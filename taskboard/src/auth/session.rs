//! Session lifecycle: login, logout, refresh and startup restore.
//!
//! The [`SessionManager`] is the only writer of the process-wide [`Session`].
//! State transitions are published as [`SessionEvent`]s on a bounded channel
//! for whatever presentation layer sits on top.

use parking_lot::RwLock;
use tokio::sync::{Mutex, mpsc};
use url::Url;

use taskboard_proto::codec;

use super::token::{self, TokenStore};
use crate::api::{self, ApiError, BaseUrl};

/// Where the session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// No credential.
    Anonymous,
    /// A sign-in request is in flight.
    Authenticating,
    /// A valid credential is installed.
    Authenticated,
    /// A silent refresh is in flight.
    Refreshing,
}

/// Snapshot of the current session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    /// Raw bearer credential.
    pub credential: Option<String>,
    /// Display name decoded from the credential.
    pub display_name: Option<String>,
}

impl Session {
    /// Whether a credential is present.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.credential.is_some()
    }
}

/// Notifications for the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A credential was installed (login, refresh or restore).
    SignedIn {
        /// Display name carried by the credential.
        display_name: Option<String>,
    },
    /// The session became anonymous.
    SignedOut,
    /// An authenticated call failed irrecoverably; show the login surface.
    LoginRequired,
}

#[derive(Debug)]
struct State {
    session: Session,
    phase: SessionPhase,
}

/// Owns the session and its transitions.
///
/// Shares the HTTP client (and therefore the cookie jar holding the refresh
/// cookie) with the [`ApiClient`](crate::api::ApiClient).
#[derive(Debug)]
pub struct SessionManager {
    http: reqwest::Client,
    base: BaseUrl,
    tokens: TokenStore,
    state: RwLock<State>,
    /// Serializes refreshes so concurrent 401s trigger one refresh.
    refresh_gate: Mutex<()>,
    events: mpsc::Sender<SessionEvent>,
}

impl SessionManager {
    /// Creates an anonymous session.
    ///
    /// Returns the manager and the receiving end of its event channel.
    /// Call [`restore`](Self::restore) to adopt a persisted credential.
    pub fn new(
        http: reqwest::Client,
        base: BaseUrl,
        tokens: TokenStore,
        event_buffer: usize,
    ) -> (Self, mpsc::Receiver<SessionEvent>) {
        let (events, rx) = mpsc::channel(event_buffer.max(1));
        let manager = Self {
            http,
            base,
            tokens,
            state: RwLock::new(State {
                session: Session::default(),
                phase: SessionPhase::Anonymous,
            }),
            refresh_gate: Mutex::new(()),
            events,
        };
        (manager, rx)
    }

    // --- accessors ---

    /// Current session snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Session {
        self.state.read().session.clone()
    }

    /// Current raw credential, if any.
    #[must_use]
    pub fn credential(&self) -> Option<String> {
        self.state.read().session.credential.clone()
    }

    /// Current display name, if any.
    #[must_use]
    pub fn display_name(&self) -> Option<String> {
        self.state.read().session.display_name.clone()
    }

    /// Current lifecycle phase.
    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        self.state.read().phase
    }

    // --- transitions ---

    /// Installs `raw` as the session credential.
    ///
    /// An expired or undecodable credential is treated as a logout and
    /// `false` is returned.
    pub async fn login(&self, raw: &str) -> bool {
        if token::is_expired(Some(raw)) {
            tracing::info!("rejecting expired credential, signing out");
            self.logout().await;
            return false;
        }
        self.install(raw);
        true
    }

    /// Adopts the credential carried by an OAuth success redirect
    /// (`...?token=<credential>`).
    ///
    /// Returns `false`, leaving the session untouched, when the URL cannot
    /// be parsed or carries no token.
    pub async fn login_from_redirect(&self, redirect: &str) -> bool {
        let token = Url::parse(redirect).ok().and_then(|url| {
            url.query_pairs()
                .find(|(key, value)| key == "token" && !value.is_empty())
                .map(|(_, value)| value.into_owned())
        });
        match token {
            Some(token) => self.login(&token).await,
            None => {
                tracing::warn!("redirect carried no token");
                false
            }
        }
    }

    /// Ends the session.
    ///
    /// Local state is cleared first, then the backend is asked to drop its
    /// refresh state. A failure of that request is logged and ignored.
    pub async fn logout(&self) {
        self.clear_local();

        let notify = async {
            let url = self.base.join("auth/logout")?;
            let response = self
                .http
                .post(url.clone())
                .send()
                .await
                .map_err(|e| api::connectivity(&url, e))?;
            api::read_body(response).await?;
            Ok::<(), ApiError>(())
        };
        if let Err(e) = notify.await {
            tracing::warn!(error = %e, "backend logout failed, refresh cookie may outlive the session");
        }
    }

    /// Exchanges the refresh cookie for a new credential.
    ///
    /// The returned credential is installed without checking its expiry.
    /// On any failure the session is logged out and `None` is returned.
    pub async fn refresh(&self) -> Option<String> {
        let _gate = self.refresh_gate.lock().await;
        self.refresh_locked().await
    }

    /// Refreshes unless the credential that just failed (`stale`) has
    /// already been replaced, in which case the replacement is returned.
    ///
    /// A stale credential that was cleared while waiting means another
    /// request's refresh failed and logged out; `None` is returned without
    /// contacting the backend again.
    pub(crate) async fn refresh_after(&self, stale: Option<&str>) -> Option<String> {
        let _gate = self.refresh_gate.lock().await;
        match self.credential() {
            Some(current) if stale != Some(current.as_str()) => {
                tracing::debug!("credential already refreshed by another request");
                return Some(current);
            }
            None if stale.is_some() => {
                tracing::debug!("session cleared by a failed refresh while waiting");
                return None;
            }
            _ => {}
        }
        self.refresh_locked().await
    }

    async fn refresh_locked(&self) -> Option<String> {
        self.set_phase(SessionPhase::Refreshing);
        match self.request_refresh().await {
            Ok(raw) => {
                self.install(&raw);
                tracing::info!("session refreshed");
                Some(raw)
            }
            Err(e) => {
                tracing::warn!(error = %e, "session refresh failed");
                self.logout().await;
                None
            }
        }
    }

    async fn request_refresh(&self) -> Result<String, ApiError> {
        let url = self.base.join("auth/refresh")?;
        let response = self
            .http
            .post(url.clone())
            .send()
            .await
            .map_err(|e| api::connectivity(&url, e))?;
        let body = api::read_body(response).await?;
        codec::decode_credential(&body).ok_or(ApiError::InvalidCredential)
    }

    /// Startup reconciliation.
    ///
    /// Adopts a persisted, unexpired credential; otherwise tries one refresh.
    /// Returns whether the session ended up authenticated.
    pub async fn restore(&self) -> bool {
        match self.tokens.load() {
            Some(raw) if !token::is_expired(Some(&raw)) => {
                let name = token::display_name(&raw).or_else(|| self.tokens.cached_display_name());
                self.set_session(raw, name);
                tracing::info!("restored persisted session");
                true
            }
            _ => self.refresh().await.is_some(),
        }
    }

    /// Clears the credential in memory and in storage without any network
    /// call. Publishes [`SessionEvent::SignedOut`] if a session existed.
    pub fn clear_local(&self) {
        if let Err(e) = self.tokens.clear() {
            tracing::warn!(error = %e, "failed to clear persisted credential");
        }
        let was_authenticated = {
            let mut state = self.state.write();
            let was = state.session.is_authenticated();
            state.session = Session::default();
            state.phase = SessionPhase::Anonymous;
            was
        };
        if was_authenticated {
            tracing::info!("signed out");
            self.emit(SessionEvent::SignedOut);
        }
    }

    /// Asks the presentation layer to show the login surface.
    pub fn require_login(&self) {
        self.emit(SessionEvent::LoginRequired);
    }

    /// Marks a sign-in request as in flight.
    pub(crate) fn begin_authentication(&self) {
        let mut state = self.state.write();
        if !state.session.is_authenticated() {
            state.phase = SessionPhase::Authenticating;
        }
    }

    /// Returns to anonymous after a failed sign-in request.
    pub(crate) fn abort_authentication(&self) {
        let mut state = self.state.write();
        if state.phase == SessionPhase::Authenticating {
            state.phase = SessionPhase::Anonymous;
        }
    }

    fn install(&self, raw: &str) {
        let name = match self.tokens.persist(raw) {
            Ok(name) => name,
            Err(e) => {
                tracing::warn!(error = %e, "failed to persist credential, session will not survive restart");
                token::display_name(raw)
            }
        };
        self.set_session(raw.to_string(), name);
    }

    fn set_session(&self, credential: String, display_name: Option<String>) {
        {
            let mut state = self.state.write();
            state.session = Session {
                credential: Some(credential),
                display_name: display_name.clone(),
            };
            state.phase = SessionPhase::Authenticated;
        }
        self.emit(SessionEvent::SignedIn { display_name });
    }

    fn set_phase(&self, phase: SessionPhase) {
        self.state.write().phase = phase;
    }

    fn emit(&self, event: SessionEvent) {
        if self.events.try_send(event).is_err() {
            tracing::debug!("session event dropped, channel full or closed");
        }
    }
}

// Process-wide session context and the extractor protected pages use

use std::sync::Arc;

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{Method, Uri, header, request::Parts},
};
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::{
    AppState,
    error::{ApiError, AppError},
    listings_api::SessionSource,
    models::{Credentials, SessionUser},
};

#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    /// Not checked against the remote yet.
    Unknown,
    Anonymous,
    Authenticated(SessionUser),
}

struct Snapshot {
    state: SessionState,
    checked_at: Option<DateTime<Utc>>,
}

/// Who is logged in, shared by every page.
///
/// Checked once at startup with `initialize`, replaced on `login`, cleared on
/// `logout`. Pages read it instead of asking the remote on every request.
pub struct SessionContext {
    source: Arc<dyn SessionSource>,
    snapshot: RwLock<Snapshot>,
}

impl SessionContext {
    pub fn new(source: Arc<dyn SessionSource>) -> Self {
        SessionContext {
            source,
            snapshot: RwLock::new(Snapshot { state: SessionState::Unknown, checked_at: None }),
        }
    }

    /// Asks the remote who is logged in. Once a state is known this returns it
    /// without a request. No lock is held while the remote answers, and an
    /// answer that arrives after a login or logout is dropped.
    pub async fn initialize(&self) -> SessionState {
        {
            let snapshot = self.snapshot.read().await;
            if snapshot.state != SessionState::Unknown {
                return snapshot.state.clone();
            }
        }

        let checked = match self.source.current_user().await {
            Ok(Some(user)) => {
                info!(user_id = user.user_id, username = %user.username, "Existing session found");
                SessionState::Authenticated(user)
            }
            Ok(None) => {
                info!("No existing session");
                SessionState::Anonymous
            }
            Err(e) => {
                warn!(error = %e, "Session check failed, continuing anonymously");
                SessionState::Anonymous
            }
        };

        let mut snapshot = self.snapshot.write().await;
        if snapshot.state == SessionState::Unknown {
            snapshot.state = checked;
            snapshot.checked_at = Some(Utc::now());
        }
        snapshot.state.clone()
    }

    pub async fn state(&self) -> SessionState {
        self.snapshot.read().await.state.clone()
    }

    pub async fn current_user(&self) -> Option<SessionUser> {
        match &self.snapshot.read().await.state {
            SessionState::Authenticated(user) => Some(user.clone()),
            _ => None,
        }
    }

    pub async fn is_authenticated(&self) -> bool {
        self.current_user().await.is_some()
    }

    pub async fn checked_at(&self) -> Option<DateTime<Utc>> {
        self.snapshot.read().await.checked_at
    }

    pub async fn login(&self, credentials: &Credentials) -> Result<SessionUser, ApiError> {
        self.source.login(credentials).await?;
        let user = self.source.current_user().await?.ok_or_else(|| ApiError::Rejected {
            status: 401,
            message: "Login did not create a session.".to_string(),
        })?;

        let mut snapshot = self.snapshot.write().await;
        snapshot.state = SessionState::Authenticated(user.clone());
        snapshot.checked_at = Some(Utc::now());
        info!(user_id = user.user_id, username = %user.username, "Logged in");
        Ok(user)
    }

    /// Always ends anonymous, even when the remote logout call fails.
    pub async fn logout(&self) {
        if let Err(e) = self.source.logout().await {
            warn!(error = %e, "Remote logout failed; clearing local session anyway");
        }
        let mut snapshot = self.snapshot.write().await;
        snapshot.state = SessionState::Anonymous;
        snapshot.checked_at = Some(Utc::now());
        info!("Logged out");
    }
}

/// Extracted by handlers that need a logged-in user. Browsers without a
/// session are redirected to the login page.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub SessionUser);

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);
        match app_state.session.current_user().await {
            Some(user) => Ok(AuthenticatedUser(user)),
            None => {
                warn!(path = %parts.uri.path(), "Protected page requested without a session");
                Err(AppError::LoginRequired(return_path(parts)))
            }
        }
    }
}

/// Page to come back to after logging in. Form posts cannot be replayed, so
/// they return to the page the form was on.
fn return_path(parts: &Parts) -> String {
    if parts.method == Method::GET {
        return parts.uri.path().to_string();
    }
    parts
        .headers
        .get(header::REFERER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<Uri>().ok())
        .map(|uri| uri.path().to_string())
        .unwrap_or_else(|| "/properties".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeApi;
    use std::time::Duration;

    #[tokio::test]
    async fn initialize_checks_the_remote_once() {
        let api = Arc::new(FakeApi::default());
        api.sign_in("ashley");
        let session = SessionContext::new(api.clone());

        assert_eq!(session.state().await, SessionState::Unknown);
        assert!(matches!(session.initialize().await, SessionState::Authenticated(_)));
        session.initialize().await;
        assert!(session.is_authenticated().await);
        assert_eq!(*api.me_calls.lock().unwrap(), 1);
        assert!(session.checked_at().await.is_some());
    }

    #[tokio::test]
    async fn slow_check_does_not_block_readers_or_override_login() {
        let api = Arc::new(FakeApi::default());
        *api.me_delay.lock().unwrap() = Some(Duration::from_millis(200));
        let session = Arc::new(SessionContext::new(api.clone()));

        let check = tokio::spawn({
            let session = session.clone();
            async move { session.initialize().await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;

        let state = tokio::time::timeout(Duration::from_millis(50), session.state()).await;
        assert_eq!(state.unwrap(), SessionState::Unknown);

        *api.me_delay.lock().unwrap() = None;
        session
            .login(&Credentials { username: "maria".into(), password: "secret".into() })
            .await
            .unwrap();

        assert!(matches!(check.await.unwrap(), SessionState::Authenticated(user) if user.username == "maria"));
        assert!(session.is_authenticated().await);
    }

    #[tokio::test]
    async fn failed_check_means_anonymous() {
        let api = Arc::new(FakeApi::default());
        api.fail_with(ApiError::Transport("offline".into()));
        let session = SessionContext::new(api.clone());

        assert_eq!(session.initialize().await, SessionState::Anonymous);
        assert_eq!(session.current_user().await, None);
    }

    #[tokio::test]
    async fn login_then_logout() {
        let api = Arc::new(FakeApi::default());
        let session = SessionContext::new(api.clone());
        session.initialize().await;

        let err = session
            .login(&Credentials { username: "jeff".into(), password: "wrong".into() })
            .await
            .unwrap_err();
        assert_eq!(err, ApiError::Rejected { status: 401, message: "Invalid credentials".into() });
        assert!(!session.is_authenticated().await);

        let user = session
            .login(&Credentials { username: "jeff".into(), password: "secret".into() })
            .await
            .unwrap();
        assert_eq!(user.username, "jeff");
        assert!(session.is_authenticated().await);

        session.logout().await;
        assert_eq!(session.state().await, SessionState::Anonymous);
        assert_eq!(*api.logout_calls.lock().unwrap(), 1);
    }

    #[test]
    fn return_path_for_form_posts_uses_referer() {
        let (mut parts, _) = axum::http::Request::post("/listing/7/review")
            .header(header::REFERER, "http://localhost:3000/listing/7")
            .body(())
            .unwrap()
            .into_parts();
        assert_eq!(return_path(&parts), "/listing/7");

        parts.headers.clear();
        assert_eq!(return_path(&parts), "/properties");

        let (parts, _) = axum::http::Request::get("/manage").body(()).unwrap().into_parts();
        assert_eq!(return_path(&parts), "/manage");
    }

    #[tokio::test]
    async fn logout_clears_local_state_when_remote_fails() {
        let api = Arc::new(FakeApi::default());
        api.sign_in("sophia");
        let session = SessionContext::new(api.clone());
        session.initialize().await;

        api.fail_with(ApiError::Transport("offline".into()));
        session.logout().await;
        assert!(!session.is_authenticated().await);
    }
}

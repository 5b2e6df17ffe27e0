//! Cookie-keyed server-side sessions.
//!
//! The cookie only carries a signed session id; the logged-in user id lives
//! in the session store under [`LOGGED_IN_USER_KEY`].

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
    Router,
};
use sha2::{Digest, Sha512};
use tower_sessions::{
    cookie::{Key, SameSite},
    Expiry, MemoryStore, Session, SessionManagerLayer,
};
use tracing::warn;

use crate::{config::SessionConfig, error::AppError, state::AppState};

pub const LOGGED_IN_USER_KEY: &str = "loggedInUser";

/// Rolling expiry: every saved request pushes the deadline forward.
pub fn expiry(config: &SessionConfig) -> Expiry {
    Expiry::OnInactivity(time::Duration::seconds(config.timeout_secs))
}

/// 64-byte cookie signing key derived from the configured secret.
pub fn signing_key(secret: &str) -> Key {
    let digest = Sha512::digest(secret.as_bytes());
    Key::from(digest.as_slice())
}

/// Wraps `router` in a session manager backed by an in-process store.
pub fn with_sessions<S>(router: Router<S>, config: &SessionConfig) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    let layer = SessionManagerLayer::new(MemoryStore::default())
        .with_name(config.cookie_name.clone())
        .with_secure(config.secure)
        .with_http_only(true)
        .with_same_site(SameSite::Lax)
        .with_expiry(expiry(config))
        .with_signed(signing_key(&config.secret));
    router.layer(layer)
}

/// Rejects requests without a logged-in user and refreshes the expiry of
/// those with one.
pub async fn require_session(
    State(state): State<AppState>,
    session: Session,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let user: Option<String> = session.get(LOGGED_IN_USER_KEY).await?;
    if user.is_none() {
        warn!(uri = %request.uri(), "session expired");
        return Err(AppError::Unauthorized("Session expired"));
    }
    session.set_expiry(Some(expiry(&state.config.session)));
    Ok(next.run(request).await)
}

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::{password::verify_password, session::LOGGED_IN_USER_KEY},
    error::{AppError, AppJson},
    state::AppState,
    users::{
        dto::{MessageResponse, UserResponse},
        services::normalize_email,
    },
};

const INVALID_CREDENTIALS: &str = "Invalid username or password";
const NO_LOGGED_IN_USER: &str = "Logged in user not found";

/// Request body for login.
#[derive(Debug, Deserialize)]
pub struct Credentials {
    #[serde(rename = "emailID", alias = "email")]
    pub email_id: String,
    pub password: String,
}

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/loggedInUser", get(logged_in_user))
}

#[instrument(skip(state, session, payload))]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    AppJson(payload): AppJson<Credentials>,
) -> Result<Json<MessageResponse>, AppError> {
    let email = normalize_email(&payload.email_id);

    let user = match state.users.find_by_email(&email).await {
        Ok(Some(u)) => u,
        Ok(None) => {
            warn!(%email, "login unknown email");
            return Err(AppError::Unauthorized(INVALID_CREDENTIALS));
        }
        Err(e) => return Err(AppError::internal("Error in login", e)),
    };

    let ok = verify_password(payload.password, user.password_hash.clone())
        .await
        .map_err(|e| AppError::internal("Error in login", e))?;
    if !ok {
        warn!(%email, user_id = %user.id, "login invalid password");
        return Err(AppError::Unauthorized(INVALID_CREDENTIALS));
    }

    session.cycle_id().await?;
    session
        .insert(LOGGED_IN_USER_KEY, user.id.to_string())
        .await?;

    info!(user_id = %user.id, "user logged in");
    Ok(Json(MessageResponse {
        message: "logged in successfully",
    }))
}

#[instrument(skip(state, session))]
pub async fn logged_in_user(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<UserResponse>, AppError> {
    let Some(raw_id) = session.get::<String>(LOGGED_IN_USER_KEY).await? else {
        return Err(AppError::Unauthorized(NO_LOGGED_IN_USER));
    };
    let user_id =
        Uuid::parse_str(&raw_id).map_err(|_| AppError::Unauthorized("Invalid session user ID"))?;

    let user = state
        .users
        .find_by_id(user_id)
        .await
        .map_err(|e| AppError::internal("Error in loading user", e))?
        .ok_or_else(|| {
            warn!(%user_id, "session points at a missing user");
            AppError::Unauthorized(NO_LOGGED_IN_USER)
        })?;

    Ok(Json(user.into()))
}

#[instrument(skip(session))]
pub async fn logout(session: Session) -> Result<Json<MessageResponse>, AppError> {
    session.flush().await?;
    Ok(Json(MessageResponse {
        message: "logged out successfully",
    }))
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    use crate::test_support::{build_test_app, login_cookie, request, send, with_cookie};

    #[tokio::test]
    async fn login_then_fetch_logged_in_user() {
        let (app, state) = build_test_app(false);
        let cookie = login_cookie(&app, &state, "ann@example.com", "abc123").await;

        let (status, _, body) = send(
            &app,
            with_cookie(request(Method::GET, "/loggedInUser", None), &cookie),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["email"], "ann@example.com");
        assert!(body.get("password").is_none());
    }

    #[tokio::test]
    async fn logged_in_user_requires_session() {
        let (app, _) = build_test_app(false);
        let (status, _, body) = send(&app, request(Method::GET, "/loggedInUser", None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "Logged in user not found");
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_email_are_rejected_alike() {
        let (app, state) = build_test_app(false);
        login_cookie(&app, &state, "ann@example.com", "abc123").await;

        for creds in [
            json!({"emailID": "ann@example.com", "password": "wrong1"}),
            json!({"emailID": "bob@example.com", "password": "abc123"}),
        ] {
            let (status, headers, body) =
                send(&app, request(Method::POST, "/login", Some(creds))).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED);
            assert_eq!(body["message"], "Invalid username or password");
            assert!(headers.get("set-cookie").is_none());
        }
    }

    #[tokio::test]
    async fn login_accepts_email_alias_and_any_case() {
        let (app, state) = build_test_app(false);
        login_cookie(&app, &state, "ann@example.com", "abc123").await;

        let (status, headers, _) = send(
            &app,
            request(
                Method::POST,
                "/login",
                Some(json!({"email": "ANN@example.com", "password": "abc123"})),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(headers.get("set-cookie").is_some());
    }

    #[tokio::test]
    async fn logout_ends_the_session() {
        let (app, state) = build_test_app(false);
        let cookie = login_cookie(&app, &state, "ann@example.com", "abc123").await;

        let (status, _, body) =
            send(&app, with_cookie(request(Method::POST, "/logout", None), &cookie)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "logged out successfully");

        let (status, _, _) = send(
            &app,
            with_cookie(request(Method::GET, "/loggedInUser", None), &cookie),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn tampered_cookie_is_not_a_session() {
        let (app, state) = build_test_app(false);
        let cookie = login_cookie(&app, &state, "ann@example.com", "abc123").await;
        let (name, value) = cookie.split_once('=').unwrap();
        let forged = format!("{name}=x{value}");

        let (status, _, _) = send(
            &app,
            with_cookie(request(Method::GET, "/loggedInUser", None), &forged),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}

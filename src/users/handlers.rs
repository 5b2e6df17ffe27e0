use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        DefaultBodyLimit, Multipart, Path, State,
    },
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use time::OffsetDateTime;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{
    dto::{MessageResponse, SavedUserResponse, StatusChangeResponse, UserForm, UserResponse},
    repo_types::{User, UserFilter, UserImage},
    services::{create_user, update_user},
};
use crate::{
    error::{AppError, AppJson},
    state::AppState,
};

const IMAGE_FIELD: &str = "userImage";

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users))
        .route("/activeusers", get(list_active_users))
        .route("/user/:id", get(get_user))
        .route("/user/:id/image", get(get_user_image))
}

pub fn write_routes(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/user", post(save_user))
        .route("/user/:id", put(put_user))
        .route("/user/:id/activate", put(activate_user))
        .route("/user/:id/inactivate", put(inactivate_user))
        .route(
            "/user/:id/image",
            put(save_user_image).layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
}

fn parse_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::InvalidId)
}

async fn load_user(state: &AppState, raw_id: &str) -> Result<User, AppError> {
    let id = parse_id(raw_id)?;
    state
        .users
        .find_by_id(id)
        .await
        .map_err(|e| AppError::internal("Error in loading user", e))?
        .ok_or(AppError::NotFound("User not found"))
}

async fn list(state: &AppState, filter: UserFilter) -> Result<Json<Vec<UserResponse>>, AppError> {
    let users = state
        .users
        .list(filter)
        .await
        .map_err(|e| AppError::internal("Error in listing users", e))?;
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

#[instrument(skip(state))]
pub async fn list_users(
    State(state): State<AppState>,
) -> Result<Json<Vec<UserResponse>>, AppError> {
    list(&state, UserFilter::All).await
}

#[instrument(skip(state))]
pub async fn list_active_users(
    State(state): State<AppState>,
) -> Result<Json<Vec<UserResponse>>, AppError> {
    list(&state, UserFilter::ActiveOnly).await
}

#[instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<UserResponse>, AppError> {
    let user = load_user(&state, &id).await?;
    Ok(Json(user.into()))
}

#[instrument(skip(state, payload))]
pub async fn save_user(
    State(state): State<AppState>,
    AppJson(UserForm(payload)): AppJson<UserForm>,
) -> Result<Json<SavedUserResponse>, AppError> {
    let user = create_user(state.users.as_ref(), payload).await?;
    Ok(Json(SavedUserResponse {
        message: "User saved successfully",
        user: user.into(),
    }))
}

/// The body is parsed only after the user is found, so a bad id wins over a
/// bad body.
#[instrument(skip(state, payload))]
pub async fn put_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<AppJson<UserForm>, AppError>,
) -> Result<Json<SavedUserResponse>, AppError> {
    let existing = load_user(&state, &id).await?;
    let AppJson(UserForm(patch)) = payload?;
    let user = update_user(state.users.as_ref(), existing, patch).await?;
    Ok(Json(SavedUserResponse {
        message: "User updated successfully",
        user: user.into(),
    }))
}

async fn set_active(
    state: &AppState,
    raw_id: &str,
    active: bool,
) -> Result<Uuid, AppError> {
    let user = load_user(state, raw_id).await?;
    let context = if active {
        "Error in activating user"
    } else {
        "Error in inactivating user"
    };
    let found = state
        .users
        .set_active(user.id, active, OffsetDateTime::now_utc())
        .await
        .map_err(|e| AppError::internal(context, e))?;
    if !found {
        return Err(AppError::NotFound("User not found"));
    }
    info!(user_id = %user.id, active, "user status changed");
    Ok(user.id)
}

#[instrument(skip(state))]
pub async fn activate_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<StatusChangeResponse>, AppError> {
    let id = set_active(&state, &id, true).await?;
    Ok(Json(StatusChangeResponse {
        message: "User activated successfully",
        id,
    }))
}

#[instrument(skip(state))]
pub async fn inactivate_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<StatusChangeResponse>, AppError> {
    let id = set_active(&state, &id, false).await?;
    Ok(Json(StatusChangeResponse {
        message: "User inactivated successfully",
        id,
    }))
}

fn read_file_error(detail: impl ToString) -> AppError {
    AppError::BadRequest {
        message: "Error in reading file",
        detail: Some(detail.to_string()),
    }
}

fn multipart_error(err: MultipartError, limit: usize) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        warn!(limit, "image upload over the size limit");
        AppError::PayloadTooLarge { limit }
    } else {
        read_file_error(err.body_text())
    }
}

/// Pulls the `userImage` part out of the form, skipping any other fields.
async fn read_image(mut mp: Multipart, limit: usize) -> Result<UserImage, AppError> {
    let field_error = move |e: MultipartError| multipart_error(e, limit);
    while let Some(field) = mp.next_field().await.map_err(field_error)? {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }
        let content_type = field.content_type().unwrap_or_default().to_string();
        if !content_type.starts_with("image/") {
            warn!(%content_type, "rejected non-image upload");
            return Err(AppError::UnsupportedMedia);
        }
        let data = field.bytes().await.map_err(field_error)?;
        return Ok(UserImage {
            content_type,
            data,
        });
    }
    Err(read_file_error(format!("missing form field `{IMAGE_FIELD}`")))
}

#[instrument(skip(state, form))]
pub async fn save_user_image(
    State(state): State<AppState>,
    Path(id): Path<String>,
    form: Result<Multipart, MultipartRejection>,
) -> Result<Json<MessageResponse>, AppError> {
    let user = load_user(&state, &id).await?;
    let limit = state.config.max_upload_bytes;
    let image = read_image(form.map_err(|e| read_file_error(e.body_text()))?, limit).await?;
    let size = image.data.len();

    let found = state
        .users
        .set_image(user.id, image, OffsetDateTime::now_utc())
        .await
        .map_err(|e| AppError::internal("Error in uploading image", e))?;
    if !found {
        return Err(AppError::NotFound("User not found"));
    }
    info!(user_id = %user.id, size, "user image stored");
    Ok(Json(MessageResponse {
        message: "Image uploaded successfully",
    }))
}

#[instrument(skip(state))]
pub async fn get_user_image(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let user = load_user(&state, &id).await?;
    let image = state
        .users
        .find_image(user.id)
        .await
        .map_err(|e| AppError::internal("Error in loading image", e))?
        .ok_or(AppError::NotFound("Image not found"))?;
    Ok(([(header::CONTENT_TYPE, image.content_type)], image.data).into_response())
}

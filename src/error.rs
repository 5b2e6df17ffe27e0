use axum::{
    extract::{rejection::JsonRejection, FromRequest},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::error;

use crate::validation::ValidationErrors;

/// JSON body extractor whose rejection renders through [`AppError`].
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);

/// Body of every failed response: `{message, error?, validationErrors?}`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation_errors: Option<ValidationErrors>,
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Error in parsing json")]
    Json(#[from] JsonRejection),
    #[error("Invalid user ID")]
    InvalidId,
    #[error("Error in validation")]
    Validation(ValidationErrors),
    #[error("{message}")]
    BadRequest {
        message: &'static str,
        detail: Option<String>,
    },
    #[error("{0}")]
    Unauthorized(&'static str),
    #[error("{0}")]
    NotFound(&'static str),
    #[error("Upload valid image file")]
    UnsupportedMedia,
    #[error("Image is too large")]
    PayloadTooLarge { limit: usize },
    #[error("Request timed out")]
    Timeout,
    #[error("Session error")]
    Session(#[from] tower_sessions::session::Error),
    #[error("{message}")]
    Internal {
        message: &'static str,
        cause: anyhow::Error,
    },
}

impl AppError {
    pub fn internal(message: &'static str, cause: impl Into<anyhow::Error>) -> Self {
        Self::Internal {
            message,
            cause: cause.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Json(_) | Self::InvalidId | Self::Validation(_) | Self::BadRequest { .. } => {
                StatusCode::BAD_REQUEST
            }
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::UnsupportedMedia => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Timeout => StatusCode::REQUEST_TIMEOUT,
            Self::Session(_) | Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn body(&self) -> ErrorBody {
        let mut body = ErrorBody {
            message: self.to_string(),
            error: None,
            validation_errors: None,
        };
        match self {
            Self::Json(rejection) => body.error = Some(rejection.body_text()),
            Self::Validation(errors) => body.validation_errors = Some(errors.clone()),
            Self::BadRequest { detail, .. } => body.error = detail.clone(),
            Self::PayloadTooLarge { limit } => {
                body.error = Some(format!("upload limit is {limit} bytes"))
            }
            Self::Session(e) => body.error = Some(e.to_string()),
            Self::Internal { cause, .. } => body.error = Some(format!("{cause:#}")),
            _ => {}
        }
        body
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = ?self, "request failed");
        }
        (status, Json(self.body())).into_response()
    }
}

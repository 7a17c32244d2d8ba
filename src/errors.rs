use crate::{services::error::ServiceError, state::AppState};
use axum::{
    Json,
    extract::{Request, State, multipart::MultipartError},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

/// A lightweight wrapper for general errors that keeps the message local.
///
/// `details` carries the underlying cause. It is only written to the
/// response body by [`expose_error_details`] in development mode.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
    pub details: Option<String>,
}

/// Response extension holding what [`expose_error_details`] needs.
#[derive(Debug, Clone)]
struct ErrorReport {
    message: String,
    details: String,
}

impl AppError {
    /// Create a new AppError with a specific status and message.
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
            details: None,
        }
    }

    /// Shortcut for a 500 Internal Server Error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, msg)
    }

    /// Shortcut for 404 Not Found
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, msg)
    }

    /// Shortcut for 400 Bad Request
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, msg)
    }

    pub fn with_details(mut self, details: impl fmt::Display) -> Self {
        self.details = Some(details.to_string());
        self
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.message,
            "status": self.status.as_u16()
        }));

        let mut response = (self.status, body).into_response();
        if let Some(details) = self.details {
            response.extensions_mut().insert(ErrorReport {
                message: self.message,
                details,
            });
        }
        response
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match &err {
            ServiceError::NoFilesProvided => AppError::bad_request("no files provided"),
            ServiceError::TooManyFiles { .. } | ServiceError::UnsupportedMediaType { .. } => {
                AppError::bad_request(err.to_string())
            }
            ServiceError::NotFound(_) => AppError::not_found("file not found").with_details(&err),
            ServiceError::UploadFailed { .. } => {
                tracing::error!(error = %err, "upload failed");
                AppError::internal("file upload failed").with_details(&err)
            }
            ServiceError::ObjectStore(_) | ServiceError::Metadata(_) => {
                tracing::error!(error = %err, "request failed");
                AppError::internal("internal server error").with_details(&err)
            }
        }
    }
}

impl From<MultipartError> for AppError {
    fn from(err: MultipartError) -> Self {
        AppError::new(err.status(), "malformed multipart body").with_details(err.body_text())
    }
}

/// Middleware: in development mode, rewrite error bodies to include `details`.
pub async fn expose_error_details(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let mut response = next.run(request).await;
    let Some(report) = response.extensions_mut().remove::<ErrorReport>() else {
        return response;
    };
    if !state.development {
        return response;
    }

    let status = response.status();
    let body = Json(json!({
        "error": report.message,
        "status": status.as_u16(),
        "details": report.details,
    }));
    (status, body).into_response()
}

/// Body for requests whose handler panicked.
pub fn panic_response(_panic: Box<dyn std::any::Any + Send + 'static>) -> Response {
    tracing::error!("handler panicked");
    AppError::internal("internal server error").into_response()
}

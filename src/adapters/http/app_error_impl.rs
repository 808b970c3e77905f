use crate::app_error::{AppError, ErrorCode};
use axum::Json;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Token failures all look the same to the client; the sub-kind only goes to logs.
        if self.is_auth_failure() {
            tracing::warn!(code = self.code().as_str(), error = %self, "Credential rejected");
            return error_resp(StatusCode::UNAUTHORIZED, ErrorCode::InvalidCredentials, None);
        }

        tracing::error!(error = ?self, "Request failed");

        match self {
            AppError::NotFound => error_resp(StatusCode::NOT_FOUND, ErrorCode::NotFound, None),
            AppError::InvalidInput(msg) => {
                error_resp(StatusCode::BAD_REQUEST, ErrorCode::InvalidInput, Some(msg))
            }
            AppError::KeyUnavailable => error_resp(
                StatusCode::SERVICE_UNAVAILABLE,
                ErrorCode::KeyUnavailable,
                None,
            ),
            AppError::Store(_) => {
                error_resp(StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::StoreError, None)
            }
            _ => error_resp(
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorCode::InternalError,
                None,
            ),
        }
    }
}

fn error_resp(status: StatusCode, code: ErrorCode, message: Option<String>) -> Response {
    let body = match message {
        Some(msg) => serde_json::json!({ "code": code.as_str(), "message": msg }),
        None => serde_json::json!({ "code": code.as_str() }),
    };
    (status, Json(body)).into_response()
}

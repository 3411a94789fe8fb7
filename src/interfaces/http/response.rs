use crate::error::SettlementError;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tracing::{debug, error};

/// Success envelope: `{ success, message, data }`.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    pub message: String,
    pub data: T,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    success: bool,
    message: String,
    error: &'static str,
}

pub fn ok<T: Serialize>(message: impl Into<String>, data: T) -> Json<Envelope<T>> {
    Json(Envelope {
        success: true,
        message: message.into(),
        data,
    })
}

pub fn created<T: Serialize>(message: impl Into<String>, data: T) -> (StatusCode, Json<Envelope<T>>) {
    (StatusCode::CREATED, ok(message, data))
}

/// Any engine error, rendered as the failure envelope.
#[derive(Debug)]
pub struct ApiError(pub SettlementError);

impl From<SettlementError> for ApiError {
    fn from(err: SettlementError) -> Self {
        Self(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            SettlementError::Validation(_)
            | SettlementError::StateConflict(_)
            | SettlementError::InsufficientStock { .. } => StatusCode::BAD_REQUEST,
            SettlementError::NotFound { .. } => StatusCode::NOT_FOUND,
            SettlementError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            SettlementError::Authorization(_) => StatusCode::FORBIDDEN,
            SettlementError::Duplicate(_) => StatusCode::CONFLICT,
            SettlementError::Gateway(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self.0, code = self.0.code(), "Request failed");
        } else {
            debug!(error = %self.0, code = self.0.code(), "Request rejected");
        }
        let body = ErrorBody {
            success: false,
            message: self.0.to_string(),
            error: self.0.code(),
        };
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

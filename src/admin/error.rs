//! Admin API errors, rendered as `{"error", "code", "name"}`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum AdminError {
    #[error("Missing or invalid API key")]
    Unauthorized,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl AdminError {
    fn status(&self) -> StatusCode {
        match self {
            AdminError::Unauthorized => StatusCode::UNAUTHORIZED,
            AdminError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AdminError::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            AdminError::Unauthorized => "Unauthorized",
            AdminError::BadRequest(_) => "BadRequest",
            AdminError::NotFound(_) => "NotFound",
        }
    }
}

impl IntoResponse for AdminError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = json!({
            "error": self.to_string(),
            "code": status.as_u16(),
            "name": self.name(),
        });
        (status, Json(body)).into_response()
    }
}

//! Error types for the server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::error::ScreeningError;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error(transparent)]
    Screening(#[from] ScreeningError),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServerError {
    fn status_and_kind(&self) -> (StatusCode, &'static str) {
        match self {
            ServerError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            ServerError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
            ServerError::Screening(e) => {
                let status = match e {
                    ScreeningError::MalformedUpload(_)
                    | ScreeningError::InvalidRecord { .. }
                    | ScreeningError::InvalidInput(_) => StatusCode::BAD_REQUEST,
                    ScreeningError::InsufficientClasses { .. }
                    | ScreeningError::SchemaMismatch { .. }
                    | ScreeningError::UnknownLabel(_) => StatusCode::UNPROCESSABLE_ENTITY,
                    ScreeningError::ArtifactsNotReady { .. } | ScreeningError::ModelNotFitted => {
                        StatusCode::CONFLICT
                    }
                    ScreeningError::UnknownId { .. }
                    | ScreeningError::TrainingError(_)
                    | ScreeningError::IoError(_)
                    | ScreeningError::SerializationError(_)
                    | ScreeningError::ShapeError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, e.kind())
            }
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, kind) = self.status_and_kind();

        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(kind, detail = %self, "Internal server error");
            "An internal error occurred. Check server logs for details.".to_string()
        } else {
            self.to_string()
        };

        let body = Json(json!({
            "error": true,
            "kind": kind,
            "message": message,
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ServerError>;

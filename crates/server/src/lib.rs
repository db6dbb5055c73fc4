use axum::{Json, http::StatusCode, response::IntoResponse};
use engine::EngineError;

use serde::Serialize;
pub use api::{Operation, OperationResult};
pub use server::{ServerState, app, run_with_listener};
pub use subscribe::{ClientMessage, ServerMessage};

mod api;
mod server;
mod subscribe;
mod user;

pub enum ServerError {
    Engine(EngineError),
    Generic(String),
}

#[derive(Serialize)]
struct Error {
    error: String,
}

fn status_for_engine_error(err: &EngineError) -> StatusCode {
    match err {
        EngineError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        EngineError::Unauthorized(_) => StatusCode::FORBIDDEN,
        EngineError::NotFound(_) => StatusCode::NOT_FOUND,
        EngineError::PreconditionFailed(_) => StatusCode::PRECONDITION_FAILED,
        EngineError::ExistingKey(_) => StatusCode::CONFLICT,
        EngineError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Message sent to clients. Storage details stay in the log.
pub(crate) fn message_for_engine_error(err: EngineError) -> String {
    match err {
        EngineError::Storage(db_err) => {
            tracing::error!("database error: {db_err}");
            "internal server error".to_string()
        }
        other => other.to_string(),
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> axum::response::Response {
        let (status, error) = match self {
            ServerError::Engine(err) => (status_for_engine_error(&err), message_for_engine_error(err)),
            ServerError::Generic(err) => (StatusCode::BAD_REQUEST, err),
        };

        (status, Json(Error { error })).into_response()
    }
}

impl From<EngineError> for ServerError {
    fn from(value: EngineError) -> Self {
        Self::Engine(value)
    }
}

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use roadhound_core::world::{ActionError, JoinError};

use crate::world_loop::WorldError;

#[derive(Debug)]
pub enum AppError {
    InvalidArgument(String),
    BadRequest(String),
    MapNotFound(String),
    InvalidToken(String),
    UnknownToken(String),
    InvalidMethod(String),
    Internal(String),
}

impl AppError {
    fn code(&self) -> &'static str {
        match self {
            Self::InvalidArgument(_) => "invalidArgument",
            Self::BadRequest(_) => "badRequest",
            Self::MapNotFound(_) => "mapNotFound",
            Self::InvalidToken(_) => "invalidToken",
            Self::UnknownToken(_) => "unknownToken",
            Self::InvalidMethod(_) => "invalidMethod",
            Self::Internal(_) => "internalError",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::InvalidArgument(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::MapNotFound(_) => StatusCode::NOT_FOUND,
            Self::InvalidToken(_) | Self::UnknownToken(_) => StatusCode::UNAUTHORIZED,
            Self::InvalidMethod(_) => StatusCode::METHOD_NOT_ALLOWED,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidArgument(m)
            | Self::BadRequest(m)
            | Self::MapNotFound(m)
            | Self::InvalidToken(m)
            | Self::UnknownToken(m)
            | Self::InvalidMethod(m)
            | Self::Internal(m) => write!(f, "{m}"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let Self::Internal(m) = &self {
            tracing::error!(error = %m, "Request failed");
        }
        let body = serde_json::json!({ "code": self.code(), "message": self.to_string() });
        (self.status(), Json(body)).into_response()
    }
}

impl From<WorldError> for AppError {
    fn from(e: WorldError) -> Self {
        match e {
            WorldError::Join(JoinError::InvalidName) => Self::InvalidArgument("Invalid name".into()),
            WorldError::Join(JoinError::MapNotFound(_)) => Self::MapNotFound("Map not found".into()),
            WorldError::Join(e @ JoinError::Registry(_)) => Self::Internal(e.to_string()),
            WorldError::Action(ActionError::UnknownToken) => {
                Self::UnknownToken("Player token has not been found".into())
            },
            WorldError::AutoTickActive => Self::BadRequest("Invalid endpoint".into()),
            WorldError::Closed => Self::Internal("world loop has stopped".into()),
        }
    }
}

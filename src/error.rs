use std::{io, net::SocketAddr, path::PathBuf};

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::error;

/// Failures of a single request, mapped onto HTTP statuses.
#[derive(Debug, thiserror::Error)]
pub enum ShareError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("method not allowed")]
    MethodNotAllowed,

    #[error("upload exceeds the {0} byte limit")]
    PayloadTooLarge(usize),

    #[error("server is shutting down")]
    ShuttingDown,

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },
}

impl ShareError {
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        ShareError::Io {
            context: context.into(),
            source,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ShareError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ShareError::NotFound(_) => StatusCode::NOT_FOUND,
            ShareError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ShareError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ShareError::ShuttingDown => StatusCode::SERVICE_UNAVAILABLE,
            ShareError::Io { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
    code: u16,
}

impl IntoResponse for ShareError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            // Keep filesystem details in the log, not on the wire.
            ShareError::Io { context, .. } => {
                error!("{}", self);
                context.clone()
            }
            other => other.to_string(),
        };
        let body = ErrorBody {
            message,
            code: status.as_u16(),
        };
        (status, Json(body)).into_response()
    }
}

/// Reasons a share session could not be brought up.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("failed to resolve shared directory '{}': {source}", .path.display())]
    InvalidRoot {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("shared path '{}' is not a directory", .0.display())]
    NotADirectory(PathBuf),

    #[error("a share session is already running on {0}")]
    AlreadyRunning(SocketAddr),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn renders_json_body_with_status_code() {
        let response = ShareError::NotFound("File not found.".into()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["message"], "File not found.");
        assert_eq!(body["code"], 404);
    }

    #[test]
    fn io_errors_are_server_errors() {
        let err = ShareError::io(
            "Could not save file.",
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        );
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.to_string(), "Could not save file.: denied");
    }
}

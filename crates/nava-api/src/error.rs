use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;
use uuid::Uuid;

use nava_feed::FeedError;

/// Every failure a handler can return. Rendered as
/// `{"success": false, "message": ...}`.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<FeedError> for ApiError {
    fn from(err: FeedError) -> Self {
        match err {
            FeedError::NotFound => ApiError::NotFound("Entry not found".into()),
            FeedError::Validation(msg) => ApiError::Validation(msg),
            FeedError::Store(e) => ApiError::Internal(e),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // Internal detail goes to the log, never to the client.
        if let ApiError::Internal(e) = &self {
            error!("Internal error: {:#}", e);
        }

        let body = Json(json!({ "success": false, "message": self.to_string() }));
        (self.status(), body).into_response()
    }
}

/// Runs store work off the async runtime.
pub(crate) async fn run_blocking<F, T>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        ApiError::Internal(anyhow::anyhow!("blocking task failed: {}", e))
    })?
}

/// Ids in paths are UUIDs; anything else is a client error.
pub(crate) fn parse_path_id(raw: &str) -> Result<Uuid, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::Validation(format!("Invalid id '{}'", raw)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_and_client_messages() {
        assert_eq!(ApiError::Validation("bad".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::Conflict("taken".into()).status(), StatusCode::CONFLICT);
        assert_eq!(ApiError::from(FeedError::NotFound).status(), StatusCode::NOT_FOUND);

        let internal = ApiError::from(anyhow::anyhow!("disk on fire"));
        assert_eq!(internal.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(internal.to_string(), "Internal server error");
    }

    #[test]
    fn path_ids_must_be_uuids() {
        assert!(parse_path_id("00000000-0000-4000-8000-000000000000").is_ok());
        assert!(matches!(parse_path_id("42"), Err(ApiError::Validation(_))));
    }
}

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use tracing::{error, warn};

use super::dto::ErrorResponse;
use super::repo::StoreError;
use super::repo_types::ValidationErrors;
use super::validation::TAKEN;
use crate::remote::RemoteError;

/// Outcome of a failed sync operation.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("remote user API unavailable: {0}")]
    RemoteUnavailable(#[from] RemoteError),

    #[error("validation failed: {0}")]
    ValidationFailed(ValidationErrors),

    #[error("Failed to delete user with id {id} (status {status})")]
    DeleteRejected { id: i64, status: u16 },

    #[error("user {0} not found")]
    NotFound(i64),

    #[error("store error: {0}")]
    Store(anyhow::Error),
}

impl From<StoreError> for SyncError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict { field } => {
                let mut errors = ValidationErrors::new();
                errors.add(field, TAKEN);
                SyncError::ValidationFailed(errors)
            }
            StoreError::NotFound(id) => SyncError::NotFound(id),
            StoreError::Other(e) => SyncError::Store(e),
        }
    }
}

impl IntoResponse for SyncError {
    fn into_response(self) -> Response {
        match self {
            SyncError::ValidationFailed(errors) => {
                (StatusCode::UNPROCESSABLE_ENTITY, Json(errors)).into_response()
            }
            SyncError::NotFound(_) => (
                StatusCode::NOT_FOUND,
                Json(ErrorResponse {
                    error: "User not found".into(),
                }),
            )
                .into_response(),
            SyncError::RemoteUnavailable(ref e) => {
                warn!(status = ?e.status(), error = %e, "remote user API unavailable");
                (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    Json(ErrorResponse {
                        error: self.to_string(),
                    }),
                )
                    .into_response()
            }
            SyncError::DeleteRejected { .. } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(ErrorResponse {
                    error: self.to_string(),
                }),
            )
                .into_response(),
            SyncError::Store(e) => {
                error!(error = %e, "store failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse {
                        error: "Internal server error".into(),
                    }),
                )
                    .into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delete_rejected_message_carries_status() {
        let err = SyncError::DeleteRejected { id: 7, status: 500 };
        assert_eq!(err.to_string(), "Failed to delete user with id 7 (status 500)");
    }

    #[test]
    fn store_conflict_becomes_field_error() {
        let err = SyncError::from(StoreError::Conflict { field: "username" });
        match err {
            SyncError::ValidationFailed(errors) => {
                assert_eq!(errors.messages("username"), &[TAKEN.to_string()])
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn status_codes() {
        let not_found = SyncError::NotFound(3).into_response();
        assert_eq!(not_found.status(), StatusCode::NOT_FOUND);

        let rejected = SyncError::DeleteRejected { id: 3, status: 500 }.into_response();
        assert_eq!(rejected.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let invalid = SyncError::ValidationFailed(ValidationErrors::new()).into_response();
        assert_eq!(invalid.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let store = SyncError::Store(anyhow::anyhow!("boom")).into_response();
        assert_eq!(store.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}

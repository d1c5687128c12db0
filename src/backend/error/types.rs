/**
 * Backend Error Types
 *
 * Every handler returns `Result<_, BackendError>`. The variants line up with
 * the error taxonomy the clients react to:
 *
 * - `Unauthenticated` - no viewer on a mutation; clients roll back and ask
 *   for a login instead of showing a generic failure
 * - `Forbidden` / `NotFound` - the viewer may not touch this room or topic
 * - `SharedError` (validation) - malformed input, rejected before persistence
 * - `Database` - transient server-side failure
 */

use axum::http::StatusCode;
use thiserror::Error;

use crate::shared::SharedError;

/// Backend-specific error types
#[derive(Debug, Error)]
pub enum BackendError {
    /// The request needs a signed-in viewer
    #[error("Authentication required")]
    Unauthenticated,

    /// The viewer is signed in but not allowed to do this
    #[error("Forbidden: {message}")]
    Forbidden {
        /// Human-readable error message
        message: String,
    },

    /// The addressed resource does not exist
    #[error("Not found: {message}")]
    NotFound {
        /// Human-readable error message
        message: String,
    },

    /// Validation or serialization error from the shared layer
    #[error(transparent)]
    SharedError(#[from] SharedError),

    /// Database failure
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl BackendError {
    /// Create a new forbidden error
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden {
            message: message.into(),
        }
    }

    /// Create a new not-found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::Forbidden { .. } => StatusCode::FORBIDDEN,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::SharedError(err) => match err {
                SharedError::SerializationError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
                SharedError::ValidationError { .. } => StatusCode::BAD_REQUEST,
            },
            Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error message exposed to clients
    pub fn message(&self) -> String {
        match self {
            Self::Forbidden { message } | Self::NotFound { message } => message.clone(),
            // Database details stay in the logs.
            Self::Database(_) => "Internal database error".to_string(),
            other => other.to_string(),
        }
    }
}

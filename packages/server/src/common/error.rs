use thiserror::Error;

use super::auth::AuthError;

/// Errors surfaced by every moderation and membership operation.
///
/// Compare-and-set losers surface as [`ModerationError::AlreadyDecided`]; the engine never
/// retries on its own, callers re-fetch and decide whether to act again.
#[derive(Error, Debug)]
pub enum ModerationError {
    /// Missing or invalid input. The caller must resubmit.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The authorization gate denied the action.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// The entity left `pending` before this decision landed.
    #[error("Already decided")]
    AlreadyDecided,

    #[error("Community is not active")]
    CommunityNotActive,

    /// Uniqueness violation (duplicate pending request, duplicate grant, existing member).
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ModerationError {
    /// Rejections must carry a reason.
    pub fn reason_required() -> Self {
        ModerationError::Validation("a rejection reason is required".to_string())
    }

    pub fn not_found(what: impl std::fmt::Display) -> Self {
        ModerationError::NotFound(what.to_string())
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, ModerationError::Validation(_))
    }
}

impl From<sqlx::Error> for ModerationError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => ModerationError::NotFound("row".to_string()),
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                let constraint = db_err.constraint().unwrap_or("unique constraint").to_string();
                ModerationError::Conflict(constraint)
            }
            other => ModerationError::Database(other),
        }
    }
}

impl From<serde_json::Error> for ModerationError {
    fn from(err: serde_json::Error) -> Self {
        ModerationError::Validation(format!("malformed payload: {}", err))
    }
}

pub type Result<T, E = ModerationError> = std::result::Result<T, E>;

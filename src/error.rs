use crate::database::DatabaseError;
use sqlx::Error as SqlxError;
use thiserror::Error;

/// Application-level error types.
///
/// Pipeline fault classes are first-class variants so callers never have
/// to infer a failure kind from message text.
#[derive(Error, Debug)]
pub enum AppError {
    /// Market-data source was unreachable or timed out
    #[error("Market data source unavailable: {0}")]
    SourceUnavailable(String),

    /// Market-data source replied with an unreadable payload
    #[error("Market data source returned malformed payload: {0}")]
    SourceMalformed(String),

    /// Durable store unreachable or rejected an operation
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// SQLx database errors
    #[error("SQL error: {0}")]
    Sqlx(#[from] SqlxError),

    /// Another pipeline run currently holds the single-flight lock.
    /// A normal skip outcome, not a fault.
    #[error("Pipeline run already in progress")]
    AlreadyRunning,

    /// Per-recipient send failure; recorded in the ledger, never
    /// propagated out of the dispatcher
    #[error("Notification send failed: {detail}")]
    SendFailed { terminal: bool, detail: String },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Not found errors
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// UUID parsing errors
    #[error("Invalid UUID: {0}")]
    InvalidUuid(#[from] uuid::Error),

    /// Generic error with message
    #[error("{0}")]
    Message(String),
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// Machine-readable reason code surfaced to the trigger caller.
    pub fn reason_code(&self) -> &'static str {
        match self {
            AppError::SourceUnavailable(_) => "source_unavailable",
            AppError::SourceMalformed(_) => "source_malformed",
            AppError::StoreUnavailable(_) | AppError::Database(_) | AppError::Sqlx(_) => {
                "store_unavailable"
            }
            AppError::AlreadyRunning => "already_running",
            AppError::SendFailed { .. } => "send_failed",
            AppError::Config(_) => "config",
            AppError::Validation(_) => "validation",
            AppError::NotFound(_) => "not_found",
            AppError::Serialization(_) => "serialization",
            AppError::InvalidUuid(_) => "invalid_uuid",
            AppError::Message(_) => "internal",
        }
    }

    /// True for the "run skipped, nothing wrong" outcome.
    pub fn is_skip(&self) -> bool {
        matches!(self, AppError::AlreadyRunning)
    }

    /// True for fetch-stage failures that abort a run with no writes.
    pub fn is_source_error(&self) -> bool {
        matches!(
            self,
            AppError::SourceUnavailable(_) | AppError::SourceMalformed(_)
        )
    }

    /// True for store-layer failures in any stage.
    pub fn is_store_error(&self) -> bool {
        matches!(
            self,
            AppError::StoreUnavailable(_) | AppError::Database(_) | AppError::Sqlx(_)
        )
    }

    /// Check if error is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, AppError::NotFound(_))
    }
}

//! Error types for RecordStore
//!
//! This module defines the common error taxonomy shared by the ingestion,
//! lifecycle and storage layers.

use thiserror::Error;

/// Common result type for RecordStore operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for RecordStore
#[derive(Debug, Error)]
pub enum Error {
    // Validation errors
    #[error(
        "the kind '{kind}' does not follow the required naming convention: the first kind component must be '{tenant}'"
    )]
    InvalidKind { kind: String, tenant: String },

    #[error(
        "the record '{id}' does not follow the naming convention: the first id component must be '{tenant}'"
    )]
    InvalidRecordId { id: String, tenant: String },

    #[error("cannot update the same record multiple times in the same request. Id: {0}")]
    DuplicateIdInBatch(String),

    #[error("invalid ACL: {0}")]
    InvalidAcl(String),

    #[error("the record '{id}' does not follow the schema: {reason}")]
    InvalidRecord { id: String, reason: String },

    #[error("invalid patch: {0}")]
    InvalidPatch(String),

    #[error("the record '{0}' was not found")]
    ParentNotFound(String),

    #[error("legal validation failed: {0}")]
    LegalValidationFailed(String),

    // Access errors
    #[error("access denied: {0}")]
    AccessDenied(String),

    // Lookup errors
    #[error("record with id '{0}' does not exist")]
    RecordNotFound(String),

    // Processing errors
    #[error("duplicate check failed: {0}")]
    DuplicateCheckFailed(String),

    #[error("persistence failure: {0}")]
    PersistenceFailure(String),

    #[error("record '{0}' was modified concurrently")]
    ConcurrentModification(String),

    #[error("rollback of record '{id}' failed, manual repair required: {message}")]
    RollbackFailed { id: String, message: String },

    // Internal errors
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Create an access denied error
    pub fn access_denied(msg: impl Into<String>) -> Self {
        Self::AccessDenied(msg.into())
    }

    /// Create a persistence failure
    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::PersistenceFailure(msg.into())
    }

    /// Create a legal validation error
    pub fn legal(msg: impl Into<String>) -> Self {
        Self::LegalValidationFailed(msg.into())
    }

    /// Create an invalid patch error
    pub fn invalid_patch(msg: impl Into<String>) -> Self {
        Self::InvalidPatch(msg.into())
    }

    /// Check if this is a retryable error
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::PersistenceFailure(_) | Self::ConcurrentModification(_)
        )
    }

    /// Check if this is a not found error
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::RecordNotFound(_) | Self::ParentNotFound(_))
    }

    /// Get HTTP status code for the REST layer
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        match self {
            // 400 Bad Request
            Self::InvalidKind { .. }
            | Self::InvalidRecordId { .. }
            | Self::DuplicateIdInBatch(_)
            | Self::InvalidAcl(_)
            | Self::InvalidRecord { .. }
            | Self::InvalidPatch(_)
            | Self::LegalValidationFailed(_) => 400,

            // 403 Forbidden
            Self::AccessDenied(_) => 403,

            // 404 Not Found
            Self::ParentNotFound(_) | Self::RecordNotFound(_) => 404,

            // 409 Conflict
            Self::ConcurrentModification(_) => 409,

            // 500 Internal Server Error
            Self::DuplicateCheckFailed(_)
            | Self::PersistenceFailure(_)
            | Self::RollbackFailed { .. }
            | Self::Configuration(_)
            | Self::Serialization(_) => 500,
        }
    }

    /// Short reason phrase reported alongside the status code
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::InvalidKind { .. } => "Invalid kind",
            Self::InvalidRecordId { .. } => "Invalid record id",
            Self::DuplicateIdInBatch(_) => "Bad request",
            Self::InvalidAcl(_) => "Invalid ACL",
            Self::InvalidRecord { .. } => "Invalid record",
            Self::InvalidPatch(_) => "Invalid patch",
            Self::ParentNotFound(_) | Self::RecordNotFound(_) => "Record not found",
            Self::LegalValidationFailed(_) => "Invalid legal tags",
            Self::AccessDenied(_) => "Access denied",
            Self::ConcurrentModification(_) => "Record locked",
            Self::DuplicateCheckFailed(_) => "Duplicate check failed",
            Self::RollbackFailed { .. } => "Rollback failed",
            _ => "Internal error",
        }
    }
}

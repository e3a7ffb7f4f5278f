//! Error types for store operations

/// Errors from verification store operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("verification code already in use")]
    DuplicateCode,

    #[error("verification code not found")]
    NotFound,

    #[error("verification code expired")]
    Expired,
}

/// Result alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

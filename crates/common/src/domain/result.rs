use thiserror::Error;

pub type DomainResult<T> = Result<T, DomainError>;

/// Failure kinds shared by the repository and service layers.
///
/// Callers classify errors by matching on the variant, never on the message.
/// Variants that wrap an infrastructure failure keep it as their `source`, so
/// the original driver error can still be recovered with
/// `anyhow::Error::downcast_ref`.
#[derive(Error, Debug)]
pub enum DomainError {
    #[error("item not found: {0}")]
    NotFound(String),

    #[error("insert data error: {0}")]
    InsertFailed(#[source] anyhow::Error),

    #[error("update data error: {0}")]
    UpdateFailed(#[source] anyhow::Error),

    #[error("update affect 0 rows: {0}")]
    UpdateAffectedZeroRows(String),

    /// Reserved: no delete operation exists yet.
    #[error("delete data error: {0}")]
    DeleteFailed(String),

    #[error("unmarshal json error: {0}")]
    UnmarshalFailed(String),

    #[error("not authorized")]
    Unauthorized,

    #[error("server identified error: {0}")]
    ServerError(#[source] anyhow::Error),

    #[error("forbidden request")]
    Forbidden,

    #[error("invalid data: {0}")]
    InvalidData(String),

    #[error("transaction invalid: {0}")]
    InvalidTransaction(String),

    /// Reserved.
    #[error("invalid amount for this transaction type")]
    InvalidAmount,

    #[error("timeout: {0}")]
    Timeout(String),
}

impl DomainError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, DomainError::Timeout(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, DomainError::NotFound(_))
    }
}

impl From<tokio::time::error::Elapsed> for DomainError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        DomainError::Timeout("request deadline exceeded".to_string())
    }
}

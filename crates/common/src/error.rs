use crate::path::PathError;

/// Errors reported by grant and share storage providers.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The referenced row (user, grant, share) does not exist
    #[error("record not found")]
    NotFound,
    /// A uniqueness constraint rejected the write
    #[error("conflicting record")]
    Conflict,
    /// The backing store failed
    #[error("store backend error: {0}")]
    Backend(String),
}

/// Outcome taxonomy for gateway operations.
///
/// Denial of access is reported as `Forbidden` or `NotFound` only where an
/// operation cannot proceed; the authorization check itself returns a
/// [`crate::gateway::Decision`] and never fails for ordinary denial.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("not found")]
    NotFound,
    #[error("forbidden")]
    Forbidden,
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("conflict")]
    Conflict,
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for GatewayError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => GatewayError::NotFound,
            StoreError::Conflict => GatewayError::Conflict,
            StoreError::Backend(msg) => GatewayError::Internal(msg),
        }
    }
}

impl From<PathError> for GatewayError {
    fn from(err: PathError) -> Self {
        GatewayError::BadRequest(err.to_string())
    }
}

impl From<std::io::Error> for GatewayError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => GatewayError::NotFound,
            _ => GatewayError::Internal(err.to_string()),
        }
    }
}

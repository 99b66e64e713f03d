//! Error types for authorization operations
//!
//! Missing roles, permissions, transactions and rules are not errors; the
//! resolver has a defined verdict for each of them. What remains are store
//! failures, integrity violations on writes, and guard denials.

use rolegate_org::RoleTreeError;
use thiserror::Error;

use crate::guard::PermissionDenied;

/// Store error types.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Write rejected by a hierarchy invariant
    #[error(transparent)]
    Integrity(#[from] RoleTreeError),

    /// Referenced permission does not exist
    #[error("Unknown permission: {0}")]
    UnknownPermission(String),

    /// Referenced transaction does not exist
    #[error("Unknown transaction: {0}")]
    UnknownTransaction(String),

    /// Referenced group identity does not exist
    #[error("Unknown group: {0}")]
    UnknownGroup(String),

    /// The backing store timed out
    #[error("Store operation timed out")]
    Timeout,

    /// The backing store failed
    #[error("Store backend error: {0}")]
    Backend(String),
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Authorization error types.
#[derive(Debug, Error)]
pub enum AuthzError {
    /// Role hierarchy invariant violated (name collision, cycle, unknown role)
    #[error("Integrity violation: {0}")]
    Integrity(RoleTreeError),

    /// Store failure while resolving or writing
    #[error("Store error: {0}")]
    Store(StoreError),

    /// A guard denied the request
    #[error(transparent)]
    PermissionDenied(#[from] PermissionDenied),
}

impl From<StoreError> for AuthzError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Integrity(inner) => AuthzError::Integrity(inner),
            other => AuthzError::Store(other),
        }
    }
}

impl From<RoleTreeError> for AuthzError {
    fn from(err: RoleTreeError) -> Self {
        AuthzError::Integrity(err)
    }
}

/// Result type for authorization operations.
pub type AuthzResult<T> = Result<T, AuthzError>;

impl AuthzError {
    /// Check if this error should be logged at error level.
    ///
    /// Denials and rejected writes are expected outcomes.
    pub fn is_server_error(&self) -> bool {
        matches!(self, AuthzError::Store(_))
    }

    /// Get HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            AuthzError::Integrity(RoleTreeError::UnknownRole(_)) => 404,
            AuthzError::Integrity(RoleTreeError::EmptyName) => 400,
            AuthzError::Integrity(_) => 409,
            AuthzError::PermissionDenied(_) => 403,
            AuthzError::Store(StoreError::Timeout) => 504,
            AuthzError::Store(StoreError::UnknownPermission(_))
            | AuthzError::Store(StoreError::UnknownTransaction(_))
            | AuthzError::Store(StoreError::UnknownGroup(_)) => 404,
            AuthzError::Store(_) => 500,
        }
    }

    /// Get error code for API responses.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthzError::Integrity(RoleTreeError::DuplicateRole(_)) => "DUPLICATE_ROLE",
            AuthzError::Integrity(RoleTreeError::UnknownRole(_)) => "UNKNOWN_ROLE",
            AuthzError::Integrity(RoleTreeError::UnknownParent(_)) => "UNKNOWN_PARENT",
            AuthzError::Integrity(RoleTreeError::CyclicParent { .. }) => "CYCLIC_PARENT",
            AuthzError::Integrity(RoleTreeError::EmptyName) => "EMPTY_ROLE_NAME",
            AuthzError::Integrity(RoleTreeError::HasChildren(_)) => "ROLE_HAS_CHILDREN",
            AuthzError::PermissionDenied(_) => "PERMISSION_DENIED",
            AuthzError::Store(StoreError::Timeout) => "STORE_TIMEOUT",
            AuthzError::Store(StoreError::UnknownPermission(_)) => "UNKNOWN_PERMISSION",
            AuthzError::Store(StoreError::UnknownTransaction(_)) => "UNKNOWN_TRANSACTION",
            AuthzError::Store(StoreError::UnknownGroup(_)) => "UNKNOWN_GROUP",
            AuthzError::Store(_) => "STORE_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_integrity_maps_to_integrity() {
        let err: AuthzError = StoreError::Integrity(RoleTreeError::DuplicateRole("a".into())).into();
        assert!(matches!(err, AuthzError::Integrity(_)));
        assert_eq!(err.status_code(), 409);
        assert_eq!(err.error_code(), "DUPLICATE_ROLE");
        assert!(!err.is_server_error());
    }

    #[test]
    fn test_store_failures_are_server_errors() {
        let err: AuthzError = StoreError::Timeout.into();
        assert!(err.is_server_error());
        assert_eq!(err.status_code(), 504);

        let err: AuthzError = StoreError::Backend("down".into()).into();
        assert_eq!(err.status_code(), 500);
        assert_eq!(err.error_code(), "STORE_ERROR");
    }

    #[test]
    fn test_role_with_children_conflicts() {
        let err: AuthzError = StoreError::Integrity(RoleTreeError::HasChildren("manager".into())).into();
        assert_eq!(err.status_code(), 409);
        assert_eq!(err.error_code(), "ROLE_HAS_CHILDREN");
        assert!(!err.is_server_error());
    }

    #[test]
    fn test_unknown_role_is_not_found() {
        let err = AuthzError::from(RoleTreeError::UnknownRole("ghost".into()));
        assert_eq!(err.status_code(), 404);
        assert_eq!(err.to_string(), "Integrity violation: Unknown role: ghost");
    }
}

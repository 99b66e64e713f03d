//! # CRUD Operations
//!
//! Defines the four operations a rule table is keyed by, and the mapping
//! from HTTP request methods onto them.

use serde::{Deserialize, Serialize};

/// Operations a rule table grants per resource path.
///
/// Every request is reduced to exactly one of these before rules are
/// consulted:
/// - **Create**: `POST`
/// - **Read**: `GET` and any method without an explicit mapping
/// - **Update**: `PUT`
/// - **Delete**: `DELETE`
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CrudOperation {
    /// Create a new resource instance.
    Create,

    /// Read/view a resource.
    Read,

    /// Modify an existing resource.
    Update,

    /// Remove a resource.
    Delete,
}

impl CrudOperation {
    /// Get the string representation of the operation.
    ///
    /// This is also the key used for the operation inside a rule table.
    pub fn as_str(&self) -> &'static str {
        match self {
            CrudOperation::Create => "create",
            CrudOperation::Read => "read",
            CrudOperation::Update => "update",
            CrudOperation::Delete => "delete",
        }
    }

    /// Parse an operation from its rule-table key.
    ///
    /// # Example
    ///
    /// ```
    /// use rolegate_rbac::actions::CrudOperation;
    ///
    /// assert_eq!(CrudOperation::parse("update"), Some(CrudOperation::Update));
    /// assert_eq!(CrudOperation::parse("READ"), Some(CrudOperation::Read));
    /// assert_eq!(CrudOperation::parse("patch"), None);
    /// ```
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "create" => Some(CrudOperation::Create),
            "read" => Some(CrudOperation::Read),
            "update" => Some(CrudOperation::Update),
            "delete" => Some(CrudOperation::Delete),
            _ => None,
        }
    }

    /// Map an HTTP request method onto an operation.
    ///
    /// The comparison is case-insensitive. Methods outside the fixed table
    /// (`HEAD`, `PATCH`, `OPTIONS`, ...) are treated as reads.
    ///
    /// # Example
    ///
    /// ```
    /// use rolegate_rbac::actions::CrudOperation;
    ///
    /// assert_eq!(CrudOperation::from_method("PUT"), CrudOperation::Update);
    /// assert_eq!(CrudOperation::from_method("post"), CrudOperation::Create);
    /// assert_eq!(CrudOperation::from_method("PATCH"), CrudOperation::Read);
    /// ```
    pub fn from_method(method: &str) -> Self {
        match method.to_lowercase().as_str() {
            "get" => CrudOperation::Read,
            "post" => CrudOperation::Create,
            "put" => CrudOperation::Update,
            "delete" => CrudOperation::Delete,
            _ => CrudOperation::Read,
        }
    }

    /// Get all operations, in rule-table order.
    pub fn all() -> [Self; 4] {
        [
            CrudOperation::Create,
            CrudOperation::Read,
            CrudOperation::Update,
            CrudOperation::Delete,
        ]
    }
}

impl std::fmt::Display for CrudOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_mapping() {
        assert_eq!(CrudOperation::from_method("get"), CrudOperation::Read);
        assert_eq!(CrudOperation::from_method("GET"), CrudOperation::Read);
        assert_eq!(CrudOperation::from_method("post"), CrudOperation::Create);
        assert_eq!(CrudOperation::from_method("Put"), CrudOperation::Update);
        assert_eq!(CrudOperation::from_method("DELETE"), CrudOperation::Delete);
    }

    #[test]
    fn test_unknown_method_defaults_to_read() {
        assert_eq!(CrudOperation::from_method("patch"), CrudOperation::Read);
        assert_eq!(CrudOperation::from_method("OPTIONS"), CrudOperation::Read);
        assert_eq!(CrudOperation::from_method(""), CrudOperation::Read);
    }

    #[test]
    fn test_operation_parsing() {
        for op in CrudOperation::all() {
            assert_eq!(CrudOperation::parse(op.as_str()), Some(op));
        }
        assert_eq!(CrudOperation::parse("manage"), None);
    }

    #[test]
    fn test_serde_keys_match_as_str() {
        let json = serde_json::to_string(&CrudOperation::Update).unwrap();
        assert_eq!(json, "\"update\"");
    }
}

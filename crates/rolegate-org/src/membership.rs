//! Role membership records
//!
//! A membership says "this role participates in this transaction, guarded by
//! this permission". The resolver scans a subject's roles for memberships of
//! the transaction that covers the requested path.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Join record linking a role to a permission via a transaction.
///
/// Records are never mutated; they are only created or removed. A role may
/// hold several memberships for the same transaction, in which case the most
/// recently created one is used.
///
/// # Examples
///
/// ```
/// use rolegate_org::RoleMembership;
///
/// let membership = RoleMembership::new("editor", "posts", "posts");
/// assert_eq!(membership.role, "editor");
/// assert_eq!(membership.transaction, "posts");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoleMembership {
    /// Unique membership ID
    pub id: Uuid,

    /// Role name
    pub role: String,

    /// Codename of the guarding permission
    pub permission: String,

    /// Transaction name
    pub transaction: String,

    /// When the membership was created
    pub created_at: DateTime<Utc>,
}

impl RoleMembership {
    /// Creates a new membership.
    pub fn new(
        role: impl Into<String>,
        permission: impl Into<String>,
        transaction: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            role: role.into(),
            permission: permission.into(),
            transaction: transaction.into(),
            created_at: Utc::now(),
        }
    }
}

impl std::fmt::Display for RoleMembership {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Role {} is a member of Permission {}",
            self.role, self.permission
        )
    }
}

//! Authorization subjects
//!
//! The subject is whoever is making a request. Rolegate only needs to know
//! whether the subject is a superuser and which roles it holds; user storage
//! stays with the host application, which implements [`AuthSubject`] for its
//! own user type or uses the plain [`Subject`] value.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What the resolver needs to know about a caller.
///
/// Implementations must be cheap to query; the resolver calls these once per
/// required role.
pub trait AuthSubject: Send + Sync {
    /// Superusers bypass every check.
    fn is_superuser(&self) -> bool;

    /// Names of the roles assigned to the subject, in assignment order.
    fn assigned_role_names(&self) -> &[String];

    /// Whether the subject is a logged-in user.
    ///
    /// Only the admin index guard consults this.
    fn is_authenticated(&self) -> bool {
        true
    }
}

/// A plain subject value.
///
/// # Examples
///
/// ```
/// use rolegate_org::{AuthSubject, Subject};
///
/// let subject = Subject::new().with_role("editor").with_role("writer");
/// assert_eq!(subject.assigned_role_names(), ["editor", "writer"]);
/// assert!(!subject.is_superuser());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Subject {
    /// User ID
    pub user_id: Uuid,

    /// Superuser flag
    #[serde(default)]
    pub superuser: bool,

    /// Assigned role names, in assignment order
    #[serde(default)]
    pub roles: Vec<String>,

    /// Whether the user is logged in
    #[serde(default = "default_authenticated")]
    pub authenticated: bool,
}

fn default_authenticated() -> bool {
    true
}

impl Subject {
    /// Creates an authenticated subject without roles.
    pub fn new() -> Self {
        Self {
            user_id: Uuid::now_v7(),
            superuser: false,
            roles: Vec::new(),
            authenticated: true,
        }
    }

    /// Creates an authenticated superuser.
    pub fn superuser() -> Self {
        Self {
            superuser: true,
            ..Self::new()
        }
    }

    /// Creates an anonymous subject.
    pub fn anonymous() -> Self {
        Self {
            authenticated: false,
            ..Self::new()
        }
    }

    /// Use a specific user ID.
    pub fn with_user_id(mut self, user_id: Uuid) -> Self {
        self.user_id = user_id;
        self
    }

    /// Assign a role, keeping assignment order. Duplicates are ignored.
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        let role = role.into();
        if !self.roles.contains(&role) {
            self.roles.push(role);
        }
        self
    }

    /// Assign several roles in order.
    pub fn with_roles<I, S>(self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        roles.into_iter().fold(self, |subject, role| subject.with_role(role))
    }
}

impl Default for Subject {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthSubject for Subject {
    fn is_superuser(&self) -> bool {
        self.superuser
    }

    fn assigned_role_names(&self) -> &[String] {
        &self.roles
    }

    fn is_authenticated(&self) -> bool {
        self.authenticated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subject_creation() {
        let subject = Subject::new();
        assert!(subject.is_authenticated());
        assert!(!subject.is_superuser());
        assert!(subject.assigned_role_names().is_empty());
    }

    #[test]
    fn test_role_order_is_kept() {
        let subject = Subject::new().with_roles(["writer", "editor", "writer"]);
        assert_eq!(subject.assigned_role_names(), ["writer", "editor"]);
    }

    #[test]
    fn test_superuser_and_anonymous() {
        assert!(Subject::superuser().is_superuser());
        assert!(!Subject::anonymous().is_authenticated());
    }

    #[test]
    fn test_deserialize_defaults() {
        let json = format!("{{\"user_id\": \"{}\"}}", Uuid::now_v7());
        let subject: Subject = serde_json::from_str(&json).unwrap();
        assert!(subject.authenticated);
        assert!(!subject.superuser);
        assert!(subject.roles.is_empty());
    }
}

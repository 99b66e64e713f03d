//! Role hierarchy
//!
//! Roles form a rooted forest. Each role has at most one parent; a child is
//! *senior* to its parent and is admitted wherever the parent is required.
//! Only one level of seniority counts: a grandchild is not admitted for its
//! grandparent, and a parent is never admitted for its child.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use thiserror::Error;
use uuid::Uuid;

/// Integrity violations on the role hierarchy.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RoleTreeError {
    /// A role with this name already exists
    #[error("Role already exists: {0}")]
    DuplicateRole(String),

    /// The named role does not exist
    #[error("Unknown role: {0}")]
    UnknownRole(String),

    /// The requested parent does not exist
    #[error("Unknown parent role: {0}")]
    UnknownParent(String),

    /// Assigning this parent would make the role its own ancestor
    #[error("Cyclic parent assignment: {role} cannot descend from {parent}")]
    CyclicParent {
        /// Role being re-parented
        role: String,
        /// Parent that closes the cycle
        parent: String,
    },

    /// Role names must be non-empty
    #[error("Role name must not be empty")]
    EmptyName,

    /// A role with children cannot be removed
    #[error("Role still has children: {0}")]
    HasChildren(String),
}

/// How a subject's role relates to a required role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TreeRelation {
    /// The subject holds the required role itself
    Equal,
    /// The subject's role is an immediate child (senior) of the required role
    Child,
}

/// A node in the role hierarchy.
///
/// The name is the identity and the join key for the whole tree. The parent
/// is referenced by name; children are derived by [`RoleTree`].
///
/// # Examples
///
/// ```
/// use rolegate_org::{Role, TreeRelation};
///
/// let editor = Role::new("editor").with_parent("manager");
/// assert_eq!(editor.relation_to("manager"), Some(TreeRelation::Child));
/// assert_eq!(editor.relation_to("editor"), Some(TreeRelation::Equal));
/// assert_eq!(editor.relation_to("director"), None);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Role {
    /// Unique role ID
    pub id: Uuid,

    /// Unique role name
    pub name: String,

    /// Parent role name (junior to this role)
    pub parent: Option<String>,

    /// When the role was created
    pub created_at: DateTime<Utc>,
}

impl Role {
    /// Creates a new root role.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            name: name.into(),
            parent: None,
            created_at: Utc::now(),
        }
    }

    /// Set the parent role.
    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    /// Relation of this role to `required`, if it is within its tree.
    ///
    /// Equality is checked before the parent link.
    pub fn relation_to(&self, required: &str) -> Option<TreeRelation> {
        if self.name == required {
            Some(TreeRelation::Equal)
        } else if self.parent.as_deref() == Some(required) {
            Some(TreeRelation::Child)
        } else {
            None
        }
    }
}

/// Adjacency index over roles: name → role, name → child names.
///
/// All mutations keep the forest acyclic and the names unique.
#[derive(Debug, Clone, Default)]
pub struct RoleTree {
    roles: HashMap<String, Role>,
    children: HashMap<String, BTreeSet<String>>,
}

impl RoleTree {
    /// Create an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new role.
    ///
    /// # Errors
    ///
    /// - [`RoleTreeError::DuplicateRole`] if the name is taken
    /// - [`RoleTreeError::UnknownParent`] if the parent does not exist
    /// - [`RoleTreeError::CyclicParent`] if the role names itself as parent
    pub fn insert(&mut self, role: Role) -> Result<(), RoleTreeError> {
        if role.name.is_empty() {
            return Err(RoleTreeError::EmptyName);
        }
        if self.roles.contains_key(&role.name) {
            return Err(RoleTreeError::DuplicateRole(role.name));
        }
        if let Some(parent) = &role.parent {
            if parent == &role.name {
                return Err(RoleTreeError::CyclicParent {
                    role: role.name.clone(),
                    parent: parent.clone(),
                });
            }
            if !self.roles.contains_key(parent) {
                return Err(RoleTreeError::UnknownParent(parent.clone()));
            }
            self.children
                .entry(parent.clone())
                .or_default()
                .insert(role.name.clone());
        }
        self.roles.insert(role.name.clone(), role);
        Ok(())
    }

    /// Move a role under a new parent, or make it a root with `None`.
    ///
    /// # Errors
    ///
    /// Fails if either role is unknown or if `parent` is the role itself or
    /// one of its descendants.
    pub fn set_parent(&mut self, name: &str, parent: Option<&str>) -> Result<(), RoleTreeError> {
        if !self.roles.contains_key(name) {
            return Err(RoleTreeError::UnknownRole(name.to_string()));
        }
        if let Some(parent) = parent {
            if !self.roles.contains_key(parent) {
                return Err(RoleTreeError::UnknownParent(parent.to_string()));
            }
            if parent == name || self.ancestors(parent).iter().any(|a| a == name) {
                return Err(RoleTreeError::CyclicParent {
                    role: name.to_string(),
                    parent: parent.to_string(),
                });
            }
        }

        let old_parent = self.roles.get(name).and_then(|r| r.parent.clone());
        if let Some(old) = old_parent {
            if let Some(siblings) = self.children.get_mut(&old) {
                siblings.remove(name);
            }
        }
        if let Some(parent) = parent {
            self.children
                .entry(parent.to_string())
                .or_default()
                .insert(name.to_string());
        }
        if let Some(role) = self.roles.get_mut(name) {
            role.parent = parent.map(str::to_owned);
        }
        Ok(())
    }

    /// Remove a leaf role.
    ///
    /// # Errors
    ///
    /// - [`RoleTreeError::UnknownRole`] if the role does not exist
    /// - [`RoleTreeError::HasChildren`] if other roles name it as parent
    pub fn remove(&mut self, name: &str) -> Result<Role, RoleTreeError> {
        if self.children.get(name).is_some_and(|c| !c.is_empty()) {
            return Err(RoleTreeError::HasChildren(name.to_string()));
        }
        let role = self
            .roles
            .remove(name)
            .ok_or_else(|| RoleTreeError::UnknownRole(name.to_string()))?;
        self.children.remove(name);
        if let Some(parent) = &role.parent {
            if let Some(siblings) = self.children.get_mut(parent) {
                siblings.remove(name);
            }
        }
        Ok(role)
    }

    /// Look up a role by name.
    pub fn get(&self, name: &str) -> Option<&Role> {
        self.roles.get(name)
    }

    /// Check if a role exists.
    pub fn contains(&self, name: &str) -> bool {
        self.roles.contains_key(name)
    }

    /// Immediate children (senior roles) of a role, sorted by name.
    pub fn children_of(&self, name: &str) -> Vec<&str> {
        self.children
            .get(name)
            .map(|c| c.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Names of all ancestors of a role, nearest first.
    pub fn ancestors(&self, name: &str) -> Vec<String> {
        let mut result = Vec::new();
        let mut current = self.roles.get(name).and_then(|r| r.parent.clone());
        while let Some(parent) = current {
            // Acyclic by construction; the length guard only bounds a corrupted index.
            if result.len() > self.roles.len() {
                tracing::error!(role = %name, "Role parent chain does not terminate");
                break;
            }
            current = self.roles.get(&parent).and_then(|r| r.parent.clone());
            result.push(parent);
        }
        result
    }

    /// Number of roles.
    pub fn len(&self) -> usize {
        self.roles.len()
    }

    /// Check if the tree has no roles.
    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }
}

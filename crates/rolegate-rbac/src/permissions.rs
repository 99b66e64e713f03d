//! # Permissions
//!
//! Named capabilities and the flat permission sets carried by a role's
//! backing group identity.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A named capability.
///
/// The codename is the identity. A transaction is guarded by the permission
/// whose codename equals the transaction name.
///
/// # Example
///
/// ```
/// use rolegate_rbac::permissions::Permission;
///
/// let perm = Permission::for_module("offers");
/// assert_eq!(perm.codename, "offers");
/// assert_eq!(perm.name, "Can view offers");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Permission {
    /// Unique codename (e.g. "offers").
    pub codename: String,
    /// Human-readable display name.
    pub name: String,
}

impl Permission {
    /// Create a permission with an explicit display name.
    pub fn new(codename: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            codename: codename.into(),
            name: name.into(),
        }
    }

    /// Create the permission backing a module grant.
    ///
    /// Module permissions are created lazily during role provisioning and
    /// get a generated display name.
    pub fn for_module(module_name: impl Into<String>) -> Self {
        let codename = module_name.into();
        let name = format!("Can view {}", codename);
        Self { codename, name }
    }
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.codename)
    }
}

/// A flat set of permission codenames.
///
/// This is what a role's group identity holds directly, independent of the
/// transaction/rule mechanism. Iteration is in codename order.
///
/// # Example
///
/// ```
/// use rolegate_rbac::permissions::PermissionSet;
///
/// let mut set = PermissionSet::new();
/// set.add("reports");
/// set.add("invoices");
///
/// assert!(set.has("reports"));
/// assert_eq!(set.codenames(), vec!["invoices", "reports"]);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PermissionSet {
    codenames: BTreeSet<String>,
}

impl PermissionSet {
    /// Create a new empty permission set.
    pub fn new() -> Self {
        Self {
            codenames: BTreeSet::new(),
        }
    }

    /// Add a permission codename. Returns `false` if it was already present.
    pub fn add(&mut self, codename: impl Into<String>) -> bool {
        self.codenames.insert(codename.into())
    }

    /// Add multiple codenames.
    pub fn add_all<I, S>(&mut self, codenames: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for codename in codenames {
            self.add(codename);
        }
    }

    /// Check if the set contains a codename.
    pub fn has(&self, codename: &str) -> bool {
        self.codenames.contains(codename)
    }

    /// All codenames in the set, sorted.
    pub fn codenames(&self) -> Vec<&str> {
        self.codenames.iter().map(String::as_str).collect()
    }

    /// Iterate over the codenames.
    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.codenames.iter()
    }

    /// Merge another set into this one.
    pub fn merge(&mut self, other: &PermissionSet) {
        for codename in &other.codenames {
            self.codenames.insert(codename.clone());
        }
    }

    /// Get the count of permissions.
    pub fn len(&self) -> usize {
        self.codenames.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.codenames.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for PermissionSet {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        let mut set = PermissionSet::new();
        set.add_all(iter);
        set
    }
}

impl<'a> IntoIterator for &'a PermissionSet {
    type Item = &'a String;
    type IntoIter = std::collections::btree_set::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.codenames.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_permission_name() {
        let perm = Permission::for_module("invoices");
        assert_eq!(perm.codename, "invoices");
        assert_eq!(perm.name, "Can view invoices");
        assert_eq!(perm.to_string(), "invoices");
    }

    #[test]
    fn test_permission_set_dedup() {
        let mut set = PermissionSet::new();
        assert!(set.add("a"));
        assert!(!set.add("a"));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_permission_set_merge() {
        let mut set1: PermissionSet = ["a"].into_iter().collect();
        let set2: PermissionSet = ["b", "c"].into_iter().collect();

        set1.merge(&set2);
        assert_eq!(set1.codenames(), vec!["a", "b", "c"]);
        assert!(set2.iter().all(|c| set1.has(c)));
    }

    #[test]
    fn test_empty_set() {
        let set = PermissionSet::new();
        assert!(set.is_empty());
        assert!(set.codenames().is_empty());
    }
}

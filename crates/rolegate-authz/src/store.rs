//! Authorization store
//!
//! The resolver, the provisioner and the administration surface read and
//! write records only through the [`Store`] trait. Any backend works as long
//! as it keeps creation order for transactions and memberships and makes
//! each get-or-create atomic.

use async_trait::async_trait;
use rolegate_org::{PathMatch, Role, RoleMembership, Transaction};
use rolegate_rbac::{Permission, PermissionSet};
use uuid::Uuid;

use crate::error::StoreResult;

/// Record store consumed by every authorization component.
///
/// Reads must not block behind unrelated writes for longer than a single
/// write takes. Ordered results are oldest first, so "most recently created"
/// is always the last element.
#[async_trait]
pub trait Store: Send + Sync {
    // Roles

    /// Look up a role by name.
    async fn get_role(&self, name: &str) -> StoreResult<Option<Role>>;

    /// Names of the immediate children of a role.
    async fn children_of(&self, name: &str) -> StoreResult<Vec<String>>;

    /// Insert a new role, enforcing unique names and an existing parent.
    async fn insert_role(&self, role: Role) -> StoreResult<()>;

    /// Re-parent a role, rejecting cycles. Returns the updated role.
    async fn set_role_parent(&self, name: &str, parent: Option<&str>) -> StoreResult<Role>;

    /// Remove a leaf role together with its group identity and memberships.
    async fn remove_role(&self, name: &str) -> StoreResult<Role>;

    // Group identities

    /// Create the group identity if absent. Returns `true` if it was created.
    async fn ensure_group(&self, name: &str) -> StoreResult<bool>;

    /// Permissions held directly by a group. Unknown groups hold none.
    async fn group_permissions(&self, name: &str) -> StoreResult<PermissionSet>;

    /// Replace the permissions held by a group.
    async fn set_group_permissions(&self, name: &str, permissions: PermissionSet) -> StoreResult<()>;

    // Permissions

    /// Look up a permission by codename.
    async fn get_permission(&self, codename: &str) -> StoreResult<Option<Permission>>;

    /// Atomically fetch the permission with this codename or create it.
    ///
    /// Returns the stored permission and whether it was created.
    async fn get_or_create_permission(&self, permission: Permission) -> StoreResult<(Permission, bool)>;

    // Transactions

    /// Look up a transaction by name.
    async fn get_transaction(&self, name: &str) -> StoreResult<Option<Transaction>>;

    /// Atomically fetch the transaction with this name or create an empty one.
    async fn get_or_create_transaction(&self, name: &str) -> StoreResult<(Transaction, bool)>;

    /// Insert or replace a transaction by name, keeping its creation position.
    async fn save_transaction(&self, transaction: Transaction) -> StoreResult<()>;

    /// Transactions with a path matching `path`, oldest first.
    async fn transactions_for_path(&self, path: &str, mode: PathMatch) -> StoreResult<Vec<Transaction>>;

    // Memberships

    /// Create a membership. Role, permission and transaction must exist.
    async fn create_membership(&self, membership: RoleMembership) -> StoreResult<RoleMembership>;

    /// Remove a membership. Returns `true` if it existed.
    async fn remove_membership(&self, id: Uuid) -> StoreResult<bool>;

    /// Memberships of a role, oldest first.
    async fn memberships_of(&self, role: &str) -> StoreResult<Vec<RoleMembership>>;
}

#[cfg(feature = "memory")]
pub use memory::MemoryStore;

#[cfg(feature = "memory")]
mod memory {
    use super::*;
    use crate::error::StoreError;
    use rolegate_org::{RoleTree, RoleTreeError};
    use std::collections::HashMap;
    use std::sync::Arc;
    use tokio::sync::RwLock;

    #[derive(Debug, Default)]
    struct State {
        roles: RoleTree,
        groups: HashMap<String, PermissionSet>,
        permissions: HashMap<String, Permission>,
        /// Creation order; names are unique.
        transactions: Vec<Transaction>,
        /// Creation order.
        memberships: Vec<RoleMembership>,
    }

    impl State {
        fn transaction_index(&self, name: &str) -> Option<usize> {
            self.transactions.iter().position(|t| t.name == name)
        }
    }

    /// In-memory store.
    ///
    /// Suitable for single-process deployments and testing. Every write
    /// holds the exclusive lock for its whole duration, which makes
    /// get-or-create atomic; reads share the lock.
    #[derive(Clone, Default)]
    pub struct MemoryStore {
        state: Arc<RwLock<State>>,
    }

    impl std::fmt::Debug for MemoryStore {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("MemoryStore").finish_non_exhaustive()
        }
    }

    impl MemoryStore {
        /// Create an empty store.
        pub fn new() -> Self {
            Self::default()
        }
    }

    #[async_trait]
    impl Store for MemoryStore {
        async fn get_role(&self, name: &str) -> StoreResult<Option<Role>> {
            Ok(self.state.read().await.roles.get(name).cloned())
        }

        async fn children_of(&self, name: &str) -> StoreResult<Vec<String>> {
            let state = self.state.read().await;
            Ok(state
                .roles
                .children_of(name)
                .into_iter()
                .map(str::to_owned)
                .collect())
        }

        async fn insert_role(&self, role: Role) -> StoreResult<()> {
            let mut state = self.state.write().await;
            state.roles.insert(role)?;
            Ok(())
        }

        async fn set_role_parent(&self, name: &str, parent: Option<&str>) -> StoreResult<Role> {
            let mut state = self.state.write().await;
            state.roles.set_parent(name, parent)?;
            state
                .roles
                .get(name)
                .cloned()
                .ok_or_else(|| RoleTreeError::UnknownRole(name.to_string()).into())
        }

        async fn remove_role(&self, name: &str) -> StoreResult<Role> {
            let mut state = self.state.write().await;
            let role = state.roles.remove(name)?;
            state.groups.remove(name);
            state.memberships.retain(|m| m.role != name);
            Ok(role)
        }

        async fn ensure_group(&self, name: &str) -> StoreResult<bool> {
            let mut state = self.state.write().await;
            if state.groups.contains_key(name) {
                return Ok(false);
            }
            state.groups.insert(name.to_string(), PermissionSet::new());
            Ok(true)
        }

        async fn group_permissions(&self, name: &str) -> StoreResult<PermissionSet> {
            let state = self.state.read().await;
            Ok(state.groups.get(name).cloned().unwrap_or_default())
        }

        async fn set_group_permissions(&self, name: &str, permissions: PermissionSet) -> StoreResult<()> {
            let mut state = self.state.write().await;
            match state.groups.get_mut(name) {
                Some(existing) => {
                    *existing = permissions;
                    Ok(())
                }
                None => Err(StoreError::UnknownGroup(name.to_string())),
            }
        }

        async fn get_permission(&self, codename: &str) -> StoreResult<Option<Permission>> {
            Ok(self.state.read().await.permissions.get(codename).cloned())
        }

        async fn get_or_create_permission(&self, permission: Permission) -> StoreResult<(Permission, bool)> {
            let mut state = self.state.write().await;
            if let Some(existing) = state.permissions.get(&permission.codename) {
                return Ok((existing.clone(), false));
            }
            state
                .permissions
                .insert(permission.codename.clone(), permission.clone());
            Ok((permission, true))
        }

        async fn get_transaction(&self, name: &str) -> StoreResult<Option<Transaction>> {
            let state = self.state.read().await;
            Ok(state.transactions.iter().find(|t| t.name == name).cloned())
        }

        async fn get_or_create_transaction(&self, name: &str) -> StoreResult<(Transaction, bool)> {
            let mut state = self.state.write().await;
            if let Some(index) = state.transaction_index(name) {
                return Ok((state.transactions[index].clone(), false));
            }
            let transaction = Transaction::new(name);
            state.transactions.push(transaction.clone());
            Ok((transaction, true))
        }

        async fn save_transaction(&self, transaction: Transaction) -> StoreResult<()> {
            let mut state = self.state.write().await;
            match state.transaction_index(&transaction.name) {
                Some(index) => state.transactions[index] = transaction,
                None => state.transactions.push(transaction),
            }
            Ok(())
        }

        async fn transactions_for_path(&self, path: &str, mode: PathMatch) -> StoreResult<Vec<Transaction>> {
            let state = self.state.read().await;
            Ok(state
                .transactions
                .iter()
                .filter(|t| t.covers_path(path, mode))
                .cloned()
                .collect())
        }

        async fn create_membership(&self, membership: RoleMembership) -> StoreResult<RoleMembership> {
            let mut state = self.state.write().await;
            if !state.roles.contains(&membership.role) {
                return Err(RoleTreeError::UnknownRole(membership.role).into());
            }
            if !state.permissions.contains_key(&membership.permission) {
                return Err(StoreError::UnknownPermission(membership.permission));
            }
            if state.transaction_index(&membership.transaction).is_none() {
                return Err(StoreError::UnknownTransaction(membership.transaction));
            }
            state.memberships.push(membership.clone());
            Ok(membership)
        }

        async fn remove_membership(&self, id: Uuid) -> StoreResult<bool> {
            let mut state = self.state.write().await;
            let before = state.memberships.len();
            state.memberships.retain(|m| m.id != id);
            Ok(state.memberships.len() != before)
        }

        async fn memberships_of(&self, role: &str) -> StoreResult<Vec<RoleMembership>> {
            let state = self.state.read().await;
            Ok(state
                .memberships
                .iter()
                .filter(|m| m.role == role)
                .cloned()
                .collect())
        }
    }
}

#[cfg(all(test, feature = "memory"))]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use rolegate_org::RoleTreeError;

    #[tokio::test]
    async fn test_remove_role_clears_group_and_memberships() {
        let store = MemoryStore::new();
        store.insert_role(Role::new("manager")).await.unwrap();
        store
            .insert_role(Role::new("editor").with_parent("manager"))
            .await
            .unwrap();
        store.ensure_group("editor").await.unwrap();
        store
            .get_or_create_permission(Permission::for_module("posts"))
            .await
            .unwrap();
        store.get_or_create_transaction("posts").await.unwrap();
        store
            .create_membership(RoleMembership::new("editor", "posts", "posts"))
            .await
            .unwrap();

        let err = store.remove_role("manager").await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::Integrity(RoleTreeError::HasChildren(_))
        ));

        store.remove_role("editor").await.unwrap();
        assert!(store.get_role("editor").await.unwrap().is_none());
        assert!(store.memberships_of("editor").await.unwrap().is_empty());
        assert!(store.children_of("manager").await.unwrap().is_empty());
        // Group is gone, so it can be ensured again
        assert!(store.ensure_group("editor").await.unwrap());
    }

    #[tokio::test]
    async fn test_role_integrity() {
        let store = MemoryStore::new();
        store.insert_role(Role::new("manager")).await.unwrap();
        store
            .insert_role(Role::new("editor").with_parent("manager"))
            .await
            .unwrap();

        let err = store.insert_role(Role::new("editor")).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::Integrity(RoleTreeError::DuplicateRole(_))
        ));

        let err = store
            .set_role_parent("manager", Some("editor"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::Integrity(RoleTreeError::CyclicParent { .. })
        ));

        assert_eq!(store.children_of("manager").await.unwrap(), vec!["editor"]);
    }

    #[tokio::test]
    async fn test_get_or_create_is_idempotent() {
        let store = MemoryStore::new();

        let (_, created) = store
            .get_or_create_permission(Permission::for_module("offers"))
            .await
            .unwrap();
        assert!(created);
        let (perm, created) = store
            .get_or_create_permission(Permission::new("offers", "Other name"))
            .await
            .unwrap();
        assert!(!created);
        assert_eq!(perm.name, "Can view offers");

        let (first, created) = store.get_or_create_transaction("offers").await.unwrap();
        assert!(created);
        let (second, created) = store.get_or_create_transaction("offers").await.unwrap();
        assert!(!created);
        assert_eq!(first.id, second.id);

        assert!(store.ensure_group("editor").await.unwrap());
        assert!(!store.ensure_group("editor").await.unwrap());
    }

    #[tokio::test]
    async fn test_concurrent_get_or_create_creates_once() {
        let store = MemoryStore::new();
        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.get_or_create_transaction("reports").await.unwrap().1
            }));
        }

        let mut created = 0;
        for handle in handles {
            if handle.await.unwrap() {
                created += 1;
            }
        }
        assert_eq!(created, 1);
    }

    #[tokio::test]
    async fn test_transactions_for_path_keeps_creation_order() {
        let store = MemoryStore::new();
        store
            .save_transaction(Transaction::new("first").with_paths(["shared-path"]))
            .await
            .unwrap();
        store
            .save_transaction(Transaction::new("second").with_paths(["shared-path"]))
            .await
            .unwrap();
        // Updating keeps the creation position
        store
            .save_transaction(Transaction::new("first").with_paths(["shared-path", "other"]))
            .await
            .unwrap();

        let found = store
            .transactions_for_path("shared-path", PathMatch::Exact)
            .await
            .unwrap();
        let names: Vec<_> = found.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["first", "second"]);
    }

    #[tokio::test]
    async fn test_membership_requires_existing_records() {
        let store = MemoryStore::new();
        store.insert_role(Role::new("editor")).await.unwrap();

        let err = store
            .create_membership(RoleMembership::new("editor", "posts", "posts"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::UnknownPermission(_)));

        store
            .get_or_create_permission(Permission::for_module("posts"))
            .await
            .unwrap();
        store.get_or_create_transaction("posts").await.unwrap();
        let membership = store
            .create_membership(RoleMembership::new("editor", "posts", "posts"))
            .await
            .unwrap();

        assert_eq!(store.memberships_of("editor").await.unwrap().len(), 1);
        assert!(store.remove_membership(membership.id).await.unwrap());
        assert!(!store.remove_membership(membership.id).await.unwrap());
        assert!(store.memberships_of("editor").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_group_permissions() {
        let store = MemoryStore::new();
        assert!(store.group_permissions("nobody").await.unwrap().is_empty());

        let err = store
            .set_group_permissions("nobody", PermissionSet::new())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::UnknownGroup(_)));

        store.ensure_group("editor").await.unwrap();
        store
            .set_group_permissions("editor", ["a", "b"].into_iter().collect())
            .await
            .unwrap();
        assert_eq!(
            store.group_permissions("editor").await.unwrap().codenames(),
            vec!["a", "b"]
        );
    }
}

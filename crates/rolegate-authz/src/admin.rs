//! Administration operations
//!
//! Write paths used by an admin surface: role permissions, transaction paths
//! and rules, and direct membership management.

use rolegate_org::{RoleMembership, RoleTreeError, Transaction};
use rolegate_rbac::{PathRule, PermissionSet, RuleTable};
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{AuthzResult, StoreError};
use crate::store::Store;

/// Administrative writes over a store.
#[derive(Clone)]
pub struct Administration {
    store: Arc<dyn Store>,
}

impl std::fmt::Debug for Administration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Administration").finish_non_exhaustive()
    }
}

impl Administration {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Replace a role's permissions and apply the same set to each of its
    /// immediate children.
    ///
    /// An empty set changes nothing.
    ///
    /// # Returns
    ///
    /// Names of the roles whose permissions were set, the role first.
    pub async fn set_role_permissions(
        &self,
        role: &str,
        permissions: PermissionSet,
    ) -> AuthzResult<Vec<String>> {
        if permissions.is_empty() {
            return Ok(Vec::new());
        }
        if self.store.get_role(role).await?.is_none() {
            return Err(RoleTreeError::UnknownRole(role.to_string()).into());
        }
        for codename in permissions.iter() {
            if self.store.get_permission(codename).await?.is_none() {
                return Err(StoreError::UnknownPermission(codename.clone()).into());
            }
        }

        let mut updated = vec![role.to_string()];
        updated.extend(self.store.children_of(role).await?);
        for name in &updated {
            self.store.ensure_group(name).await?;
            self.store
                .set_group_permissions(name, permissions.clone())
                .await?;
        }
        tracing::info!(
            role = %role,
            permissions = permissions.len(),
            children = updated.len() - 1,
            "Role permissions set"
        );
        Ok(updated)
    }

    /// Add paths to a transaction, creating it if needed.
    ///
    /// `raw_rules`, when given, is merged into the transaction's rule table
    /// before the new paths get their skeletons. It never adds covered
    /// paths. Malformed rule data is treated as an empty table.
    pub async fn add_transaction_paths(
        &self,
        name: &str,
        paths: &[&str],
        raw_rules: Option<&Value>,
    ) -> AuthzResult<Transaction> {
        let (mut transaction, created) = self.store.get_or_create_transaction(name).await?;

        if let Some(raw) = raw_rules {
            // Rules only; the covered paths change through `add_paths` alone
            let parsed = RuleTable::from_value(raw);
            for path in parsed.paths() {
                if let Some(rule) = parsed.rule(path) {
                    transaction.rules.insert(path, rule.clone());
                }
            }
        }

        let added = transaction.add_paths(paths.iter().copied());
        self.store.save_transaction(transaction.clone()).await?;
        tracing::debug!(
            transaction = %name,
            created,
            added = added.len(),
            "Transaction paths updated"
        );
        Ok(transaction)
    }

    /// Set the rule for one path of an existing transaction.
    pub async fn set_path_rule(
        &self,
        name: &str,
        path: &str,
        rule: PathRule,
    ) -> AuthzResult<Transaction> {
        let transaction = self
            .store
            .get_transaction(name)
            .await?
            .ok_or_else(|| StoreError::UnknownTransaction(name.to_string()))?
            .with_rule(path, rule);
        self.store.save_transaction(transaction.clone()).await?;
        Ok(transaction)
    }

    /// Make a role a member of a transaction under the permission of the
    /// same name.
    pub async fn grant_membership(&self, role: &str, transaction: &str) -> AuthzResult<RoleMembership> {
        let membership = self
            .store
            .create_membership(RoleMembership::new(role, transaction, transaction))
            .await?;
        tracing::debug!(membership = %membership, "Membership granted");
        Ok(membership)
    }

    /// Remove a membership. Returns `false` if it did not exist.
    pub async fn revoke_membership(&self, id: Uuid) -> AuthzResult<bool> {
        let removed = self.store.remove_membership(id).await?;
        tracing::debug!(membership_id = %id, removed, "Membership revoked");
        Ok(removed)
    }
}

#[cfg(all(test, feature = "memory"))]
mod tests {
    use super::*;
    use crate::error::AuthzError;
    use crate::store::MemoryStore;
    use rolegate_org::{PathMatch, Role};
    use rolegate_rbac::{CrudOperation, Permission};
    use serde_json::json;

    async fn setup() -> (Arc<MemoryStore>, Administration) {
        let store = Arc::new(MemoryStore::new());
        store.insert_role(Role::new("manager")).await.unwrap();
        store
            .insert_role(Role::new("editor").with_parent("manager"))
            .await
            .unwrap();
        store
            .insert_role(Role::new("writer").with_parent("editor"))
            .await
            .unwrap();
        for codename in ["view_posts", "edit_posts"] {
            store
                .get_or_create_permission(Permission::new(codename, codename))
                .await
                .unwrap();
        }
        let admin = Administration::new(store.clone());
        (store, admin)
    }

    #[tokio::test]
    async fn test_set_permissions_reaches_immediate_children() {
        let (store, admin) = setup().await;
        let perms: PermissionSet = ["view_posts", "edit_posts"].into_iter().collect();

        let updated = admin.set_role_permissions("manager", perms.clone()).await.unwrap();
        assert_eq!(updated, vec!["manager", "editor"]);
        assert_eq!(store.group_permissions("editor").await.unwrap(), perms);
        assert!(store.group_permissions("writer").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_set_permissions_validation() {
        let (_, admin) = setup().await;

        assert!(admin
            .set_role_permissions("manager", PermissionSet::new())
            .await
            .unwrap()
            .is_empty());

        let err = admin
            .set_role_permissions("ghost", ["view_posts"].into_iter().collect())
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "UNKNOWN_ROLE");

        let err = admin
            .set_role_permissions("manager", ["delete_posts"].into_iter().collect())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthzError::Store(StoreError::UnknownPermission(_))));
    }

    #[tokio::test]
    async fn test_add_paths_merges_rules() {
        let (store, admin) = setup().await;

        admin
            .add_transaction_paths("posts", &["posts-list"], None)
            .await
            .unwrap();
        let raw = json!({"posts-list": {"read": ["*"]}});
        let transaction = admin
            .add_transaction_paths("posts", &["posts-update"], Some(&raw))
            .await
            .unwrap();

        assert_eq!(transaction.paths, vec!["posts-list", "posts-update"]);
        assert_eq!(
            transaction.rule_for("posts-list", CrudOperation::Read),
            Some(&["*".to_string()][..])
        );
        assert_eq!(
            transaction.rule_for("posts-update", CrudOperation::Update),
            Some(&[][..])
        );

        let stored = store
            .transactions_for_path("posts-update", PathMatch::Exact)
            .await
            .unwrap();
        assert_eq!(stored.len(), 1);
    }

    #[tokio::test]
    async fn test_rules_alone_do_not_cover_paths() {
        let (store, admin) = setup().await;
        admin
            .add_transaction_paths("posts", &["posts-list"], None)
            .await
            .unwrap();

        let raw = json!({
            "posts-list": {"read": ["editor"]},
            "billing-delete": {"delete": ["*"]}
        });
        let transaction = admin
            .add_transaction_paths("posts", &[], Some(&raw))
            .await
            .unwrap();

        assert_eq!(transaction.paths, vec!["posts-list"]);
        assert_eq!(
            transaction.rule_for("posts-list", CrudOperation::Read),
            Some(&["editor".to_string()][..])
        );
        assert!(store
            .transactions_for_path("billing-delete", PathMatch::Exact)
            .await
            .unwrap()
            .is_empty());

        // Adding the path later picks up the merged rule instead of a skeleton
        let transaction = admin
            .add_transaction_paths("posts", &["billing-delete"], None)
            .await
            .unwrap();
        assert_eq!(
            transaction.rule_for("billing-delete", CrudOperation::Delete),
            Some(&["*".to_string()][..])
        );
    }

    #[tokio::test]
    async fn test_add_paths_tolerates_malformed_rules() {
        let (_, admin) = setup().await;
        let transaction = admin
            .add_transaction_paths("posts", &["posts-list"], Some(&json!("not a table")))
            .await
            .unwrap();
        assert_eq!(
            transaction.rule_for("posts-list", CrudOperation::Read),
            Some(&[][..])
        );
    }

    #[tokio::test]
    async fn test_set_path_rule_requires_transaction() {
        let (_, admin) = setup().await;
        let err = admin
            .set_path_rule("missing", "x", PathRule::skeleton())
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "UNKNOWN_TRANSACTION");

        admin.add_transaction_paths("posts", &[], None).await.unwrap();
        let transaction = admin
            .set_path_rule(
                "posts",
                "posts-update",
                PathRule::new().allow(CrudOperation::Update, "editor"),
            )
            .await
            .unwrap();
        assert!(transaction.covers_path("posts-update", PathMatch::Exact));
    }

    #[tokio::test]
    async fn test_grant_and_revoke_membership() {
        let (store, admin) = setup().await;
        store
            .get_or_create_permission(Permission::for_module("posts"))
            .await
            .unwrap();
        admin.add_transaction_paths("posts", &["posts-list"], None).await.unwrap();

        let membership = admin.grant_membership("editor", "posts").await.unwrap();
        assert_eq!(store.memberships_of("editor").await.unwrap().len(), 1);

        assert!(admin.revoke_membership(membership.id).await.unwrap());
        assert!(!admin.revoke_membership(membership.id).await.unwrap());
        assert!(store.memberships_of("editor").await.unwrap().is_empty());

        let err = admin.grant_membership("editor", "drafts").await.unwrap_err();
        assert_eq!(err.error_code(), "UNKNOWN_PERMISSION");
    }
}

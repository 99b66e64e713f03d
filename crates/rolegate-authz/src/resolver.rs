//! Authorization resolver
//!
//! Decides whether a subject may perform an HTTP method on a resolved route.
//! For each required role the resolver:
//!
//! 1. checks that one of the subject's roles equals the required role or is
//!    its immediate child;
//! 2. finds the transaction covering the route (the newest one wins);
//! 3. grants outright if the transaction's permission was never declared;
//! 4. otherwise scans every role the subject holds for a membership of that
//!    transaction and evaluates the path's CRUD rule.
//!
//! Verdicts are OR-ed across required roles.

use rolegate_org::{AuthSubject, AuthzSettings, Role, RoleMembership, Transaction, TreeRelation};
use rolegate_rbac::{roles_allow, CrudOperation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::AuthzResult;
use crate::store::Store;

/// Outcome of an authorization request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    /// Whether access is granted
    pub granted: bool,
    /// Whether any held role is within a required role's tree
    pub in_tree: bool,
    /// Human-readable reason, present only on denial
    pub denial_reason: Option<String>,
}

impl Decision {
    /// A grant with no reason attached.
    pub fn granted() -> Self {
        Self {
            granted: true,
            in_tree: true,
            denial_reason: None,
        }
    }

    /// Build a decision from aggregated flags, picking the denial message.
    pub fn from_flags(granted: bool, in_tree: bool, settings: &AuthzSettings) -> Self {
        Self {
            granted,
            in_tree,
            denial_reason: settings.denial_reason(granted, in_tree).map(str::to_owned),
        }
    }
}

/// A subject role found within a required role's tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeMatch {
    /// The subject's role that matched
    pub role: Role,
    /// How it relates to the required role
    pub relation: TreeRelation,
}

/// The decision engine.
///
/// Holds the store and the settings; cheap to clone and safe to share
/// across requests. Every method only reads from the store.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use rolegate_authz::{Authorizer, MemoryStore};
/// use rolegate_org::{AuthzSettings, Subject};
///
/// # async fn run() -> rolegate_authz::AuthzResult<()> {
/// let authorizer = Authorizer::new(Arc::new(MemoryStore::new()), Arc::new(AuthzSettings::default()));
/// let subject = Subject::new().with_role("editor");
///
/// let decision = authorizer.authorize(&subject, &["manager"], "posts-update", "PUT").await?;
/// if !decision.granted {
///     println!("{}", decision.denial_reason.unwrap_or_default());
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Authorizer {
    store: Arc<dyn Store>,
    settings: Arc<AuthzSettings>,
}

impl std::fmt::Debug for Authorizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authorizer")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl Authorizer {
    /// Create a resolver over a store with fixed settings.
    pub fn new(store: Arc<dyn Store>, settings: Arc<AuthzSettings>) -> Self {
        Self { store, settings }
    }

    /// The settings this resolver decides with.
    pub fn settings(&self) -> &AuthzSettings {
        &self.settings
    }

    /// Decide whether `subject` may perform `method` on `path`.
    ///
    /// `required_roles` are alternatives: any one of them authorizing is
    /// enough. Superusers are always granted.
    ///
    /// # Errors
    ///
    /// Only store failures. Unknown roles, permissions, transactions and
    /// rules all have defined verdicts.
    pub async fn authorize<S, R>(
        &self,
        subject: &S,
        required_roles: &[R],
        path: &str,
        method: &str,
    ) -> AuthzResult<Decision>
    where
        S: AuthSubject + ?Sized,
        R: AsRef<str> + Sync,
    {
        if subject.is_superuser() {
            tracing::debug!(path = %path, "Superuser bypasses role checks");
            return Ok(Decision::granted());
        }

        let operation = CrudOperation::from_method(method);
        let mut granted = false;
        let mut in_tree = false;

        for required in required_roles {
            let required = required.as_ref();
            let (role_granted, role_in_tree) = self
                .evaluate_required_role(subject, required, path, operation)
                .await?;
            granted |= role_granted;
            in_tree |= role_in_tree;
        }

        let decision = Decision::from_flags(granted, in_tree, &self.settings);
        if decision.granted {
            tracing::debug!(path = %path, operation = %operation, "Access granted");
        } else {
            tracing::debug!(
                path = %path,
                operation = %operation,
                in_tree = decision.in_tree,
                reason = ?decision.denial_reason,
                "Access denied"
            );
        }
        Ok(decision)
    }

    async fn evaluate_required_role<S>(
        &self,
        subject: &S,
        required: &str,
        path: &str,
        operation: CrudOperation,
    ) -> AuthzResult<(bool, bool)>
    where
        S: AuthSubject + ?Sized,
    {
        let Some(matched) = self
            .is_within_tree(subject.assigned_role_names(), required)
            .await?
        else {
            return Ok((false, false));
        };
        tracing::trace!(
            required = %required,
            role = %matched.role.name,
            relation = ?matched.relation,
            "Subject role within required tree"
        );

        let Some(transaction) = self.find_transaction_for_path(path).await? else {
            let grant = self.settings.grant_nonexistent_path_access;
            tracing::debug!(path = %path, grant, "No transaction covers path");
            return Ok((grant, grant));
        };

        let granted = self
            .evaluate_rules(subject, &transaction.name, path, operation)
            .await?;
        Ok((granted, true))
    }

    /// Find the first subject role that equals `required` or is its
    /// immediate child.
    ///
    /// Role names with no stored role are skipped.
    pub async fn is_within_tree(
        &self,
        subject_roles: &[String],
        required: &str,
    ) -> AuthzResult<Option<TreeMatch>> {
        for name in subject_roles {
            let Some(role) = self.store.get_role(name).await? else {
                continue;
            };
            if let Some(relation) = role.relation_to(required) {
                return Ok(Some(TreeMatch { role, relation }));
            }
        }
        Ok(None)
    }

    /// The most recently created transaction covering `path`.
    pub async fn find_transaction_for_path(&self, path: &str) -> AuthzResult<Option<Transaction>> {
        let mut matching = self
            .store
            .transactions_for_path(path, self.settings.path_match)
            .await?;
        Ok(matching.pop())
    }

    /// Allowed role names for `operation` at `path`, or `None` when the
    /// transaction defines no rule for the path.
    pub fn rule_for<'a>(
        transaction: &'a Transaction,
        path: &str,
        operation: CrudOperation,
    ) -> Option<&'a [String]> {
        transaction.rule_for(path, operation)
    }

    /// The most recently created membership of `role` in the named
    /// transaction, provided that transaction covers `path`.
    pub async fn membership_of(
        &self,
        role: &str,
        transaction_name: &str,
        path: &str,
    ) -> AuthzResult<Option<(RoleMembership, Transaction)>> {
        let memberships = self.store.memberships_of(role).await?;
        for membership in memberships.into_iter().rev() {
            if membership.transaction != transaction_name {
                continue;
            }
            let Some(transaction) = self.store.get_transaction(&membership.transaction).await? else {
                continue;
            };
            if transaction.covers_path(path, self.settings.path_match) {
                return Ok(Some((membership, transaction)));
            }
        }
        Ok(None)
    }

    /// Check the subject's memberships of one transaction against its rules,
    /// without the role-tree test.
    ///
    /// Superusers are granted; an undeclared permission is granted.
    pub async fn check_transaction_permission<S>(
        &self,
        subject: &S,
        permission_name: &str,
        path: &str,
        method: &str,
    ) -> AuthzResult<bool>
    where
        S: AuthSubject + ?Sized,
    {
        if subject.is_superuser() {
            return Ok(true);
        }
        self.evaluate_rules(subject, permission_name, path, CrudOperation::from_method(method))
            .await
    }

    async fn evaluate_rules<S>(
        &self,
        subject: &S,
        permission_name: &str,
        path: &str,
        operation: CrudOperation,
    ) -> AuthzResult<bool>
    where
        S: AuthSubject + ?Sized,
    {
        if self.store.get_permission(permission_name).await?.is_none() {
            tracing::debug!(permission = %permission_name, "Permission not declared, granting");
            return Ok(true);
        }

        let mut granted = false;
        for role_name in subject.assigned_role_names() {
            let Some((_, transaction)) = self.membership_of(role_name, permission_name, path).await?
            else {
                continue;
            };

            match Self::rule_for(&transaction, path, operation) {
                // No rule for this path: grant, but keep scanning the remaining roles
                None => granted = true,
                Some(allowed) => {
                    granted = roles_allow(allowed, role_name);
                    if granted {
                        break;
                    }
                }
            }
        }
        Ok(granted)
    }
}

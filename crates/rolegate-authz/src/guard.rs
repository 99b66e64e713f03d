//! Request guards
//!
//! Adapters between a routed request and the resolver. A route's name is the
//! resource path the rules are keyed by; the HTTP verb selects the CRUD
//! operation.
//!
//! Guards compose with [`GuardSet`]: a request passes if any one guard
//! passes, and fails with a [`PermissionDenied`] that lists the denial state
//! of every guard when all of them fail.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use rolegate_authz::{Authorizer, GuardSet, MemoryStore, RoleGuard, RouteRequest};
//! use rolegate_org::{AuthzSettings, Subject};
//!
//! # async fn run() -> rolegate_authz::AuthzResult<()> {
//! let authorizer = Authorizer::new(Arc::new(MemoryStore::new()), Arc::new(AuthzSettings::default()));
//! let guards = GuardSet::new()
//!     .with(RoleGuard::new(authorizer.clone(), ["manager"]))
//!     .with(RoleGuard::new(authorizer, ["auditor"]));
//!
//! let request = RouteRequest::new("posts-update", "/posts/7/", "PUT");
//! guards.enforce(&Subject::new().with_role("editor"), &request).await?;
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use rolegate_org::{AuthSubject, AuthzSettings};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::AuthzResult;
use crate::resolver::{Authorizer, Decision};

/// The parts of a routed request the guards look at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteRequest {
    /// Name of the resolved route, used as the resource path
    pub route_name: String,
    /// Raw request path
    pub path: String,
    /// HTTP method
    pub method: String,
}

impl RouteRequest {
    /// Create a request description.
    pub fn new(
        route_name: impl Into<String>,
        path: impl Into<String>,
        method: impl Into<String>,
    ) -> Self {
        Self {
            route_name: route_name.into(),
            path: path.into(),
            method: method.into(),
        }
    }
}

/// Why one guard denied, for one required role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DenialState {
    /// The required role that was checked, if the guard is role-based
    pub role: Option<String>,
    /// Denial message
    pub message: String,
}

/// Raised when every guard on a request denies.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
#[error("{message}")]
pub struct PermissionDenied {
    /// Summary message
    pub message: String,
    /// Denial states of every failing guard
    pub states: Vec<DenialState>,
}

impl PermissionDenied {
    /// Build from denial states. The summary is the first state's message.
    pub fn new(states: Vec<DenialState>) -> Self {
        let message = states
            .first()
            .map(|state| state.message.clone())
            .unwrap_or_else(|| "Permission denied".to_string());
        Self { message, states }
    }
}

/// Result of a single guard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardVerdict {
    Allow,
    Deny(Vec<DenialState>),
}

impl GuardVerdict {
    pub fn is_allowed(&self) -> bool {
        matches!(self, GuardVerdict::Allow)
    }
}

/// A permission check applied to a request.
#[async_trait]
pub trait Guard: Send + Sync {
    /// Check the request for a subject.
    async fn check(&self, subject: &dyn AuthSubject, request: &RouteRequest)
        -> AuthzResult<GuardVerdict>;
}

/// Build the redirect location for a denied request.
///
/// The message travels as a form-encoded `message` query parameter.
///
/// ```
/// use rolegate_authz::denied_redirect_url;
/// use rolegate_org::AuthzSettings;
///
/// let url = denied_redirect_url(&AuthzSettings::default(), "no access");
/// assert_eq!(url, "/permission-denied/?message=no+access");
/// ```
pub fn denied_redirect_url(settings: &AuthzSettings, message: &str) -> String {
    let query = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("message", message)
        .finish();
    let separator = if settings.permission_denied_url.contains('?') {
        '&'
    } else {
        '?'
    };
    format!("{}{}{}", settings.permission_denied_url, separator, query)
}

/// Guard requiring the subject to sit within one of several role trees.
#[derive(Debug, Clone)]
pub struct RoleGuard {
    authorizer: Authorizer,
    required_roles: Vec<String>,
}

impl RoleGuard {
    pub fn new<I, S>(authorizer: Authorizer, required_roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            authorizer,
            required_roles: required_roles.into_iter().map(Into::into).collect(),
        }
    }

    pub fn required_roles(&self) -> &[String] {
        &self.required_roles
    }

    /// Run the resolver for this guard's roles.
    pub async fn decide(
        &self,
        subject: &dyn AuthSubject,
        request: &RouteRequest,
    ) -> AuthzResult<Decision> {
        self.authorizer
            .authorize(
                subject,
                self.required_roles.as_slice(),
                &request.route_name,
                &request.method,
            )
            .await
    }

    /// Redirect location when denied, `None` when granted.
    pub async fn redirect_on_denied(
        &self,
        subject: &dyn AuthSubject,
        request: &RouteRequest,
    ) -> AuthzResult<Option<String>> {
        let decision = self.decide(subject, request).await?;
        Ok(decision.denial_reason.map(|reason| {
            tracing::debug!(route = %request.route_name, "Redirecting denied request");
            denied_redirect_url(self.authorizer.settings(), &reason)
        }))
    }

    /// Fail with [`PermissionDenied`] when denied.
    pub async fn enforce(&self, subject: &dyn AuthSubject, request: &RouteRequest) -> AuthzResult<()> {
        match self.check(subject, request).await? {
            GuardVerdict::Allow => Ok(()),
            GuardVerdict::Deny(states) => Err(PermissionDenied::new(states).into()),
        }
    }
}

#[async_trait]
impl Guard for RoleGuard {
    async fn check(
        &self,
        subject: &dyn AuthSubject,
        request: &RouteRequest,
    ) -> AuthzResult<GuardVerdict> {
        let decision = self.decide(subject, request).await?;
        if decision.granted {
            return Ok(GuardVerdict::Allow);
        }
        let message = decision.denial_reason.unwrap_or_default();
        let states = self
            .required_roles
            .iter()
            .map(|role| DenialState {
                role: Some(role.clone()),
                message: message.clone(),
            })
            .collect();
        Ok(GuardVerdict::Deny(states))
    }
}

/// Guard on the admin index page.
///
/// Applies only to authenticated subjects requesting the admin index path;
/// everything else passes through.
#[derive(Debug, Clone)]
pub struct AdminIndexGuard {
    authorizer: Authorizer,
}

impl AdminIndexGuard {
    pub fn new(authorizer: Authorizer) -> Self {
        Self { authorizer }
    }
}

#[async_trait]
impl Guard for AdminIndexGuard {
    async fn check(
        &self,
        subject: &dyn AuthSubject,
        request: &RouteRequest,
    ) -> AuthzResult<GuardVerdict> {
        let settings = self.authorizer.settings();
        if request.path != settings.admin_index_path || !subject.is_authenticated() {
            return Ok(GuardVerdict::Allow);
        }

        let allowed = self
            .authorizer
            .check_transaction_permission(
                subject,
                &settings.admin_permission,
                &request.path,
                &request.method,
            )
            .await?;
        if allowed {
            Ok(GuardVerdict::Allow)
        } else {
            tracing::debug!(path = %request.path, "Admin index denied");
            Ok(GuardVerdict::Deny(vec![DenialState {
                role: None,
                message: settings.forbidden_message.clone(),
            }]))
        }
    }
}

/// OR-composition of guards.
///
/// An empty set allows everything.
#[derive(Default)]
pub struct GuardSet {
    guards: Vec<Box<dyn Guard>>,
}

impl std::fmt::Debug for GuardSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuardSet")
            .field("guards", &self.guards.len())
            .finish()
    }
}

impl GuardSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a guard.
    pub fn with(mut self, guard: impl Guard + 'static) -> Self {
        self.guards.push(Box::new(guard));
        self
    }

    pub fn push(&mut self, guard: Box<dyn Guard>) {
        self.guards.push(guard);
    }

    pub fn len(&self) -> usize {
        self.guards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.guards.is_empty()
    }

    /// Fail with [`PermissionDenied`] when every guard denies.
    pub async fn enforce(&self, subject: &dyn AuthSubject, request: &RouteRequest) -> AuthzResult<()> {
        match self.check(subject, request).await? {
            GuardVerdict::Allow => Ok(()),
            GuardVerdict::Deny(states) => Err(PermissionDenied::new(states).into()),
        }
    }
}

#[async_trait]
impl Guard for GuardSet {
    async fn check(
        &self,
        subject: &dyn AuthSubject,
        request: &RouteRequest,
    ) -> AuthzResult<GuardVerdict> {
        if self.guards.is_empty() {
            return Ok(GuardVerdict::Allow);
        }

        let mut states = Vec::new();
        for guard in &self.guards {
            match guard.check(subject, request).await? {
                GuardVerdict::Allow => return Ok(GuardVerdict::Allow),
                GuardVerdict::Deny(denied) => states.extend(denied),
            }
        }
        Ok(GuardVerdict::Deny(states))
    }
}

#[cfg(all(test, feature = "memory"))]
mod tests {
    use super::*;
    use crate::error::AuthzError;
    use crate::store::{MemoryStore, Store};
    use rolegate_org::{Role, RoleMembership, Subject, Transaction};
    use rolegate_rbac::{CrudOperation, PathRule, Permission};
    use std::sync::Arc;

    async fn setup() -> Authorizer {
        let store = Arc::new(MemoryStore::new());
        store.insert_role(Role::new("manager")).await.unwrap();
        store
            .insert_role(Role::new("editor").with_parent("manager"))
            .await
            .unwrap();
        store.insert_role(Role::new("auditor")).await.unwrap();

        for (name, path, allowed) in [
            ("posts", "posts-update", "manager"),
            ("admin", "/admin/", "manager"),
        ] {
            store
                .get_or_create_permission(Permission::for_module(name))
                .await
                .unwrap();
            store
                .save_transaction(
                    Transaction::new(name).with_rule(
                        path,
                        PathRule::new()
                            .allow(CrudOperation::Update, allowed)
                            .allow(CrudOperation::Read, allowed),
                    ),
                )
                .await
                .unwrap();
            for role in ["manager", "editor"] {
                store
                    .create_membership(RoleMembership::new(role, name, name))
                    .await
                    .unwrap();
            }
        }
        Authorizer::new(store, Arc::new(AuthzSettings::default()))
    }

    #[test]
    fn test_redirect_url_encoding() {
        let settings = AuthzSettings::default();
        let url = denied_redirect_url(&settings, "You belong to the required role, but no");
        assert_eq!(
            url,
            "/permission-denied/?message=You+belong+to+the+required+role%2C+but+no"
        );

        let settings = AuthzSettings {
            permission_denied_url: "/denied/?next=home".to_string(),
            ..AuthzSettings::default()
        };
        assert_eq!(denied_redirect_url(&settings, "x"), "/denied/?next=home&message=x");
    }

    #[test]
    fn test_permission_denied_message() {
        let denied = PermissionDenied::new(vec![DenialState {
            role: Some("manager".into()),
            message: "nope".into(),
        }]);
        assert_eq!(denied.to_string(), "nope");
        assert_eq!(PermissionDenied::new(Vec::new()).to_string(), "Permission denied");
    }

    #[tokio::test]
    async fn test_role_guard_redirects_on_denial() {
        let authz = setup().await;
        let guard = RoleGuard::new(authz, ["manager"]);
        let request = RouteRequest::new("posts-update", "/posts/1/", "PUT");

        let redirect = guard
            .redirect_on_denied(&Subject::new().with_role("editor"), &request)
            .await
            .unwrap()
            .unwrap();
        assert!(redirect.starts_with("/permission-denied/?message=You+belong"));

        let granted = guard
            .redirect_on_denied(&Subject::new().with_role("manager"), &request)
            .await
            .unwrap();
        assert!(granted.is_none());
    }

    #[tokio::test]
    async fn test_guard_set_or_composition() {
        let authz = setup().await;
        let request = RouteRequest::new("posts-update", "/posts/1/", "PUT");
        let guards = GuardSet::new()
            .with(RoleGuard::new(authz.clone(), ["auditor"]))
            .with(RoleGuard::new(authz.clone(), ["manager"]));

        assert!(guards
            .enforce(&Subject::new().with_role("manager"), &request)
            .await
            .is_ok());

        let err = guards
            .enforce(&Subject::new().with_role("editor"), &request)
            .await
            .unwrap_err();
        let AuthzError::PermissionDenied(denied) = err else {
            panic!("expected a denial");
        };
        assert_eq!(denied.states.len(), 2);
        assert_eq!(denied.states[0].role.as_deref(), Some("auditor"));
        assert_eq!(denied.states[0].message, authz.settings().forbidden_message);
        assert_eq!(denied.states[1].role.as_deref(), Some("manager"));
        assert_eq!(denied.states[1].message, authz.settings().role_denied_message);
    }

    #[tokio::test]
    async fn test_empty_guard_set_allows() {
        let guards = GuardSet::new();
        let request = RouteRequest::new("anything", "/", "GET");
        assert!(guards.enforce(&Subject::anonymous(), &request).await.is_ok());
    }

    #[tokio::test]
    async fn test_admin_index_guard() {
        let authz = setup().await;
        let guard = AdminIndexGuard::new(authz);
        let index = RouteRequest::new("admin:index", "/admin/", "GET");

        let manager = Subject::new().with_role("manager");
        let editor = Subject::new().with_role("editor");
        assert!(guard.check(&manager, &index).await.unwrap().is_allowed());
        assert!(!guard.check(&editor, &index).await.unwrap().is_allowed());

        // Anonymous subjects and other pages pass through
        assert!(guard.check(&Subject::anonymous(), &index).await.unwrap().is_allowed());
        let other = RouteRequest::new("admin:users", "/admin/users/", "GET");
        assert!(guard.check(&editor, &other).await.unwrap().is_allowed());
    }
}

//! # Rolegate Authorization
//!
//! Role-tree authorization for request handlers.
//!
//! ## Overview
//!
//! Given a subject, the roles a route requires, the route's resource path and
//! the HTTP method, the [`Authorizer`] answers whether access is granted,
//! whether the subject sits within a required role's tree, and why access
//! was denied.
//!
//! The crate also covers the write side:
//! - **Provisioning**: creating roles with inherited permissions and module
//!   memberships ([`RoleProvisioner`])
//! - **Administration**: role permissions, transaction paths and rules,
//!   memberships ([`Administration`])
//! - **Guards**: request adapters composable with OR semantics ([`GuardSet`])
//!
//! ## Features
//!
//! - `memory` (default): the in-process [`MemoryStore`]
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use rolegate_authz::{Administration, Authorizer, MemoryStore, RoleProvisioner};
//! use rolegate_org::{AuthzSettings, Subject};
//! use rolegate_rbac::{CrudOperation, PathRule};
//!
//! # async fn run() -> rolegate_authz::AuthzResult<()> {
//! let store = Arc::new(MemoryStore::new());
//! let provisioner = RoleProvisioner::without_modules(store.clone());
//! provisioner.create_role("manager", None).await?;
//! provisioner.create_role("editor", Some("manager")).await?;
//!
//! let admin = Administration::new(store.clone());
//! admin.add_transaction_paths("posts", &["posts-update"], None).await?;
//! admin
//!     .set_path_rule("posts", "posts-update", PathRule::new().allow(CrudOperation::Update, "*"))
//!     .await?;
//!
//! let authorizer = Authorizer::new(store, Arc::new(AuthzSettings::from_env()));
//! let decision = authorizer
//!     .authorize(&Subject::new().with_role("editor"), &["manager"], "posts-update", "PUT")
//!     .await?;
//! assert!(decision.granted);
//! # Ok(())
//! # }
//! ```

pub mod admin;
pub mod error;
pub mod guard;
pub mod provisioning;
pub mod resolver;
pub mod store;

// Re-export main types
pub use admin::Administration;
pub use error::{AuthzError, AuthzResult, StoreError, StoreResult};
pub use guard::{
    denied_redirect_url, AdminIndexGuard, DenialState, Guard, GuardSet, GuardVerdict,
    PermissionDenied, RoleGuard, RouteRequest,
};
pub use provisioning::{
    ModuleConfigError, ModuleConfiguration, ModuleRegistry, ProvisionedRole, RoleProvisioner,
    StaticModuleConfiguration,
};
pub use resolver::{Authorizer, Decision, TreeMatch};
pub use store::Store;

#[cfg(feature = "memory")]
pub use store::MemoryStore;

//! # Rolegate role hierarchy and records
//!
//! The records an authorization store holds, and the pure logic over them.
//!
//! ## Overview
//!
//! The rolegate-org crate handles:
//! - **Roles**: a forest of uniquely named roles with single parents
//! - **Transactions**: named operations covering resource paths, with rules
//! - **Memberships**: role ↔ permission ↔ transaction join records
//! - **Subjects**: the caller as seen by the resolver
//! - **Settings**: the immutable configuration of the engine
//!
//! ## Architecture
//!
//! ```text
//! Role "director"
//!   └─ Role "manager"            (senior to director)
//!        ├─ Role "editor"        (senior to manager)
//!        │    └─ RoleMembership ─→ Transaction "posts"
//!        │                           ├─ paths: ["posts-list", "posts-update"]
//!        │                           └─ rules: RuleTable
//!        └─ Role "writer"
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use rolegate_org::{Role, RoleTree, TreeRelation};
//!
//! let mut tree = RoleTree::new();
//! tree.insert(Role::new("manager")).unwrap();
//! tree.insert(Role::new("editor").with_parent("manager")).unwrap();
//!
//! let editor = tree.get("editor").unwrap();
//! assert_eq!(editor.relation_to("manager"), Some(TreeRelation::Child));
//! assert_eq!(tree.children_of("manager"), vec!["editor"]);
//! ```

pub mod membership;
pub mod roles;
pub mod settings;
pub mod subject;
pub mod transaction;

// Re-export main types for convenience
pub use membership::RoleMembership;
pub use roles::{Role, RoleTree, RoleTreeError, TreeRelation};
pub use settings::{
    AuthzSettings, DEFAULT_ADMIN_INDEX_PATH, DEFAULT_ADMIN_PERMISSION, DEFAULT_FORBIDDEN_MESSAGE,
    DEFAULT_PERMISSION_DENIED_URL, DEFAULT_ROLE_DENIED_MESSAGE,
};
pub use subject::{AuthSubject, Subject};
pub use transaction::{PathMatch, Transaction};

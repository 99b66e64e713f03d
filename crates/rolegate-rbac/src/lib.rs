//! # Rolegate RBAC primitives
//!
//! Value types shared by the role tree and the resolver.
//!
//! ## Overview
//!
//! - **Operations**: the four CRUD operations and the HTTP method mapping
//! - **Permissions**: named capabilities and flat permission sets
//! - **Rules**: per-path tables of allowed role names per operation
//!
//! ## Architecture
//!
//! ```text
//! Transaction "posts"
//!   └─ RuleTable
//!        └─ "posts-update" → PathRule
//!                              ├─ create → []
//!                              ├─ read   → ["*"]
//!                              ├─ update → ["manager"]
//!                              └─ delete → []
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use rolegate_rbac::{CrudOperation, PathRule, RuleTable};
//!
//! let mut rules = RuleTable::new();
//! rules.insert("posts-update", PathRule::skeleton().allow(CrudOperation::Update, "manager"));
//!
//! let op = CrudOperation::from_method("PUT");
//! let rule = rules.rule("posts-update").unwrap();
//! assert!(rule.allows("manager", op));
//! assert!(!rule.allows("editor", op));
//! ```

pub mod actions;
pub mod permissions;
pub mod rules;

// Re-export main types for convenience
pub use actions::CrudOperation;
pub use permissions::{Permission, PermissionSet};
pub use rules::{roles_allow, PathRule, RuleTable, ALLOW_ALL_ROLES};

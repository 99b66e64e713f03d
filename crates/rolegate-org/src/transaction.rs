//! Transaction domain models
//!
//! A transaction is a named business operation bound to one or more
//! resource paths. Its name doubles as the codename of the permission that
//! guards it, and its rule table decides which roles may perform each CRUD
//! operation on each path.

use chrono::{DateTime, Utc};
use rolegate_rbac::{CrudOperation, PathRule, RuleTable};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How a resource path is compared with a transaction's path set.
///
/// # Examples
///
/// ```
/// use rolegate_org::PathMatch;
///
/// assert!(PathMatch::Exact.matches("posts-update", "posts-update"));
/// assert!(!PathMatch::Exact.matches("posts-update", "posts"));
/// assert!(PathMatch::Prefix.matches("/admin/", "/admin/users/"));
/// assert!(!PathMatch::Prefix.matches("/admin/users/", "/admin/"));
/// assert!(PathMatch::Substring.matches("Blog-Posts-Update", "posts"));
/// ```
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PathMatch {
    /// The requested path must equal one of the transaction's paths
    #[default]
    Exact,

    /// The requested path must start with one of the transaction's paths
    Prefix,

    /// The requested path may appear anywhere inside one of the
    /// transaction's paths, ignoring case
    Substring,
}

impl PathMatch {
    /// Compare one stored path with a requested path.
    pub fn matches(&self, stored: &str, requested: &str) -> bool {
        match self {
            PathMatch::Exact => stored == requested,
            PathMatch::Prefix => requested.starts_with(stored),
            PathMatch::Substring => stored.to_lowercase().contains(&requested.to_lowercase()),
        }
    }

    /// Parse from a configuration value.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "exact" => Some(PathMatch::Exact),
            "prefix" => Some(PathMatch::Prefix),
            "substring" | "contains" => Some(PathMatch::Substring),
            _ => None,
        }
    }
}

/// A named operation covering a set of resource paths.
///
/// # Examples
///
/// ```
/// use rolegate_org::{PathMatch, Transaction};
/// use rolegate_rbac::CrudOperation;
///
/// let tx = Transaction::new("posts").with_paths(["posts-list", "posts-update"]);
/// assert!(tx.covers_path("posts-update", PathMatch::Exact));
///
/// // Newly added paths get an empty rule skeleton
/// assert_eq!(tx.rule_for("posts-update", CrudOperation::Update), Some(&[][..]));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    /// Unique transaction ID
    pub id: Uuid,

    /// Transaction name, also the guarding permission's codename
    pub name: String,

    /// Resource paths covered, in insertion order
    #[serde(default)]
    pub paths: Vec<String>,

    /// Per-path CRUD rules
    #[serde(default)]
    pub rules: RuleTable,

    /// When the transaction was created
    pub created_at: DateTime<Utc>,

    /// When the transaction was last updated
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    /// Creates a new transaction with no paths.
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            name: name.into(),
            paths: Vec::new(),
            rules: RuleTable::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Add paths, synthesizing rule skeletons for them.
    pub fn with_paths<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.add_paths(paths);
        self
    }

    /// Set the rule for a path, adding the path if it is not covered yet.
    pub fn with_rule(mut self, path: impl Into<String>, rule: PathRule) -> Self {
        let path = path.into();
        if !self.paths.contains(&path) {
            self.paths.push(path.clone());
        }
        self.rules.insert(path, rule);
        self
    }

    /// Append paths that are not covered yet.
    ///
    /// Every newly added path receives an empty skeleton rule; existing rule
    /// entries are kept as they are.
    ///
    /// # Returns
    ///
    /// The paths that were actually added.
    pub fn add_paths<I, S>(&mut self, paths: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut added = Vec::new();
        for path in paths {
            let path = path.into();
            if self.paths.contains(&path) {
                continue;
            }
            self.rules.ensure_skeleton(&path);
            self.paths.push(path.clone());
            added.push(path);
        }
        if !added.is_empty() {
            self.updated_at = Utc::now();
        }
        added
    }

    /// Check if any covered path matches `path`.
    pub fn covers_path(&self, path: &str, mode: PathMatch) -> bool {
        self.paths.iter().any(|stored| mode.matches(stored, path))
    }

    /// Allowed role names for an operation at a path.
    ///
    /// `None` means no rule is defined for the path.
    pub fn rule_for(&self, path: &str, operation: CrudOperation) -> Option<&[String]> {
        self.rules.rule_for(path, operation)
    }
}

//! # Rule Tables
//!
//! A transaction's rule table maps each resource path to a per-operation
//! list of role names allowed to perform it. The literal role name `*`
//! allows any role.
//!
//! ```text
//! {
//!   "posts-update": { "create": [], "read": ["*"], "update": ["manager"], "delete": [] },
//!   "posts-list":   { "read": ["*"] }
//! }
//! ```
//!
//! Rule data may arrive from an editing surface in a loose form (a JSON
//! string instead of an object, unknown operation keys, non-string role
//! names). [`RuleTable::from_value`] accepts all of these and never fails.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::actions::CrudOperation;

/// Role name that satisfies any rule.
pub const ALLOW_ALL_ROLES: &str = "*";

/// Allowed role names per operation for one resource path.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct PathRule {
    operations: BTreeMap<CrudOperation, Vec<String>>,
}

impl PathRule {
    /// Create a rule with no operations at all.
    ///
    /// Such a rule counts as undefined: see [`PathRule::is_undefined`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the empty skeleton synthesized for a newly added path.
    ///
    /// Every operation is present and allows nobody.
    ///
    /// # Example
    ///
    /// ```
    /// use rolegate_rbac::actions::CrudOperation;
    /// use rolegate_rbac::rules::PathRule;
    ///
    /// let rule = PathRule::skeleton();
    /// assert_eq!(rule.allowed_roles(CrudOperation::Update), Some(&[][..]));
    /// assert!(!rule.allows("manager", CrudOperation::Update));
    /// ```
    pub fn skeleton() -> Self {
        let operations = CrudOperation::all()
            .into_iter()
            .map(|op| (op, Vec::new()))
            .collect();
        Self { operations }
    }

    /// Allow a role to perform an operation.
    pub fn allow(mut self, operation: CrudOperation, role_name: impl Into<String>) -> Self {
        let role_name = role_name.into();
        let roles = self.operations.entry(operation).or_default();
        if !roles.contains(&role_name) {
            roles.push(role_name);
        }
        self
    }

    /// Replace the role list of an operation.
    pub fn set(&mut self, operation: CrudOperation, role_names: Vec<String>) {
        self.operations.insert(operation, role_names);
    }

    /// Role names allowed for an operation, if the operation is listed.
    pub fn allowed_roles(&self, operation: CrudOperation) -> Option<&[String]> {
        self.operations.get(&operation).map(Vec::as_slice)
    }

    /// Whether the rule lists no operations at all.
    ///
    /// An undefined rule behaves exactly like a missing rule entry.
    pub fn is_undefined(&self) -> bool {
        self.operations.is_empty()
    }

    /// Check whether `role_name` may perform `operation`.
    ///
    /// An operation that is not listed allows nobody.
    pub fn allows(&self, role_name: &str, operation: CrudOperation) -> bool {
        self.allowed_roles(operation)
            .map(|roles| roles_allow(roles, role_name))
            .unwrap_or(false)
    }

    fn from_value(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        let mut rule = PathRule::new();
        for (key, roles) in object {
            let Some(operation) = CrudOperation::parse(key) else {
                tracing::debug!(operation = %key, "Ignoring unknown operation in rule");
                continue;
            };
            let role_names = match roles {
                Value::Array(items) => items
                    .iter()
                    .filter_map(|item| item.as_str().map(str::to_owned))
                    .collect(),
                Value::String(single) => vec![single.clone()],
                _ => Vec::new(),
            };
            rule.set(operation, role_names);
        }
        Some(rule)
    }
}

/// Check a role name against an allowed-role list, honouring the wildcard.
pub fn roles_allow(allowed: &[String], role_name: &str) -> bool {
    allowed
        .iter()
        .any(|allowed| allowed == role_name || allowed == ALLOW_ALL_ROLES)
}

/// Per-path rules of a transaction.
///
/// # Example
///
/// ```
/// use rolegate_rbac::actions::CrudOperation;
/// use rolegate_rbac::rules::{PathRule, RuleTable};
///
/// let mut table = RuleTable::new();
/// table.insert("posts-update", PathRule::new().allow(CrudOperation::Update, "manager"));
///
/// let allowed = table.rule_for("posts-update", CrudOperation::Update).unwrap();
/// assert_eq!(allowed, ["manager".to_string()]);
/// assert!(table.rule_for("posts-list", CrudOperation::Read).is_none());
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct RuleTable {
    paths: BTreeMap<String, PathRule>,
}

impl RuleTable {
    /// Create an empty rule table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the rule for a path, replacing any existing one.
    pub fn insert(&mut self, path: impl Into<String>, rule: PathRule) {
        self.paths.insert(path.into(), rule);
    }

    /// The defined rule for a path.
    ///
    /// Returns `None` both when the path has no entry and when its entry
    /// lists no operations.
    pub fn rule(&self, path: &str) -> Option<&PathRule> {
        self.paths.get(path).filter(|rule| !rule.is_undefined())
    }

    /// Allowed role names for an operation at a path.
    ///
    /// `None` means the path has no defined rule. A defined rule that does
    /// not list the operation yields an empty slice.
    pub fn rule_for(&self, path: &str, operation: CrudOperation) -> Option<&[String]> {
        self.rule(path)
            .map(|rule| rule.allowed_roles(operation).unwrap_or(&[]))
    }

    /// Add an empty skeleton for `path` unless it already has an entry.
    ///
    /// Returns `true` if a skeleton was added.
    pub fn ensure_skeleton(&mut self, path: &str) -> bool {
        if self.paths.contains_key(path) {
            return false;
        }
        self.paths.insert(path.to_string(), PathRule::skeleton());
        true
    }

    /// Paths with an entry, sorted.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.paths.keys().map(String::as_str)
    }

    /// Number of path entries.
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// Check if the table has no entries.
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Parse a rule table from loosely-typed JSON.
    ///
    /// - An object is read path by path; path values that are not objects
    ///   are dropped.
    /// - A string is parsed as JSON and then read the same way.
    /// - Anything else, or a string that does not parse, yields an empty
    ///   table.
    ///
    /// # Example
    ///
    /// ```
    /// use rolegate_rbac::rules::RuleTable;
    /// use serde_json::json;
    ///
    /// let table = RuleTable::from_value(&json!("{\"a\": {\"read\": [\"*\"]}}"));
    /// assert_eq!(table.len(), 1);
    ///
    /// let broken = RuleTable::from_value(&json!("not json"));
    /// assert!(broken.is_empty());
    /// ```
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Object(object) => {
                let mut table = RuleTable::new();
                for (path, rule) in object {
                    match PathRule::from_value(rule) {
                        Some(rule) => table.insert(path.clone(), rule),
                        None => {
                            tracing::warn!(path = %path, "Dropping malformed path rule");
                        }
                    }
                }
                table
            }
            Value::String(raw) => match serde_json::from_str::<Value>(raw) {
                Ok(parsed @ Value::Object(_)) => Self::from_value(&parsed),
                Ok(_) | Err(_) => {
                    tracing::warn!("Rule table string is not a JSON object, using an empty table");
                    RuleTable::new()
                }
            },
            Value::Null => RuleTable::new(),
            _ => {
                tracing::warn!("Rule table is not an object, using an empty table");
                RuleTable::new()
            }
        }
    }

    /// Serialize the table into JSON.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

//! Authorization settings
//!
//! One immutable settings value is built at process start and handed to the
//! resolver, the provisioner and the request guards. Nothing reads global
//! state at decision time.

use serde::{Deserialize, Serialize};

use crate::transaction::PathMatch;

/// Default message when the subject is within the required role's tree but
/// the rules do not allow the operation.
pub const DEFAULT_ROLE_DENIED_MESSAGE: &str =
    "You belong to the required role, but are not permitted to commit this transaction.";

/// Default message when the subject is outside the required role's tree.
pub const DEFAULT_FORBIDDEN_MESSAGE: &str = "You do not have permission to access this resource.";

/// Default location to redirect denied requests to.
pub const DEFAULT_PERMISSION_DENIED_URL: &str = "/permission-denied/";

/// Default admin index path.
pub const DEFAULT_ADMIN_INDEX_PATH: &str = "/admin/";

/// Default permission guarding the admin index.
pub const DEFAULT_ADMIN_PERMISSION: &str = "admin";

/// Settings shared by every authorization component.
///
/// # Examples
///
/// ```
/// use rolegate_org::{AuthzSettings, PathMatch};
///
/// let settings = AuthzSettings::default();
/// assert!(!settings.grant_nonexistent_path_access);
/// assert_eq!(settings.path_match, PathMatch::Exact);
/// assert!(settings.module_configuration.is_none());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthzSettings {
    /// Verdict for paths that no transaction covers
    #[serde(default)]
    pub grant_nonexistent_path_access: bool,

    /// Denial message when the role matches but the rules deny
    #[serde(default = "default_role_denied_message")]
    pub role_denied_message: String,

    /// Denial message when no held role is within the required tree
    #[serde(default = "default_forbidden_message")]
    pub forbidden_message: String,

    /// Where denied requests are redirected to
    #[serde(default = "default_permission_denied_url")]
    pub permission_denied_url: String,

    /// Name of the module configuration collaborator, if any
    #[serde(default)]
    pub module_configuration: Option<String>,

    /// How requested paths are compared with transaction paths
    #[serde(default)]
    pub path_match: PathMatch,

    /// Path of the admin index page
    #[serde(default = "default_admin_index_path")]
    pub admin_index_path: String,

    /// Permission codename guarding the admin index page
    #[serde(default = "default_admin_permission")]
    pub admin_permission: String,
}

fn default_role_denied_message() -> String {
    DEFAULT_ROLE_DENIED_MESSAGE.to_string()
}

fn default_forbidden_message() -> String {
    DEFAULT_FORBIDDEN_MESSAGE.to_string()
}

fn default_permission_denied_url() -> String {
    DEFAULT_PERMISSION_DENIED_URL.to_string()
}

fn default_admin_index_path() -> String {
    DEFAULT_ADMIN_INDEX_PATH.to_string()
}

fn default_admin_permission() -> String {
    DEFAULT_ADMIN_PERMISSION.to_string()
}

impl Default for AuthzSettings {
    fn default() -> Self {
        Self {
            grant_nonexistent_path_access: false,
            role_denied_message: default_role_denied_message(),
            forbidden_message: default_forbidden_message(),
            permission_denied_url: default_permission_denied_url(),
            module_configuration: None,
            path_match: PathMatch::default(),
            admin_index_path: default_admin_index_path(),
            admin_permission: default_admin_permission(),
        }
    }
}

impl AuthzSettings {
    /// Load settings from environment variables.
    ///
    /// Environment variables:
    /// - `RBAC_GRANT_NONEXISTENT_PATH_ACCESS`: grant unmapped paths (default: false)
    /// - `RBAC_ROLE_DENIED_MESSAGE`: role-mismatch denial message
    /// - `RBAC_FORBIDDEN_MESSAGE`: generic denial message
    /// - `RBAC_PERMISSION_DENIED_URL`: redirect target (default: /permission-denied/)
    /// - `RBAC_MODULE_CONFIGURATION`: module configuration collaborator name
    /// - `RBAC_PATH_MATCH`: `exact`, `prefix` or `substring` (default: exact)
    /// - `RBAC_ADMIN_INDEX_PATH`: admin index path (default: /admin/)
    /// - `RBAC_ADMIN_PERMISSION`: admin permission codename (default: admin)
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            grant_nonexistent_path_access: std::env::var("RBAC_GRANT_NONEXISTENT_PATH_ACCESS")
                .map(|s| parse_flag(&s))
                .unwrap_or(default.grant_nonexistent_path_access),
            role_denied_message: std::env::var("RBAC_ROLE_DENIED_MESSAGE")
                .unwrap_or(default.role_denied_message),
            forbidden_message: std::env::var("RBAC_FORBIDDEN_MESSAGE")
                .unwrap_or(default.forbidden_message),
            permission_denied_url: std::env::var("RBAC_PERMISSION_DENIED_URL")
                .unwrap_or(default.permission_denied_url),
            module_configuration: std::env::var("RBAC_MODULE_CONFIGURATION")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            path_match: std::env::var("RBAC_PATH_MATCH")
                .ok()
                .and_then(|s| {
                    let parsed = PathMatch::parse(&s);
                    if parsed.is_none() {
                        tracing::warn!(value = %s, "Unknown RBAC_PATH_MATCH, using default");
                    }
                    parsed
                })
                .unwrap_or(default.path_match),
            admin_index_path: std::env::var("RBAC_ADMIN_INDEX_PATH")
                .unwrap_or(default.admin_index_path),
            admin_permission: std::env::var("RBAC_ADMIN_PERMISSION")
                .unwrap_or(default.admin_permission),
        }
    }

    /// Set the verdict for paths that no transaction covers.
    pub fn with_nonexistent_path_access(mut self, grant: bool) -> Self {
        self.grant_nonexistent_path_access = grant;
        self
    }

    /// Set the module configuration collaborator name.
    pub fn with_module_configuration(mut self, name: impl Into<String>) -> Self {
        self.module_configuration = Some(name.into());
        self
    }

    /// Set the path comparison mode.
    pub fn with_path_match(mut self, mode: PathMatch) -> Self {
        self.path_match = mode;
        self
    }

    /// Pick the denial message for an aggregate verdict.
    ///
    /// Returns `None` when access is granted.
    pub fn denial_reason(&self, granted: bool, in_tree: bool) -> Option<&str> {
        if granted {
            None
        } else if in_tree {
            Some(self.role_denied_message.as_str())
        } else {
            Some(self.forbidden_message.as_str())
        }
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = AuthzSettings::default();
        assert!(!settings.grant_nonexistent_path_access);
        assert_eq!(settings.permission_denied_url, "/permission-denied/");
        assert_eq!(settings.admin_index_path, "/admin/");
        assert_eq!(settings.admin_permission, "admin");
    }

    #[test]
    fn test_denial_reason() {
        let settings = AuthzSettings::default();
        assert_eq!(settings.denial_reason(true, true), None);
        assert_eq!(settings.denial_reason(true, false), None);
        assert_eq!(
            settings.denial_reason(false, true),
            Some(DEFAULT_ROLE_DENIED_MESSAGE)
        );
        assert_eq!(
            settings.denial_reason(false, false),
            Some(DEFAULT_FORBIDDEN_MESSAGE)
        );
    }

    #[test]
    fn test_deserialize_partial() {
        let settings: AuthzSettings = serde_json::from_str(
            r#"{"grant_nonexistent_path_access": true, "path_match": "substring"}"#,
        )
        .unwrap();
        assert!(settings.grant_nonexistent_path_access);
        assert_eq!(settings.path_match, PathMatch::Substring);
        assert_eq!(settings.forbidden_message, DEFAULT_FORBIDDEN_MESSAGE);
    }

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag("true"));
        assert!(parse_flag(" 1 "));
        assert!(parse_flag("YES"));
        assert!(!parse_flag("false"));
        assert!(!parse_flag("0"));
    }

    #[test]
    fn test_builders() {
        let settings = AuthzSettings::default()
            .with_nonexistent_path_access(true)
            .with_module_configuration("modules")
            .with_path_match(PathMatch::Prefix);
        assert!(settings.grant_nonexistent_path_access);
        assert_eq!(settings.module_configuration.as_deref(), Some("modules"));
        assert_eq!(settings.path_match, PathMatch::Prefix);
    }
}

//! Role provisioning
//!
//! Creating a role also prepares everything it needs to be usable:
//!
//! 1. a backing group identity named after the role;
//! 2. on first creation, the parent's group permissions copied onto it;
//! 3. when a module configuration collaborator is available, the modules
//!    enabled for the role and its parent, unioned with the parent's granted
//!    membership permissions;
//! 4. for each of those modules a permission, a transaction and a membership.
//!
//! A missing or failing collaborator only skips steps 3 and 4.

use async_trait::async_trait;
use rolegate_org::{AuthzSettings, Role, RoleMembership};
use rolegate_rbac::{Permission, PermissionSet};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use thiserror::Error;

use crate::error::AuthzResult;
use crate::store::Store;

/// Module configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ModuleConfigError {
    #[error("Module configuration not found: {0}")]
    NotFound(String),

    #[error("Module configuration unavailable: {0}")]
    Unavailable(String),
}

/// Source of the modules enabled for a set of roles.
#[async_trait]
pub trait ModuleConfiguration: Send + Sync {
    /// Names of the modules enabled for any of `role_names`.
    async fn query_enabled_modules(
        &self,
        role_names: &[String],
    ) -> Result<Vec<String>, ModuleConfigError>;
}

/// Named module configuration collaborators.
///
/// The settings only carry a locator string; the host registers the
/// collaborator under that name at startup.
#[derive(Clone, Default)]
pub struct ModuleRegistry {
    entries: HashMap<String, Arc<dyn ModuleConfiguration>>,
}

impl std::fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&String> = self.entries.keys().collect();
        names.sort();
        f.debug_struct("ModuleRegistry").field("entries", &names).finish()
    }
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a collaborator, replacing any previous one with that name.
    pub fn register(&mut self, name: impl Into<String>, config: Arc<dyn ModuleConfiguration>) {
        self.entries.insert(name.into(), config);
    }

    /// Look up a collaborator.
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn ModuleConfiguration>, ModuleConfigError> {
        self.entries
            .get(name)
            .cloned()
            .ok_or_else(|| ModuleConfigError::NotFound(name.to_string()))
    }
}

/// In-process module configuration: role name to module switches.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StaticModuleConfiguration {
    modules: HashMap<String, HashMap<String, bool>>,
}

impl StaticModuleConfiguration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable a module for a role.
    pub fn set(mut self, role: impl Into<String>, module: impl Into<String>, enabled: bool) -> Self {
        self.modules
            .entry(role.into())
            .or_default()
            .insert(module.into(), enabled);
        self
    }

    /// Enable a module for a role.
    pub fn enable(self, role: impl Into<String>, module: impl Into<String>) -> Self {
        self.set(role, module, true)
    }
}

#[async_trait]
impl ModuleConfiguration for StaticModuleConfiguration {
    async fn query_enabled_modules(
        &self,
        role_names: &[String],
    ) -> Result<Vec<String>, ModuleConfigError> {
        let mut enabled = BTreeSet::new();
        for role in role_names {
            if let Some(switches) = self.modules.get(role) {
                enabled.extend(
                    switches
                        .iter()
                        .filter(|(_, on)| **on)
                        .map(|(module, _)| module.clone()),
                );
            }
        }
        Ok(enabled.into_iter().collect())
    }
}

/// What provisioning did for a new role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionedRole {
    /// The stored role
    pub role: Role,
    /// Permissions copied from the parent's group
    pub inherited: PermissionSet,
    /// Modules the role was made a member of, in provisioning order
    pub modules: Vec<String>,
}

/// Creates and re-parents roles.
#[derive(Clone)]
pub struct RoleProvisioner {
    store: Arc<dyn Store>,
    modules: Option<Arc<dyn ModuleConfiguration>>,
}

impl std::fmt::Debug for RoleProvisioner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoleProvisioner")
            .field("modules", &self.modules.is_some())
            .finish_non_exhaustive()
    }
}

impl RoleProvisioner {
    /// Create a provisioner, resolving the configured module collaborator.
    ///
    /// An unresolvable collaborator is logged and ignored.
    pub fn new(store: Arc<dyn Store>, settings: &AuthzSettings, registry: &ModuleRegistry) -> Self {
        let modules = settings
            .module_configuration
            .as_deref()
            .and_then(|name| match registry.resolve(name) {
                Ok(config) => Some(config),
                Err(e) => {
                    tracing::warn!(error = %e, "Module configuration unavailable, provisioning without modules");
                    None
                }
            });
        Self { store, modules }
    }

    /// Create a provisioner that never queries modules.
    pub fn without_modules(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            modules: None,
        }
    }

    /// Use a collaborator directly.
    pub fn with_module_configuration(mut self, config: Arc<dyn ModuleConfiguration>) -> Self {
        self.modules = Some(config);
        self
    }

    /// Create a role and provision it.
    ///
    /// # Errors
    ///
    /// Fails on integrity violations (duplicate name, unknown parent) and
    /// on store failures. Module configuration failures are not errors.
    ///
    /// If a store write fails after the role was inserted, the role, its
    /// group and its memberships are removed again so the name can be
    /// retried. Permissions and transactions created on the way are shared
    /// records and stay.
    pub async fn create_role(&self, name: &str, parent: Option<&str>) -> AuthzResult<ProvisionedRole> {
        let mut role = Role::new(name);
        if let Some(parent) = parent {
            role = role.with_parent(parent);
        }
        if let Err(e) = self.store.insert_role(role.clone()).await {
            tracing::warn!(role = %name, error = %e, "Role creation rejected");
            return Err(e.into());
        }

        let (inherited, modules) = match self.provision(name, parent).await {
            Ok(provisioned) => provisioned,
            Err(e) => {
                tracing::warn!(role = %name, error = %e, "Role provisioning failed, rolling back");
                if let Err(rollback) = self.store.remove_role(name).await {
                    tracing::error!(role = %name, error = %rollback, "Role rollback failed");
                }
                return Err(e);
            }
        };

        tracing::info!(
            role = %name,
            parent = ?parent,
            inherited = inherited.len(),
            modules = modules.len(),
            "Role provisioned"
        );
        Ok(ProvisionedRole {
            role,
            inherited,
            modules,
        })
    }

    async fn provision(
        &self,
        name: &str,
        parent: Option<&str>,
    ) -> AuthzResult<(PermissionSet, Vec<String>)> {
        self.store.ensure_group(name).await?;

        let mut inherited = PermissionSet::new();
        if let Some(parent) = parent {
            inherited = self.store.group_permissions(parent).await?;
            if !inherited.is_empty() {
                let mut own = self.store.group_permissions(name).await?;
                own.merge(&inherited);
                self.store.set_group_permissions(name, own).await?;
            }
        }

        let modules = self
            .enabled_modules(name, parent)
            .await?
            .unwrap_or_default();
        for module in &modules {
            self.attach_module(name, module).await?;
        }
        Ok((inherited, modules))
    }

    /// Move a role under a new parent, or make it a root.
    ///
    /// Only the backing group is ensured; permissions and modules are not
    /// inherited again.
    pub async fn update_role_parent(&self, name: &str, parent: Option<&str>) -> AuthzResult<Role> {
        let role = match self.store.set_role_parent(name, parent).await {
            Ok(role) => role,
            Err(e) => {
                tracing::warn!(role = %name, parent = ?parent, error = %e, "Role update rejected");
                return Err(e.into());
            }
        };
        self.store.ensure_group(name).await?;
        tracing::debug!(role = %name, parent = ?parent, "Role parent updated");
        Ok(role)
    }

    async fn enabled_modules(&self, name: &str, parent: Option<&str>) -> AuthzResult<Option<Vec<String>>> {
        let Some(config) = &self.modules else {
            return Ok(None);
        };

        let mut query = vec![name.to_string()];
        if let Some(parent) = parent {
            query.push(parent.to_string());
        }
        let enabled = match config.query_enabled_modules(&query).await {
            Ok(enabled) => enabled,
            Err(e) => {
                tracing::warn!(role = %name, error = %e, "Module configuration query failed");
                return Ok(None);
            }
        };

        let mut modules = Vec::new();
        let mut seen = BTreeSet::new();
        for module in enabled {
            if seen.insert(module.clone()) {
                modules.push(module);
            }
        }
        if let Some(parent) = parent {
            for membership in self.store.memberships_of(parent).await? {
                if seen.insert(membership.permission.clone()) {
                    modules.push(membership.permission);
                }
            }
        }
        Ok(Some(modules))
    }

    async fn attach_module(&self, role: &str, module: &str) -> AuthzResult<()> {
        let (permission, _) = self
            .store
            .get_or_create_permission(Permission::for_module(module))
            .await?;
        let (transaction, _) = self.store.get_or_create_transaction(module).await?;
        self.store
            .create_membership(RoleMembership::new(role, permission.codename, transaction.name))
            .await?;
        tracing::debug!(role = %role, module = %module, "Module membership created");
        Ok(())
    }
}

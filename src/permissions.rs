use std::collections::HashSet;

use anyhow::anyhow;
use serde::{Deserialize, Serialize};

use crate::error::{LibError, Result};

/// Global (non resource-scoped) console permissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Permission {
    /// Can manage users and roles.
    ManageSecurity,
    /// Can import and uninventory resources, manage groups.
    ManageInventory,
    /// Can change system settings, plugins and the server topology.
    ManageSettings,
    ManageBundle,
    ManageRepositories,
    /// Can browse other users' accounts without editing them.
    ViewUsers,
}

pub const ALL_GLOBAL_PERMISSIONS: &[Permission] = &[
    Permission::ManageSecurity,
    Permission::ManageInventory,
    Permission::ManageSettings,
    Permission::ManageBundle,
    Permission::ManageRepositories,
    Permission::ViewUsers,
];

impl Permission {
    pub const fn as_str(self) -> &'static str {
        match self {
            Permission::ManageSecurity => "MANAGE_SECURITY",
            Permission::ManageInventory => "MANAGE_INVENTORY",
            Permission::ManageSettings => "MANAGE_SETTINGS",
            Permission::ManageBundle => "MANAGE_BUNDLE",
            Permission::ManageRepositories => "MANAGE_REPOSITORIES",
            Permission::ViewUsers => "VIEW_USERS",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        ALL_GLOBAL_PERMISSIONS
            .iter()
            .copied()
            .find(|permission| permission.as_str() == name)
    }
}

/// Rejects with `Forbidden` unless `required` was granted.
pub fn ensure_permission(granted: &HashSet<Permission>, required: Permission) -> Result<()> {
    if granted.contains(&required) {
        return Ok(());
    }

    Err(LibError::forbidden(
        "You do not have permission to view this page",
        anyhow!("missing global permission {}", required.as_str()),
    ))
}

/// Like [`ensure_permission`], satisfied by any one of `accepted`.
pub fn ensure_any_permission(granted: &HashSet<Permission>, accepted: &[Permission]) -> Result<()> {
    if accepted.iter().any(|permission| granted.contains(permission)) {
        return Ok(());
    }

    let names: Vec<&str> = accepted.iter().map(|permission| permission.as_str()).collect();
    Err(LibError::forbidden(
        "You do not have permission to view this page",
        anyhow!("missing one of global permissions [{}]", names.join(", ")),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn names_round_trip() {
        for permission in ALL_GLOBAL_PERMISSIONS {
            assert_eq!(Permission::from_name(permission.as_str()), Some(*permission));
        }
        assert_eq!(Permission::from_name("MANAGE_EVERYTHING"), None);
    }

    #[test]
    fn missing_permission_is_forbidden() {
        let granted = HashSet::from([Permission::ViewUsers]);
        assert!(ensure_permission(&granted, Permission::ViewUsers).is_ok());

        let err = ensure_permission(&granted, Permission::ManageSettings).expect_err("forbidden");
        assert_eq!(err.kind, ErrorKind::Forbidden);
    }

    #[test]
    fn any_of_accepts_a_single_grant() {
        let granted = HashSet::from([Permission::ViewUsers]);
        let accepted = [Permission::ManageSecurity, Permission::ViewUsers];
        assert!(ensure_any_permission(&granted, &accepted).is_ok());
        assert!(ensure_any_permission(&HashSet::new(), &accepted).is_err());
    }
}

//! Permission tags and the fixed role → permission table.

use std::{collections::BTreeSet, fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{identity::Identity, role::Role};

pub type PermissionSet = BTreeSet<Permission>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown permission `{0}`")]
pub struct UnknownPermission(pub String);

/// Modules guarded by per-action grants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Module {
    Volunteers,
    Donations,
    Contacts,
}

impl Module {
    pub const ALL: [Module; 3] = [Module::Volunteers, Module::Donations, Module::Contacts];

    pub fn as_str(self) -> &'static str {
        match self {
            Module::Volunteers => "volunteers",
            Module::Donations => "donations",
            Module::Contacts => "contacts",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ModuleAction {
    Read,
    Create,
    Update,
    Delete,
}

impl ModuleAction {
    pub const ALL: [ModuleAction; 4] = [
        ModuleAction::Read,
        ModuleAction::Create,
        ModuleAction::Update,
        ModuleAction::Delete,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ModuleAction::Read => "read",
            ModuleAction::Create => "create",
            ModuleAction::Update => "update",
            ModuleAction::Delete => "delete",
        }
    }
}

/// A grantable permission. Plain tags serialize as `manage-users`, module
/// grants as `volunteers:read`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Permission {
    ManageUsers,
    ViewReports,
    ViewDashboard,
    ManageEvents,
    ManageJobs,
    ManageBlogs,
    ManageDonations,
    ManageContacts,
    Module(Module, ModuleAction),
}

const PLAIN: [(Permission, &str); 8] = [
    (Permission::ManageUsers, "manage-users"),
    (Permission::ViewReports, "view-reports"),
    (Permission::ViewDashboard, "view-dashboard"),
    (Permission::ManageEvents, "manage-events"),
    (Permission::ManageJobs, "manage-jobs"),
    (Permission::ManageBlogs, "manage-blogs"),
    (Permission::ManageDonations, "manage-donations"),
    (Permission::ManageContacts, "manage-contacts"),
];

impl Permission {
    pub const fn module(module: Module, action: ModuleAction) -> Self {
        Permission::Module(module, action)
    }

    /// Every grantable permission.
    pub fn all() -> PermissionSet {
        let mut set: PermissionSet = PLAIN.iter().map(|(permission, _)| *permission).collect();
        set.extend(module_grants(&Module::ALL, &ModuleAction::ALL));
        set
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Permission::Module(module, action) => {
                write!(f, "{}:{}", module.as_str(), action.as_str())
            }
            plain => {
                let tag = PLAIN
                    .iter()
                    .find(|(permission, _)| permission == plain)
                    .map(|(_, tag)| *tag)
                    .unwrap_or_default();
                f.write_str(tag)
            }
        }
    }
}

impl FromStr for Permission {
    type Err = UnknownPermission;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let unknown = || UnknownPermission(value.to_string());
        if let Some((module, action)) = value.split_once(':') {
            let module = Module::ALL
                .into_iter()
                .find(|m| m.as_str() == module)
                .ok_or_else(unknown)?;
            let action = ModuleAction::ALL
                .into_iter()
                .find(|a| a.as_str() == action)
                .ok_or_else(unknown)?;
            return Ok(Permission::Module(module, action));
        }
        PLAIN
            .iter()
            .find(|(_, tag)| *tag == value)
            .map(|(permission, _)| *permission)
            .ok_or_else(unknown)
    }
}

impl TryFrom<String> for Permission {
    type Error = UnknownPermission;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Permission> for String {
    fn from(value: Permission) -> Self {
        value.to_string()
    }
}

fn module_grants<'a>(
    modules: &'a [Module],
    actions: &'a [ModuleAction],
) -> impl Iterator<Item = Permission> + 'a {
    modules.iter().flat_map(move |module| {
        actions
            .iter()
            .map(move |action| Permission::Module(*module, *action))
    })
}

/// Permissions granted to a freshly created account of `role`.
///
/// Called once by whoever creates the account; the result is stored with the
/// account and never recomputed, so later edits to this table do not reach
/// existing accounts.
pub fn compute_permissions(role: Role) -> PermissionSet {
    use ModuleAction::{Create, Read, Update};

    match role {
        // country-admin gets every grant, but only through its stored set.
        Role::SuperAdmin | Role::CountryAdmin => Permission::all(),
        Role::StateAdmin => {
            let mut set = PermissionSet::from([
                Permission::ManageUsers,
                Permission::ViewReports,
                Permission::ViewDashboard,
                Permission::ManageEvents,
                Permission::ManageJobs,
            ]);
            set.extend(module_grants(&[Module::Volunteers], &ModuleAction::ALL));
            set.insert(Permission::module(Module::Donations, Read));
            set.insert(Permission::module(Module::Contacts, Read));
            set
        }
        Role::RegionalAdmin => {
            let mut set = PermissionSet::from([
                Permission::ManageUsers,
                Permission::ViewReports,
                Permission::ManageEvents,
            ]);
            set.extend(module_grants(&[Module::Volunteers], &[Read, Create, Update]));
            set
        }
        Role::DistrictAdmin => {
            let mut set = PermissionSet::from([Permission::ViewReports, Permission::ManageEvents]);
            set.extend(module_grants(&[Module::Volunteers], &[Read, Create, Update]));
            set
        }
        Role::BlockAdmin => {
            let mut set = PermissionSet::from([Permission::ViewReports]);
            set.extend(module_grants(&[Module::Volunteers], &[Read, Create]));
            set
        }
        Role::AreaAdmin => module_grants(&[Module::Volunteers], &[Read, Create]).collect(),
        Role::User => PermissionSet::new(),
    }
}

/// Membership in the stored set; `super-admin` holds everything.
pub fn has_permission(identity: &Identity, required: Permission) -> bool {
    identity.role.is_universal() || identity.permissions.contains(&required)
}

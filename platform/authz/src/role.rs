use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown role `{0}`")]
pub struct UnknownRole(pub String);

/// Account role. Exactly one per identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    SuperAdmin,
    CountryAdmin,
    StateAdmin,
    RegionalAdmin,
    DistrictAdmin,
    BlockAdmin,
    AreaAdmin,
    User,
}

/// Administrative seniority chain, most senior first.
pub const ADMIN_CHAIN: [Role; 7] = [
    Role::SuperAdmin,
    Role::CountryAdmin,
    Role::StateAdmin,
    Role::RegionalAdmin,
    Role::DistrictAdmin,
    Role::BlockAdmin,
    Role::AreaAdmin,
];

impl Role {
    pub const ALL: [Role; 8] = [
        Role::SuperAdmin,
        Role::CountryAdmin,
        Role::StateAdmin,
        Role::RegionalAdmin,
        Role::DistrictAdmin,
        Role::BlockAdmin,
        Role::AreaAdmin,
        Role::User,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::SuperAdmin => "super-admin",
            Role::CountryAdmin => "country-admin",
            Role::StateAdmin => "state-admin",
            Role::RegionalAdmin => "regional-admin",
            Role::DistrictAdmin => "district-admin",
            Role::BlockAdmin => "block-admin",
            Role::AreaAdmin => "area-admin",
            Role::User => "user",
        }
    }

    /// Position in [`ADMIN_CHAIN`]; lower is more senior. `None` for roles
    /// outside the chain.
    pub fn chain_index(self) -> Option<usize> {
        ADMIN_CHAIN.iter().position(|role| *role == self)
    }

    /// The role that bypasses geo and permission checks.
    pub fn is_universal(self) -> bool {
        matches!(self, Role::SuperAdmin)
    }

    pub fn outranks(self, other: Role) -> bool {
        outranks(self, other)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str() == value)
            .ok_or_else(|| UnknownRole(value.to_string()))
    }
}

/// Strict seniority. Roles that cannot be placed on the chain never outrank
/// and are never outranked, except by `super-admin`.
pub fn outranks(a: Role, b: Role) -> bool {
    if a.is_universal() {
        return !b.is_universal();
    }
    match (a.chain_index(), b.chain_index()) {
        (Some(a), Some(b)) => a < b,
        _ => false,
    }
}

/// Like [`outranks`] for a target taken verbatim from a payload.
pub fn outranks_tag(a: Role, target: &str) -> bool {
    match target.parse::<Role>() {
        Ok(b) => outranks(a, b),
        Err(_) => a.is_universal(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn any_role() -> impl Strategy<Value = Role> {
        prop::sample::select(Role::ALL.to_vec())
    }

    fn chain_role() -> impl Strategy<Value = Role> {
        prop::sample::select(ADMIN_CHAIN.to_vec())
    }

    #[test]
    fn tags_round_trip_through_from_str() {
        for role in Role::ALL {
            assert_eq!(role.as_str().parse::<Role>(), Ok(role));
        }
        assert_eq!(
            "admin".parse::<Role>(),
            Err(UnknownRole("admin".to_string()))
        );
    }

    #[test]
    fn serde_uses_kebab_tags() {
        let json = serde_json::to_string(&Role::RegionalAdmin).unwrap();
        assert_eq!(json, "\"regional-admin\"");
        let parsed: Role = serde_json::from_str("\"block-admin\"").unwrap();
        assert_eq!(parsed, Role::BlockAdmin);
    }

    #[test]
    fn user_is_outside_the_chain() {
        assert_eq!(Role::User.chain_index(), None);
        assert!(!Role::AreaAdmin.outranks(Role::User));
        assert!(!Role::User.outranks(Role::AreaAdmin));
        assert!(Role::SuperAdmin.outranks(Role::User));
    }

    #[test]
    fn unrecognised_payload_roles_fail_closed() {
        assert!(!outranks_tag(Role::CountryAdmin, "organizer"));
        assert!(outranks_tag(Role::SuperAdmin, "organizer"));
        assert!(outranks_tag(Role::StateAdmin, "district-admin"));
        assert!(!outranks_tag(Role::StateAdmin, "state-admin"));
    }

    proptest! {
        #[test]
        fn prop_outranks_is_irreflexive(role in any_role()) {
            prop_assert!(!outranks(role, role));
        }

        #[test]
        fn prop_chain_is_totally_ordered(a in chain_role(), b in chain_role()) {
            prop_assume!(a != b);
            prop_assert!(outranks(a, b) ^ outranks(b, a));
        }

        #[test]
        fn prop_super_admin_outranks_everyone_else(role in any_role()) {
            prop_assume!(role != Role::SuperAdmin);
            prop_assert!(outranks(Role::SuperAdmin, role));
            prop_assert!(!outranks(role, Role::SuperAdmin));
        }

        #[test]
        fn prop_unknown_tags_are_never_outranked_by_chain_admins(
            role in chain_role(),
            tag in "[a-z]{3,12}",
        ) {
            prop_assume!(tag.parse::<Role>().is_err());
            prop_assert_eq!(outranks_tag(role, &tag), role == Role::SuperAdmin);
        }
    }
}

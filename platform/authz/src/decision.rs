//! Composes the individual evaluators into one verdict per operation.

use thiserror::Error;
use tracing::{debug, instrument};

use crate::{
    geo::{GeoLevel, has_geo_access},
    identity::Identity,
    permission::{Permission, has_permission},
    role::{Role, outranks_tag},
};

/// Requirement declared once per protected operation.
///
/// Requirements are `const`-constructible so routes can declare them next to
/// their registration:
///
/// ```
/// use platform_authz::{AccessRequirement, GeoLevel, Permission, Role};
///
/// const COUNTRY_DASHBOARD: AccessRequirement = AccessRequirement::new()
///     .roles(&[Role::CountryAdmin])
///     .min_geo(GeoLevel::Country)
///     .permission(Permission::ViewDashboard);
/// # let _ = COUNTRY_DASHBOARD;
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccessRequirement {
    /// Empty means any role.
    pub allowed_roles: &'static [Role],
    pub min_geo_scope: Option<GeoLevel>,
    pub required_permission: Option<Permission>,
    /// Compare against the `role` carried by the mutation payload.
    pub must_outrank_target_role: bool,
}

impl AccessRequirement {
    /// Any resolved identity passes.
    pub const AUTHENTICATED: AccessRequirement = AccessRequirement::new();

    pub const fn new() -> Self {
        Self {
            allowed_roles: &[],
            min_geo_scope: None,
            required_permission: None,
            must_outrank_target_role: false,
        }
    }

    pub const fn roles(mut self, roles: &'static [Role]) -> Self {
        self.allowed_roles = roles;
        self
    }

    pub const fn min_geo(mut self, level: GeoLevel) -> Self {
        self.min_geo_scope = Some(level);
        self
    }

    pub const fn permission(mut self, permission: Permission) -> Self {
        self.required_permission = Some(permission);
        self
    }

    pub const fn outrank_target(mut self) -> Self {
        self.must_outrank_target_role = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DenyReason {
    #[error("insufficient privileges: role {actual} not in {allowed:?}")]
    RoleNotAllowed { allowed: Vec<Role>, actual: Role },
    #[error("insufficient geographic access: {required} required")]
    InsufficientGeoScope {
        required: GeoLevel,
        actual: Option<GeoLevel>,
    },
    #[error("permission denied: {required} required")]
    PermissionDenied { required: Permission },
    #[error("cannot modify users with equal or higher role ({actual} vs {target})")]
    CannotModifyEqualOrHigherRole { actual: Role, target: String },
    #[error("target role not specified")]
    TargetRoleUnspecified,
    #[error("only super admins can create {requested} accounts")]
    AdminCreationRestricted { requested: Role },
    #[error("not authorized to update this profile")]
    NotProfileOwner,
}

impl DenyReason {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            DenyReason::RoleNotAllowed { .. } => "ROLE_NOT_ALLOWED",
            DenyReason::InsufficientGeoScope { .. } => "INSUFFICIENT_GEO_SCOPE",
            DenyReason::PermissionDenied { .. } => "PERMISSION_DENIED",
            DenyReason::CannotModifyEqualOrHigherRole { .. } => {
                "CANNOT_MODIFY_EQUAL_OR_HIGHER_ROLE"
            }
            DenyReason::TargetRoleUnspecified => "TARGET_ROLE_UNSPECIFIED",
            DenyReason::AdminCreationRestricted { .. } => "ADMIN_CREATION_RESTRICTED",
            DenyReason::NotProfileOwner => "NOT_PROFILE_OWNER",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }

    pub fn into_result(self) -> Result<(), DenyReason> {
        match self {
            Decision::Allow => Ok(()),
            Decision::Deny(reason) => Err(reason),
        }
    }
}

impl From<Result<(), DenyReason>> for Decision {
    fn from(value: Result<(), DenyReason>) -> Self {
        match value {
            Ok(()) => Decision::Allow,
            Err(reason) => Decision::Deny(reason),
        }
    }
}

/// Evaluates `requirement` for `identity`, stopping at the first failing
/// dimension: allowed roles, geo scope, permission, then target seniority.
///
/// `payload_role` is the `role` field of the call's mutation payload and is
/// only read when the requirement asks for the seniority check.
#[instrument(
    level = "debug",
    skip_all,
    fields(identity_id = %identity.id, role = %identity.role)
)]
pub fn authorize(
    identity: &Identity,
    requirement: &AccessRequirement,
    payload_role: Option<&str>,
) -> Decision {
    let decision = Decision::from(evaluate(identity, requirement, payload_role));
    if let Decision::Deny(reason) = &decision {
        debug!(code = reason.code(), %reason, "access denied");
    }
    decision
}

fn evaluate(
    identity: &Identity,
    requirement: &AccessRequirement,
    payload_role: Option<&str>,
) -> Result<(), DenyReason> {
    if !requirement.allowed_roles.is_empty() && !requirement.allowed_roles.contains(&identity.role)
    {
        return Err(DenyReason::RoleNotAllowed {
            allowed: requirement.allowed_roles.to_vec(),
            actual: identity.role,
        });
    }

    if let Some(required) = requirement.min_geo_scope {
        if !has_geo_access(identity, required) {
            return Err(DenyReason::InsufficientGeoScope {
                required,
                actual: identity.geo.depth(),
            });
        }
    }

    if let Some(required) = requirement.required_permission {
        if !has_permission(identity, required) {
            return Err(DenyReason::PermissionDenied { required });
        }
    }

    if requirement.must_outrank_target_role {
        let target = payload_role
            .map(str::trim)
            .filter(|role| !role.is_empty())
            .ok_or(DenyReason::TargetRoleUnspecified)?;
        if !identity.role.is_universal() && !outranks_tag(identity.role, target) {
            return Err(DenyReason::CannotModifyEqualOrHigherRole {
                actual: identity.role,
                target: target.to_string(),
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        geo::GeoScope,
        permission::{Module, ModuleAction, PermissionSet},
    };
    use uuid::Uuid;

    fn identity(role: Role, geo: GeoScope) -> Identity {
        Identity::new(Uuid::new_v4(), role).with_geo(geo)
    }

    const ADMIN_DASHBOARD: AccessRequirement =
        AccessRequirement::new().roles(&[Role::SuperAdmin, Role::CountryAdmin]);
    const COUNTRY_DASHBOARD: AccessRequirement = AccessRequirement::new()
        .roles(&[Role::CountryAdmin])
        .min_geo(GeoLevel::Country)
        .permission(Permission::ViewDashboard);
    const CREATE_ADMIN: AccessRequirement = AccessRequirement::new().outrank_target();

    #[test]
    fn empty_requirement_allows_any_identity() {
        let nobody = identity(Role::User, GeoScope::default());
        assert_eq!(
            authorize(&nobody, &AccessRequirement::AUTHENTICATED, None),
            Decision::Allow
        );
    }

    #[test]
    fn role_check_reports_allowed_and_actual() {
        let state = identity(Role::StateAdmin, GeoScope::country("IN"));
        assert_eq!(
            authorize(&state, &ADMIN_DASHBOARD, None),
            Decision::Deny(DenyReason::RoleNotAllowed {
                allowed: vec![Role::SuperAdmin, Role::CountryAdmin],
                actual: Role::StateAdmin,
            })
        );
    }

    #[test]
    fn district_admin_with_country_scope_passes_state_requirement() {
        let district = identity(
            Role::DistrictAdmin,
            GeoScope::country("IN")
                .with(GeoLevel::State, "KA")
                .with(GeoLevel::District, "Mysuru"),
        );
        let requirement = AccessRequirement::new().min_geo(GeoLevel::State);
        assert!(authorize(&district, &requirement, None).is_allowed());
    }

    #[test]
    fn area_admin_with_country_and_area_passes_district_requirement() {
        let area = identity(
            Role::AreaAdmin,
            GeoScope::country("IN").with(GeoLevel::Area, "Zone9"),
        );
        let requirement = AccessRequirement::new().min_geo(GeoLevel::District);
        assert!(authorize(&area, &requirement, None).is_allowed());
    }

    #[test]
    fn geo_failure_reports_actual_depth() {
        let regional = identity(
            Role::RegionalAdmin,
            GeoScope::default().with(GeoLevel::Region, "South"),
        );
        let requirement = AccessRequirement::new().min_geo(GeoLevel::Country);
        assert_eq!(
            authorize(&regional, &requirement, None),
            Decision::Deny(DenyReason::InsufficientGeoScope {
                required: GeoLevel::Country,
                actual: Some(GeoLevel::Region),
            })
        );
    }

    #[test]
    fn checks_short_circuit_in_order() {
        // Fails role, geo and permission; role is reported.
        let stranger = identity(Role::User, GeoScope::default());
        let reason = authorize(&stranger, &COUNTRY_DASHBOARD, None)
            .into_result()
            .unwrap_err();
        assert_eq!(reason.code(), "ROLE_NOT_ALLOWED");

        // Right role, no scope, no permission; geo is reported.
        let unscoped = identity(Role::CountryAdmin, GeoScope::default())
            .with_permissions(PermissionSet::new());
        let reason = authorize(&unscoped, &COUNTRY_DASHBOARD, None)
            .into_result()
            .unwrap_err();
        assert_eq!(reason.code(), "INSUFFICIENT_GEO_SCOPE");

        // Right role and scope, permission revoked.
        let revoked = identity(Role::CountryAdmin, GeoScope::country("IN"))
            .with_permissions(PermissionSet::new());
        assert_eq!(
            authorize(&revoked, &COUNTRY_DASHBOARD, None),
            Decision::Deny(DenyReason::PermissionDenied {
                required: Permission::ViewDashboard
            })
        );

        let granted = identity(Role::CountryAdmin, GeoScope::country("IN"));
        assert!(authorize(&granted, &COUNTRY_DASHBOARD, None).is_allowed());
    }

    #[test]
    fn module_grants_are_checked_like_plain_tags() {
        let requirement = AccessRequirement::new()
            .permission(Permission::module(Module::Volunteers, ModuleAction::Delete));
        let block = identity(Role::BlockAdmin, GeoScope::country("IN"));
        let state = identity(Role::StateAdmin, GeoScope::country("IN"));
        assert!(!authorize(&block, &requirement, None).is_allowed());
        assert!(authorize(&state, &requirement, None).is_allowed());
    }

    #[test]
    fn target_role_must_be_strictly_junior() {
        let state = identity(Role::StateAdmin, GeoScope::country("IN"));
        assert_eq!(
            authorize(&state, &CREATE_ADMIN, Some("state-admin")),
            Decision::Deny(DenyReason::CannotModifyEqualOrHigherRole {
                actual: Role::StateAdmin,
                target: "state-admin".to_string(),
            })
        );
        assert!(authorize(&state, &CREATE_ADMIN, Some("district-admin")).is_allowed());
        assert!(!authorize(&state, &CREATE_ADMIN, Some("organizer")).is_allowed());
    }

    #[test]
    fn missing_target_role_is_reported_even_for_super_admin() {
        let root = identity(Role::SuperAdmin, GeoScope::default());
        assert_eq!(
            authorize(&root, &CREATE_ADMIN, None),
            Decision::Deny(DenyReason::TargetRoleUnspecified)
        );
        assert_eq!(
            authorize(&root, &CREATE_ADMIN, Some("  ")),
            Decision::Deny(DenyReason::TargetRoleUnspecified)
        );
        assert!(authorize(&root, &CREATE_ADMIN, Some("super-admin")).is_allowed());
    }

    #[test]
    fn super_admin_bypasses_geo_and_permission_but_not_role_list() {
        let root = identity(Role::SuperAdmin, GeoScope::default())
            .with_permissions(PermissionSet::new());
        let requirement = AccessRequirement::new()
            .min_geo(GeoLevel::Country)
            .permission(Permission::ViewReports);
        assert!(authorize(&root, &requirement, None).is_allowed());
        assert_eq!(
            authorize(&root, &COUNTRY_DASHBOARD, None)
                .into_result()
                .unwrap_err()
                .code(),
            "ROLE_NOT_ALLOWED"
        );
    }
}

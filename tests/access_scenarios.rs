use access_tests::AccessWorld;
use chrono::{Duration, Utc};
use platform_authn::{AccountDirectory, ProfileUpdate, ResolveError};
use platform_authz::{
    AccessRequirement, Decision, DenyReason, GeoLevel, GeoScope, Permission, Role, authorize,
};
use sea_orm::{ConnectionTrait, DatabaseBackend, Statement};

const STATE_SCOPED: AccessRequirement = AccessRequirement::new().min_geo(GeoLevel::State);
const DISTRICT_SCOPED: AccessRequirement = AccessRequirement::new().min_geo(GeoLevel::District);
const ADMIN_WRITE: AccessRequirement = AccessRequirement::new()
    .roles(&[
        Role::SuperAdmin,
        Role::CountryAdmin,
        Role::StateAdmin,
        Role::RegionalAdmin,
    ])
    .outrank_target();
const MANAGE_USERS: AccessRequirement =
    AccessRequirement::new().permission(Permission::ManageUsers);

fn mysuru() -> GeoScope {
    GeoScope::country("IN")
        .with(GeoLevel::State, "KA")
        .with(GeoLevel::District, "Mysuru")
}

#[tokio::test]
async fn district_admin_with_country_passes_state_requirement() -> anyhow::Result<()> {
    let world = AccessWorld::sqlite().await?;
    let (_, token) = world.enroll(Role::DistrictAdmin, mysuru(), Utc::now()).await?;

    let identity = world.resolver.resolve(Some(&token)).await?;
    assert_eq!(identity.geo.depth(), Some(GeoLevel::Country));
    assert_eq!(authorize(&identity, &STATE_SCOPED, None), Decision::Allow);
    Ok(())
}

#[tokio::test]
async fn area_admin_with_country_and_area_passes_district_requirement() -> anyhow::Result<()> {
    let world = AccessWorld::sqlite().await?;
    let geo = GeoScope::country("IN").with(GeoLevel::Area, "Zone9");
    let (_, token) = world.enroll(Role::AreaAdmin, geo, Utc::now()).await?;

    let identity = world.resolver.resolve(Some(&token)).await?;
    assert_eq!(authorize(&identity, &DISTRICT_SCOPED, None), Decision::Allow);
    Ok(())
}

#[tokio::test]
async fn state_admin_may_only_modify_lower_roles() -> anyhow::Result<()> {
    let world = AccessWorld::sqlite().await?;
    let geo = GeoScope::country("IN").with(GeoLevel::State, "KA");
    let (_, token) = world.enroll(Role::StateAdmin, geo, Utc::now()).await?;
    let identity = world.resolver.resolve(Some(&token)).await?;

    assert_eq!(
        authorize(&identity, &ADMIN_WRITE, Some("state-admin")),
        Decision::Deny(DenyReason::CannotModifyEqualOrHigherRole {
            actual: Role::StateAdmin,
            target: "state-admin".to_string(),
        })
    );
    assert_eq!(
        authorize(&identity, &ADMIN_WRITE, Some("district-admin")),
        Decision::Allow
    );
    assert_eq!(
        authorize(&identity, &ADMIN_WRITE, None),
        Decision::Deny(DenyReason::TargetRoleUnspecified)
    );
    Ok(())
}

#[tokio::test]
async fn role_check_runs_before_outranking() -> anyhow::Result<()> {
    let world = AccessWorld::sqlite().await?;
    let (_, token) = world.enroll(Role::BlockAdmin, mysuru(), Utc::now()).await?;
    let identity = world.resolver.resolve(Some(&token)).await?;

    let decision = authorize(&identity, &ADMIN_WRITE, Some("area-admin"));
    assert!(matches!(
        decision,
        Decision::Deny(DenyReason::RoleNotAllowed {
            actual: Role::BlockAdmin,
            ..
        })
    ));
    Ok(())
}

#[tokio::test]
async fn credential_expires_one_second_after_seven_days() -> anyhow::Result<()> {
    let world = AccessWorld::sqlite().await?;
    let issued = Utc::now();
    let (_, token) = world.enroll(Role::User, GeoScope::country("IN"), issued).await?;

    let deadline = issued + Duration::days(7);
    assert!(world.resolver.resolve_at(Some(&token), deadline).await.is_ok());
    let err = world
        .resolver
        .resolve_at(Some(&token), deadline + Duration::seconds(1))
        .await
        .unwrap_err();
    assert!(matches!(err, ResolveError::InvalidCredential));
    Ok(())
}

#[tokio::test]
async fn stored_permission_edits_apply_before_expiry() -> anyhow::Result<()> {
    let world = AccessWorld::sqlite().await?;
    let (record, token) = world.enroll(Role::RegionalAdmin, mysuru(), Utc::now()).await?;

    let before = world.resolver.resolve(Some(&token)).await?;
    assert!(authorize(&before, &MANAGE_USERS, None).is_allowed());

    world
        .store
        .connection()
        .execute(Statement::from_sql_and_values(
            DatabaseBackend::Sqlite,
            "UPDATE accounts SET permissions = ? WHERE email = ?",
            vec![r#"["view-reports"]"#.into(), record.email.clone().into()],
        ))
        .await?;

    let after = world.resolver.resolve(Some(&token)).await?;
    assert_eq!(
        authorize(&after, &MANAGE_USERS, None),
        Decision::Deny(DenyReason::PermissionDenied {
            required: Permission::ManageUsers
        })
    );
    Ok(())
}

#[tokio::test]
async fn deleted_account_no_longer_resolves() -> anyhow::Result<()> {
    let world = AccessWorld::sqlite().await?;
    let (record, token) = world
        .enroll(Role::CountryAdmin, GeoScope::country("IN"), Utc::now())
        .await?;

    world
        .store
        .connection()
        .execute(Statement::from_sql_and_values(
            DatabaseBackend::Sqlite,
            "DELETE FROM accounts WHERE email = ?",
            vec![record.email.clone().into()],
        ))
        .await?;

    let err = world.resolver.resolve(Some(&token)).await.unwrap_err();
    assert!(matches!(err, ResolveError::IdentityNotFound));
    Ok(())
}

#[tokio::test]
async fn profile_edit_does_not_change_authorization() -> anyhow::Result<()> {
    let world = AccessWorld::sqlite().await?;
    let (record, token) = world.enroll(Role::DistrictAdmin, mysuru(), Utc::now()).await?;
    let update = ProfileUpdate {
        name: Some("Renamed Admin".into()),
        ..ProfileUpdate::default()
    };
    world
        .store
        .update_profile(record.id, &update, Utc::now())
        .await?;

    let identity = world.resolver.resolve(Some(&token)).await?;
    assert_eq!(identity, record.identity());
    Ok(())
}

#[tokio::test]
async fn super_admin_passes_every_dimension_except_missing_target() -> anyhow::Result<()> {
    let world = AccessWorld::sqlite().await?;
    let (mut record, _) = world
        .enroll(Role::SuperAdmin, GeoScope::country("IN"), Utc::now())
        .await?;
    record.geo = GeoScope::default();
    record.permissions.clear();
    let identity = record.identity();

    let everything = AccessRequirement::new()
        .min_geo(GeoLevel::Area)
        .permission(Permission::ManageJobs)
        .outrank_target();
    assert_eq!(
        authorize(&identity, &everything, Some("super-admin")),
        Decision::Allow
    );
    assert_eq!(
        authorize(&identity, &everything, Some("  ")),
        Decision::Deny(DenyReason::TargetRoleUnspecified)
    );
    Ok(())
}

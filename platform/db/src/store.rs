use async_trait::async_trait;
use chrono::{DateTime, Utc};
use entity::accounts;
use platform_authn::{AccountDirectory, IdentityRecord, IdentityStore, ProfileUpdate, StoreError};
use platform_authz::{Designation, GeoScope, Level, Permission, PermissionSet, Role};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, Set,
    SqlErr,
};
use serde_json::Value;
use tracing::{instrument, warn};
use uuid::Uuid;

/// [`IdentityStore`] backed by the `accounts` table.
#[derive(Clone, Debug)]
pub struct DbIdentityStore {
    db: DatabaseConnection,
}

impl DbIdentityStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    async fn email_in_use(&self, email: &str, except: Option<Uuid>) -> Result<bool, StoreError> {
        let mut query = accounts::Entity::find().filter(accounts::Column::Email.eq(email));
        if let Some(id) = except {
            query = query.filter(accounts::Column::Id.ne(id));
        }
        let existing = query.one(&self.db).await.map_err(StoreError::backend)?;
        Ok(existing.is_some())
    }
}

#[async_trait]
impl IdentityStore for DbIdentityStore {
    #[instrument(level = "debug", skip(self))]
    async fn get(&self, id: Uuid) -> Result<Option<IdentityRecord>, StoreError> {
        accounts::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(StoreError::backend)?
            .map(into_record)
            .transpose()
    }
}

#[async_trait]
impl AccountDirectory for DbIdentityStore {
    #[instrument(level = "debug", skip_all, fields(account_id = %record.id))]
    async fn create(&self, record: IdentityRecord) -> Result<IdentityRecord, StoreError> {
        if self.email_in_use(&record.email, None).await? {
            return Err(StoreError::EmailTaken(record.email));
        }
        let model = into_active(&record)
            .insert(&self.db)
            .await
            .map_err(|err| write_error(err, &record.email))?;
        into_record(model)
    }

    #[instrument(level = "debug", skip(self, update))]
    async fn update_profile(
        &self,
        id: Uuid,
        update: &ProfileUpdate,
        now: DateTime<Utc>,
    ) -> Result<Option<IdentityRecord>, StoreError> {
        let Some(model) = accounts::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(StoreError::backend)?
        else {
            return Ok(None);
        };

        let mut record = into_record(model.clone())?;
        update.apply(&mut record, now);
        if record.email != model.email && self.email_in_use(&record.email, Some(id)).await? {
            return Err(StoreError::EmailTaken(record.email));
        }

        let mut active: accounts::ActiveModel = model.into();
        active.name = Set(record.name.clone());
        active.email = Set(record.email.clone());
        active.designation = Set(record.designation.map(|d| d.as_str().to_string()));
        active.updated_at = Set(record.updated_at.into());
        let updated = active
            .update(&self.db)
            .await
            .map_err(|err| write_error(err, &record.email))?;
        into_record(updated).map(Some)
    }
}

fn write_error(err: DbErr, email: &str) -> StoreError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => StoreError::EmailTaken(email.to_string()),
        _ => StoreError::backend(err),
    }
}

fn into_active(record: &IdentityRecord) -> accounts::ActiveModel {
    let geo = &record.geo;
    accounts::ActiveModel {
        id: Set(record.id),
        name: Set(record.name.clone()),
        email: Set(record.email.clone()),
        role: Set(record.role.as_str().to_string()),
        designation: Set(record.designation.map(|d| d.as_str().to_string())),
        level: Set(i16::from(record.level.get())),
        country: Set(geo.country.clone()),
        state: Set(geo.state.clone()),
        region: Set(geo.region.clone()),
        district: Set(geo.district.clone()),
        block: Set(geo.block.clone()),
        area: Set(geo.area.clone()),
        permissions: Set(Value::from(
            record
                .permissions
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>(),
        )),
        assigned_regions: Set(Value::from(record.assigned_regions.clone())),
        created_at: Set(record.created_at.into()),
        updated_at: Set(record.updated_at.into()),
    }
}

fn into_record(model: accounts::Model) -> Result<IdentityRecord, StoreError> {
    let id = model.id;
    let corrupt = |reason: String| StoreError::Corrupt { id, reason };

    let role = model.role.parse::<Role>().map_err(|err| corrupt(err.to_string()))?;
    let level = Level::new(i64::from(model.level)).map_err(|err| corrupt(err.to_string()))?;
    let designation = model.designation.as_deref().and_then(|tag| {
        tag.parse::<Designation>()
            .inspect_err(|_| warn!(account_id = %id, tag, "ignoring unknown designation"))
            .ok()
    });
    let permissions = permission_tags(id, &model.permissions)?;
    let assigned_regions: Vec<String> = serde_json::from_value(model.assigned_regions)
        .map_err(|err| corrupt(format!("assigned_regions: {err}")))?;

    Ok(IdentityRecord {
        id,
        name: model.name,
        email: model.email,
        role,
        level,
        designation,
        geo: GeoScope {
            country: model.country,
            state: model.state,
            region: model.region,
            district: model.district,
            block: model.block,
            area: model.area,
        },
        permissions,
        assigned_regions,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    })
}

/// Unknown tags are skipped with a warning; a non-array value is corrupt.
fn permission_tags(id: Uuid, value: &Value) -> Result<PermissionSet, StoreError> {
    let Some(tags) = value.as_array() else {
        return Err(StoreError::Corrupt {
            id,
            reason: "permissions is not an array".to_string(),
        });
    };
    Ok(tags
        .iter()
        .filter_map(|tag| {
            let parsed = tag.as_str().map(str::parse::<Permission>);
            match parsed {
                Some(Ok(permission)) => Some(permission),
                _ => {
                    warn!(account_id = %id, tag = %tag, "ignoring unknown permission tag");
                    None
                }
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use platform_authn::NewAccount;
    use platform_authz::{GeoLevel, compute_permissions};
    use sea_orm::{ConnectionTrait, Database, DatabaseBackend, Statement};

    async fn setup() -> DbIdentityStore {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        bootstrap_sqlite(&db).await;
        DbIdentityStore::new(db)
    }

    async fn bootstrap_sqlite(db: &DatabaseConnection) {
        db.execute(Statement::from_string(
            DatabaseBackend::Sqlite,
            migration::SQLITE_ACCOUNTS_SQL.to_string(),
        ))
        .await
        .unwrap();
    }

    fn district_admin(email: &str) -> IdentityRecord {
        NewAccount::new(
            "Farah Khan",
            email,
            Role::DistrictAdmin,
            GeoScope::country("IN")
                .with(GeoLevel::State, "KA")
                .with(GeoLevel::District, "Mysuru"),
        )
        .into_record(Uuid::new_v4(), Utc::now())
        .unwrap()
    }

    #[tokio::test]
    async fn create_then_get_round_trips() {
        let store = setup().await;
        let record = district_admin("farah@ngo.test");
        store.create(record.clone()).await.unwrap();

        let loaded = store.get(record.id).await.unwrap().unwrap();
        assert_eq!(loaded.role, Role::DistrictAdmin);
        assert_eq!(loaded.geo, record.geo);
        assert_eq!(loaded.permissions, compute_permissions(Role::DistrictAdmin));
        assert_eq!(loaded.email, "farah@ngo.test");
        assert!(store.get(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected() {
        let store = setup().await;
        store.create(district_admin("farah@ngo.test")).await.unwrap();
        let err = store
            .create(district_admin("farah@ngo.test"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::EmailTaken(_)));
    }

    #[tokio::test]
    async fn profile_update_keeps_role_and_permissions() {
        let store = setup().await;
        let record = district_admin("farah@ngo.test");
        store.create(record.clone()).await.unwrap();
        store.create(district_admin("other@ngo.test")).await.unwrap();

        let rename = ProfileUpdate {
            name: Some("Farah K.".into()),
            ..ProfileUpdate::default()
        };
        let updated = store
            .update_profile(record.id, &rename, Utc::now())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.name, "Farah K.");
        assert_eq!(updated.role, record.role);
        assert_eq!(updated.permissions, record.permissions);

        let steal = ProfileUpdate {
            email: Some("other@ngo.test".into()),
            ..ProfileUpdate::default()
        };
        assert!(matches!(
            store.update_profile(record.id, &steal, Utc::now()).await,
            Err(StoreError::EmailTaken(_))
        ));
    }

    #[tokio::test]
    async fn unknown_permission_tags_are_skipped() {
        let store = setup().await;
        let record = district_admin("farah@ngo.test");
        store.create(record.clone()).await.unwrap();
        store
            .connection()
            .execute(Statement::from_sql_and_values(
                DatabaseBackend::Sqlite,
                "UPDATE accounts SET permissions = ? WHERE email = ?",
                vec![
                    r#"["view-reports","launch-rockets"]"#.into(),
                    "farah@ngo.test".into(),
                ],
            ))
            .await
            .unwrap();

        let loaded = store.get(record.id).await.unwrap().unwrap();
        assert_eq!(loaded.permissions, PermissionSet::from([Permission::ViewReports]));
    }

    #[tokio::test]
    async fn unknown_role_is_corrupt() {
        let store = setup().await;
        let record = district_admin("farah@ngo.test");
        store.create(record.clone()).await.unwrap();
        store
            .connection()
            .execute(Statement::from_sql_and_values(
                DatabaseBackend::Sqlite,
                "UPDATE accounts SET role = ? WHERE email = ?",
                vec!["overlord".into(), "farah@ngo.test".into()],
            ))
            .await
            .unwrap();

        assert!(matches!(
            store.get(record.id).await,
            Err(StoreError::Corrupt { .. })
        ));
    }
}

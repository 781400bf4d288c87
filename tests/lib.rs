//! Fixtures shared by the end-to-end access scenarios.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use migration::SQLITE_ACCOUNTS_SQL;
use platform_authn::{
    AccountDirectory, CredentialCodec, IdentityRecord, IdentityResolver, NewAccount,
};
use platform_authz::{GeoScope, Role};
use platform_db::DbIdentityStore;
use sea_orm::{ConnectionTrait, Database, DatabaseBackend, DbErr, Statement};
use uuid::Uuid;

pub const TEST_SECRET: &[u8] = b"scenario-secret-scenario-secret-!";

/// A database-backed store, resolver and codec wired the way the server
/// wires them.
pub struct AccessWorld {
    pub store: Arc<DbIdentityStore>,
    pub resolver: IdentityResolver,
    pub codec: CredentialCodec,
}

impl AccessWorld {
    pub async fn sqlite() -> Result<Self, DbErr> {
        let db = Database::connect("sqlite::memory:").await?;
        db.execute(Statement::from_string(
            DatabaseBackend::Sqlite,
            SQLITE_ACCOUNTS_SQL.to_string(),
        ))
        .await?;
        let store = Arc::new(DbIdentityStore::new(db));
        let codec = CredentialCodec::from_secret(TEST_SECRET);
        let resolver = IdentityResolver::new(codec.clone(), store.clone());
        Ok(Self {
            store,
            resolver,
            codec,
        })
    }

    /// Creates an account through the directory and returns it with a fresh
    /// credential issued at `issued_at`.
    pub async fn enroll(
        &self,
        role: Role,
        geo: GeoScope,
        issued_at: DateTime<Utc>,
    ) -> anyhow::Result<(IdentityRecord, String)> {
        let email = format!("{}@scenario.test", Uuid::new_v4().simple());
        let account = NewAccount::new("Scenario Admin", email, role, geo);
        let record = account.into_record(Uuid::new_v4(), issued_at)?;
        let record = self.store.create(record).await?;
        let token = self.codec.issue_at(&record.identity(), issued_at)?;
        Ok((record, token))
    }
}

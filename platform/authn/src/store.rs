//! Authoritative account lookup.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use platform_authz::{Designation, GeoScope, Identity, Level, PermissionSet, Role};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::account::ProfileUpdate;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("identity store backend failure")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("email {0} already registered")]
    EmailTaken(String),
    #[error("stored account {id} is unreadable: {reason}")]
    Corrupt { id: Uuid, reason: String },
}

impl StoreError {
    pub fn backend(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        StoreError::Backend(Box::new(err))
    }
}

/// One stored account. Holds no credential or password material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityRecord {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub level: Level,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub designation: Option<Designation>,
    pub geo: GeoScope,
    pub permissions: PermissionSet,
    pub assigned_regions: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl IdentityRecord {
    /// Projection onto the fields authorization decisions read.
    pub fn identity(&self) -> Identity {
        Identity {
            id: self.id,
            role: self.role,
            level: self.level,
            designation: self.designation,
            geo: self.geo.clone(),
            permissions: self.permissions.clone(),
            assigned_regions: self.assigned_regions.clone(),
        }
    }
}

/// Key-value lookup of accounts by id.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<Option<IdentityRecord>, StoreError>;
}

/// Write side used by the account collaborator.
#[async_trait]
pub trait AccountDirectory: IdentityStore {
    /// Persists a new account. Fails with [`StoreError::EmailTaken`] when the
    /// email is already registered.
    async fn create(&self, record: IdentityRecord) -> Result<IdentityRecord, StoreError>;

    async fn update_profile(
        &self,
        id: Uuid,
        update: &ProfileUpdate,
        now: DateTime<Utc>,
    ) -> Result<Option<IdentityRecord>, StoreError>;
}

/// In-process store for tests and local development.
#[derive(Debug, Default)]
pub struct MemoryIdentityStore {
    records: RwLock<HashMap<Uuid, IdentityRecord>>,
}

impl MemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: impl IntoIterator<Item = IdentityRecord>) -> Self {
        Self {
            records: RwLock::new(records.into_iter().map(|r| (r.id, r)).collect()),
        }
    }

    /// Inserts or replaces a record, bypassing the email check.
    pub async fn upsert(&self, record: IdentityRecord) {
        self.records.write().await.insert(record.id, record);
    }

    pub async fn remove(&self, id: Uuid) -> Option<IdentityRecord> {
        self.records.write().await.remove(&id)
    }

    pub async fn count(&self) -> usize {
        self.records.read().await.len()
    }
}

#[async_trait]
impl IdentityStore for MemoryIdentityStore {
    async fn get(&self, id: Uuid) -> Result<Option<IdentityRecord>, StoreError> {
        Ok(self.records.read().await.get(&id).cloned())
    }
}

#[async_trait]
impl AccountDirectory for MemoryIdentityStore {
    async fn create(&self, record: IdentityRecord) -> Result<IdentityRecord, StoreError> {
        let mut records = self.records.write().await;
        if records.values().any(|existing| existing.email == record.email) {
            return Err(StoreError::EmailTaken(record.email));
        }
        records.insert(record.id, record.clone());
        Ok(record)
    }

    async fn update_profile(
        &self,
        id: Uuid,
        update: &ProfileUpdate,
        now: DateTime<Utc>,
    ) -> Result<Option<IdentityRecord>, StoreError> {
        let mut records = self.records.write().await;
        if let Some(email) = update.email.as_deref() {
            let email = email.trim().to_lowercase();
            if records
                .values()
                .any(|existing| existing.id != id && existing.email == email)
            {
                return Err(StoreError::EmailTaken(email));
            }
        }
        let Some(record) = records.get_mut(&id) else {
            return Ok(None);
        };
        update.apply(record, now);
        Ok(Some(record.clone()))
    }
}

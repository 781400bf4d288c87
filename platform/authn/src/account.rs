//! Account creation and profile edits.

use chrono::{DateTime, Utc};
use platform_authz::{Designation, GeoLevel, GeoScope, Level, Role, compute_permissions};
use serde::Deserialize;
use thiserror::Error;
use uuid::Uuid;

use crate::store::IdentityRecord;

const NAME_LEN: std::ops::RangeInclusive<usize> = 3..=50;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccountError {
    #[error("name must be between 3 and 50 characters")]
    InvalidName,
    #[error("please fill a valid email address")]
    InvalidEmail,
    #[error("geo.country is required")]
    MissingCountry,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAccount {
    pub name: String,
    pub email: String,
    #[serde(default = "default_role")]
    pub role: Role,
    #[serde(default)]
    pub designation: Option<Designation>,
    #[serde(default)]
    pub level: Level,
    pub geo: GeoScope,
    #[serde(default)]
    pub assigned_regions: Vec<String>,
}

fn default_role() -> Role {
    Role::User
}

impl NewAccount {
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        role: Role,
        geo: GeoScope,
    ) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            role,
            designation: None,
            level: Level::default(),
            geo,
            assigned_regions: Vec::new(),
        }
    }

    pub fn validate(&self) -> Result<(), AccountError> {
        validate_name(&self.name)?;
        validate_email(&self.email)?;
        if self.geo.get(GeoLevel::Country).is_none() {
            return Err(AccountError::MissingCountry);
        }
        Ok(())
    }

    /// Builds the stored record. This is the only place permissions are
    /// derived from the role.
    pub fn into_record(self, id: Uuid, now: DateTime<Utc>) -> Result<IdentityRecord, AccountError> {
        self.validate()?;
        Ok(IdentityRecord {
            id,
            name: self.name.trim().to_string(),
            email: normalize_email(&self.email),
            permissions: compute_permissions(self.role),
            role: self.role,
            level: self.level,
            designation: self.designation,
            geo: self.geo,
            assigned_regions: self.assigned_regions,
            created_at: now,
            updated_at: now,
        })
    }
}

/// Editable profile fields. Role, geo and permissions are managed elsewhere.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub designation: Option<Designation>,
}

impl ProfileUpdate {
    pub fn validate(&self) -> Result<(), AccountError> {
        if let Some(name) = &self.name {
            validate_name(name)?;
        }
        if let Some(email) = &self.email {
            validate_email(email)?;
        }
        Ok(())
    }

    pub fn apply(&self, record: &mut IdentityRecord, now: DateTime<Utc>) {
        if let Some(name) = &self.name {
            record.name = name.trim().to_string();
        }
        if let Some(email) = &self.email {
            record.email = normalize_email(email);
        }
        if let Some(designation) = self.designation {
            record.designation = Some(designation);
        }
        record.updated_at = now;
    }
}

fn validate_name(name: &str) -> Result<(), AccountError> {
    if NAME_LEN.contains(&name.trim().chars().count()) {
        Ok(())
    } else {
        Err(AccountError::InvalidName)
    }
}

fn validate_email(email: &str) -> Result<(), AccountError> {
    let email = email.trim();
    let valid = email
        .split_once('@')
        .is_some_and(|(local, domain)| {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        })
        && !email.contains(char::is_whitespace);
    if valid {
        Ok(())
    } else {
        Err(AccountError::InvalidEmail)
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

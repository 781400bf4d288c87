use std::sync::Arc;

use chrono::{DateTime, Utc};
use platform_authz::Identity;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::{
    credential::CredentialCodec,
    store::{IdentityRecord, IdentityStore, StoreError},
};

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("authorization token required")]
    MissingCredential,
    /// Signature and expiry failures are deliberately indistinguishable.
    #[error("invalid or expired token")]
    InvalidCredential,
    #[error("user not found")]
    IdentityNotFound,
    #[error("identity store unavailable")]
    ResolutionUnavailable(#[source] StoreError),
}

impl ResolveError {
    pub fn code(&self) -> &'static str {
        match self {
            ResolveError::MissingCredential => "MISSING_CREDENTIAL",
            ResolveError::InvalidCredential => "INVALID_CREDENTIAL",
            ResolveError::IdentityNotFound => "IDENTITY_NOT_FOUND",
            ResolveError::ResolutionUnavailable(_) => "RESOLUTION_UNAVAILABLE",
        }
    }
}

/// Turns a raw bearer credential into the caller's current [`Identity`].
///
/// The store handle is owned by the caller that opened it; the resolver only
/// reads through it, once per call, without caching.
#[derive(Clone)]
pub struct IdentityResolver {
    codec: CredentialCodec,
    store: Arc<dyn IdentityStore>,
}

impl IdentityResolver {
    pub fn new(codec: CredentialCodec, store: Arc<dyn IdentityStore>) -> Self {
        Self { codec, store }
    }

    pub fn codec(&self) -> &CredentialCodec {
        &self.codec
    }

    pub async fn resolve(&self, raw: Option<&str>) -> Result<Identity, ResolveError> {
        self.resolve_at(raw, Utc::now()).await
    }

    pub async fn resolve_at(
        &self,
        raw: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Identity, ResolveError> {
        self.resolve_record_at(raw, now)
            .await
            .map(|record| record.identity())
    }

    /// Full stored record of the caller, for profile views.
    pub async fn resolve_record(&self, raw: Option<&str>) -> Result<IdentityRecord, ResolveError> {
        self.resolve_record_at(raw, Utc::now()).await
    }

    #[instrument(level = "debug", skip_all)]
    pub async fn resolve_record_at(
        &self,
        raw: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<IdentityRecord, ResolveError> {
        let token = raw
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or(ResolveError::MissingCredential)?;

        let claims = self.codec.verify_at(token, now).map_err(|err| {
            debug!(error = %err, "credential rejected");
            ResolveError::InvalidCredential
        })?;

        match self.store.get(claims.id).await {
            Ok(Some(record)) => {
                debug!(identity_id = %record.id, role = %record.role, "identity resolved");
                Ok(record)
            }
            Ok(None) => {
                debug!(identity_id = %claims.id, "credential refers to a missing account");
                Err(ResolveError::IdentityNotFound)
            }
            Err(err) => {
                warn!(error = %err, identity_id = %claims.id, "identity lookup failed");
                Err(ResolveError::ResolutionUnavailable(err))
            }
        }
    }
}

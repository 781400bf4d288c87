use std::fmt;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, errors::ErrorKind};
use platform_authz::{Designation, GeoScope, Identity, Level, PermissionSet, Role};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Credentials expire this many days after issuance.
pub const CREDENTIAL_TTL_DAYS: i64 = 7;

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("credential expired")]
    Expired,
    #[error("credential malformed")]
    Malformed,
    #[error("credential signature invalid")]
    SignatureInvalid,
    #[error("failed to sign credential")]
    Signing(#[source] jsonwebtoken::errors::Error),
}

/// Authorization claims embedded in a credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialClaims {
    #[serde(rename = "sub")]
    pub id: Uuid,
    pub role: Role,
    pub level: Level,
    pub geo: GeoScope,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub designation: Option<Designation>,
    pub permissions: PermissionSet,
    pub iat: i64,
    pub exp: i64,
}

impl CredentialClaims {
    pub fn new(identity: &Identity, issued_at: DateTime<Utc>) -> Self {
        let expires_at = issued_at + Duration::days(CREDENTIAL_TTL_DAYS);
        Self {
            id: identity.id,
            role: identity.role,
            level: identity.level,
            geo: identity.geo.clone(),
            designation: identity.designation,
            permissions: identity.permissions.clone(),
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
        }
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.exp, 0)
    }
}

/// HS256 signer/verifier keyed by the process-wide secret.
#[derive(Clone)]
pub struct CredentialCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl fmt::Debug for CredentialCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialCodec")
            .field("secret", &"<redacted>")
            .finish()
    }
}

impl CredentialCodec {
    pub fn from_secret(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked against an explicit clock in `verify_at`.
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
        }
    }

    pub fn issue(&self, identity: &Identity) -> Result<String, CredentialError> {
        self.issue_at(identity, Utc::now())
    }

    pub fn issue_at(
        &self,
        identity: &Identity,
        now: DateTime<Utc>,
    ) -> Result<String, CredentialError> {
        let claims = CredentialClaims::new(identity, now);
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(CredentialError::Signing)
    }

    pub fn verify(&self, token: &str) -> Result<CredentialClaims, CredentialError> {
        self.verify_at(token, Utc::now())
    }

    /// Checks signature, structure and expiry as of `now`. A credential is
    /// still valid at its `exp` second and expired one second later.
    pub fn verify_at(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<CredentialClaims, CredentialError> {
        let claims =
            jsonwebtoken::decode::<CredentialClaims>(token, &self.decoding, &self.validation)
                .map(|data| data.claims)
                .map_err(|err| match err.kind() {
                    ErrorKind::InvalidSignature => CredentialError::SignatureInvalid,
                    ErrorKind::ExpiredSignature => CredentialError::Expired,
                    _ => CredentialError::Malformed,
                })?;
        if now.timestamp() > claims.exp {
            return Err(CredentialError::Expired);
        }
        Ok(claims)
    }
}

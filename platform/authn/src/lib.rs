//! Platform authentication.
//!
//! Issues and verifies signed bearer credentials and resolves them into an
//! [`Identity`](platform_authz::Identity) by re-reading the authoritative
//! account record on every call.

pub mod account;
pub mod credential;
pub mod resolver;
pub mod store;

pub use account::{AccountError, NewAccount, ProfileUpdate};
pub use credential::{CREDENTIAL_TTL_DAYS, CredentialClaims, CredentialCodec, CredentialError};
pub use resolver::{IdentityResolver, ResolveError};
pub use store::{AccountDirectory, IdentityRecord, IdentityStore, MemoryIdentityStore, StoreError};

//! Authorization primitives for the administrative platform.
//!
//! An [`Identity`] is checked against an [`AccessRequirement`] along three
//! independent dimensions (role membership, geographic scope and explicit
//! permission grants) plus an optional seniority check against the role named
//! in a mutation payload. Everything in this crate is pure and synchronous.

pub mod account;
pub mod decision;
pub mod geo;
pub mod identity;
pub mod permission;
pub mod role;

pub use account::{authorize_account_creation, authorize_profile_update};
pub use decision::{AccessRequirement, Decision, DenyReason, authorize};
pub use geo::{GeoLevel, GeoScope, UnknownGeoLevel, has_geo_access};
pub use identity::{Designation, Identity, Level, LevelOutOfRange, UnknownDesignation};
pub use permission::{
    Module, ModuleAction, Permission, PermissionSet, UnknownPermission, compute_permissions,
    has_permission,
};
pub use role::{ADMIN_CHAIN, Role, UnknownRole, outranks, outranks_tag};

//! Account lifecycle rules applied by the account collaborator.

use uuid::Uuid;

use crate::{
    decision::{Decision, DenyReason},
    identity::Identity,
    role::Role,
};

/// Only `user` accounts may be created without a caller; every other role
/// needs a `super-admin` caller.
pub fn authorize_account_creation(creator: Option<&Identity>, requested: Role) -> Decision {
    if requested == Role::User {
        return Decision::Allow;
    }
    match creator {
        Some(creator) if creator.role.is_universal() => Decision::Allow,
        _ => Decision::Deny(DenyReason::AdminCreationRestricted { requested }),
    }
}

/// An identity may edit its own profile; `super-admin` may edit any.
pub fn authorize_profile_update(identity: &Identity, target: Uuid) -> Decision {
    if identity.id == target || identity.role.is_universal() {
        Decision::Allow
    } else {
        Decision::Deny(DenyReason::NotProfileOwner)
    }
}

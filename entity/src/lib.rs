//! SeaORM entities for the access store.

pub mod accounts;

pub use accounts::Entity as Accounts;

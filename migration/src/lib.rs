pub use sea_orm_migration::prelude::*;

mod m20260301_000001_accounts;

pub use m20260301_000001_accounts::SQLITE_ACCOUNTS_SQL;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![Box::new(m20260301_000001_accounts::Migration)]
    }
}

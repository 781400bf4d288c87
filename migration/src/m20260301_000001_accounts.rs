use sea_orm_migration::sea_orm::ConnectionTrait;
use sea_orm_migration::prelude::*;

const UP_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS accounts (
    id uuid PRIMARY KEY,
    name text NOT NULL,
    email text NOT NULL UNIQUE,
    role text NOT NULL DEFAULT 'user'
        CHECK (role IN ('super-admin','country-admin','state-admin','regional-admin',
                        'district-admin','block-admin','area-admin','user')),
    designation text NULL,
    level smallint NOT NULL DEFAULT 1 CHECK (level BETWEEN 1 AND 12),
    country text NULL,
    state text NULL,
    region text NULL,
    district text NULL,
    block text NULL,
    area text NULL,
    permissions jsonb NOT NULL DEFAULT '[]'::jsonb,
    assigned_regions jsonb NOT NULL DEFAULT '[]'::jsonb,
    created_at timestamptz NOT NULL DEFAULT now(),
    updated_at timestamptz NOT NULL DEFAULT now()
);

CREATE INDEX IF NOT EXISTS idx_accounts_role ON accounts (role);
CREATE INDEX IF NOT EXISTS idx_accounts_country_state ON accounts (country, state);
"#;

/// SQLite rendition of `UP_SQL` for in-memory test databases. Column names
/// and nullability must track the Postgres table.
pub const SQLITE_ACCOUNTS_SQL: &str = r#"
CREATE TABLE accounts (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    email TEXT NOT NULL UNIQUE,
    role TEXT NOT NULL DEFAULT 'user',
    designation TEXT,
    level INTEGER NOT NULL DEFAULT 1 CHECK (level BETWEEN 1 AND 12),
    country TEXT,
    state TEXT,
    region TEXT,
    district TEXT,
    block TEXT,
    area TEXT,
    permissions TEXT NOT NULL DEFAULT '[]',
    assigned_regions TEXT NOT NULL DEFAULT '[]',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
"#;

const DOWN_SQL: &str = r#"
DROP INDEX IF EXISTS idx_accounts_country_state;
DROP INDEX IF EXISTS idx_accounts_role;
DROP TABLE IF EXISTS accounts;
"#;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared(UP_SQL)
            .await
            .map(|_| ())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared(DOWN_SQL)
            .await
            .map(|_| ())
    }
}

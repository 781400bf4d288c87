mod config;
mod http;

use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use clap::{Args, Parser, Subcommand};
use migration::{Migrator, MigratorTrait};
use platform_authn::{IdentityResolver, IdentityStore};
use platform_db::{DbIdentityStore, DbPool, connect};
use platform_obs::{ObsConfig, init_tracing};
use tracing::info;
use uuid::Uuid;

use crate::{
    config::AppConfig,
    http::{AppState, ServeConfig},
};

#[derive(Parser, Debug)]
#[command(name = "access-server", version, about = "Geo-scoped access control service")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP server.
    Serve(ServeCommand),
    /// Run database migrations.
    #[command(subcommand)]
    Migrate(MigrateCommand),
    /// Mint a credential for an existing account and print it.
    IssueToken {
        #[arg(long, value_name = "UUID")]
        account: Uuid,
    },
}

#[derive(Subcommand, Debug)]
enum MigrateCommand {
    /// Apply pending migrations.
    Up,
    /// Rollback the most recent migration.
    Down,
}

#[derive(Args, Debug)]
struct ServeCommand {
    #[arg(long, default_value = "0.0.0.0")]
    host: std::net::IpAddr,
    #[arg(long, default_value_t = 8080)]
    port: u16,
    #[arg(long, help = "Allow starting even when migrations are pending")]
    allow_dirty: bool,
}

impl From<&ServeCommand> for ServeConfig {
    fn from(value: &ServeCommand) -> Self {
        ServeConfig::new(value.host, value.port)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let app_config = Arc::new(AppConfig::load()?);
    let tracing = init_tracing(ObsConfig::from_env())?;
    let outcome = match cli.command {
        Command::Serve(cmd) => run_server(cmd, app_config).await,
        Command::Migrate(action) => match action {
            MigrateCommand::Up => migrate_up(&app_config).await,
            MigrateCommand::Down => migrate_down(&app_config).await,
        },
        Command::IssueToken { account } => issue_token(&app_config, account).await,
    };
    tracing.shutdown();
    outcome
}

async fn setup_pool(config: &AppConfig) -> Result<DbPool> {
    connect(&config.database).await.map_err(Into::into)
}

async fn run_server(cmd: ServeCommand, config: Arc<AppConfig>) -> Result<()> {
    let pool = setup_pool(&config).await?;
    ensure_migrations(&pool, cmd.allow_dirty).await?;

    let store = Arc::new(DbIdentityStore::new(pool.clone()));
    let state = AppState {
        resolver: IdentityResolver::new(config.codec.clone(), store.clone()),
        accounts: store,
        config: config.clone(),
        pool: Some(pool.clone()),
    };
    let served = http::serve((&cmd).into(), state).await;
    platform_db::close(pool).await?;
    served
}

async fn ensure_migrations(pool: &DbPool, allow_dirty: bool) -> Result<()> {
    let pending = Migrator::get_pending_migrations(pool).await?;
    if !pending.is_empty() && !allow_dirty {
        anyhow::bail!(
            "pending migrations detected; run `cargo run -p server -- migrate up` or pass --allow-dirty"
        );
    }
    Ok(())
}

async fn migrate_up(config: &AppConfig) -> Result<()> {
    let pool = setup_pool(config).await?;
    Migrator::up(&pool, None).await?;
    info!("database migrations applied");
    platform_db::close(pool).await?;
    Ok(())
}

async fn migrate_down(config: &AppConfig) -> Result<()> {
    let pool = setup_pool(config).await?;
    Migrator::down(&pool, Some(1)).await?;
    info!("most recent migration rolled back");
    platform_db::close(pool).await?;
    Ok(())
}

async fn issue_token(config: &AppConfig, account: Uuid) -> Result<()> {
    let pool = setup_pool(config).await?;
    let store = DbIdentityStore::new(pool.clone());
    let record = store
        .get(account)
        .await
        .context("failed to load account")?
        .ok_or_else(|| anyhow!("account {account} not found"))?;
    let token = config
        .codec
        .issue(&record.identity())
        .context("failed to sign credential")?;
    info!(account_id = %record.id, role = %record.role, "credential issued");
    println!("{token}");
    platform_db::close(pool).await?;
    Ok(())
}

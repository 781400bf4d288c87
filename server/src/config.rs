use anyhow::{Context, Result, anyhow};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use platform_authn::CredentialCodec;
use platform_db::DatabaseSettings;

const DEFAULT_TOKEN_COOKIE: &str = "token";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub codec: CredentialCodec,
    pub database: DatabaseSettings,
    pub cors_allowed_origins: Vec<String>,
    pub token_cookie: String,
    pub secure_cookies: bool,
}

impl AppConfig {
    /// Reads `.env` when present, then the process environment.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_vars(|key| std::env::var(key).ok())
    }

    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let secret = var("JWT_SECRET_BASE64").context("JWT_SECRET_BASE64 missing")?;
        let secret_bytes = STANDARD
            .decode(secret.trim())
            .context("invalid JWT_SECRET_BASE64")?;
        if secret_bytes.len() < 32 {
            return Err(anyhow!("JWT_SECRET_BASE64 must decode to at least 32 bytes"));
        }

        let database_url = var("DATABASE_URL")
            .filter(|url| !url.trim().is_empty())
            .context("DATABASE_URL missing")?;

        let cors_allowed_origins = var("CORS_ALLOWED_ORIGINS")
            .unwrap_or_else(|| "http://localhost:5173".into())
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(str::to_string)
            .collect();

        let token_cookie = var("TOKEN_COOKIE")
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_TOKEN_COOKIE.into());

        let secure_cookies = var("SECURE_COOKIES")
            .map(|val| matches!(val.to_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(true);

        Ok(Self {
            codec: CredentialCodec::from_secret(&secret_bytes),
            database: DatabaseSettings::new(database_url),
            cors_allowed_origins,
            token_cookie,
            secure_cookies,
        })
    }
}

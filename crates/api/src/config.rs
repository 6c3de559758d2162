//! Process configuration read from the environment.
//!
//! An optional `.env` file is loaded first; real environment variables win.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;

const DEV_JWT_SECRET: &str = "dev-secret";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub jwt_secret: String,
    /// `None` selects the in-memory store.
    pub database_url: Option<String>,
    /// Base prepended to relative image URLs.
    pub public_url: String,
    pub upload_dir: PathBuf,
    pub otp_ttl_minutes: i64,
    pub token_ttl_hours: i64,
    pub max_upload_bytes: usize,
    /// SMTP relay, tried first for email recipients. Unset host disables it.
    pub smtp_host: Option<String>,
    pub smtp_port: u16,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    /// Defaults to the SMTP login.
    pub smtp_from_email: Option<String>,
    pub postmark_server_token: Option<String>,
    pub postmark_from_email: String,
    /// RapidAPI email OTP, tried after Postmark.
    pub rapidapi_key: Option<String>,
    pub admin_email: Option<String>,
    pub admin_username: String,
    pub seed_demo_data: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8000)),
            jwt_secret: DEV_JWT_SECRET.to_string(),
            database_url: None,
            public_url: "http://localhost:8000".to_string(),
            upload_dir: PathBuf::from("uploads"),
            otp_ttl_minutes: railparcel_auth::otp::DEFAULT_TTL_MINUTES,
            token_ttl_hours: 24,
            max_upload_bytes: 10 * 1024 * 1024,
            smtp_host: None,
            smtp_port: 465,
            smtp_username: None,
            smtp_password: None,
            smtp_from_email: None,
            postmark_server_token: None,
            postmark_from_email: "noreply@railparcel.local".to_string(),
            rapidapi_key: None,
            admin_email: None,
            admin_username: "admin".to_string(),
            seed_demo_data: false,
        }
    }
}

fn var(key: &str) -> Option<String> {
    std::env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parsed<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match var(key) {
        Some(raw) => raw.parse().with_context(|| format!("invalid {key}: {raw}")),
        None => Ok(default),
    }
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        let jwt_secret = var("JWT_SECRET").unwrap_or_else(|| {
            tracing::warn!("JWT_SECRET not set; using insecure dev default");
            DEV_JWT_SECRET.to_string()
        });

        let config = Self {
            bind_addr: parsed("BIND_ADDR", defaults.bind_addr)?,
            jwt_secret,
            database_url: var("DATABASE_URL"),
            public_url: var("PUBLIC_URL").unwrap_or(defaults.public_url),
            upload_dir: var("UPLOAD_DIR").map(PathBuf::from).unwrap_or(defaults.upload_dir),
            otp_ttl_minutes: parsed("OTP_TTL_MINUTES", defaults.otp_ttl_minutes)?,
            token_ttl_hours: parsed("TOKEN_TTL_HOURS", defaults.token_ttl_hours)?,
            max_upload_bytes: parsed("MAX_UPLOAD_BYTES", defaults.max_upload_bytes)?,
            smtp_host: var("SMTP_HOST"),
            smtp_port: parsed("SMTP_PORT", defaults.smtp_port)?,
            smtp_username: var("SMTP_USERNAME"),
            smtp_password: var("SMTP_PASSWORD"),
            smtp_from_email: var("SMTP_FROM_EMAIL"),
            postmark_server_token: var("POSTMARK_SERVER_TOKEN"),
            postmark_from_email: var("POSTMARK_FROM_EMAIL").unwrap_or(defaults.postmark_from_email),
            rapidapi_key: var("RAPIDAPI_KEY"),
            admin_email: var("ADMIN_EMAIL"),
            admin_username: var("ADMIN_USERNAME").unwrap_or(defaults.admin_username),
            seed_demo_data: parsed("SEED_DEMO_DATA", defaults.seed_demo_data)?,
        };

        if config.otp_ttl_minutes <= 0 || config.token_ttl_hours <= 0 {
            anyhow::bail!("OTP_TTL_MINUTES and TOKEN_TTL_HOURS must be positive");
        }
        Ok(config)
    }
}

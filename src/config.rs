use std::{env, fmt::Display, path::PathBuf, str::FromStr};

use anyhow::{anyhow, bail, Context, Result};
use derive_getters::Getters;
use tracing::{info, warn};

const DEV_JWT_SECRET: &str = "solar-cms-development-secret";

#[derive(Debug, Clone, Getters)]
pub struct Config {
    port: u16,
    database_url: Option<String>,
    cms_database_url: Option<String>,
    jwt_secret: String,
    jwt_ttl_hours: i64,
    admin_username: String,
    admin_password: String,
    api_base_url: String,
    upload_dir: PathBuf,
    search_index_dir: Option<PathBuf>,
    max_upload_bytes: usize,
    production: bool,
    cors_origins: Vec<String>,
}

impl Config {
    /// Reads the process environment. Call `dotenvy::dotenv()` first to pick up `.env`.
    pub fn load() -> Result<Self> {
        let production = var("APP_ENV")
            .map(|value| value.eq_ignore_ascii_case("production"))
            .unwrap_or(false);

        let port: u16 = try_load("PORT", "5000")?;

        let database_url = var("DATABASE_URL").or_else(|| var("MONGODB_URI"));
        let cms_database_url = var("DATABASE_URL_CMS")
            .or_else(|| var("MONGODB_URI_CMS"))
            .or_else(|| database_url.clone());

        let jwt_secret = match var("JWT_SECRET") {
            Some(secret) => secret,
            None if production => bail!("JWT_SECRET must be set in production"),
            None => {
                warn!("JWT_SECRET not set, using development secret");
                DEV_JWT_SECRET.to_string()
            }
        };

        let (admin_username, admin_password) =
            match (var("ADMIN_USERNAME"), var("ADMIN_PASSWORD")) {
                (Some(user), Some(password)) => (user, password),
                _ if production => bail!("ADMIN_USERNAME and ADMIN_PASSWORD must be set in production"),
                _ => {
                    warn!("Admin credentials not set, using development defaults");
                    ("admin".to_string(), "admin123".to_string())
                }
            };

        let api_base_url = var("API_BASE_URL")
            .unwrap_or_else(|| format!("http://localhost:{port}"))
            .trim_end_matches('/')
            .to_string();

        let max_upload_mb: usize = try_load("MAX_UPLOAD_MB", "10")?;

        let cors_origins = var("CORS_ORIGINS")
            .map(|origins| {
                origins
                    .split(',')
                    .map(str::trim)
                    .filter(|origin| !origin.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            port,
            database_url,
            cms_database_url,
            jwt_secret,
            jwt_ttl_hours: try_load("JWT_TTL_HOURS", "24")?,
            admin_username,
            admin_password,
            api_base_url,
            upload_dir: PathBuf::from(var("UPLOAD_DIR").unwrap_or_else(|| "uploads".to_string())),
            search_index_dir: var("SEARCH_INDEX_DIR").map(PathBuf::from),
            max_upload_bytes: max_upload_mb * 1024 * 1024,
            production,
            cors_origins,
        })
    }

    /// In-memory configuration for tests and local tooling.
    pub fn for_tests(upload_dir: impl Into<PathBuf>) -> Self {
        Self {
            port: 0,
            database_url: None,
            cms_database_url: None,
            jwt_secret: DEV_JWT_SECRET.to_string(),
            jwt_ttl_hours: 1,
            admin_username: "admin".to_string(),
            admin_password: "admin123".to_string(),
            api_base_url: "http://localhost:5000".to_string(),
            upload_dir: upload_dir.into(),
            search_index_dir: None,
            max_upload_bytes: 1024 * 1024,
            production: true,
            cors_origins: Vec::new(),
        }
    }
}

fn var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn try_load<T: FromStr>(key: &str, default: &str) -> Result<T>
where
    T::Err: Display,
{
    let raw = var(key).unwrap_or_else(|| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });

    raw.parse()
        .map_err(|e| anyhow!("{e}"))
        .with_context(|| format!("Invalid {key} value: {raw}"))
}

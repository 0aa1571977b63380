use anyhow::{Context, bail};
use serde::Deserialize;

/// Where the catalog keeps its records.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Postgres,
    Memory,
}

impl std::str::FromStr for Backend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(Self::Postgres),
            "memory" => Ok(Self::Memory),
            other => bail!("unknown CATALOG_BACKEND `{other}` (expected `postgres` or `memory`)"),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    pub backend: Backend,
    pub database_url: Option<String>,
    pub jwt_secret: String,
    pub server_port: u16,
    pub page_size: i64,
    pub book_cache_ttl_secs: u64,
    pub rate_limit_per_minute: u32,
    /// Librarian account created at startup when it does not exist yet.
    pub librarian: Option<Credentials>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Config {
    /// Load configuration from environment variables, applying defaults where appropriate.
    ///
    /// # Errors
    /// Returns an error if mandatory variables (`JWT_SECRET`, and `DATABASE_URL` for the
    /// Postgres backend) are missing, or if `CATALOG_BACKEND` is not recognised.
    pub fn from_env() -> anyhow::Result<Self> {
        let backend = match std::env::var("CATALOG_BACKEND") {
            Ok(v) => v.parse()?,
            Err(_) => Backend::default(),
        };
        let database_url = std::env::var("DATABASE_URL").ok();
        if backend == Backend::Postgres && database_url.is_none() {
            bail!("DATABASE_URL must be set when CATALOG_BACKEND is postgres");
        }
        let jwt_secret = std::env::var("JWT_SECRET").context("JWT_SECRET must be set")?;
        let server_port = std::env::var("SERVER_PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(8080);
        let page_size = std::env::var("PAGE_SIZE")
            .ok()
            .and_then(|v| v.parse().ok())
            .filter(|n: &i64| *n > 0)
            .unwrap_or(10);
        let book_cache_ttl_secs = std::env::var("BOOK_CACHE_TTL_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(60 * 60);
        let rate_limit_per_minute = std::env::var("RATE_LIMIT_PER_MINUTE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(60);
        let librarian = match (
            std::env::var("LIBRARIAN_USERNAME"),
            std::env::var("LIBRARIAN_PASSWORD"),
        ) {
            (Ok(username), Ok(password)) => Some(Credentials { username, password }),
            _ => None,
        };

        Ok(Self {
            backend,
            database_url,
            jwt_secret,
            server_port,
            page_size,
            book_cache_ttl_secs,
            rate_limit_per_minute,
            librarian,
        })
    }
}

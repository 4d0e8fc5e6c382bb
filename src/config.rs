use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use anyhow::{anyhow, Context};

const DEFAULT_MODEL_DIR: &str = "models";
const DEFAULT_PORT: u16 = 8000;
const DEFAULT_MAX_CONNECTIONS: u32 = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub database_url: Option<String>,
    pub model_dir: PathBuf,
    pub db_max_connections: u32,
    pub bind_addr: SocketAddr,
}

impl AppConfig {
    /// Reads `.env` (if present) and then the process environment.
    pub fn from_env() -> anyhow::Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let db_max_connections = match lookup("DB_MAX_CONNECTIONS") {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("invalid DB_MAX_CONNECTIONS value '{raw}'"))?,
            None => DEFAULT_MAX_CONNECTIONS,
        };

        let port: u16 = match lookup("PORT") {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("invalid PORT value '{raw}'"))?,
            None => DEFAULT_PORT,
        };

        let host: IpAddr = match lookup("HOST") {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("invalid HOST value '{raw}'"))?,
            None => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        };

        Ok(Self {
            database_url: lookup("DATABASE_URL").filter(|url| !url.is_empty()),
            model_dir: lookup("MODEL_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_MODEL_DIR)),
            db_max_connections,
            bind_addr: SocketAddr::new(host, port),
        })
    }

    pub fn database_url(&self) -> anyhow::Result<&str> {
        self.database_url
            .as_deref()
            .ok_or_else(|| anyhow!("DATABASE_URL must be set to a Postgres instance"))
    }
}

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use tracing::info;

use circle_db::{Database, MemoryStore, Store};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreMode {
    Sqlite,
    Memory,
}

impl FromStr for StoreMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "sqlite" => Ok(Self::Sqlite),
            "memory" => Ok(Self::Memory),
            other => bail!("unknown store mode {:?} (expected \"sqlite\" or \"memory\")", other),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub store: StoreMode,
    pub db_path: PathBuf,
    pub token_ttl: Duration,
}

impl ServerConfig {
    /// Read `CIRCLE_*` variables from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let host = get("CIRCLE_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = get("CIRCLE_PORT")
            .unwrap_or_else(|| "3000".into())
            .parse()
            .context("CIRCLE_PORT must be a port number")?;
        let store: StoreMode = get("CIRCLE_STORE")
            .unwrap_or_else(|| "sqlite".into())
            .parse()?;
        let db_path = PathBuf::from(get("CIRCLE_DB_PATH").unwrap_or_else(|| "circle.db".into()));
        let ttl_hours: u64 = get("CIRCLE_TOKEN_TTL_HOURS")
            .unwrap_or_else(|| "24".into())
            .parse()
            .context("CIRCLE_TOKEN_TTL_HOURS must be a whole number of hours")?;
        if ttl_hours == 0 {
            bail!("CIRCLE_TOKEN_TTL_HOURS must be at least 1");
        }

        Ok(Self {
            host,
            port,
            store,
            db_path,
            token_ttl: Duration::from_secs(ttl_hours * 60 * 60),
        })
    }

    pub fn addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", self.host, self.port))
    }

    pub fn open_store(&self) -> Result<Store> {
        let store = match self.store {
            StoreMode::Sqlite => Store::new(Arc::new(Database::open(&self.db_path)?)),
            StoreMode::Memory => {
                info!("Using in-memory store; data will not survive a restart");
                Store::new(Arc::new(MemoryStore::new()))
            }
        };
        Ok(store.with_token_ttl(self.token_ttl))
    }
}

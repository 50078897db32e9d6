use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
    "secret",
];

/// Server settings, read from `SEGORA_*` environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub db_path: PathBuf,
    pub jwt_secret: String,
    pub storage_dir: PathBuf,
    /// Base URL images are served under, e.g. `https://segora.example`.
    pub public_url: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let jwt_secret = var("SEGORA_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("SEGORA_JWT_SECRET is unset or still a placeholder; set it in .env and restart");
        }

        let host = var("SEGORA_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = var("SEGORA_PORT")
            .unwrap_or_else(|| "3000".into())
            .parse()
            .context("SEGORA_PORT must be a port number")?;
        let addr: SocketAddr = format!("{}:{}", host, port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", host, port))?;

        let db_path = var("SEGORA_DB_PATH").unwrap_or_else(|| "segora.db".into()).into();
        let storage_dir = var("SEGORA_STORAGE_DIR")
            .unwrap_or_else(|| "./storage".into())
            .into();
        let public_url = var("SEGORA_PUBLIC_URL")
            .unwrap_or_else(|| format!("http://localhost:{}", port));

        Ok(Self {
            addr,
            db_path,
            jwt_secret,
            storage_dir,
            public_url,
        })
    }
}

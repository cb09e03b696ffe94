use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;

use crate::common::pagination::DEFAULT_LIMIT;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub db_max_connections: u32,
    pub jwt_secret: String,
    pub jwt_issuer: String,
    /// Notifications are disabled when unset.
    pub nats_url: Option<String>,
    pub default_page_limit: u32,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            db_max_connections: env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .context("DB_MAX_CONNECTIONS must be a valid number")?,
            jwt_secret: env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            jwt_issuer: env::var("JWT_ISSUER")
                .unwrap_or_else(|_| "community-platform".to_string()),
            nats_url: env::var("NATS_URL").ok().filter(|url| !url.is_empty()),
            default_page_limit: match env::var("DEFAULT_PAGE_LIMIT") {
                Ok(raw) => raw
                    .parse()
                    .context("DEFAULT_PAGE_LIMIT must be a valid number")?,
                Err(_) => DEFAULT_LIMIT,
            },
        })
    }
}

//! Environment-driven configuration

use std::env;

use anyhow::{Context, Result};

/// Runtime settings, read once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Externally visible host name, when one is configured
    pub host: Option<String>,

    /// Port the server binds
    pub port: u16,

    /// SQLite database path
    /// Use DATABASE_PATH, or DATABASE_URL with a sqlite: prefix
    pub database_url: String,
}

impl Config {
    /// Read settings from the environment, falling back to dev defaults.
    pub fn from_env() -> Result<Self> {
        let database_url = env::var("DATABASE_PATH")
            .or_else(|_| env::var("DATABASE_URL"))
            .unwrap_or_else(|_| "./data/roster.db".to_string());

        Ok(Self {
            host: env::var("HOST").ok(),

            port: env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .context("Invalid PORT")?,

            database_url,
        })
    }

    /// Base URL clients reach the server on, for the startup log.
    pub fn public_base_url(&self) -> String {
        format!(
            "http://{}:{}",
            self.host.as_deref().unwrap_or("localhost"),
            self.port
        )
    }
}

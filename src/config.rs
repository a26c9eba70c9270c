//! Country Cache configuration management
//!
//! Configuration is built once at startup and handed to the components that
//! need it. Sources, lowest to highest precedence: built-in defaults, an
//! optional TOML file, then the `DB_*` / `DATABASE_URL` environment
//! variables.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main Country Cache configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CountryCacheConfig {
    /// HTTP server configuration
    pub server: ServerConfig,

    /// Record store connection configuration
    pub database: DatabaseConfig,

    /// Upstream provider endpoints
    pub upstream: UpstreamConfig,

    /// Background refresh schedule
    pub refresh: RefreshConfig,

    /// Summary image cache
    pub cache: CacheConfig,
}

impl CountryCacheConfig {
    /// Load configuration from an optional TOML file, then overlay the
    /// process environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.database.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Parse a TOML configuration file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Allowed CORS origins (empty = any origin)
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            cors_origins: Vec::new(),
        }
    }
}

/// Record store connection configuration
///
/// Either a full `url` or the individual MySQL connection parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Full connection string; overrides every other connection field
    pub url: Option<String>,

    pub host: String,

    pub port: u16,

    pub username: String,

    pub password: String,

    /// Database (schema) name
    pub name: String,

    /// Require TLS to the database server
    pub ssl: bool,

    /// Maximum pool size
    pub max_connections: u32,

    /// Connection attempts before giving up at startup
    pub connect_retries: u32,

    /// Delay between connection attempts in milliseconds
    pub retry_delay_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            host: "localhost".to_string(),
            port: 3306,
            username: "root".to_string(),
            password: String::new(),
            name: "country_cache".to_string(),
            ssl: false,
            max_connections: 5,
            connect_retries: 10,
            retry_delay_ms: 5000,
        }
    }
}

impl DatabaseConfig {
    /// Overlay `DATABASE_URL` and the `DB_*` variables resolved by `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("DATABASE_URL").filter(|v| !v.is_empty()) {
            self.url = Some(url);
        }
        if let Some(host) = lookup("DB_HOST") {
            self.host = host;
        }
        if let Some(port) = lookup("DB_PORT") {
            self.port = port
                .parse()
                .map_err(|_| Error::Config(format!("DB_PORT is not a valid port: {}", port)))?;
        }
        if let Some(username) = lookup("DB_USERNAME") {
            self.username = username;
        }
        if let Some(password) = lookup("DB_PASSWORD") {
            self.password = password;
        }
        if let Some(name) = lookup("DB_NAME") {
            self.name = name;
        }
        if let Some(ssl) = lookup("DB_SSL") {
            self.ssl = ssl == "true";
        }
        Ok(())
    }

    /// Connection URL handed to the sqlx pool
    pub fn connection_url(&self) -> Result<String> {
        if let Some(url) = &self.url {
            return Ok(url.clone());
        }

        let mut url = reqwest::Url::parse(&format!(
            "mysql://{}:{}/{}",
            self.host, self.port, self.name
        ))
        .map_err(|e| Error::Config(format!("invalid database host or name: {}", e)))?;

        url.set_username(&self.username)
            .map_err(|_| Error::Config("database username cannot be set".to_string()))?;
        if !self.password.is_empty() {
            url.set_password(Some(&self.password))
                .map_err(|_| Error::Config("database password cannot be set".to_string()))?;
        }

        let ssl_mode = if self.ssl { "REQUIRED" } else { "DISABLED" };
        url.query_pairs_mut().append_pair("ssl-mode", ssl_mode);

        Ok(url.to_string())
    }
}

/// Upstream provider endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Country list endpoint
    pub countries_url: String,

    /// USD exchange-rate endpoint
    pub rates_url: String,

    /// Per-request timeout in seconds (0 = transport default)
    pub timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            countries_url:
                "https://restcountries.com/v2/all?fields=name,capital,region,population,flag,currencies"
                    .to_string(),
            rates_url: "https://open.er-api.com/v6/latest/USD".to_string(),
            timeout_secs: 30,
        }
    }
}

/// Background refresh schedule
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshConfig {
    /// Seconds between background refreshes (0 = disabled)
    pub interval_secs: u64,

    /// Run one refresh as soon as the server starts
    pub on_startup: bool,
}

/// Summary image cache
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Directory holding `summary.png`
    pub dir: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("cache"),
        }
    }
}

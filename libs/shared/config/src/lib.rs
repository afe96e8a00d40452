use std::env;
use tracing::warn;

pub const DEFAULT_DATABASE_PATH: &str = "clinic.db";
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5000;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_path: String,
    pub host: String,
    pub port: u16,
    pub database_busy_timeout_ms: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_path: DEFAULT_DATABASE_PATH.to_string(),
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            database_busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            database_path: env::var("DATABASE_PATH")
                .unwrap_or_else(|_| {
                    warn!("DATABASE_PATH not set, using default {}", DEFAULT_DATABASE_PATH);
                    DEFAULT_DATABASE_PATH.to_string()
                }),
            host: env::var("HOST")
                .unwrap_or_else(|_| {
                    warn!("HOST not set, using default {}", DEFAULT_HOST);
                    DEFAULT_HOST.to_string()
                }),
            port: parse_or_default("PORT", env::var("PORT").ok(), DEFAULT_PORT),
            database_busy_timeout_ms: parse_or_default(
                "DATABASE_BUSY_TIMEOUT_MS",
                env::var("DATABASE_BUSY_TIMEOUT_MS").ok(),
                DEFAULT_BUSY_TIMEOUT_MS,
            ),
        };

        if !config.is_persistent() {
            warn!("Using an in-memory database - appointments will not survive a restart");
        }

        config
    }

    /// `false` when the store lives only in memory.
    pub fn is_persistent(&self) -> bool {
        self.database_path != ":memory:"
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or_default<T>(name: &str, raw: Option<String>, default: T) -> T
where
    T: std::str::FromStr + std::fmt::Display + Copy,
{
    match raw {
        Some(value) => value.trim().parse().unwrap_or_else(|_| {
            warn!("{} has invalid value {:?}, using default {}", name, value, default);
            default
        }),
        None => {
            warn!("{} not set, using default {}", name, default);
            default
        }
    }
}

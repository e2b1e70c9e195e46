//! Command line and environment configuration.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::auth::DEFAULT_TTL_HOURS;

#[derive(Debug, Clone, Parser)]
#[command(name = "bank-ledger", about = "Account ledger service")]
pub struct Config {
    #[arg(long, env = "BANK_BIND", default_value = "127.0.0.1:8080")]
    pub bind: SocketAddr,

    /// Overrides `RUST_LOG` when given.
    #[arg(long, env = "BANK_LOG_LEVEL")]
    pub log_level: Option<tracing::Level>,

    /// JSON snapshot file. Accounts live in memory only when unset.
    #[arg(long, env = "BANK_DATA_FILE")]
    pub data_file: Option<PathBuf>,

    #[arg(long, env = "BANK_TOKEN_SECRET", hide_env_values = true)]
    pub token_secret: String,

    #[arg(long, env = "BANK_TOKEN_TTL_HOURS", default_value_t = DEFAULT_TTL_HOURS)]
    pub token_ttl_hours: i64,

    #[arg(long, env = "BANK_STORE_TIMEOUT_MS", default_value_t = 2000)]
    pub store_timeout_ms: u64,

    #[arg(long, env = "BANK_READ_RETRIES", default_value_t = 2)]
    pub read_retries: u32,

    #[arg(long, env = "BANK_ADMIN_NAME", default_value = "Administrator")]
    pub admin_name: String,

    #[arg(long, env = "BANK_ADMIN_EMAIL", requires = "admin_password")]
    pub admin_email: Option<String>,

    #[arg(long, env = "BANK_ADMIN_PASSWORD", hide_env_values = true, requires = "admin_email")]
    pub admin_password: Option<String>,
}

impl Config {
    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    pub fn token_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.token_ttl_hours)
    }
}

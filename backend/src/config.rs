//! Runtime configuration.
//!
//! Every setting can come from a command-line flag or an environment
//! variable (a `.env` file is loaded first by the binary).

use std::net::{AddrParseError, IpAddr, SocketAddr};
use std::path::PathBuf;

use clap::Args;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_DATABASE: &str = "csv-import.db";
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Where the SQLite database lives.
#[derive(Debug, Clone, Args)]
pub struct StoreConfig {
    /// SQLite database file (created if missing)
    #[arg(long, env = "CSV_IMPORT_DATABASE", default_value = DEFAULT_DATABASE)]
    pub database: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { database: PathBuf::from(DEFAULT_DATABASE) }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Args)]
pub struct ServerConfig {
    /// Interface to bind
    #[arg(long, env = "CSV_IMPORT_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, env = "CSV_IMPORT_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// SQLite database file (created if missing)
    #[arg(long, env = "CSV_IMPORT_DATABASE", default_value = DEFAULT_DATABASE)]
    pub database: PathBuf,

    /// Largest accepted request body, in bytes
    #[arg(long, env = "CSV_IMPORT_MAX_UPLOAD_BYTES", default_value_t = DEFAULT_MAX_UPLOAD_BYTES)]
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            database: PathBuf::from(DEFAULT_DATABASE),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, AddrParseError> {
        let ip: IpAddr = self.host.parse()?;
        Ok(SocketAddr::new(ip, self.port))
    }
}

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use clap::Parser;

use crate::clock::DEFAULT_TIME_URL;
use crate::invoker::ExternalCommand;

/// Server settings, from command-line flags or `LASA_*` environment variables.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "website",
    version,
    about = "YMM-LASA web form for MMSTA separation and circuit list integration"
)]
pub struct Config {
    /// Address the HTTP server listens on
    #[arg(long, env = "LASA_BIND", default_value = "127.0.0.1:3000")]
    pub bind: SocketAddr,

    /// Root directory for uploaded files, one subdirectory per job
    #[arg(long, env = "LASA_UPLOADS_DIR", default_value = "uploads")]
    pub uploads_dir: PathBuf,

    /// Root directory for external process working directories, one per job
    #[arg(long, env = "LASA_JOBS_DIR", default_value = "jobs")]
    pub jobs_dir: PathBuf,

    /// Directory served under /static
    #[arg(long, env = "LASA_STATIC_DIR", default_value = "static")]
    pub static_dir: PathBuf,

    /// Remote UTC time endpoint returning {"datetime": "<ISO-8601>"}
    #[arg(long, env = "LASA_TIME_URL", default_value = DEFAULT_TIME_URL)]
    pub time_url: String,

    /// Time service request timeout in seconds
    #[arg(long, env = "LASA_TIME_TIMEOUT", default_value_t = 5)]
    pub time_timeout: u64,

    /// Instant after which the application refuses service (RFC 3339)
    #[arg(long, env = "LASA_EXPIRES_AT", default_value = "2024-09-10T14:00:00Z")]
    pub expires_at: DateTime<Utc>,

    /// Separation command; the uploaded file path is appended
    #[arg(long, env = "LASA_SEPARATION_CMD", default_value = "python separation.py")]
    pub separation_cmd: ExternalCommand,

    /// Integration command; the separated file and circuit list paths are appended
    #[arg(long, env = "LASA_INTEGRATION_CMD", default_value = "python integration.py")]
    pub integration_cmd: ExternalCommand,

    /// Kill external processes running longer than this many seconds
    #[arg(long, env = "LASA_PROCESS_TIMEOUT")]
    pub process_timeout: Option<u64>,

    /// Maximum request body size in megabytes
    #[arg(long, env = "LASA_MAX_UPLOAD_MB", default_value_t = 200)]
    pub max_upload_mb: usize,
}

impl Config {
    pub fn time_timeout(&self) -> Duration {
        Duration::from_secs(self.time_timeout)
    }

    pub fn process_timeout(&self) -> Option<Duration> {
        self.process_timeout.map(Duration::from_secs)
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb * 1024 * 1024
    }
}

use std::process::ExitStatus;
use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum MongoError {
    #[error("invalid connection settings: {0}")]
    InvalidSettings(String),

    #[error("could not verify connection to {address}: {source}")]
    Unreachable {
        address: String,
        source: mongodb::error::Error,
    },

    #[error("driver error: {0}")]
    Driver(#[from] mongodb::error::Error),

    #[error("failed to start ssh tunnel to {host}: {source}")]
    TunnelSpawn {
        host: String,
        source: std::io::Error,
    },

    #[error("local port {port} for the ssh tunnel is unavailable: {source}")]
    TunnelPortInUse {
        port: u16,
        source: std::io::Error,
    },

    #[error("ssh tunnel to {host} exited before becoming ready ({status})")]
    TunnelExited { host: String, status: ExitStatus },

    #[error("ssh tunnel to {host} did not open local port {port} within {timeout_ms} ms")]
    TunnelTimeout {
        host: String,
        port: u16,
        timeout_ms: u64,
    },
}

//! Thin MongoDB connection wrapper.
//!
//! Loads connection parameters from a [`Config`](crate::Config), optionally
//! opens an SSH tunnel, and hands out the driver's own database and
//! collection handles.

mod client;
mod error;
mod settings;
mod tunnel;

pub use client::Mongo;
pub use error::MongoError;
pub use settings::{
    Credentials, MongoSettings, SshTunnelSettings, DEFAULT_ADDRESS, DEFAULT_CONFIG_LOCATIONS,
    DEFAULT_DATABASE, DEFAULT_PORT, DEFAULT_TIMEOUT_MS,
};
pub use tunnel::SshTunnel;

// Re-export driver types for convenience
pub use mongodb::sync::{Client, Collection, Database};

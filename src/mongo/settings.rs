//! Connection parameters and their config file layout.

use std::fmt;
use std::path::PathBuf;

use toml::{Table, Value};

use super::MongoError;
use crate::config::{Config, FromConfigValue};
use crate::error::Result;

/// Files searched by [`Mongo::from_default_locations`](super::Mongo::from_default_locations).
pub const DEFAULT_CONFIG_LOCATIONS: &[&str] = &["database.toml", "~/.database.toml"];

pub const DEFAULT_ADDRESS: &str = "localhost";
pub const DEFAULT_PORT: u16 = 27017;
pub const DEFAULT_DATABASE: &str = "foil";
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Everything needed to open a connection.
///
/// Read from a [`Config`] with the following layout (every key optional
/// unless the tunnel is enabled):
///
/// ```toml
/// [MongoServer]
/// address = "localhost"
/// port = 27017
/// username = "app"          # optional
/// password = "secret"       # optional, requires username
/// auth_source = "admin"     # optional
///
/// [MongoDatabase]
/// database_name = "foil"
///
/// [MongoClient]
/// serverselectiontimeoutms = 5000
///
/// [SSHTunnel]
/// use_ssh_tunnel = false
/// ssh_host = "someserver.com"
/// ssh_port = 22
/// ssh_username = "user"
/// ssh_key_file = "~/.ssh/ssh_key"
/// remote_port = 27017
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MongoSettings {
    pub address: String,
    pub port: u16,
    pub database_name: String,
    pub server_selection_timeout_ms: u64,
    pub credentials: Option<Credentials>,
    pub ssh_tunnel: Option<SshTunnelSettings>,
}

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: Option<String>,
    pub auth_source: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("auth_source", &self.auth_source)
            .finish()
    }
}

/// SSH port forwarding in front of the database.
///
/// Local port `MongoSettings::port` is forwarded to `remote_port` on the
/// SSH host's loopback interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshTunnelSettings {
    pub ssh_host: String,
    pub ssh_port: u16,
    pub ssh_username: String,
    pub ssh_key_file: PathBuf,
    pub remote_port: u16,
    /// Client binary to run, `ssh` unless overridden.
    pub ssh_program: String,
    pub ready_timeout_ms: u64,
}

impl Default for MongoSettings {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS.to_string(),
            port: DEFAULT_PORT,
            database_name: DEFAULT_DATABASE.to_string(),
            server_selection_timeout_ms: DEFAULT_TIMEOUT_MS,
            credentials: None,
            ssh_tunnel: None,
        }
    }
}

impl MongoSettings {
    /// Reads settings from `config`, falling back to defaults for absent keys.
    ///
    /// Present but malformed values are errors, as are missing tunnel
    /// parameters when `SSHTunnel.use_ssh_tunnel` is set.
    pub fn from_config(config: &Config) -> Result<Self> {
        let username: Option<String> = optional(config, "MongoServer.username")?;
        let password: Option<String> = optional(config, "MongoServer.password")?;
        let auth_source: Option<String> = optional(config, "MongoServer.auth_source")?;

        let credentials = match username {
            Some(username) => Some(Credentials {
                username,
                password,
                auth_source,
            }),
            None if password.is_some() => {
                return Err(MongoError::InvalidSettings(
                    "MongoServer.password is set without MongoServer.username".into(),
                )
                .into());
            }
            None => None,
        };

        let ssh_tunnel = if config.get_bool_or("SSHTunnel.use_ssh_tunnel", false)? {
            Some(SshTunnelSettings {
                ssh_host: config.get("SSHTunnel.ssh_host")?,
                ssh_port: config.get_or("SSHTunnel.ssh_port", 22)?,
                ssh_username: config.get("SSHTunnel.ssh_username")?,
                ssh_key_file: config.get("SSHTunnel.ssh_key_file")?,
                remote_port: config.get_or("SSHTunnel.remote_port", DEFAULT_PORT)?,
                ssh_program: config.get_or("SSHTunnel.ssh_program", "ssh".to_string())?,
                ready_timeout_ms: config.get_or("SSHTunnel.ready_timeout_ms", 10_000)?,
            })
        } else {
            None
        };

        let settings = Self {
            address: config.get_or("MongoServer.address", DEFAULT_ADDRESS.to_string())?,
            port: config.get_or("MongoServer.port", DEFAULT_PORT)?,
            database_name: config
                .get_or("MongoDatabase.database_name", DEFAULT_DATABASE.to_string())?,
            server_selection_timeout_ms: config
                .get_or("MongoClient.serverselectiontimeoutms", DEFAULT_TIMEOUT_MS)?,
            credentials,
            ssh_tunnel,
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Checks the settings without touching the network.
    pub fn validate(&self) -> Result<()> {
        let fail = |msg: &str| -> Result<()> { Err(MongoError::InvalidSettings(msg.to_string()).into()) };

        if self.address.trim().is_empty() {
            return fail("no address set");
        }
        if self.port == 0 {
            return fail("port must be non-zero");
        }
        if self.database_name.is_empty() {
            return fail("no database name set");
        }
        if self.server_selection_timeout_ms == 0 {
            return fail("server selection timeout must be non-zero");
        }
        if let Some(creds) = &self.credentials {
            if creds.username.is_empty() {
                return fail("username must not be empty");
            }
        }
        if let Some(tunnel) = &self.ssh_tunnel {
            if tunnel.ssh_host.trim().is_empty() {
                return fail("ssh tunnel requires ssh_host");
            }
            if tunnel.ssh_username.is_empty() {
                return fail("ssh tunnel requires ssh_username");
            }
            if tunnel.ssh_key_file.as_os_str().is_empty() {
                return fail("ssh tunnel requires ssh_key_file");
            }
            if tunnel.ssh_port == 0 || tunnel.remote_port == 0 {
                return fail("ssh tunnel ports must be non-zero");
            }
        }
        Ok(())
    }

    /// Host and port the driver should dial: the local tunnel end when a
    /// tunnel is configured, the server itself otherwise.
    pub fn connection_target(&self) -> (String, u16) {
        match self.ssh_tunnel {
            Some(_) => ("127.0.0.1".to_string(), self.port),
            None => (self.address.clone(), self.port),
        }
    }

    /// A starter configuration holding every supported key with its
    /// template value, suitable for [`Config::write`].
    pub fn template() -> Config {
        let mut table = Table::new();
        table.insert(
            "MongoServer".into(),
            section([
                ("address", Value::from(DEFAULT_ADDRESS)),
                ("port", Value::from(i64::from(DEFAULT_PORT))),
            ]),
        );
        table.insert(
            "MongoDatabase".into(),
            section([("database_name", Value::from(DEFAULT_DATABASE))]),
        );
        table.insert(
            "MongoClient".into(),
            section([("serverselectiontimeoutms", Value::from(5000i64))]),
        );
        table.insert(
            "SSHTunnel".into(),
            section([
                ("use_ssh_tunnel", Value::from(false)),
                ("ssh_host", Value::from("someserver.com")),
                ("ssh_port", Value::from(22i64)),
                ("ssh_username", Value::from("user")),
                ("remote_port", Value::from(i64::from(DEFAULT_PORT))),
                ("ssh_key_file", Value::from("~/.ssh/ssh_key")),
            ]),
        );
        Config::from_table(table)
    }
}

fn section<const N: usize>(entries: [(&str, Value); N]) -> Value {
    Value::Table(
        entries
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect(),
    )
}

fn optional<T: FromConfigValue>(config: &Config, key: &str) -> Result<Option<T>> {
    if config.contains(key) {
        config.get(key).map(Some)
    } else {
        Ok(None)
    }
}

use std::path::Path;
use std::time::Duration;

use mongodb::bson::doc;
use mongodb::error::ErrorKind;
use mongodb::options::{ClientOptions, Credential, ServerAddress};
use mongodb::sync::{Client, Collection, Database};
use tracing::{debug, info};

use super::settings::{MongoSettings, DEFAULT_CONFIG_LOCATIONS};
use super::tunnel::SshTunnel;
use super::MongoError;
use crate::config::Config;
use crate::error::Result;

/// A verified MongoDB connection.
///
/// Owns the driver client and, when configured, the SSH tunnel it runs
/// through. Both are released when the value is dropped or
/// [`disconnect`](Self::disconnect) is called.
///
/// ```no_run
/// use foil::{bson::doc, Mongo};
///
/// let db = Mongo::from_file(".foilmongo")?;
/// let users = db.collection::<foil::bson::Document>("users");
/// let count = users.count_documents(doc! {}).run().map_err(foil::MongoError::from)?;
/// db.disconnect();
/// # let _ = count;
/// # Ok::<(), foil::FoilError>(())
/// ```
#[derive(Debug)]
pub struct Mongo {
    // Declared before the tunnel so the client is dropped first.
    client: Client,
    settings: MongoSettings,
    tunnel: Option<SshTunnel>,
}

impl Mongo {
    /// Opens and verifies a connection.
    ///
    /// Fails if the settings are invalid, the tunnel cannot be started, or
    /// the server does not answer a `ping` within the server selection
    /// timeout.
    pub fn connect(settings: MongoSettings) -> Result<Self> {
        settings.validate()?;

        let tunnel = match &settings.ssh_tunnel {
            Some(tunnel_settings) => Some(SshTunnel::start(tunnel_settings, settings.port)?),
            None => None,
        };

        let client = Client::with_options(client_options(&settings)).map_err(MongoError::Driver)?;
        let mongo = Self {
            client,
            settings,
            tunnel,
        };
        mongo.ping()?;

        info!(
            address = %mongo.settings.address,
            port = mongo.settings.port,
            database = %mongo.settings.database_name,
            tunneled = mongo.tunnel.is_some(),
            "connected to MongoDB"
        );
        Ok(mongo)
    }

    /// Connects with settings read from `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::connect(MongoSettings::from_config(config)?)
    }

    /// Connects with settings read from a config file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_config(&Config::load(path)?)
    }

    /// Connects using the first of [`DEFAULT_CONFIG_LOCATIONS`] that exists.
    pub fn from_default_locations() -> Result<Self> {
        let config = Config::load_first(DEFAULT_CONFIG_LOCATIONS.iter().copied())?;
        debug!(path = ?config.source_path(), "using database config");
        Self::from_config(&config)
    }

    /// Runs a `ping` against the server.
    ///
    /// A server that cannot be selected within the timeout is reported as
    /// [`MongoError::Unreachable`]; anything else the server or driver
    /// rejects (authentication, for one) as [`MongoError::Driver`].
    pub fn ping(&self) -> Result<()> {
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .run()
            .map_err(|source| {
                let address = format!("{}:{}", self.settings.address, self.settings.port);
                ping_error(address, source)
            })?;
        Ok(())
    }

    /// The raw driver client.
    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn database(&self, name: &str) -> Database {
        self.client.database(name)
    }

    /// The database named by `MongoDatabase.database_name`.
    pub fn default_database(&self) -> Database {
        self.client.database(&self.settings.database_name)
    }

    /// A collection in the default database.
    pub fn collection<T: Send + Sync>(&self, name: &str) -> Collection<T> {
        self.default_database().collection(name)
    }

    pub fn settings(&self) -> &MongoSettings {
        &self.settings
    }

    pub fn is_tunneled(&self) -> bool {
        self.tunnel.is_some()
    }

    /// Shuts the client down, then stops the tunnel, if any.
    ///
    /// Blocks until the driver has closed its pooled connections.
    pub fn disconnect(self) {
        let Self {
            client,
            settings,
            tunnel,
        } = self;
        info!(address = %settings.address, "disconnecting from MongoDB");
        client.shutdown().run();
        drop(tunnel);
    }
}

fn ping_error(address: String, source: mongodb::error::Error) -> MongoError {
    if matches!(*source.kind, ErrorKind::ServerSelection { .. }) {
        MongoError::Unreachable { address, source }
    } else {
        MongoError::Driver(source)
    }
}

fn client_options(settings: &MongoSettings) -> ClientOptions {
    let (host, port) = settings.connection_target();
    let timeout = Duration::from_millis(settings.server_selection_timeout_ms);

    let mut options = ClientOptions::default();
    options.hosts = vec![ServerAddress::Tcp {
        host,
        port: Some(port),
    }];
    options.app_name = Some("foil".to_string());
    options.server_selection_timeout = Some(timeout);
    options.connect_timeout = Some(timeout);

    // Through a tunnel only the forwarded member is reachable.
    if settings.ssh_tunnel.is_some() {
        options.direct_connection = Some(true);
    }

    if let Some(creds) = &settings.credentials {
        let mut credential = Credential::default();
        credential.username = Some(creds.username.clone());
        credential.password = creds.password.clone();
        credential.source = creds.auth_source.clone();
        options.credential = Some(credential);
    }

    options
}

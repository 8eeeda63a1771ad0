use std::path::{Path, PathBuf};

use tracing::debug;

use super::env::EnvSource;
use super::file::FileSource;
use super::resolve::resolve_references;
use super::source::{merge_at_path, ConfigSource, TableSource};
use super::Config;
use crate::error::Result;

/// Builder for loading configuration from files, the environment and
/// in-memory tables.
///
/// Sources are merged in registration order, with later sources overriding
/// earlier ones. Nested tables are merged recursively; other values
/// (including arrays) are replaced entirely.
///
/// ## Variable References
///
/// String values can reference other config values using `${path.to.field}` syntax:
///
/// ```toml
/// [MongoServer]
/// address = "db.example.com"
///
/// [SSHTunnel]
/// ssh_host = "${MongoServer.address}"
/// ```
///
/// Use `$$` to escape a literal `$` (e.g., `$${VAR}` becomes `${VAR}`).
///
/// ## Example
///
/// ```no_run
/// use foil::Config;
///
/// let config = Config::builder()
///     .with_file("database.toml", true)
///     .with_file("~/.database.toml", false)
///     .with_env("FOIL", "__")
///     .build()?;
///
/// let port: u16 = config.get("MongoServer.port")?;
/// # Ok::<(), foil::FoilError>(())
/// ```
#[derive(Debug, Default)]
#[must_use = "builders do nothing until .build() is called"]
pub struct ConfigBuilder {
    sources: Vec<RegisteredSource>,
}

#[derive(Debug)]
struct RegisteredSource {
    source: Box<dyn ConfigSource>,
    origin: Option<PathBuf>,
}

impl ConfigBuilder {
    /// Adds a TOML file to be loaded.
    ///
    /// If `required` is `true`, the build will fail if the file doesn't exist.
    /// Optional files that are missing are silently skipped.
    pub fn with_file(mut self, path: impl AsRef<Path>, required: bool) -> Self {
        let source = FileSource::new(path, required);
        let origin = Some(source.path().to_path_buf());
        self.sources.push(RegisteredSource {
            source: Box::new(source),
            origin,
        });
        self
    }

    /// Loads configuration from environment variables with the given prefix.
    ///
    /// `FOIL__MONGOSERVER__PORT=27018` with prefix `FOIL` and separator `__`
    /// sets `MongoServer.port`. Path segments are lowercased and then matched
    /// against already loaded keys without regard to case.
    ///
    /// Values are stored as the exact strings found in the environment;
    /// [`Config::get`] converts them to the requested type on read.
    ///
    /// # Panics
    ///
    /// Panics if `separator` is empty.
    pub fn with_env(self, prefix: impl Into<String>, separator: impl Into<String>) -> Self {
        self.with_source(EnvSource::new(prefix, separator))
    }

    /// Adds an in-memory table, typically a set of defaults.
    pub fn with_table(self, table: toml::Table) -> Self {
        self.with_source(TableSource::new(table))
    }

    /// Adds a custom source.
    pub fn with_source(mut self, source: impl ConfigSource + 'static) -> Self {
        self.sources.push(RegisteredSource {
            source: Box::new(source),
            origin: None,
        });
        self
    }

    /// Loads, merges and resolves all sources into a [`Config`].
    pub fn build(self) -> Result<Config> {
        let mut merged = toml::Table::new();
        let mut source_path = None;

        for registered in self.sources {
            let entries = registered.source.entries()?;
            if !entries.is_empty() && registered.origin.is_some() {
                source_path = registered.origin;
            }
            for entry in entries {
                merge_at_path(&mut merged, &entry.path, entry.value);
            }
        }

        // Resolve ${...} references after all sources are merged
        resolve_references(&mut merged)?;
        debug!(sections = merged.len(), "configuration built");

        Ok(Config::with_origin(merged, source_path))
    }
}

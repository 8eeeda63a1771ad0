use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use toml::{Table, Value};
use tracing::{debug, info};

use super::builder::ConfigBuilder;
use super::file::expand_home;
use super::source::find_key;
use super::value::FromConfigValue;
use super::ConfigError;
use crate::error::Result;

/// Loaded configuration, addressed by dotted `section.option` keys.
///
/// A `Config` is normally produced once by [`Config::builder`] or
/// [`Config::load`] and only read afterwards. [`init`](Self::init),
/// [`set`](Self::set) and [`write`](Self::write) exist for producing
/// template files.
///
/// ```no_run
/// use foil::Config;
///
/// let config = Config::load("~/.database.toml")?;
/// let address: String = config.get("MongoServer.address")?;
/// let port = config.get_or("MongoServer.port", 27017u16)?;
/// let tunnel = config.get_bool_or("SSHTunnel.use_ssh_tunnel", false)?;
/// # Ok::<(), foil::FoilError>(())
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    table: Table,
    source_path: Option<PathBuf>,
}

impl Config {
    /// Creates a new configuration builder.
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Wraps an already built table.
    pub fn from_table(table: Table) -> Self {
        Self::with_origin(table, None)
    }

    pub(crate) fn with_origin(table: Table, source_path: Option<PathBuf>) -> Self {
        Self { table, source_path }
    }

    /// Loads a single required TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::builder().with_file(path, true).build()
    }

    /// Loads the first candidate file that exists.
    ///
    /// Candidates are tried in order. A candidate that exists but fails to
    /// parse is an error rather than a reason to try the next one.
    pub fn load_first<I, P>(candidates: I) -> Result<Self>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut tried = Vec::new();
        for candidate in candidates {
            let path = expand_home(candidate.as_ref());
            if path.is_file() {
                return Self::load(&path);
            }
            debug!(path = %path.display(), "config candidate not found");
            tried.push(path);
        }
        Err(ConfigError::NoConfigFile(tried).into())
    }

    /// Replaces the contents with a copy of `table`. An empty table resets.
    pub fn init(&mut self, table: Table) {
        self.table = table;
    }

    /// Sets `key` to `value`, creating intermediate sections as needed.
    pub fn set(&mut self, key: &str, value: impl Into<Value>) -> Result<()> {
        let parts = split_key(key)?;
        let (last, sections) = parts.split_last().ok_or_else(|| invalid_key(key))?;

        let mut current = &mut self.table;
        for section in sections {
            let entry = current
                .entry(section.to_string())
                .or_insert_with(|| Value::Table(Table::new()));
            current = entry.as_table_mut().ok_or_else(|| invalid_key(key))?;
        }
        current.insert(last.to_string(), value.into());
        Ok(())
    }

    /// Writes the configuration to `path` as TOML.
    ///
    /// Refuses to replace an existing file unless `force` is set.
    pub fn write(&self, path: impl AsRef<Path>, force: bool) -> Result<()> {
        let path = expand_home(path.as_ref());

        if path.is_dir() {
            return Err(ConfigError::IsDirectory(path).into());
        }

        let parent = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        if !parent.is_dir() {
            return Err(ConfigError::MissingDirectory(parent).into());
        }

        if path.exists() && !force {
            return Err(ConfigError::FileExists(path).into());
        }

        let contents = toml::to_string(&self.table).map_err(ConfigError::SerializeError)?;
        std::fs::write(&path, contents).map_err(|e| ConfigError::WriteError {
            path: path.clone(),
            source: e,
        })?;
        info!(path = %path.display(), "wrote config file");
        Ok(())
    }

    /// Returns the value at `key` converted to `T`.
    ///
    /// Fails if the key is absent or the value cannot be converted.
    pub fn get<T: FromConfigValue>(&self, key: &str) -> Result<T> {
        let value = self
            .lookup(key)?
            .ok_or_else(|| ConfigError::MissingKey(key.to_string()))?;
        Ok(T::from_config_value(key, value)?)
    }

    /// Returns the value at `key` converted to `T`, or `default` if absent.
    ///
    /// A present value that cannot be converted is still an error.
    pub fn get_or<T: FromConfigValue>(&self, key: &str, default: T) -> Result<T> {
        match self.lookup(key)? {
            Some(value) => Ok(T::from_config_value(key, value)?),
            None => {
                debug!(key, "config entry absent, using default");
                Ok(default)
            }
        }
    }

    /// Reads a boolean entry; string values go through [`str_to_bool`](crate::str_to_bool).
    pub fn get_bool(&self, key: &str) -> Result<bool> {
        self.get(key)
    }

    pub fn get_bool_or(&self, key: &str, default: bool) -> Result<bool> {
        self.get_or(key, default)
    }

    /// Returns the raw value at `key`, if present and the key is well formed.
    pub fn get_raw(&self, key: &str) -> Option<&Value> {
        self.lookup(key).ok().flatten()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get_raw(key).is_some()
    }

    /// Names of the top-level sections (entries holding a table).
    pub fn sections(&self) -> impl Iterator<Item = &str> + '_ {
        self.table
            .iter()
            .filter(|(_, v)| v.is_table())
            .map(|(k, _)| k.as_str())
    }

    /// Options of `section` with their values. Empty if the section is absent.
    pub fn options<'a>(&'a self, section: &str) -> impl Iterator<Item = (&'a str, &'a Value)> + 'a {
        self.table
            .get(section)
            .and_then(Value::as_table)
            .into_iter()
            .flat_map(|t| t.iter().map(|(k, v)| (k.as_str(), v)))
    }

    /// Deserializes the whole configuration into `T`.
    pub fn extract<T: DeserializeOwned>(&self) -> Result<T> {
        let value = Value::Table(self.table.clone());
        Ok(value.try_into().map_err(ConfigError::DeserializeError)?)
    }

    pub fn as_table(&self) -> &Table {
        &self.table
    }

    /// The file this configuration was loaded from, if any.
    pub fn source_path(&self) -> Option<&Path> {
        self.source_path.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    fn lookup(&self, key: &str) -> Result<Option<&Value>, ConfigError> {
        let parts = split_key(key)?;
        let (first, rest) = parts.split_first().ok_or_else(|| invalid_key(key))?;

        let mut current = match find_key(&self.table, first) {
            Some(v) => v,
            None => return Ok(None),
        };
        for part in rest {
            current = match current.as_table().and_then(|t| find_key(t, part)) {
                Some(v) => v,
                None => return Ok(None),
            };
        }
        Ok(Some(current))
    }
}

fn split_key(key: &str) -> Result<Vec<&str>, ConfigError> {
    let parts: Vec<&str> = key.split('.').collect();
    if parts.iter().any(|p| p.is_empty()) {
        return Err(invalid_key(key));
    }
    Ok(parts)
}

fn invalid_key(key: &str) -> ConfigError {
    ConfigError::InvalidKey(key.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FoilError;
    use serde::Deserialize;
    use std::io::Write;
    use tempfile::{tempdir, NamedTempFile};

    fn sample() -> Config {
        let table: Table = toml::from_str(
            r#"
            [MongoServer]
            address = "db.example.com"
            port = "27017"

            [SSHTunnel]
            use_ssh_tunnel = "Yes"
            compress = "sometimes"
            ssh_port = 22
            "#,
        )
        .unwrap();
        Config::from_table(table)
    }

    #[test]
    fn test_get_missing_key_fails() {
        let config = sample();
        let result = config.get::<String>("MongoServer.missing_key");

        assert!(matches!(
            result,
            Err(FoilError::Config(ConfigError::MissingKey(ref k))) if k == "MongoServer.missing_key"
        ));
    }

    #[test]
    fn test_get_or_returns_default_when_absent() {
        let config = sample();
        assert_eq!(config.get_or("missing_key", 5i64).unwrap(), 5);
        assert_eq!(config.get_or("Nope.port", 1u16).unwrap(), 1);
    }

    #[test]
    fn test_get_or_still_rejects_bad_values() {
        let config = sample();
        let result = config.get_or("MongoServer.address", 0u16);
        assert!(matches!(
            result,
            Err(FoilError::Config(ConfigError::InvalidValue { .. }))
        ));
    }

    #[test]
    fn test_get_coerces_strings() {
        let config = sample();
        assert_eq!(config.get::<u16>("MongoServer.port").unwrap(), 27017);
        assert_eq!(config.get::<String>("SSHTunnel.ssh_port").unwrap(), "22");
    }

    #[test]
    fn test_get_bool() {
        let config = sample();
        assert!(config.get_bool("SSHTunnel.use_ssh_tunnel").unwrap());
        assert!(!config.get_bool_or("SSHTunnel.absent", false).unwrap());
        assert!(config.get_bool("SSHTunnel.compress").is_err());
        assert!(config.get_bool_or("SSHTunnel.compress", true).is_err());
    }

    #[test]
    fn test_get_bool_is_total_over_tokens() {
        let mut config = Config::default();
        for token in crate::coerce::TRUE_TOKENS {
            config.set("Flags.value", *token).unwrap();
            assert!(config.get_bool("Flags.value").unwrap());
        }
        for token in crate::coerce::FALSE_TOKENS {
            config.set("Flags.value", *token).unwrap();
            assert!(!config.get_bool("Flags.value").unwrap());
        }
    }

    #[test]
    fn test_lookup_ignores_case_as_fallback() {
        let config = sample();
        assert_eq!(config.get::<String>("mongoserver.ADDRESS").unwrap(), "db.example.com");
    }

    #[test]
    fn test_invalid_keys() {
        let config = sample();
        assert!(matches!(
            config.get::<String>("MongoServer..port"),
            Err(FoilError::Config(ConfigError::InvalidKey(_)))
        ));
        assert!(config.get_raw("").is_none());
        assert!(!config.contains("MongoServer.port.extra"));
    }

    #[test]
    fn test_sections_and_options() {
        let config = sample();
        let mut sections: Vec<&str> = config.sections().collect();
        sections.sort();
        assert_eq!(sections, vec!["MongoServer", "SSHTunnel"]);

        let options: Vec<&str> = config.options("MongoServer").map(|(k, _)| k).collect();
        assert_eq!(options.len(), 2);
        assert!(options.contains(&"address"));
        assert_eq!(config.options("Missing").count(), 0);
    }

    #[test]
    fn test_set_creates_sections_and_rejects_scalar_parent() {
        let mut config = Config::default();
        config.set("MongoServer.port", 27017i64).unwrap();
        assert_eq!(config.get::<u16>("MongoServer.port").unwrap(), 27017);

        let result = config.set("MongoServer.port.extra", "x");
        assert!(matches!(
            result,
            Err(FoilError::Config(ConfigError::InvalidKey(_)))
        ));
    }

    #[test]
    fn test_init_replaces_contents() {
        let mut config = sample();
        config.init(Table::new());
        assert!(config.is_empty());

        let table: Table = toml::from_str("[A]\nb = 1").unwrap();
        config.init(table);
        assert_eq!(config.get::<i64>("A.b").unwrap(), 1);
    }

    #[test]
    fn test_write_then_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".foilmongo");

        let config = sample();
        config.write(&path, false).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.as_table(), config.as_table());
        assert_eq!(loaded.source_path(), Some(path.as_path()));
    }

    #[test]
    fn test_write_refuses_existing_file_without_force() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("database.toml");
        std::fs::write(&path, "").unwrap();

        let config = sample();
        assert!(matches!(
            config.write(&path, false),
            Err(FoilError::Config(ConfigError::FileExists(_)))
        ));
        config.write(&path, true).unwrap();
        assert!(!std::fs::read_to_string(&path).unwrap().is_empty());
    }

    #[test]
    fn test_write_rejects_directories() {
        let dir = tempdir().unwrap();
        let config = sample();

        assert!(matches!(
            config.write(dir.path(), true),
            Err(FoilError::Config(ConfigError::IsDirectory(_)))
        ));
        assert!(matches!(
            config.write(dir.path().join("missing/database.toml"), true),
            Err(FoilError::Config(ConfigError::MissingDirectory(_)))
        ));
    }

    #[test]
    fn test_load_first_picks_first_existing() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[MongoDatabase]\ndatabase_name = \"second\"").unwrap();

        let config = Config::load_first([
            Path::new("/nonexistent/database.toml"),
            file.path(),
        ])
        .unwrap();
        assert_eq!(config.get::<String>("MongoDatabase.database_name").unwrap(), "second");
    }

    #[test]
    fn test_load_first_none_exist() {
        let result = Config::load_first(["/nonexistent/a.toml", "/nonexistent/b.toml"]);
        match result {
            Err(FoilError::Config(ConfigError::NoConfigFile(tried))) => assert_eq!(tried.len(), 2),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_extract_typed() {
        #[derive(Debug, Deserialize)]
        #[serde(rename_all = "PascalCase")]
        struct Layout {
            mongo_server: Server,
        }

        #[derive(Debug, Deserialize)]
        struct Server {
            address: String,
        }

        let table: Table = toml::from_str("[MongoServer]\naddress = \"localhost\"").unwrap();
        let layout: Layout = Config::from_table(table).extract().unwrap();
        assert_eq!(layout.mongo_server.address, "localhost");
    }
}

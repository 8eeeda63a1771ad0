use toml::{Table, Value};

use super::ConfigError;

/// A value contributed by a source, placed at `path` in the merged table.
///
/// An empty path means the value is a table merged at the root.
#[derive(Debug, Clone)]
pub struct ConfigEntry {
    pub path: Vec<String>,
    pub value: Value,
}

impl ConfigEntry {
    pub fn root(table: Table) -> Self {
        Self {
            path: Vec::new(),
            value: Value::Table(table),
        }
    }

    pub fn at_path(path: Vec<String>, value: Value) -> Self {
        Self { path, value }
    }
}

/// Something that can contribute configuration entries.
pub trait ConfigSource: Send + Sync + std::fmt::Debug {
    fn entries(&self) -> Result<Vec<ConfigEntry>, ConfigError>;
}

/// An in-memory table, merged at the root.
#[derive(Debug, Clone)]
pub struct TableSource {
    table: Table,
}

impl TableSource {
    pub fn new(table: Table) -> Self {
        Self { table }
    }
}

impl ConfigSource for TableSource {
    fn entries(&self) -> Result<Vec<ConfigEntry>, ConfigError> {
        Ok(vec![ConfigEntry::root(self.table.clone())])
    }
}

/// Merges `value` into `table` at `path`.
///
/// Path segments match existing keys case-insensitively, so an env-derived
/// `mongoserver.port` lands in an already loaded `[MongoServer]` table.
pub fn merge_at_path(table: &mut Table, path: &[String], value: Value) {
    let Some((first, rest)) = path.split_first() else {
        if let Value::Table(overlay) = value {
            deep_merge(table, overlay);
        }
        return;
    };
    let first = &existing_key(table, first);

    if rest.is_empty() {
        match (table.get_mut(first), value) {
            (Some(Value::Table(base)), Value::Table(overlay)) => {
                deep_merge(base, overlay);
            }
            (_, value) => {
                table.insert(first.clone(), value);
            }
        }
        return;
    }

    if !matches!(table.get(first), Some(Value::Table(_))) {
        table.insert(first.clone(), Value::Table(Table::new()));
    }

    if let Some(Value::Table(nested)) = table.get_mut(first) {
        merge_at_path(nested, rest, value);
    }
}

/// Looks up `segment` in `table`: exact match first, then a case-insensitive one.
pub(crate) fn find_key<'a>(table: &'a Table, segment: &str) -> Option<&'a Value> {
    table.get(segment).or_else(|| {
        table
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(segment))
            .map(|(_, v)| v)
    })
}

fn existing_key(table: &Table, segment: &str) -> String {
    if table.contains_key(segment) {
        return segment.to_string();
    }
    table
        .keys()
        .find(|k| k.eq_ignore_ascii_case(segment))
        .cloned()
        .unwrap_or_else(|| segment.to_string())
}

fn deep_merge(base: &mut Table, overlay: Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(Value::Table(base_table)), Value::Table(overlay_table)) => {
                deep_merge(base_table, overlay_table);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_table(toml_str: &str) -> Table {
        toml::from_str(toml_str).unwrap()
    }

    #[test]
    fn test_root_merge_is_recursive() {
        let mut base = make_table(
            r#"
            [MongoServer]
            address = "localhost"
            port = 27017
            "#,
        );
        let overlay = make_table(
            r#"
            [MongoServer]
            port = 27018
            "#,
        );
        merge_at_path(&mut base, &[], Value::Table(overlay));

        assert_eq!(base["MongoServer"]["address"].as_str(), Some("localhost"));
        assert_eq!(base["MongoServer"]["port"].as_integer(), Some(27018));
    }

    #[test]
    fn test_merge_creates_intermediate_tables() {
        let mut base = Table::new();
        let path = vec!["sshtunnel".to_string(), "ssh_port".to_string()];
        merge_at_path(&mut base, &path, Value::Integer(2222));

        assert_eq!(base["sshtunnel"]["ssh_port"].as_integer(), Some(2222));
    }

    #[test]
    fn test_merge_replaces_scalar_with_table() {
        let mut base = make_table("section = \"flat\"");
        let path = vec!["section".to_string(), "option".to_string()];
        merge_at_path(&mut base, &path, Value::String("nested".into()));

        assert_eq!(base["section"]["option"].as_str(), Some("nested"));
    }

    #[test]
    fn test_merge_matches_existing_keys_ignoring_case() {
        let mut base = make_table(
            r#"
            [MongoServer]
            port = 27017
            "#,
        );
        let path = vec!["mongoserver".to_string(), "port".to_string()];
        merge_at_path(&mut base, &path, Value::Integer(27020));

        assert_eq!(base["MongoServer"]["port"].as_integer(), Some(27020));
        assert!(!base.contains_key("mongoserver"));
    }

    #[test]
    fn test_table_source_yields_root_entry() {
        let source = TableSource::new(make_table("key = 1"));
        let entries = source.entries().unwrap();

        assert_eq!(entries.len(), 1);
        assert!(entries[0].path.is_empty());
    }
}

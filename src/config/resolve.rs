//! Variable reference resolution for configuration values.
//!
//! Supports `${section.option}` syntax for cross-referencing values within config.
//! Use `$${...}` to escape and produce a literal `${...}`.

use std::collections::HashMap;

use super::source::find_key;
use super::ConfigError;
use toml::{Table, Value};

/// Resolves all `${path.to.field}` references in the configuration table.
///
/// Referenced strings are resolved recursively against the unresolved table,
/// so escapes are interpreted exactly once. A reference chain that returns
/// to a path already being resolved is reported as circular. Path segments
/// match keys the same way [`Config::get`](super::Config::get) does.
pub fn resolve_references(table: &mut Table) -> Result<(), ConfigError> {
    let root = table.clone();
    let mut resolver = Resolver {
        root: &root,
        stack: Vec::new(),
        resolved: HashMap::new(),
    };
    resolver.resolve_table(table)
}

struct Resolver<'a> {
    root: &'a Table,
    /// Paths whose expansion is in progress.
    stack: Vec<String>,
    /// Fully expanded referenced paths; each is expanded at most once.
    resolved: HashMap<String, String>,
}

impl Resolver<'_> {
    fn resolve_table(&mut self, table: &mut Table) -> Result<(), ConfigError> {
        for (_key, value) in table.iter_mut() {
            self.resolve_value(value)?;
        }
        Ok(())
    }

    fn resolve_value(&mut self, value: &mut Value) -> Result<(), ConfigError> {
        match value {
            Value::String(s) => {
                *s = self.resolve_string(s)?;
                Ok(())
            }
            Value::Table(t) => self.resolve_table(t),
            Value::Array(arr) => {
                for item in arr.iter_mut() {
                    self.resolve_value(item)?;
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Expands every `${...}` reference in `s`, handling `$$` escapes.
    fn resolve_string(&mut self, s: &str) -> Result<String, ConfigError> {
        let mut result = String::with_capacity(s.len());
        let mut chars = s.chars().peekable();

        while let Some(ch) = chars.next() {
            if ch != '$' {
                result.push(ch);
                continue;
            }
            match chars.peek() {
                Some('$') => {
                    chars.next();
                    result.push('$');
                }
                Some('{') => {
                    chars.next();
                    let path =
                        consume_until(&mut chars, '}').ok_or(ConfigError::UnclosedReference)?;
                    result.push_str(&self.lookup_path(&path)?);
                }
                _ => result.push('$'),
            }
        }

        Ok(result)
    }

    /// Looks up a dotted path and returns its fully resolved string form.
    fn lookup_path(&mut self, path: &str) -> Result<String, ConfigError> {
        if let Some(done) = self.resolved.get(path) {
            return Ok(done.clone());
        }

        let root = self.root;
        let resolved = match find_path(root, path)? {
            Value::String(s) => {
                if self.stack.iter().any(|p| p == path) {
                    return Err(ConfigError::CircularReference);
                }
                self.stack.push(path.to_string());
                let resolved = self.resolve_string(s);
                self.stack.pop();
                resolved?
            }
            Value::Integer(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Boolean(b) => b.to_string(),
            Value::Datetime(dt) => dt.to_string(),
            Value::Array(_) | Value::Table(_) => {
                return Err(ConfigError::NonScalarReference(path.to_string()));
            }
        };

        self.resolved.insert(path.to_string(), resolved.clone());
        Ok(resolved)
    }
}

/// Consumes characters until the delimiter, returning the collected string.
fn consume_until(chars: &mut std::iter::Peekable<std::str::Chars>, delim: char) -> Option<String> {
    let mut result = String::new();
    for ch in chars.by_ref() {
        if ch == delim {
            return Some(result);
        }
        result.push(ch);
    }
    None
}

fn find_path<'a>(root: &'a Table, path: &str) -> Result<&'a Value, ConfigError> {
    let parts: Vec<&str> = path.split('.').collect();
    if parts.iter().any(|p| p.is_empty()) {
        return Err(ConfigError::InvalidReferencePath(path.to_string()));
    }

    let not_found = || ConfigError::ReferenceNotFound(path.to_string());

    let mut current = find_key(root, parts[0]).ok_or_else(not_found)?;
    for part in &parts[1..] {
        current = current
            .as_table()
            .and_then(|t| find_key(t, part))
            .ok_or_else(not_found)?;
    }
    Ok(current)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_table(toml_str: &str) -> Table {
        toml::from_str(toml_str).unwrap()
    }

    #[test]
    fn test_simple_reference() {
        let mut table = make_table(
            r#"
            host = "localhost"
            url = "mongodb://${host}/"
            "#,
        );
        resolve_references(&mut table).unwrap();
        assert_eq!(table["url"].as_str().unwrap(), "mongodb://localhost/");
    }

    #[test]
    fn test_nested_path_with_integer() {
        let mut table = make_table(
            r#"
            [MongoServer]
            address = "db.example.com"
            port = 27017

            [Report]
            target = "${MongoServer.address}:${MongoServer.port}"
            "#,
        );
        resolve_references(&mut table).unwrap();
        assert_eq!(
            table["Report"]["target"].as_str().unwrap(),
            "db.example.com:27017"
        );
    }

    #[test]
    fn test_chained_references() {
        let mut table = make_table(
            r#"
            a = "hello"
            b = "${a} world"
            c = "${b}!"
            "#,
        );
        resolve_references(&mut table).unwrap();
        assert_eq!(table["c"].as_str().unwrap(), "hello world!");
    }

    #[test]
    fn test_escape_survives_other_references() {
        let mut table = make_table(
            r#"
            home = "/home/foil"
            key = "${home}/.ssh/key"
            literal = "use $${VAR} for env vars"
            "#,
        );
        resolve_references(&mut table).unwrap();
        assert_eq!(table["key"].as_str().unwrap(), "/home/foil/.ssh/key");
        assert_eq!(table["literal"].as_str().unwrap(), "use ${VAR} for env vars");
    }

    #[test]
    fn test_lone_dollar_is_kept() {
        let mut table = make_table(r#"password = "pa$s""#);
        resolve_references(&mut table).unwrap();
        assert_eq!(table["password"].as_str().unwrap(), "pa$s");
    }

    #[test]
    fn test_circular_reference() {
        let mut table = make_table(
            r#"
            a = "${b}"
            b = "${a}"
            "#,
        );
        let result = resolve_references(&mut table);
        assert!(matches!(result, Err(ConfigError::CircularReference)));
    }

    #[test]
    fn test_self_reference() {
        let mut table = make_table(r#"a = "x${a}""#);
        let result = resolve_references(&mut table);
        assert!(matches!(result, Err(ConfigError::CircularReference)));
    }

    #[test]
    fn test_missing_reference() {
        let mut table = make_table(r#"url = "${nonexistent.path}""#);
        let result = resolve_references(&mut table);
        assert!(matches!(result, Err(ConfigError::ReferenceNotFound(_))));
    }

    #[test]
    fn test_invalid_and_unclosed_references() {
        let mut table = make_table(r#"url = "${a..b}""#);
        assert!(matches!(
            resolve_references(&mut table),
            Err(ConfigError::InvalidReferencePath(_))
        ));

        let mut table = make_table(r#"url = "${host""#);
        assert!(matches!(
            resolve_references(&mut table),
            Err(ConfigError::UnclosedReference)
        ));
    }

    #[test]
    fn test_non_scalar_reference() {
        let mut table = make_table(
            r#"
            value = "${section}"
            [section]
            option = 1
            "#,
        );
        assert!(matches!(
            resolve_references(&mut table),
            Err(ConfigError::NonScalarReference(_))
        ));
    }

    #[test]
    fn test_reference_matches_keys_ignoring_case() {
        let mut table = make_table(
            r#"
            [MongoServer]
            address = "db.example.com"

            [SSHTunnel]
            ssh_host = "${mongoserver.ADDRESS}"
            "#,
        );
        resolve_references(&mut table).unwrap();
        assert_eq!(table["SSHTunnel"]["ssh_host"].as_str().unwrap(), "db.example.com");
    }

    #[test]
    fn test_doubling_chain_resolves() {
        // Each level references the previous one twice, so 40 levels would take
        // 2^40 lookups if resolved paths were expanded again on every use.
        let mut source = String::from("a0 = \"\"\n");
        for i in 1..=40 {
            source.push_str(&format!("a{i} = \"${{a{prev}}}${{a{prev}}}\"\n", prev = i - 1));
        }
        source.push_str("b0 = \"x\"\nb1 = \"${b0}${b0}\"\nb2 = \"${b1}${b1}\"\n");
        let mut table = make_table(&source);

        resolve_references(&mut table).unwrap();
        assert_eq!(table["a40"].as_str().unwrap(), "");
        assert_eq!(table["b2"].as_str().unwrap(), "xxxx");
    }

    #[test]
    fn test_array_values() {
        let mut table = make_table(
            r#"
            base = "/data"
            paths = ["${base}/a", "${base}/b"]
            "#,
        );
        resolve_references(&mut table).unwrap();
        let paths = table["paths"].as_array().unwrap();
        assert_eq!(paths[0].as_str().unwrap(), "/data/a");
        assert_eq!(paths[1].as_str().unwrap(), "/data/b");
    }
}

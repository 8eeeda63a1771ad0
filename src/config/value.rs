//! Conversion of stored TOML values into requested Rust types.

use std::path::{Path, PathBuf};

use toml::Value;

use super::ConfigError;
use crate::coerce::str_to_bool;

/// Types that can be read out of a config entry.
///
/// `key` is only used to build error messages.
pub trait FromConfigValue: Sized {
    fn from_config_value(key: &str, value: &Value) -> Result<Self, ConfigError>;
}

/// Renders a scalar the way it would appear in the config file, without
/// quotes for strings. Arrays and tables have no scalar form.
pub(crate) fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Integer(i) => Some(i.to_string()),
        Value::Float(f) => Some(f.to_string()),
        Value::Boolean(b) => Some(b.to_string()),
        Value::Datetime(dt) => Some(dt.to_string()),
        Value::Array(_) | Value::Table(_) => None,
    }
}

fn invalid(key: &str, value: &Value, expected: &'static str) -> ConfigError {
    let value = scalar_to_string(value).unwrap_or_else(|| value.to_string());
    ConfigError::InvalidValue {
        key: key.to_string(),
        value,
        expected,
    }
}

impl FromConfigValue for String {
    fn from_config_value(key: &str, value: &Value) -> Result<Self, ConfigError> {
        scalar_to_string(value).ok_or_else(|| invalid(key, value, "string"))
    }
}

impl FromConfigValue for PathBuf {
    fn from_config_value(key: &str, value: &Value) -> Result<Self, ConfigError> {
        match value {
            Value::String(s) => Ok(super::file::expand_home(Path::new(s))),
            _ => Err(invalid(key, value, "path")),
        }
    }
}

impl FromConfigValue for bool {
    fn from_config_value(key: &str, value: &Value) -> Result<Self, ConfigError> {
        match value {
            Value::Boolean(b) => Ok(*b),
            Value::String(_) | Value::Integer(_) => scalar_to_string(value)
                .and_then(|s| str_to_bool(&s).ok())
                .ok_or_else(|| invalid(key, value, "boolean")),
            _ => Err(invalid(key, value, "boolean")),
        }
    }
}

impl FromConfigValue for i64 {
    fn from_config_value(key: &str, value: &Value) -> Result<Self, ConfigError> {
        match value {
            Value::Integer(i) => Ok(*i),
            Value::String(s) => s.trim().parse().map_err(|_| invalid(key, value, "integer")),
            _ => Err(invalid(key, value, "integer")),
        }
    }
}

macro_rules! impl_from_config_int {
    ($($ty:ty),*) => {
        $(
            impl FromConfigValue for $ty {
                fn from_config_value(key: &str, value: &Value) -> Result<Self, ConfigError> {
                    let wide = i64::from_config_value(key, value)?;
                    <$ty>::try_from(wide).map_err(|_| invalid(key, value, stringify!($ty)))
                }
            }
        )*
    };
}

impl_from_config_int!(i32, u16, u32, u64, usize);

impl FromConfigValue for f64 {
    fn from_config_value(key: &str, value: &Value) -> Result<Self, ConfigError> {
        match value {
            Value::Float(f) => Ok(*f),
            Value::Integer(i) => Ok(*i as f64),
            Value::String(s) => s.trim().parse().map_err(|_| invalid(key, value, "float")),
            _ => Err(invalid(key, value, "float")),
        }
    }
}

impl FromConfigValue for Value {
    fn from_config_value(_key: &str, value: &Value) -> Result<Self, ConfigError> {
        Ok(value.clone())
    }
}

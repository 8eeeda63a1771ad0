//! Configuration loading and typed access.

mod builder;
mod env;
mod error;
mod file;
mod resolve;
mod source;
mod store;
mod value;

pub use builder::ConfigBuilder;
pub use env::EnvSource;
pub use error::ConfigError;
pub use file::{expand_home, FileSource};
pub use source::{ConfigEntry, ConfigSource, TableSource};
pub use store::Config;
pub use value::FromConfigValue;

//! Common wrapper library: config file access, boolean coercion and a
//! MongoDB connection wrapper.

mod coerce;
pub mod config;
mod error;
pub mod mongo;

pub use coerce::{str_to_bool, FALSE_TOKENS, TRUE_TOKENS};
pub use config::{Config, ConfigError};
pub use error::{FoilError, Result};
pub use mongo::{Mongo, MongoError, MongoSettings};
pub use mongodb::bson;

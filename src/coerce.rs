//! String to boolean coercion.

use crate::error::{FoilError, Result};

/// Tokens read as `true`.
pub const TRUE_TOKENS: &[&str] = &["TRUE", "True", "true", "1", "Y", "y", "YES", "Yes", "yes"];

/// Tokens read as `false`.
pub const FALSE_TOKENS: &[&str] = &["FALSE", "False", "false", "0", "N", "n", "NO", "No", "no"];

/// Converts a string into a `bool`.
///
/// Surrounding whitespace is ignored. Only the spellings listed in
/// [`TRUE_TOKENS`] and [`FALSE_TOKENS`] are accepted; mixed casings such as
/// `tRuE` are rejected along with everything else.
///
/// ```
/// assert!(foil::str_to_bool(" yes ").unwrap());
/// assert!(!foil::str_to_bool("N").unwrap());
/// assert!(foil::str_to_bool("banana").is_err());
/// ```
pub fn str_to_bool(s: &str) -> Result<bool> {
    let token = s.trim();
    if TRUE_TOKENS.contains(&token) {
        Ok(true)
    } else if FALSE_TOKENS.contains(&token) {
        Ok(false)
    } else {
        Err(FoilError::InvalidBool(s.to_string()))
    }
}

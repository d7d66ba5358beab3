//! Configuration for the table layer
//!
//! Holds the limits the catalog and table store enforce and the literal
//! parsing policy used by filters and updates.

use std::path::PathBuf;

use crate::table::INITIAL_ROW_CAPACITY;
use crate::types::LiteralPolicy;

/// Longest table name whose `<name>.tbl` file still fits a 255-byte file name.
pub const MAX_TABLE_NAME_LEN: usize = 255 - ".tbl".len();

/// Tabvault core configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding `.tbl` files
    pub data_dir: PathBuf,
    /// Row capacity of newly created tables
    pub initial_row_capacity: usize,
    /// Maximum number of tables held in a catalog
    pub max_tables: usize,
    /// Maximum table name length in bytes
    pub max_name_len: usize,
    /// How malformed numeric literals are treated
    pub literal_policy: LiteralPolicy,
}

impl Config {
    /// Strict literals, ten in-memory tables, `data/` directory.
    pub fn standard() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            initial_row_capacity: INITIAL_ROW_CAPACITY,
            max_tables: 10,
            max_name_len: MAX_TABLE_NAME_LEN,
            literal_policy: LiteralPolicy::Strict,
        }
    }

    /// Like [`Config::standard`] but malformed numeric literals read as zero.
    pub fn compat() -> Self {
        Self {
            literal_policy: LiteralPolicy::Lenient,
            ..Self::standard()
        }
    }

    /// Same limits, different data directory.
    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    /// Validate all configuration parameters
    pub fn validate(&self) -> Result<(), String> {
        if self.data_dir.as_os_str().is_empty() {
            return Err("data_dir must not be empty".into());
        }
        if self.initial_row_capacity == 0 {
            return Err("initial_row_capacity must be > 0".into());
        }
        if self.max_tables == 0 {
            return Err("max_tables must be > 0".into());
        }
        if self.max_name_len == 0 || self.max_name_len > MAX_TABLE_NAME_LEN {
            return Err(format!("max_name_len must be in [1, {}]", MAX_TABLE_NAME_LEN));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self { Self::standard() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_valid() {
        assert!(Config::standard().validate().is_ok());
        assert!(Config::compat().validate().is_ok());
        assert_eq!(Config::default().literal_policy, LiteralPolicy::Strict);
        assert_eq!(Config::compat().literal_policy, LiteralPolicy::Lenient);
    }

    #[test]
    fn test_invalid_values() {
        let mut c = Config::default();
        c.max_tables = 0;
        assert!(c.validate().is_err());

        let mut c = Config::default();
        c.max_name_len = 1000;
        assert!(c.validate().is_err());

        let c = Config::default().with_data_dir("");
        assert!(c.validate().is_err());
    }
}

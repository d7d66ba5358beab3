//! In-memory table catalog
//!
//! A bounded, name-keyed set of tables a client works on between loads and
//! saves, backed by the [`LocalStore`] at `Config::data_dir`. The catalog
//! owns its tables; callers borrow them by name. Row operations issued
//! through the catalog parse literals under the configured policy.

use std::io;
use std::path::PathBuf;

use hashbrown::HashMap;

use crate::config::Config;
use crate::error::{TabError, TabResult};
use crate::predicate::Predicate;
use crate::store::LocalStore;
use crate::table::Table;
use crate::types::{Attribute, LiteralPolicy};

/// Name-keyed set of in-memory tables.
#[derive(Debug)]
pub struct Catalog {
    tables: HashMap<String, Table>,
    store: LocalStore,
    limit: usize,
    max_name_len: usize,
    initial_row_capacity: usize,
    literal_policy: LiteralPolicy,
}

impl Catalog {
    /// Validate `config` and open its data directory.
    pub fn open(config: &Config) -> TabResult<Self> {
        config.validate().map_err(|reason| TabError::Io {
            path: None,
            kind: io::ErrorKind::InvalidInput,
            message: format!("Invalid configuration: {}", reason),
        })?;
        let store = LocalStore::from_config(config)?;
        Ok(Self {
            tables: HashMap::with_capacity(config.max_tables),
            store,
            limit: config.max_tables,
            max_name_len: config.max_name_len,
            initial_row_capacity: config.initial_row_capacity,
            literal_policy: config.literal_policy,
        })
    }

    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    pub fn literal_policy(&self) -> LiteralPolicy {
        self.literal_policy
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    fn check_name(&self, name: &str) -> TabResult<()> {
        if name.len() > self.max_name_len {
            return Err(TabError::InvalidSchema {
                reason: format!("table name is {} bytes, limit is {}", name.len(), self.max_name_len),
            });
        }
        Ok(())
    }

    /// Create an empty table and return a handle to it.
    pub fn create(&mut self, name: &str, attributes: Vec<Attribute>) -> TabResult<&mut Table> {
        self.check_name(name)?;
        if self.tables.contains_key(name) {
            return Err(TabError::DuplicateName { kind: "table", name: name.to_string() });
        }
        if self.tables.len() >= self.limit {
            return Err(TabError::CatalogFull { limit: self.limit });
        }
        let table = Table::with_row_capacity(name, attributes, self.initial_row_capacity)?;
        log::debug!("Created table '{}' ({} attributes)", name, table.attribute_count());
        Ok(self.tables.entry(name.to_string()).or_insert(table))
    }

    /// Add a table, replacing any table of the same name.
    ///
    /// Returns the replaced table. The limit only applies to new names.
    pub fn insert(&mut self, table: Table) -> TabResult<Option<Table>> {
        self.check_name(table.name())?;
        if !self.tables.contains_key(table.name()) && self.tables.len() >= self.limit {
            return Err(TabError::CatalogFull { limit: self.limit });
        }
        Ok(self.tables.insert(table.name().to_string(), table))
    }

    pub fn get(&self, name: &str) -> TabResult<&Table> {
        self.tables.get(name).ok_or_else(|| TabError::TableNotFound { name: name.to_string() })
    }

    pub fn get_mut(&mut self, name: &str) -> TabResult<&mut Table> {
        self.tables.get_mut(name).ok_or_else(|| TabError::TableNotFound { name: name.to_string() })
    }

    /// Remove a table from memory. Its file, if any, is untouched.
    pub fn drop(&mut self, name: &str) -> TabResult<Table> {
        self.tables.remove(name).ok_or_else(|| TabError::TableNotFound { name: name.to_string() })
    }

    /// Append a row given as text.
    pub fn insert_row(&mut self, name: &str, literals: &[&str]) -> TabResult<()> {
        let policy = self.literal_policy;
        self.get_mut(name)?.insert_literals(literals, policy)
    }

    /// Copy of `name` holding only the rows matching `predicate`.
    pub fn select_where(&self, name: &str, predicate: &Predicate) -> TabResult<Table> {
        self.get(name)?.select(predicate, self.literal_policy)
    }

    /// Delete the rows of `name` matching `predicate`.
    pub fn delete_where(&mut self, name: &str, predicate: &Predicate) -> TabResult<usize> {
        let policy = self.literal_policy;
        self.get_mut(name)?.delete(predicate, policy)
    }

    /// Set `target` to `new_literal` in the rows of `name` matching `predicate`.
    pub fn update_where(&mut self, name: &str, target: &str, new_literal: &str, predicate: &Predicate) -> TabResult<usize> {
        let policy = self.literal_policy;
        self.get_mut(name)?.update(target, new_literal, predicate, policy)
    }

    /// Write `name` to its file in the data directory.
    pub fn save(&self, name: &str) -> TabResult<PathBuf> {
        self.store.save(self.get(name)?)
    }

    /// Read `name` from the data directory, replacing any in-memory copy.
    pub fn load(&mut self, name: &str) -> TabResult<&mut Table> {
        let table = self.store.load(name)?;
        let key = table.name().to_string();
        self.insert(table)?;
        self.get_mut(&key)
    }

    /// Rename a table in memory.
    pub fn rename(&mut self, old: &str, new: &str) -> TabResult<()> {
        self.check_name(new)?;
        if old == new {
            return self.get(old).map(|_| ());
        }
        if self.tables.contains_key(new) {
            return Err(TabError::DuplicateName { kind: "table", name: new.to_string() });
        }
        let mut table = self.drop(old)?;
        if let Err(e) = table.rename(new) {
            self.tables.insert(old.to_string(), table);
            return Err(e);
        }
        self.tables.insert(new.to_string(), table);
        Ok(())
    }

    /// Rename a table, save it under the new name, and delete the old file.
    ///
    /// A missing old file is not an error.
    pub fn rename_persisted(&mut self, old: &str, new: &str) -> TabResult<()> {
        self.rename(old, new)?;
        self.save(new)?;
        match self.store.delete(old) {
            Ok(()) | Err(TabError::TableNotFound { .. }) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Table names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.keys().cloned().collect();
        names.sort();
        names
    }
}

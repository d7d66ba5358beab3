//! Local table-file store
//!
//! A data directory holding one `<name>.tbl` file per table. Files are
//! written with [`write_atomic`], so a crash mid-save leaves the previous
//! version in place. Hidden files (in-progress `.part` writes) are never
//! listed.

use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::codec;
use crate::config::Config;
use crate::durability::{write_atomic, AtomicFile};
use crate::error::{TabError, TabResult};
use crate::table::Table;

/// Extension of table files, without the dot.
pub const TABLE_EXTENSION: &str = "tbl";

/// File name a table is stored and transferred under.
///
/// Appends `.tbl` unless the name already ends with it (ignoring case).
pub fn wire_name(name: &str) -> String {
    if has_table_extension(name) {
        name.to_string()
    } else {
        format!("{}.{}", name, TABLE_EXTENSION)
    }
}

fn has_table_extension(name: &str) -> bool {
    let suffix_len = TABLE_EXTENSION.len() + 1;
    name.len() > suffix_len
        && name.is_char_boundary(name.len() - suffix_len)
        && name[name.len() - suffix_len..].eq_ignore_ascii_case(".tbl")
}

/// Directory of serialized tables.
#[derive(Debug, Clone)]
pub struct LocalStore {
    dir: PathBuf,
}

impl LocalStore {
    /// Open the store, creating the directory if it does not exist.
    pub fn open<P: AsRef<Path>>(dir: P) -> TabResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)
            .map_err(|e| TabError::io_at(&dir, e, "Failed to create data directory"))?;
        Ok(Self { dir })
    }

    /// Open the store at `config.data_dir`.
    pub fn from_config(config: &Config) -> TabResult<Self> {
        Self::open(&config.data_dir)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file backing `name`.
    ///
    /// Names that would leave the directory (path separators, NUL) are
    /// rejected.
    pub fn path_for(&self, name: &str) -> TabResult<PathBuf> {
        if name.is_empty() || name.contains(['/', '\\', '\0']) {
            return Err(TabError::InvalidSchema {
                reason: format!("'{}' cannot be used as a table file name", name.escape_debug()),
            });
        }
        Ok(self.dir.join(wire_name(name)))
    }

    /// Serialize `table` and replace its file. Returns the file path.
    pub fn save(&self, table: &Table) -> TabResult<PathBuf> {
        let path = self.path_for(table.name())?;
        let mut file = AtomicFile::create(&path)?;
        {
            let mut writer = BufWriter::new(&mut file);
            codec::encode_to(table, &mut writer)
                .and_then(|_| writer.flush())
                .map_err(|e| TabError::io_at(&path, e, "Failed to write table file"))?;
        }
        let written = file.written();
        let path = file.commit()?;
        log::debug!("Saved table '{}' ({} bytes) to {}", table.name(), written, path.display());
        Ok(path)
    }

    /// Load the table stored under `name`.
    pub fn load(&self, name: &str) -> TabResult<Table> {
        let bytes = self.read_bytes(name)?;
        codec::decode(&bytes)
    }

    /// Load a table file from an arbitrary path.
    pub fn load_path<P: AsRef<Path>>(path: P) -> TabResult<Table> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|e| TabError::io_at(path, e, "Failed to read table file"))?;
        codec::decode(&bytes)
    }

    /// Raw contents of the file stored under `name`.
    pub fn read_bytes(&self, name: &str) -> TabResult<Vec<u8>> {
        let path = self.path_for(name)?;
        fs::read(&path).map_err(|e| not_found_or_io(name, &path, e, "Failed to read table file"))
    }

    /// Replace the file stored under `name` with `bytes` verbatim.
    pub fn write_bytes(&self, name: &str, bytes: &[u8]) -> TabResult<PathBuf> {
        write_atomic(self.path_for(name)?, bytes)
    }

    /// Remove the file stored under `name`.
    pub fn delete(&self, name: &str) -> TabResult<()> {
        let path = self.path_for(name)?;
        fs::remove_file(&path).map_err(|e| not_found_or_io(name, &path, e, "Failed to delete table file"))?;
        log::info!("Deleted table file {}", path.display());
        Ok(())
    }

    /// File names of stored tables, sorted.
    pub fn list(&self) -> TabResult<Vec<String>> {
        let entries = fs::read_dir(&self.dir)
            .map_err(|e| TabError::io_at(&self.dir, e, "Failed to read data directory"))?;

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| TabError::io_at(&self.dir, e, "Failed to read directory entry"))?;
            if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if !name.starts_with('.') && has_table_extension(&name) {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }
}

fn not_found_or_io(name: &str, path: &Path, err: io::Error, context: &str) -> TabError {
    if err.kind() == io::ErrorKind::NotFound {
        TabError::TableNotFound { name: name.to_string() }
    } else {
        TabError::io_at(path, err, context)
    }
}

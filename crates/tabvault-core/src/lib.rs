//! Tabvault Core: typed in-memory tables with a native little-endian file format
//!
//! A table is a named schema of typed attributes plus rows of values. Tables
//! are manipulated in memory and serialized to a compact little-endian binary
//! format for storage on disk or transfer over the network.
//!
//! # Architecture
//!
//! - **Tables**: schema validation, predicate-driven delete/update/select,
//!   column add and drop, all-or-nothing on failure
//! - **Codec**: bit-exact encode, bounds-checked decode of untrusted bytes
//! - **Local store**: one `.tbl` file per table, replaced atomically
//! - **Catalog**: bounded name-keyed set of tables held in memory
//!
//! Networking lives in a separate crate (`tabvault-net`).

pub mod catalog;
pub mod codec;
pub mod config;
pub mod durability;
pub mod error;
pub mod predicate;
pub mod store;
pub mod table;
pub mod types;

// Re-export key types for convenience
pub use catalog::Catalog;
pub use config::Config;
pub use error::{TabError, TabResult};
pub use predicate::{CompareOp, Predicate};
pub use store::{wire_name, LocalStore};
pub use table::Table;
pub use types::{Attribute, DataType, LiteralPolicy, Row, Value};

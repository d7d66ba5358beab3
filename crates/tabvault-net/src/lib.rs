//! Tabvault Net — moving table files between processes
//!
//! A small TCP protocol for listing, fetching and pushing table files, a
//! server that serves a data directory to a bounded number of concurrent
//! connections, and a client that pairs the protocol with a local store.
//!
//! # Architecture
//!
//! - **Protocol**: line commands (`LIST`, `GET`) and a length-framed push,
//!   every payload preceded by its exact length
//! - **Dispatcher**: one accept thread, one thread per admitted connection,
//!   admission bounded by a slot table, drain-on-shutdown
//! - **Client**: one connection per request, downloads committed atomically

pub mod client;
pub mod config;
pub mod handlers;
pub mod protocol;
pub mod server;
pub mod slots;

// Re-export key types for convenience
pub use client::{PushReceipt, TransferClient};
pub use config::{ClientConfig, ServerConfig};
pub use protocol::{PushAck, RequestKind};
pub use server::{Server, ServerHandle};
pub use slots::{SlotLease, SlotTable};

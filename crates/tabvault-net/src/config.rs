//! Server and client configuration
//!
//! Defaults match the classic deployment: port 8080, 256 concurrent
//! handlers, 64 KiB transfer buffers. [`ServerConfig::local`] is a small
//! loopback preset for tests and single-machine use.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Upper bound on a transferred file, 1 GiB.
pub const DEFAULT_MAX_PAYLOAD: u64 = 1 << 30;

/// Transfer buffer size, 64 KiB.
pub const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;

/// Longest filename accepted on the wire, in bytes.
pub const DEFAULT_MAX_FILENAME_LEN: usize = 255;

/// Transfer server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the listener binds to
    pub bind_addr: SocketAddr,
    /// Directory files are stored in and served from
    pub data_dir: PathBuf,
    /// Maximum number of concurrently handled connections
    pub pool_size: usize,
    /// Read timeout on every accepted stream
    pub read_timeout: Duration,
    /// Write timeout on every accepted stream
    pub write_timeout: Duration,
    /// How often the accept loop checks for shutdown
    pub accept_poll_interval: Duration,
    /// Longest accepted push filename, in bytes
    pub max_filename_len: usize,
    /// Largest accepted push payload, in bytes
    pub max_payload_bytes: u64,
    /// Chunk size for streaming payloads
    pub buffer_size: usize,
}

impl ServerConfig {
    /// Loopback on an ephemeral port with a small pool and short timeouts.
    pub fn local(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            data_dir: data_dir.into(),
            pool_size: 8,
            read_timeout: Duration::from_secs(5),
            write_timeout: Duration::from_secs(5),
            accept_poll_interval: Duration::from_millis(10),
            ..Self::default()
        }
    }

    /// Validate all configuration parameters
    pub fn validate(&self) -> Result<(), String> {
        if self.data_dir.as_os_str().is_empty() {
            return Err("data_dir must not be empty".into());
        }
        if self.pool_size == 0 {
            return Err("pool_size must be > 0".into());
        }
        if self.read_timeout.is_zero() || self.write_timeout.is_zero() {
            return Err("read_timeout and write_timeout must be > 0".into());
        }
        if self.accept_poll_interval.is_zero() {
            return Err("accept_poll_interval must be > 0".into());
        }
        if self.max_filename_len == 0 || self.max_filename_len > DEFAULT_MAX_FILENAME_LEN {
            return Err("max_filename_len must be in [1, 255]".into());
        }
        if self.max_payload_bytes == 0 {
            return Err("max_payload_bytes must be > 0".into());
        }
        if self.buffer_size == 0 {
            return Err("buffer_size must be > 0".into());
        }
        Ok(())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            data_dir: PathBuf::from("data"),
            pool_size: 256,
            read_timeout: Duration::from_secs(30),
            write_timeout: Duration::from_secs(30),
            accept_poll_interval: Duration::from_millis(50),
            max_filename_len: DEFAULT_MAX_FILENAME_LEN,
            max_payload_bytes: DEFAULT_MAX_PAYLOAD,
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

/// Transfer client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server address, `host:port`
    pub server_addr: String,
    /// Limit on establishing a connection
    pub connect_timeout: Duration,
    /// Read and write timeout once connected
    pub io_timeout: Duration,
    /// Where downloaded and pushed table files live
    pub local_data_dir: PathBuf,
    /// Largest accepted download, in bytes
    pub max_payload_bytes: u64,
    /// Chunk size for streaming payloads
    pub buffer_size: usize,
}

impl ClientConfig {
    /// Client of the server at `addr`, other settings default.
    pub fn for_server(addr: impl ToString, local_data_dir: impl Into<PathBuf>) -> Self {
        Self {
            server_addr: addr.to_string(),
            local_data_dir: local_data_dir.into(),
            ..Self::default()
        }
    }

    /// Validate all configuration parameters
    pub fn validate(&self) -> Result<(), String> {
        if self.server_addr.is_empty() {
            return Err("server_addr must not be empty".into());
        }
        if self.connect_timeout.is_zero() || self.io_timeout.is_zero() {
            return Err("connect_timeout and io_timeout must be > 0".into());
        }
        if self.local_data_dir.as_os_str().is_empty() {
            return Err("local_data_dir must not be empty".into());
        }
        if self.max_payload_bytes == 0 {
            return Err("max_payload_bytes must be > 0".into());
        }
        if self.buffer_size == 0 {
            return Err("buffer_size must be > 0".into());
        }
        Ok(())
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_addr: "127.0.0.1:8080".to_string(),
            connect_timeout: Duration::from_secs(5),
            io_timeout: Duration::from_secs(30),
            local_data_dir: PathBuf::from("data"),
            max_payload_bytes: DEFAULT_MAX_PAYLOAD,
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_presets_valid() {
        assert!(ServerConfig::default().validate().is_ok());
        assert!(ServerConfig::local("/tmp/x").validate().is_ok());
        assert!(ClientConfig::default().validate().is_ok());
        assert!(ClientConfig::for_server("127.0.0.1:9000", "/tmp/y").validate().is_ok());
    }

    #[test]
    fn test_defaults() {
        let s = ServerConfig::default();
        assert_eq!(s.bind_addr.port(), 8080);
        assert_eq!(s.pool_size, 256);
        assert_eq!(s.buffer_size, 65536);
        assert_eq!(ServerConfig::local("d").bind_addr.port(), 0);
    }

    #[test]
    fn test_invalid_values() {
        let mut s = ServerConfig::default();
        s.pool_size = 0;
        assert!(s.validate().is_err());

        let mut s = ServerConfig::default();
        s.max_filename_len = 256;
        assert!(s.validate().is_err());

        let mut c = ClientConfig::default();
        c.io_timeout = Duration::ZERO;
        assert!(c.validate().is_err());
    }
}

//! Transfer client
//!
//! Every call opens a fresh connection, issues one request, and closes it.
//! Downloads land in the client's [`LocalStore`]; pushes read from it.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::path::{Path, PathBuf};

use tabvault_core::durability::AtomicFile;
use tabvault_core::{wire_name, LocalStore, TabError, TabResult, Table};

use crate::config::{ClientConfig, DEFAULT_MAX_FILENAME_LEN};
use crate::handlers::copy_exact;
use crate::protocol::{self, PushAck, END_LINE, MAX_LINE_LEN, NO_TABLES_LINE};

/// What the server confirmed after a push.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushReceipt {
    /// Name the file was sent under
    pub name: String,
    pub bytes: u64,
    pub crc32c: u32,
}

/// Client for one transfer server.
pub struct TransferClient {
    config: ClientConfig,
    store: LocalStore,
}

impl TransferClient {
    /// Validate `config` and open the local data directory.
    pub fn new(config: ClientConfig) -> TabResult<Self> {
        config.validate().map_err(|reason| TabError::Io {
            path: None,
            kind: io::ErrorKind::InvalidInput,
            message: format!("Invalid client configuration: {}", reason),
        })?;
        let store = LocalStore::open(&config.local_data_dir)?;
        Ok(Self { config, store })
    }

    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn connect(&self) -> TabResult<TcpStream> {
        let addrs = self.config.server_addr.to_socket_addrs().map_err(|e| TabError::Io {
            path: None,
            kind: e.kind(),
            message: format!("Failed to resolve {}: {}", self.config.server_addr, e),
        })?;

        let mut last_err = None;
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, self.config.connect_timeout) {
                Ok(stream) => {
                    stream.set_read_timeout(Some(self.config.io_timeout))?;
                    stream.set_write_timeout(Some(self.config.io_timeout))?;
                    let _ = stream.set_nodelay(true);
                    return Ok(stream);
                }
                Err(e) => last_err = Some(e),
            }
        }
        let (kind, detail) = match last_err {
            Some(e) => (e.kind(), e.to_string()),
            None => (io::ErrorKind::NotFound, "no addresses".to_string()),
        };
        Err(TabError::Io {
            path: None,
            kind,
            message: format!("Failed to connect to {}: {}", self.config.server_addr, detail),
        })
    }

    /// Send a command line and return a reader over the response.
    fn request(&self, command: &str) -> TabResult<BufReader<TcpStream>> {
        let mut stream = self.connect()?;
        stream
            .write_all(format!("{}\n", command).as_bytes())
            .and_then(|_| stream.flush())
            .map_err(|e| self.send_error(e))?;
        let _ = stream.shutdown(Shutdown::Write);
        Ok(BufReader::with_capacity(self.config.buffer_size, stream))
    }

    /// First response line. A connection closed before any byte arrives
    /// means the server had no free handler slot.
    fn first_line<R: BufRead>(&self, reader: &mut R) -> TabResult<String> {
        match protocol::read_line(reader, MAX_LINE_LEN) {
            Ok(Some(line)) => Ok(line),
            Ok(None) => Err(self.pool_exhausted()),
            Err(TabError::Io { kind, .. }) if closed_by_peer(kind) => Err(self.pool_exhausted()),
            Err(e) => Err(e),
        }
    }

    fn pool_exhausted(&self) -> TabError {
        TabError::PoolExhausted { addr: self.config.server_addr.clone() }
    }

    /// Map a send failure caused by the server dropping the connection.
    fn send_error(&self, err: io::Error) -> TabError {
        if closed_by_peer(err.kind()) {
            self.pool_exhausted()
        } else {
            err.into()
        }
    }

    /// Names of the files stored on the server.
    pub fn list_tables(&self) -> TabResult<Vec<String>> {
        let mut reader = self.request(protocol::LIST_COMMAND)?;
        let mut line = self.first_line(&mut reader)?;
        let mut names = Vec::new();
        loop {
            if line == END_LINE {
                return Ok(names);
            }
            if let Some(message) = protocol::parse_error_line(&line) {
                return Err(TabError::Remote { message: message.to_string() });
            }
            if line != NO_TABLES_LINE {
                names.push(line);
            }
            line = protocol::read_line(&mut reader, MAX_LINE_LEN)?
                .ok_or_else(|| TabError::protocol("connection closed before END"))?;
        }
    }

    /// GET `wire` and stream the payload into `sink`.
    fn get_into<W: Write>(&self, wire: &str, sink: &mut W) -> TabResult<u64> {
        let mut reader = self.request(&format!("{}{}", protocol::GET_COMMAND, wire))?;
        let header = self.first_line(&mut reader)?;
        let size = protocol::parse_size_line(&header)?;
        if size > self.config.max_payload_bytes {
            return Err(TabError::protocol(format!(
                "server offered {} bytes, limit is {}",
                size, self.config.max_payload_bytes
            )));
        }

        let received = copy_exact(&mut reader, sink, size, self.config.buffer_size, |_| {})?;
        if received != size {
            return Err(TabError::protocol(format!("download interrupted after {} of {} bytes", received, size)));
        }
        match protocol::read_line(&mut reader, MAX_LINE_LEN)? {
            Some(line) if line == END_LINE => Ok(size),
            Some(line) => Err(TabError::protocol(format!("expected END, got '{}'", line.escape_debug()))),
            None => Err(TabError::protocol("connection closed before END")),
        }
    }

    /// Raw bytes of a stored file. `name` gets the `.tbl` suffix if missing.
    pub fn fetch(&self, name: &str) -> TabResult<Vec<u8>> {
        let mut bytes = Vec::new();
        self.get_into(&remote_name(name)?, &mut bytes)?;
        Ok(bytes)
    }

    /// Download a file into the local store. Returns its local path.
    ///
    /// The name is reduced to a bare filename the same way the server does,
    /// so the file always lands inside the local data directory.
    pub fn download(&self, name: &str) -> TabResult<PathBuf> {
        let wire = remote_name(name)?;
        let mut file = AtomicFile::create(self.store.path_for(&wire)?)?;
        let size = self.get_into(&wire, &mut file)?;
        let path = file.commit()?;
        log::info!("Downloaded {} ({} bytes) to {}", wire, size, path.display());
        Ok(path)
    }

    /// Download a table file and decode it.
    pub fn load_table(&self, name: &str) -> TabResult<Table> {
        let path = self.download(name)?;
        LocalStore::load_path(path)
    }

    /// Push a local file; it is stored remotely under its sanitized file name.
    ///
    /// Names the server would refuse (hidden, empty, too long) fail here
    /// without connecting.
    pub fn push_file<P: AsRef<Path>>(&self, path: P) -> TabResult<PushReceipt> {
        let path = path.as_ref();
        let raw = path.file_name().and_then(|n| n.to_str()).ok_or_else(|| TabError::Io {
            path: Some(path.to_path_buf()),
            kind: io::ErrorKind::InvalidInput,
            message: "path has no file name".to_string(),
        })?;
        let name = protocol::checked_filename(raw, DEFAULT_MAX_FILENAME_LEN)?;
        let mut file = File::open(path).map_err(|e| TabError::io_at(path, e, "Failed to open file for push"))?;
        let len = file.metadata().map_err(|e| TabError::io_at(path, e, "Failed to stat file"))?.len();

        let mut stream = self.connect()?;
        match protocol::write_push_header(&mut stream, &name, len) {
            Err(TabError::Io { kind, .. }) if closed_by_peer(kind) => return Err(self.pool_exhausted()),
            other => other?,
        }
        let mut crc = 0u32;
        let sent = copy_exact(&mut file, &mut stream, len, self.config.buffer_size, |chunk| {
            crc = crc32c::crc32c_append(crc, chunk);
        })
        .map_err(|e| self.send_error(e))?;
        if sent != len {
            return Err(TabError::io_at(
                path,
                io::Error::new(io::ErrorKind::UnexpectedEof, format!("read {} of {} bytes", sent, len)),
                "File shrank during push",
            ));
        }
        stream.flush().map_err(|e| self.send_error(e))?;
        let _ = stream.shutdown(Shutdown::Write);

        let mut reader = BufReader::new(stream);
        let ack = self.first_line(&mut reader)?;
        match PushAck::parse(&ack)? {
            PushAck::Stored { bytes, crc32c } if bytes == sent && crc32c == crc => {
                log::info!("Pushed {} ({} bytes, crc32c {:08x})", name, bytes, crc32c);
                Ok(PushReceipt { name, bytes, crc32c })
            }
            PushAck::Stored { bytes, crc32c } => Err(TabError::protocol(format!(
                "server stored {} bytes with crc32c {:08x}, sent {} bytes with crc32c {:08x}",
                bytes, crc32c, sent, crc
            ))),
            PushAck::Failed { message } => Err(TabError::Remote { message }),
        }
    }

    /// Save `table` to the local store, then push the file.
    pub fn push_table(&self, table: &Table) -> TabResult<PushReceipt> {
        let path = self.store.save(table)?;
        self.push_file(path)
    }
}

/// Bare `.tbl` filename a table is requested and stored under.
fn remote_name(name: &str) -> TabResult<String> {
    protocol::checked_filename(&wire_name(name), DEFAULT_MAX_FILENAME_LEN)
}

fn closed_by_peer(kind: io::ErrorKind) -> bool {
    matches!(
        kind,
        io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::UnexpectedEof
    )
}

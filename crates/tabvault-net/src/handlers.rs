//! Request handlers
//!
//! Each handler serves one request on one connection and owns the one file
//! it reads or writes. Handlers are generic over the stream halves so they
//! run the same against a socket or an in-memory buffer.

use std::fs::{self, File};
use std::io::{self, BufRead, Read, Write};
use std::path::Path;

use tabvault_core::durability::AtomicFile;
use tabvault_core::{TabError, TabResult};

use crate::config::ServerConfig;
use crate::protocol::{
    self, checked_filename, error_line, write_line, PushAck, END_LINE, MAX_LINE_LEN, NO_TABLES_LINE,
};

/// Names of the stored files, sorted. Hidden files are skipped.
pub fn list_files(dir: &Path) -> TabResult<Vec<String>> {
    let entries = fs::read_dir(dir).map_err(|e| TabError::io_at(dir, e, "Failed to read data directory"))?;
    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| TabError::io_at(dir, e, "Failed to read directory entry"))?;
        if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            if !name.starts_with('.') {
                names.push(name.to_string());
            }
        }
    }
    names.sort();
    Ok(names)
}

/// Answer `LIST`. An unreadable directory lists as empty.
pub fn handle_list<W: Write>(dir: &Path, out: &mut W) -> TabResult<usize> {
    let names = list_files(dir).unwrap_or_else(|e| {
        log::warn!("LIST: {}", e);
        Vec::new()
    });
    if names.is_empty() {
        write_line(out, NO_TABLES_LINE)?;
    }
    for name in &names {
        write_line(out, name)?;
    }
    write_line(out, END_LINE)?;
    out.flush()?;
    Ok(names.len())
}

/// Answer `GET <name>`. `command` is the full request line.
///
/// Returns the number of payload bytes sent.
pub fn handle_get<W: Write>(dir: &Path, command: &str, out: &mut W, config: &ServerConfig) -> TabResult<u64> {
    let requested = command.strip_prefix(protocol::GET_COMMAND).unwrap_or("");
    let name = match checked_filename(requested, config.max_filename_len) {
        Ok(name) => name,
        Err(e) => {
            write_line(out, &error_line("Invalid filename"))?;
            out.flush()?;
            return Err(e);
        }
    };

    let path = dir.join(&name);
    let opened = File::open(&path).and_then(|f| {
        let meta = f.metadata()?;
        if meta.is_file() {
            Ok((f, meta.len()))
        } else {
            Err(io::Error::new(io::ErrorKind::NotFound, "not a regular file"))
        }
    });
    let (file, size) = match opened {
        Ok(found) => found,
        Err(e) => {
            write_line(out, &error_line("File not found"))?;
            out.flush()?;
            return Err(TabError::io_at(&path, e, "GET"));
        }
    };

    write_line(out, &format!("{}{}", protocol::SIZE_PREFIX, size))?;
    let sent = copy_exact(&mut file.take(size), out, size, config.buffer_size, |_| {})?;
    if sent != size {
        // Header already promised `size` bytes; the peer sees a short stream
        return Err(TabError::Io {
            path: Some(path),
            kind: io::ErrorKind::UnexpectedEof,
            message: format!("file shrank while sending: {} of {} bytes", sent, size),
        });
    }
    write_line(out, END_LINE)?;
    out.flush()?;
    Ok(size)
}

/// Reply sent when an accepted push cannot be stored.
pub const PUSH_FAILED_MESSAGE: &str = "Failed to store file";

/// Receive a push frame and store its payload atomically.
///
/// A malformed header closes the connection without an answer. Once the
/// header is accepted the peer always gets an `OK` or `ERROR:` line,
/// unless the connection itself failed. On failure the rest of the
/// declared payload is read and discarded first, so the reply is not lost
/// to a reset.
pub fn handle_push<R: Read, W: Write>(dir: &Path, input: &mut R, out: &mut W, config: &ServerConfig) -> TabResult<PushAck> {
    let header = protocol::read_push_header(input, config.max_filename_len, config.max_payload_bytes)?;
    let mut payload = input.take(header.payload_len);

    match receive_payload(dir, &header.name, header.payload_len, &mut payload, config) {
        Ok(ack) => {
            write_line(out, &ack.to_line())?;
            out.flush()?;
            Ok(ack)
        }
        Err(e) => {
            let _ = io::copy(&mut payload, &mut io::sink());
            // The peer may already be gone; report to it on a best-effort basis
            let _ = write_line(out, &error_line(PUSH_FAILED_MESSAGE)).and_then(|_| out.flush());
            Err(e)
        }
    }
}

fn receive_payload<R: Read>(dir: &Path, name: &str, len: u64, payload: &mut R, config: &ServerConfig) -> TabResult<PushAck> {
    let mut file = AtomicFile::create(dir.join(name))?;
    let mut crc = 0u32;
    let received = copy_exact(payload, &mut file, len, config.buffer_size, |chunk| {
        crc = crc32c::crc32c_append(crc, chunk);
    })?;
    if received != len {
        return Err(TabError::protocol(format!(
            "connection closed after {} of {} payload bytes for '{}'",
            received, len, name
        )));
    }
    file.commit()?;
    Ok(PushAck::Stored { bytes: received, crc32c: crc })
}

/// Copy up to `len` bytes in `buffer_size` chunks, calling `inspect` on each.
///
/// Returns the bytes copied; fewer than `len` means the source ended early.
pub(crate) fn copy_exact<R: Read, W: Write>(
    input: &mut R,
    out: &mut W,
    len: u64,
    buffer_size: usize,
    mut inspect: impl FnMut(&[u8]),
) -> io::Result<u64> {
    let mut buf = vec![0u8; buffer_size.min(len.max(1) as usize)];
    let mut copied = 0u64;
    while copied < len {
        let want = buf.len().min((len - copied) as usize);
        let n = match input.read(&mut buf[..want]) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        inspect(&buf[..n]);
        out.write_all(&buf[..n])?;
        copied += n as u64;
    }
    Ok(copied)
}

/// Read the request line of a LIST or GET.
pub fn read_command<R: BufRead>(input: &mut R) -> TabResult<String> {
    protocol::read_line(input, MAX_LINE_LEN)?.ok_or_else(|| TabError::protocol("empty command"))
}

//! Transfer protocol framing
//!
//! Three request forms share one connection-per-request model:
//!
//! - `LIST\n` — answered with one filename per line (or `NO_TABLES`), then `END`
//! - `GET <name>\n` — answered with `SIZE <n>`, exactly `n` raw bytes, then
//!   `END`; or a single `ERROR: ...` line
//! - push — no keyword: a u32 BE name length, the name, a u64 BE payload
//!   length, then the payload. Answered with `OK <bytes> <crc32c>` once the
//!   file is durably stored, or `ERROR: ...`
//!
//! A request is classified by its first four bytes. Anything that is not
//! `LIST` or `GET ` is read as a push frame.

use std::io::{self, BufRead, Read, Write};

use tabvault_core::{TabError, TabResult};

/// Bytes inspected to classify a request.
pub const PREFIX_LEN: usize = 4;

pub const LIST_COMMAND: &str = "LIST";
pub const GET_COMMAND: &str = "GET ";
pub const END_LINE: &str = "END";
pub const NO_TABLES_LINE: &str = "NO_TABLES";
pub const ERROR_PREFIX: &str = "ERROR:";
pub const SIZE_PREFIX: &str = "SIZE ";
pub const OK_PREFIX: &str = "OK ";

/// Longest accepted command or response line, newline included.
pub const MAX_LINE_LEN: usize = 512;

/// Push frame header size before the name: u32 name length.
const NAME_LEN_WIDTH: usize = 4;

/// What a connection is asking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    List,
    Get,
    Push,
}

impl RequestKind {
    pub fn classify(prefix: &[u8; PREFIX_LEN]) -> Self {
        if prefix == LIST_COMMAND.as_bytes() {
            RequestKind::List
        } else if prefix == GET_COMMAND.as_bytes() {
            RequestKind::Get
        } else {
            RequestKind::Push
        }
    }
}

/// Reduce a client-supplied name to a bare filename.
///
/// Drops any directory part, strips CR/LF, and replaces every character
/// outside `[A-Za-z0-9._-]` with `_`.
pub fn sanitize_filename(raw: &str) -> String {
    let base = raw.rsplit(['/', '\\']).next().unwrap_or(raw);
    base.chars()
        .filter(|c| *c != '\r' && *c != '\n')
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') { c } else { '_' })
        .collect()
}

/// Sanitize `raw` and reject names that cannot be stored as a listable file.
///
/// Names starting with `.` are refused: they include `.` and `..`, and
/// hidden files never appear in a listing.
pub fn checked_filename(raw: &str, max_len: usize) -> TabResult<String> {
    let name = sanitize_filename(raw);
    if name.is_empty() || name.starts_with('.') {
        return Err(TabError::protocol(format!("invalid filename '{}'", raw.escape_debug())));
    }
    if name.len() > max_len {
        return Err(TabError::protocol(format!("filename is {} bytes, limit is {}", name.len(), max_len)));
    }
    Ok(name)
}

/// Read one `\n`-terminated line of at most `limit` bytes.
///
/// Returns `None` on a clean end of stream. The terminator and any trailing
/// `\r` are removed. A final line without a terminator is returned as is.
pub fn read_line<R: BufRead>(reader: &mut R, limit: usize) -> TabResult<Option<String>> {
    let mut buf = Vec::new();
    let n = reader.by_ref().take(limit as u64).read_until(b'\n', &mut buf)?;
    if n == 0 {
        return Ok(None);
    }
    if buf.last() == Some(&b'\n') {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
    } else if n >= limit {
        return Err(TabError::protocol(format!("line longer than {} bytes", limit)));
    }
    Ok(Some(String::from_utf8_lossy(&buf).into_owned()))
}

/// Write `line` followed by `\n`.
pub fn write_line<W: Write>(writer: &mut W, line: &str) -> io::Result<()> {
    writer.write_all(line.as_bytes())?;
    writer.write_all(b"\n")
}

/// `ERROR: <message>` line.
pub fn error_line(message: &str) -> String {
    format!("{} {}", ERROR_PREFIX, message)
}

/// Message of an `ERROR:` line, if `line` is one.
pub fn parse_error_line(line: &str) -> Option<&str> {
    line.strip_prefix(ERROR_PREFIX).map(str::trim)
}

/// Payload length from a `SIZE <n>` line. An `ERROR:` line becomes `Remote`.
pub fn parse_size_line(line: &str) -> TabResult<u64> {
    if let Some(message) = parse_error_line(line) {
        return Err(TabError::Remote { message: message.to_string() });
    }
    line.strip_prefix(SIZE_PREFIX)
        .and_then(|n| n.trim().parse::<u64>().ok())
        .ok_or_else(|| TabError::protocol(format!("bad SIZE header '{}'", line.escape_debug())))
}

/// Header of a push frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushHeader {
    /// Sanitized target filename
    pub name: String,
    pub payload_len: u64,
}

/// Write a push frame header. The payload follows separately.
pub fn write_push_header<W: Write>(writer: &mut W, name: &str, payload_len: u64) -> TabResult<()> {
    let name_len = u32::try_from(name.len())
        .map_err(|_| TabError::protocol(format!("filename of {} bytes does not fit the frame", name.len())))?;
    writer.write_all(&name_len.to_be_bytes())?;
    writer.write_all(name.as_bytes())?;
    writer.write_all(&payload_len.to_be_bytes())?;
    Ok(())
}

/// Read and validate a push frame header.
pub fn read_push_header<R: Read>(reader: &mut R, max_name_len: usize, max_payload: u64) -> TabResult<PushHeader> {
    let mut len_buf = [0u8; NAME_LEN_WIDTH];
    read_field(reader, &mut len_buf, "push name length")?;
    let name_len = u32::from_be_bytes(len_buf) as usize;
    if name_len == 0 || name_len > max_name_len {
        return Err(TabError::protocol(format!("push name length {} outside [1, {}]", name_len, max_name_len)));
    }

    let mut raw = vec![0u8; name_len];
    read_field(reader, &mut raw, "push name")?;
    let name = checked_filename(&String::from_utf8_lossy(&raw), max_name_len)?;

    let mut size_buf = [0u8; 8];
    read_field(reader, &mut size_buf, "push payload length")?;
    let payload_len = u64::from_be_bytes(size_buf);
    if payload_len > max_payload {
        return Err(TabError::protocol(format!("push payload of {} bytes exceeds limit {}", payload_len, max_payload)));
    }

    Ok(PushHeader { name, payload_len })
}

fn read_field<R: Read>(reader: &mut R, buf: &mut [u8], field: &str) -> TabResult<()> {
    reader.read_exact(buf).map_err(|e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            TabError::protocol(format!("connection closed inside {}", field))
        } else {
            TabError::from(e)
        }
    })
}

/// Server's answer to a push.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushAck {
    Stored { bytes: u64, crc32c: u32 },
    Failed { message: String },
}

impl PushAck {
    pub fn to_line(&self) -> String {
        match self {
            PushAck::Stored { bytes, crc32c } => format!("{}{} {:08x}", OK_PREFIX, bytes, crc32c),
            PushAck::Failed { message } => error_line(message),
        }
    }

    pub fn parse(line: &str) -> TabResult<Self> {
        if let Some(message) = parse_error_line(line) {
            return Ok(PushAck::Failed { message: message.to_string() });
        }
        let bad = || TabError::protocol(format!("bad push acknowledgement '{}'", line.escape_debug()));
        let rest = line.strip_prefix(OK_PREFIX).ok_or_else(bad)?;
        let mut parts = rest.split_whitespace();
        let bytes = parts.next().and_then(|b| b.parse::<u64>().ok()).ok_or_else(bad)?;
        let crc32c = parts.next().and_then(|c| u32::from_str_radix(c, 16).ok()).ok_or_else(bad)?;
        if parts.next().is_some() {
            return Err(bad());
        }
        Ok(PushAck::Stored { bytes, crc32c })
    }
}

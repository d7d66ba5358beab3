//! Binary table format (`.tbl` files and push/get payloads)
//!
//! A native little-endian dump of one table, fields in this order:
//!
//! ```text
//!   name_len:   u64 LE        name bytes (UTF-8)
//!   attr_count: u64 LE
//!   per attribute:
//!     name_len: u64 LE        name bytes (UTF-8)
//!     type_tag: u32 LE        0=INT 1=UINT 2=FLOAT 3=STRING
//!   row_count:  u64 LE
//!   per row, per column:
//!     INT:    i32 LE
//!     UINT:   u32 LE
//!     FLOAT:  f32 LE (IEEE 754 bits)
//!     STRING: len u64 LE + bytes (UTF-8)
//! ```
//!
//! There is no magic, version or checksum. The decoder trusts nothing: every
//! declared length or count is checked against the bytes that remain before
//! anything is allocated, and leftover bytes after the last row are rejected.

use std::io::Write;

use crate::error::{TabError, TabResult};
use crate::table::Table;
use crate::types::{Attribute, DataType, Row, Value};

/// Width of every length and count field.
pub const LEN_WIDTH: usize = 8;

/// Width of the attribute type tag.
pub const TYPE_TAG_WIDTH: usize = 4;

/// Width of the fixed-size numeric cells.
pub const NUMERIC_WIDTH: usize = 4;

/// Smallest possible encoding of one attribute (empty name).
const MIN_ATTRIBUTE_SIZE: usize = LEN_WIDTH + TYPE_TAG_WIDTH;

/// Row count limit when rows carry no bytes at all.
const MAX_COLUMNLESS_ROWS: u64 = 1 << 20;

/// Exact number of bytes [`encode`] produces for `table`.
pub fn encoded_len(table: &Table) -> usize {
    let header = LEN_WIDTH + table.name().len() + LEN_WIDTH;
    let schema: usize = table
        .attributes()
        .iter()
        .map(|attr| LEN_WIDTH + attr.name.len() + TYPE_TAG_WIDTH)
        .sum();
    let cells: usize = table
        .rows()
        .iter()
        .flat_map(|row| row.values())
        .map(|value| match value {
            Value::Str(s) => LEN_WIDTH + s.len(),
            _ => NUMERIC_WIDTH,
        })
        .sum();
    header + schema + LEN_WIDTH + cells
}

/// Serialize a table into a fresh buffer.
pub fn encode(table: &Table) -> Vec<u8> {
    let mut buf = Vec::with_capacity(encoded_len(table));
    put_bytes(&mut buf, table.name().as_bytes());

    buf.extend_from_slice(&(table.attribute_count() as u64).to_le_bytes());
    for attr in table.attributes() {
        put_bytes(&mut buf, attr.name.as_bytes());
        buf.extend_from_slice(&attr.data_type.tag().to_le_bytes());
    }

    buf.extend_from_slice(&(table.row_count() as u64).to_le_bytes());
    for row in table.rows() {
        for value in row.values() {
            match value {
                Value::Int32(v) => buf.extend_from_slice(&v.to_le_bytes()),
                Value::UInt32(v) => buf.extend_from_slice(&v.to_le_bytes()),
                Value::Float32(v) => buf.extend_from_slice(&v.to_le_bytes()),
                Value::Str(s) => put_bytes(&mut buf, s.as_bytes()),
            }
        }
    }

    debug_assert_eq!(buf.len(), encoded_len(table));
    buf
}

/// Serialize a table straight into a writer.
pub fn encode_to<W: Write>(table: &Table, writer: &mut W) -> std::io::Result<()> {
    writer.write_all(&encode(table))
}

fn put_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    buf.extend_from_slice(&(bytes.len() as u64).to_le_bytes());
    buf.extend_from_slice(bytes);
}

/// Deserialize a table, rejecting truncated or inconsistent input.
pub fn decode(bytes: &[u8]) -> TabResult<Table> {
    let mut cur = Cursor::new(bytes);

    let name = cur.string("table name")?;

    let attr_count = cur.count("attribute count", MIN_ATTRIBUTE_SIZE)?;
    let mut attributes = Vec::with_capacity(attr_count);
    for _ in 0..attr_count {
        let attr_name = cur.string("attribute name")?;
        let tag_offset = cur.offset();
        let tag = cur.u32("attribute type tag")?;
        let data_type = DataType::from_tag(tag).ok_or_else(|| TabError::Malformed {
            offset: tag_offset,
            reason: format!("unknown type tag {} for attribute '{}'", tag, attr_name),
        })?;
        attributes.push(Attribute::new(attr_name, data_type));
    }

    // A row with no columns occupies no bytes, so only bound the count when
    // every row needs at least one byte.
    let min_row_size: usize = attributes
        .iter()
        .map(|attr| match attr.data_type {
            DataType::String => LEN_WIDTH,
            _ => NUMERIC_WIDTH,
        })
        .sum();
    let row_count = if min_row_size == 0 {
        let offset = cur.offset();
        let declared = cur.u64("row count")?;
        if declared > MAX_COLUMNLESS_ROWS {
            return Err(TabError::Malformed {
                offset,
                reason: format!("{} rows in a table without attributes", declared),
            });
        }
        declared as usize
    } else {
        cur.count("row count", min_row_size)?
    };

    let mut rows = Vec::with_capacity(if min_row_size == 0 { 0 } else { row_count });
    for _ in 0..row_count {
        let mut values = Vec::with_capacity(attributes.len());
        for attr in &attributes {
            let value = match attr.data_type {
                DataType::Int32 => Value::Int32(i32::from_le_bytes(cur.array("INT cell")?)),
                DataType::UInt32 => Value::UInt32(u32::from_le_bytes(cur.array("UINT cell")?)),
                DataType::Float32 => Value::Float32(f32::from_le_bytes(cur.array("FLOAT cell")?)),
                DataType::String => Value::Str(cur.string("STRING cell")?),
            };
            values.push(value);
        }
        rows.push(Row::new(values));
    }

    if cur.remaining() != 0 {
        return Err(TabError::Malformed {
            offset: cur.offset(),
            reason: format!("{} trailing bytes after last row", cur.remaining()),
        });
    }

    Ok(Table::from_parts(name, attributes, rows))
}

/// Bounds-checked reader over the input buffer.
struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn offset(&self) -> u64 {
        self.pos as u64
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take(&mut self, field: &'static str, n: usize) -> TabResult<&'a [u8]> {
        if n > self.remaining() {
            return Err(TabError::Truncated {
                field,
                offset: self.offset(),
                needed: n as u64,
                available: self.remaining() as u64,
            });
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self, field: &'static str) -> TabResult<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(field, N)?);
        Ok(out)
    }

    fn u32(&mut self, field: &'static str) -> TabResult<u32> {
        Ok(u32::from_le_bytes(self.array(field)?))
    }

    fn u64(&mut self, field: &'static str) -> TabResult<u64> {
        Ok(u64::from_le_bytes(self.array(field)?))
    }

    /// Read a length prefix and check the payload fits in what is left.
    fn len(&mut self, field: &'static str) -> TabResult<usize> {
        let offset = self.offset();
        let declared = self.u64(field)?;
        if declared > self.remaining() as u64 {
            return Err(TabError::Truncated {
                field,
                offset,
                needed: declared,
                available: self.remaining() as u64,
            });
        }
        Ok(declared as usize)
    }

    /// Read a count of items each needing at least `min_item_size` bytes.
    fn count(&mut self, field: &'static str, min_item_size: usize) -> TabResult<usize> {
        let offset = self.offset();
        let declared = self.u64(field)?;
        let needed = declared.saturating_mul(min_item_size as u64);
        if needed > self.remaining() as u64 {
            return Err(TabError::Malformed {
                offset,
                reason: format!(
                    "{} of {} needs at least {} bytes, only {} remain",
                    field, declared, needed, self.remaining()
                ),
            });
        }
        Ok(declared as usize)
    }

    fn string(&mut self, field: &'static str) -> TabResult<String> {
        let len = self.len(field)?;
        let offset = self.offset();
        let bytes = self.take(field, len)?;
        String::from_utf8(bytes.to_vec()).map_err(|e| TabError::Malformed {
            offset,
            reason: format!("{} is not valid UTF-8: {}", field, e),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Table {
        let mut table = Table::create(
            "Inventory",
            vec![
                Attribute::new("id", DataType::Int32),
                Attribute::new("name", DataType::String),
                Attribute::new("qty", DataType::UInt32),
                Attribute::new("price", DataType::Float32),
            ],
        )
        .unwrap();
        table.insert(vec![1.into(), "bolt".into(), 50u32.into(), 0.25f32.into()]).unwrap();
        table.insert(vec![(-2).into(), "".into(), u32::MAX.into(), (-1.5f32).into()]).unwrap();
        table.insert(vec![i32::MIN.into(), "écrou".into(), 0u32.into(), 1e30f32.into()]).unwrap();
        table
    }

    #[test]
    fn test_roundtrip() {
        let table = sample();
        let bytes = encode(&table);
        assert_eq!(bytes.len(), encoded_len(&table));
        assert_eq!(decode(&bytes).unwrap(), table);
    }

    #[test]
    fn test_roundtrip_empty_and_columnless() {
        let empty = Table::create("e", vec![Attribute::new("a", DataType::String)]).unwrap();
        assert_eq!(decode(&encode(&empty)).unwrap(), empty);

        let mut bare = Table::create("b", vec![Attribute::new("a", DataType::Int32)]).unwrap();
        bare.insert(vec![7.into()]).unwrap();
        bare.insert(vec![8.into()]).unwrap();
        bare.drop_column("a").unwrap();
        let decoded = decode(&encode(&bare)).unwrap();
        assert_eq!(decoded.row_count(), 2);
        assert_eq!(decoded.attribute_count(), 0);
    }

    #[test]
    fn test_layout_is_little_endian() {
        let mut table = Table::create("t", vec![Attribute::new("n", DataType::UInt32)]).unwrap();
        table.insert(vec![0x0102_0304u32.into()]).unwrap();
        let bytes = encode(&table);

        assert_eq!(&bytes[0..8], &1u64.to_le_bytes());
        assert_eq!(bytes[8], b't');
        assert_eq!(&bytes[9..17], &1u64.to_le_bytes()); // attr count
        assert_eq!(&bytes[17..25], &1u64.to_le_bytes()); // attr name len
        assert_eq!(bytes[25], b'n');
        assert_eq!(&bytes[26..30], &1u32.to_le_bytes()); // UINT tag
        assert_eq!(&bytes[30..38], &1u64.to_le_bytes()); // row count
        assert_eq!(&bytes[38..42], &[0x04, 0x03, 0x02, 0x01]);
        assert_eq!(bytes.len(), 42);
    }

    #[test]
    fn test_every_truncation_rejected() {
        let bytes = encode(&sample());
        for cut in 0..bytes.len() {
            let result = decode(&bytes[..cut]);
            assert!(
                matches!(result, Err(TabError::Truncated { .. }) | Err(TabError::Malformed { .. })),
                "prefix of {} bytes decoded: {:?}",
                cut,
                result
            );
        }
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let mut bytes = encode(&sample());
        bytes.push(0);
        assert!(matches!(decode(&bytes), Err(TabError::Malformed { .. })));
    }

    #[test]
    fn test_inflated_row_count_rejected() {
        let table = sample();
        let mut bytes = encode(&table);
        let at = row_count_offset(&table);
        bytes[at..at + LEN_WIDTH].copy_from_slice(&u64::MAX.to_le_bytes());
        assert!(matches!(decode(&bytes), Err(TabError::Malformed { .. })));
    }

    #[test]
    fn test_huge_attribute_count_rejected_before_alloc() {
        let mut bytes = Vec::new();
        put_bytes(&mut bytes, b"t");
        bytes.extend_from_slice(&(1u64 << 60).to_le_bytes());
        assert!(matches!(decode(&bytes), Err(TabError::Malformed { .. })));
    }

    #[test]
    fn test_huge_string_length_rejected() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&u64::MAX.to_le_bytes());
        bytes.extend_from_slice(b"abc");
        assert!(matches!(decode(&bytes), Err(TabError::Truncated { field: "table name", .. })));
    }

    #[test]
    fn test_columnless_row_count_bounded() {
        let mut bytes = Vec::new();
        put_bytes(&mut bytes, b"t");
        bytes.extend_from_slice(&0u64.to_le_bytes());
        bytes.extend_from_slice(&u64::MAX.to_le_bytes());
        assert!(matches!(decode(&bytes), Err(TabError::Malformed { .. })));
    }

    #[test]
    fn test_unknown_type_tag_rejected() {
        let mut table = Table::create("t", vec![Attribute::new("n", DataType::Int32)]).unwrap();
        table.insert(vec![1.into()]).unwrap();
        let mut bytes = encode(&table);
        bytes[26..30].copy_from_slice(&9u32.to_le_bytes());
        assert!(matches!(decode(&bytes), Err(TabError::Malformed { offset: 26, .. })));
    }

    #[test]
    fn test_invalid_utf8_rejected() {
        let mut bytes = Vec::new();
        put_bytes(&mut bytes, &[0xff, 0xfe]);
        bytes.extend_from_slice(&0u64.to_le_bytes());
        bytes.extend_from_slice(&0u64.to_le_bytes());
        assert!(matches!(decode(&bytes), Err(TabError::Malformed { .. })));
    }

    fn row_count_offset(table: &Table) -> usize {
        LEN_WIDTH
            + table.name().len()
            + LEN_WIDTH
            + table
                .attributes()
                .iter()
                .map(|a| LEN_WIDTH + a.name.len() + TYPE_TAG_WIDTH)
                .sum::<usize>()
    }
}

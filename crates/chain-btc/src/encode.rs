//! Consensus encoding primitives: CompactSize varints and a bounds-checked
//! byte reader.

use crate::error::BtcError;

/// Write a Bitcoin CompactSize (variable-length integer).
pub fn write_varint(buf: &mut Vec<u8>, val: u64) {
    if val < 0xFD {
        buf.push(val as u8);
    } else if val <= 0xFFFF {
        buf.push(0xFD);
        buf.extend_from_slice(&(val as u16).to_le_bytes());
    } else if val <= 0xFFFF_FFFF {
        buf.push(0xFE);
        buf.extend_from_slice(&(val as u32).to_le_bytes());
    } else {
        buf.push(0xFF);
        buf.extend_from_slice(&val.to_le_bytes());
    }
}

/// Encoded size of `val` as a CompactSize.
pub fn varint_len(val: u64) -> usize {
    match val {
        0..=0xFC => 1,
        0xFD..=0xFFFF => 3,
        0x1_0000..=0xFFFF_FFFF => 5,
        _ => 9,
    }
}

/// Write a varint length prefix followed by `bytes`.
pub fn write_var_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    write_varint(buf, bytes.len() as u64);
    buf.extend_from_slice(bytes);
}

/// Cursor over a byte slice that reports truncation with context instead of
/// panicking.
#[derive(Debug)]
pub struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Next byte without consuming it.
    pub fn peek(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    /// Byte `offset` positions ahead without consuming anything.
    pub fn peek_at(&self, offset: usize) -> Option<u8> {
        self.data.get(self.pos + offset).copied()
    }

    pub fn take(&mut self, n: usize, context: &'static str) -> Result<&'a [u8], BtcError> {
        if n > self.remaining() {
            return Err(BtcError::TruncatedData {
                context,
                needed: n,
                available: self.remaining(),
            });
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn read_array<const N: usize>(&mut self, context: &'static str) -> Result<[u8; N], BtcError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N, context)?);
        Ok(out)
    }

    pub fn read_u8(&mut self, context: &'static str) -> Result<u8, BtcError> {
        Ok(self.read_array::<1>(context)?[0])
    }

    pub fn read_u16_le(&mut self, context: &'static str) -> Result<u16, BtcError> {
        Ok(u16::from_le_bytes(self.read_array(context)?))
    }

    pub fn read_u32_le(&mut self, context: &'static str) -> Result<u32, BtcError> {
        Ok(u32::from_le_bytes(self.read_array(context)?))
    }

    pub fn read_i32_le(&mut self, context: &'static str) -> Result<i32, BtcError> {
        Ok(i32::from_le_bytes(self.read_array(context)?))
    }

    pub fn read_u64_le(&mut self, context: &'static str) -> Result<u64, BtcError> {
        Ok(u64::from_le_bytes(self.read_array(context)?))
    }

    /// Read a CompactSize, rejecting non-minimal encodings.
    pub fn read_varint(&mut self, context: &'static str) -> Result<u64, BtcError> {
        let (value, width) = match self.read_u8(context)? {
            0xFD => (u64::from(self.read_u16_le(context)?), 3),
            0xFE => (u64::from(self.read_u32_le(context)?), 5),
            0xFF => (self.read_u64_le(context)?, 9),
            small => return Ok(u64::from(small)),
        };
        if varint_len(value) != width {
            return Err(BtcError::NonCanonicalVarInt { value });
        }
        Ok(value)
    }

    /// Read a count of items that each occupy at least `min_item_size` bytes.
    ///
    /// Counts that cannot possibly fit in the rest of the buffer are reported
    /// as truncation before any allocation happens.
    pub fn read_count(&mut self, min_item_size: usize, context: &'static str) -> Result<usize, BtcError> {
        let count = self.read_varint(context)?;
        let needed = (count as u128) * (min_item_size as u128);
        if needed > self.remaining() as u128 {
            return Err(BtcError::TruncatedData {
                context,
                needed: usize::try_from(needed).unwrap_or(usize::MAX),
                available: self.remaining(),
            });
        }
        Ok(count as usize)
    }

    /// Read a varint length prefix followed by that many bytes.
    pub fn read_var_bytes(&mut self, context: &'static str) -> Result<&'a [u8], BtcError> {
        let len = self.read_count(1, context)?;
        self.take(len, context)
    }

    /// Fail with `TrailingData` unless the whole buffer was consumed.
    pub fn finish(self) -> Result<(), BtcError> {
        match self.remaining() {
            0 => Ok(()),
            remaining => Err(BtcError::TrailingData { remaining }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoded(val: u64) -> Vec<u8> {
        let mut buf = Vec::new();
        write_varint(&mut buf, val);
        buf
    }

    #[test]
    fn varint_boundaries() {
        assert_eq!(encoded(0xFC), vec![0xFC]);
        assert_eq!(encoded(0xFD), vec![0xFD, 0xFD, 0x00]);
        assert_eq!(encoded(0xFFFF), vec![0xFD, 0xFF, 0xFF]);
        assert_eq!(encoded(0x1_0000), vec![0xFE, 0x00, 0x00, 0x01, 0x00]);
        assert_eq!(
            encoded(0x1_0000_0000),
            vec![0xFF, 0, 0, 0, 0, 1, 0, 0, 0]
        );
    }

    #[test]
    fn varint_len_matches_encoding() {
        for val in [0, 0xFC, 0xFD, 0xFFFF, 0x1_0000, 0xFFFF_FFFF, 0x1_0000_0000, u64::MAX] {
            assert_eq!(varint_len(val), encoded(val).len(), "value {val}");
        }
    }

    #[test]
    fn read_varint_values() {
        for val in [0, 1, 0xFC, 0xFD, 0x1234, 0xFFFF, 0x1_0000, 0xDEAD_BEEF, u64::MAX] {
            let buf = encoded(val);
            let mut reader = Reader::new(&buf);
            assert_eq!(reader.read_varint("test").unwrap(), val);
            assert!(reader.finish().is_ok());
        }
    }

    #[test]
    fn rejects_non_canonical_varint() {
        let mut reader = Reader::new(&[0xFD, 0x10, 0x00]);
        assert!(matches!(
            reader.read_varint("count"),
            Err(BtcError::NonCanonicalVarInt { value: 0x10 })
        ));

        let mut reader = Reader::new(&[0xFE, 0xFF, 0x00, 0x00, 0x00]);
        assert!(matches!(
            reader.read_varint("count"),
            Err(BtcError::NonCanonicalVarInt { value: 0xFF })
        ));
    }

    #[test]
    fn truncated_read_reports_context() {
        let mut reader = Reader::new(&[0x01, 0x02]);
        match reader.read_u32_le("version") {
            Err(BtcError::TruncatedData {
                context,
                needed,
                available,
            }) => {
                assert_eq!(context, "version");
                assert_eq!(needed, 4);
                assert_eq!(available, 2);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn oversized_count_is_truncation() {
        // Claims 0xFFFF items of at least 41 bytes in a 3-byte buffer.
        let mut reader = Reader::new(&[0xFD, 0xFF, 0xFF]);
        assert!(matches!(
            reader.read_count(41, "input count"),
            Err(BtcError::TruncatedData { .. })
        ));
    }

    #[test]
    fn finish_reports_trailing_bytes() {
        let mut reader = Reader::new(&[0x00, 0xAA, 0xBB]);
        reader.read_u8("byte").unwrap();
        assert!(matches!(
            reader.finish(),
            Err(BtcError::TrailingData { remaining: 2 })
        ));
    }
}

//! Low-level protobuf wire format parsing.
//!
//! Each protobuf field is encoded as a varint "tag" carrying the field number
//! and wire type, followed by the field data. Wire types:
//!
//! - 0: VARINT (int32, int64, uint32, uint64, sint32, sint64, bool, enum)
//! - 1: I64 (fixed64, sfixed64, double)
//! - 2: LEN (string, bytes, embedded messages, packed repeated fields)
//! - 5: I32 (fixed32, sfixed32, float)

use crate::error::{Error, Result};
use crate::MAX_FIELD_NUMBER;

/// Protobuf wire types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub(crate) enum WireType {
    /// Variable-length integer
    Varint = 0,
    /// 64-bit fixed-width
    I64 = 1,
    /// Length-delimited (strings, bytes, embedded messages)
    Len = 2,
    /// Start group (deprecated)
    StartGroup = 3,
    /// End group (deprecated)
    EndGroup = 4,
    /// 32-bit fixed-width
    I32 = 5,
}

impl TryFrom<u8> for WireType {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(WireType::Varint),
            1 => Ok(WireType::I64),
            2 => Ok(WireType::Len),
            3 => Ok(WireType::StartGroup),
            4 => Ok(WireType::EndGroup),
            5 => Ok(WireType::I32),
            _ => Err(Error::invalid_wire_format(
                0,
                format!("unknown wire type: {}", value),
            )),
        }
    }
}

/// Decode a varint from the given bytes.
///
/// Returns the decoded value and the number of bytes consumed.
pub(crate) fn decode_varint(data: &[u8]) -> Result<(u64, usize)> {
    let mut result: u64 = 0;
    let mut shift = 0;

    for (i, &byte) in data.iter().enumerate() {
        if i >= 10 {
            // Varints are at most 10 bytes for a 64-bit value
            return Err(Error::varint_decode(i));
        }

        result |= ((byte & 0x7F) as u64) << shift;
        shift += 7;

        if byte & 0x80 == 0 {
            return Ok((result, i + 1));
        }
    }

    Err(Error::varint_decode(data.len()))
}

/// Cursor over a byte slice exposing wire-level reads.
///
/// All errors carry offsets relative to the start of the slice, so callers
/// that begin at a candidate offset inside a larger buffer report positions
/// within the candidate span.
#[derive(Debug)]
pub(crate) struct WireReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> WireReader<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Current position within the slice
    pub(crate) fn pos(&self) -> usize {
        self.pos
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    fn remaining(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }

    /// Reads one varint
    pub(crate) fn read_varint(&mut self) -> Result<u64> {
        let (value, len) =
            decode_varint(self.remaining()).map_err(|_| Error::varint_decode(self.pos))?;
        self.pos += len;
        Ok(value)
    }

    /// Reads a field tag, splitting it into field number and wire type.
    ///
    /// Field number 0 is an error: embedded descriptors are NUL-terminated
    /// C strings, so a zero tag marks the end of the record rather than a
    /// field.
    pub(crate) fn read_tag(&mut self) -> Result<(u32, WireType)> {
        let offset = self.pos;
        let tag = self.read_varint()?;
        let field_number = (tag >> 3) as u32;
        if field_number == 0 {
            return Err(Error::invalid_wire_format(offset, "zero field number in tag"));
        }
        if field_number > MAX_FIELD_NUMBER {
            return Err(Error::InvalidFieldNumber {
                number: field_number,
                max: MAX_FIELD_NUMBER,
            });
        }
        let wire_type = WireType::try_from((tag & 0x07) as u8)
            .map_err(|_| Error::invalid_wire_format(offset, format!("bad wire type in tag {tag:#x}")))?;
        Ok((field_number, wire_type))
    }

    /// Reads a length-delimited payload, returning the sub-slice.
    pub(crate) fn read_len_delimited(&mut self) -> Result<&'a [u8]> {
        let offset = self.pos;
        let len = self.read_varint()? as usize;
        let available = self.data.len() - self.pos;
        if len > available {
            return Err(Error::truncated(offset, len, available));
        }
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    /// Reads a length-delimited payload as UTF-8 text.
    pub(crate) fn read_string(&mut self) -> Result<String> {
        let offset = self.pos;
        let bytes = self.read_len_delimited()?;
        String::from_utf8(bytes.to_vec())
            .map_err(|_| Error::invalid_wire_format(offset, "string field is not valid UTF-8"))
    }

    /// Reads a varint as a (possibly sign-extended) int32.
    pub(crate) fn read_int32(&mut self) -> Result<i32> {
        Ok(self.read_varint()? as i32)
    }

    /// Reads a varint as a bool.
    pub(crate) fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_varint()? != 0)
    }

    /// Reads a 32-bit fixed-width value.
    pub(crate) fn read_fixed32(&mut self) -> Result<u32> {
        let offset = self.pos;
        let available = self.data.len() - self.pos;
        if available < 4 {
            return Err(Error::truncated(offset, 4, available));
        }
        let mut buf = [0u8; 4];
        buf.copy_from_slice(&self.data[self.pos..self.pos + 4]);
        self.pos += 4;
        Ok(u32::from_le_bytes(buf))
    }

    /// Reads a 64-bit fixed-width value.
    pub(crate) fn read_fixed64(&mut self) -> Result<u64> {
        let offset = self.pos;
        let available = self.data.len() - self.pos;
        if available < 8 {
            return Err(Error::truncated(offset, 8, available));
        }
        let mut buf = [0u8; 8];
        buf.copy_from_slice(&self.data[self.pos..self.pos + 8]);
        self.pos += 8;
        Ok(u64::from_le_bytes(buf))
    }

    /// Skips one field's payload according to its wire type.
    pub(crate) fn skip(&mut self, wire_type: WireType) -> Result<()> {
        let offset = self.pos;
        match wire_type {
            WireType::Varint => {
                self.read_varint()?;
            }
            WireType::I64 => {
                if self.data.len() - self.pos < 8 {
                    return Err(Error::truncated(offset, 8, self.data.len() - self.pos));
                }
                self.pos += 8;
            }
            WireType::Len => {
                self.read_len_delimited()?;
            }
            // Group tags carry no payload of their own; the content between
            // start and end tags is parsed as further fields.
            WireType::StartGroup | WireType::EndGroup => {}
            WireType::I32 => {
                if self.data.len() - self.pos < 4 {
                    return Err(Error::truncated(offset, 4, self.data.len() - self.pos));
                }
                self.pos += 4;
            }
        }
        Ok(())
    }
}

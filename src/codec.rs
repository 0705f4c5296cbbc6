// SMPP v3.4 codec - separates wire format concerns from the PDU models.
//
// The header is kept as raw integers rather than typed enums: a gateway
// must echo whatever sequence number the peer sent and must tolerate
// command identifiers it does not implement (they are ignored, not fatal),
// so the id/status typing happens one layer up in `frame`.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::io::Cursor;
use thiserror::Error;

/// Maximum allowed PDU size to prevent memory exhaustion attacks
pub const MAX_PDU_SIZE: u32 = 65536; // 64KB

/// SMPP v3.4 PDU header (16 bytes, common to all PDUs)
///
/// Four big-endian 32-bit words per Section 2.2.1:
/// command_length, command_id, command_status, sequence_number.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PduHeader {
    pub command_length: u32,
    pub command_id: u32,
    pub command_status: u32,
    pub sequence_number: u32,
}

impl PduHeader {
    pub const SIZE: usize = 16;

    /// Decode a PDU header from the buffer with length validation.
    pub fn decode(buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        if buf.remaining() < Self::SIZE {
            return Err(CodecError::Incomplete);
        }

        let command_length = buf.get_u32();
        let command_id = buf.get_u32();
        let command_status = buf.get_u32();
        let sequence_number = buf.get_u32();

        if command_length < Self::SIZE as u32 {
            return Err(CodecError::InvalidLength {
                length: command_length,
            });
        }

        if command_length > MAX_PDU_SIZE {
            return Err(CodecError::OversizedPdu {
                length: command_length,
            });
        }

        Ok(PduHeader {
            command_length,
            command_id,
            command_status,
            sequence_number,
        })
    }

    /// Encode this header to the buffer.
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u32(self.command_length);
        buf.put_u32(self.command_id);
        buf.put_u32(self.command_status);
        buf.put_u32(self.sequence_number);
    }

    /// Number of body bytes following this header.
    pub fn body_length(&self) -> usize {
        self.command_length as usize - Self::SIZE
    }
}

/// Codec errors with enough context to log why a session died.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Not enough buffered data to finish the current PDU. The connection
    /// layer treats this as "read more", not as a failure.
    #[error("incomplete PDU: need more data")]
    Incomplete,

    /// The stream ended in the middle of a PDU.
    #[error("stream ended mid-PDU")]
    ShortRead,

    /// command_length claims fewer bytes than the header itself.
    #[error("invalid command_length: {length} (minimum 16)")]
    InvalidLength { length: u32 },

    /// command_length exceeds the 64 KiB ceiling.
    #[error("oversized PDU: {length} bytes (maximum {MAX_PDU_SIZE})")]
    OversizedPdu { length: u32 },

    /// A C-octet string field ran off the end of the body.
    #[error("field '{field}' is missing its null terminator")]
    MissingNullTerminator { field: &'static str },

    /// The body ended before a fixed-width field.
    #[error("truncated body while reading field '{field}'")]
    TruncatedField { field: &'static str },

    #[error("invalid UTF-8 in field '{field}'")]
    Utf8Error {
        field: &'static str,
        #[source]
        source: std::string::FromUtf8Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Trait for PDUs the gateway emits.
pub trait Encodable {
    /// Encode this PDU (header and body) into the buffer.
    fn encode(&self, buf: &mut BytesMut);

    /// Convert this PDU to bytes, fixing up command_length afterwards so
    /// encoders never have to precompute body sizes.
    fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::new();
        self.encode(&mut buf);

        if buf.len() >= 4 {
            let length = buf.len() as u32;
            buf[0..4].copy_from_slice(&length.to_be_bytes());
        }

        buf.freeze()
    }
}

/// Trait for PDUs the gateway consumes.
pub trait Decodable: Sized {
    /// Decode the PDU body. The cursor covers only the body bytes; the
    /// header has already been consumed.
    fn decode(header: &PduHeader, buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError>;
}

/// Read a NUL-terminated C-octet string, consuming the terminator.
///
/// SubmitSM and bind bodies carry variable-length C-strings; we scan for
/// the terminator within the body rather than assuming fixed widths.
pub fn decode_cstring(
    buf: &mut Cursor<&[u8]>,
    field: &'static str,
) -> Result<String, CodecError> {
    let chunk = buf.chunk();
    let end = chunk
        .iter()
        .position(|&b| b == 0)
        .ok_or(CodecError::MissingNullTerminator { field })?;

    let raw = chunk[..end].to_vec();
    buf.advance(end + 1);

    String::from_utf8(raw).map_err(|source| CodecError::Utf8Error { field, source })
}

/// Skip over a NUL-terminated C-octet string without retaining it.
pub fn skip_cstring(buf: &mut Cursor<&[u8]>, field: &'static str) -> Result<(), CodecError> {
    let end = buf
        .chunk()
        .iter()
        .position(|&b| b == 0)
        .ok_or(CodecError::MissingNullTerminator { field })?;
    buf.advance(end + 1);
    Ok(())
}

/// Advance past `n` fixed-width octets.
pub fn skip_octets(
    buf: &mut Cursor<&[u8]>,
    n: usize,
    field: &'static str,
) -> Result<(), CodecError> {
    if buf.remaining() < n {
        return Err(CodecError::TruncatedField { field });
    }
    buf.advance(n);
    Ok(())
}

/// Decode a single octet.
pub fn decode_u8(buf: &mut Cursor<&[u8]>, field: &'static str) -> Result<u8, CodecError> {
    if !buf.has_remaining() {
        return Err(CodecError::TruncatedField { field });
    }
    Ok(buf.get_u8())
}

/// Write a variable-length C-octet string: the bytes followed by NUL.
pub fn encode_cstring(buf: &mut BytesMut, value: &str) {
    buf.put_slice(value.as_bytes());
    buf.put_u8(0);
}

/// Assemble a complete PDU from its raw parts.
///
/// Used for the header-only error responses where building a typed PDU
/// would be noise.
pub fn encode_pdu(command_id: u32, command_status: u32, sequence_number: u32, body: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(PduHeader::SIZE + body.len());
    let header = PduHeader {
        command_length: (PduHeader::SIZE + body.len()) as u32,
        command_id,
        command_status,
        sequence_number,
    };
    header.encode(&mut buf);
    buf.put_slice(body);
    buf.freeze()
}

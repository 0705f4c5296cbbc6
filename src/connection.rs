// ABOUTME: Frame-oriented read side of an SMPP session over TCP
// ABOUTME: Buffers socket reads and yields whole PDUs or typed errors

use crate::codec::{CodecError, PduHeader};
use crate::frame::Frame;
use bytes::{Buf, BytesMut};
use std::io::Cursor;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Reads SMPP frames from the inbound half of a session socket.
///
/// The write side is owned by the session's writer task; readers never
/// write. Buffering follows the usual shape: accumulate bytes until a
/// whole PDU (`command_length` octets) is available, parse it, advance
/// the buffer, repeat.
#[derive(Debug)]
pub struct Connection<R> {
    stream: R,

    // The buffer for reading frames.
    buffer: BytesMut,
}

impl<R: AsyncRead + Unpin> Connection<R> {
    pub fn new(stream: R) -> Connection<R> {
        Connection {
            stream,
            // 4KB covers every PDU in the gateway's command set without
            // reallocation; larger submits grow the buffer on demand.
            buffer: BytesMut::with_capacity(4 * 1024),
        }
    }

    /// Read a single `Frame` from the underlying stream.
    ///
    /// Waits until enough data has arrived to parse a whole PDU. Data
    /// left over after the frame stays buffered for the next call.
    ///
    /// # Returns
    ///
    /// `Ok(Some(frame))` on success. `Ok(None)` when the peer closed the
    /// connection cleanly on a PDU boundary. `Err(CodecError::ShortRead)`
    /// when the stream ended mid-PDU, and other codec errors when the
    /// peer sent something unparseable; in either case the session is
    /// torn down without attempting to resynchronize the framing.
    pub async fn read_frame(&mut self) -> Result<Option<Frame>, CodecError> {
        loop {
            if let Some(frame) = self.parse_frame()? {
                return Ok(Some(frame));
            }

            // Not enough buffered data for a frame; pull more from the
            // socket. `0` indicates end of stream.
            if 0 == self.stream.read_buf(&mut self.buffer).await? {
                // A clean shutdown leaves no partial frame behind.
                return if self.buffer.is_empty() {
                    Ok(None)
                } else {
                    Err(CodecError::ShortRead)
                };
            }
        }
    }

    /// Try to parse one frame out of the buffer. `Ok(None)` means more
    /// data is needed; errors mean the stream is corrupt.
    fn parse_frame(&mut self) -> Result<Option<Frame>, CodecError> {
        if self.buffer.len() < PduHeader::SIZE {
            return Ok(None);
        }

        let mut cursor = Cursor::new(&self.buffer[..]);
        let header = PduHeader::decode(&mut cursor)?;

        let total = header.command_length as usize;
        if self.buffer.len() < total {
            // Header is valid but the body has not fully arrived yet.
            return Ok(None);
        }

        let body = &self.buffer[PduHeader::SIZE..total];
        let mut body_cursor = Cursor::new(body);
        let frame = Frame::parse(&header, &mut body_cursor)?;

        self.buffer.advance(total);
        Ok(Some(frame))
    }
}

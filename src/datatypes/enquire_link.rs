use crate::codec::{CodecError, Decodable, Encodable, PduHeader};
use crate::datatypes::{CommandId, CommandStatus};
use bytes::BytesMut;
use std::io::Cursor;

/// enquire_link PDU (Section 4.11.1) - Keep-alive message
///
/// The enquire_link operation provides a confidence check of the
/// communication path between an ESME and an SMSC. Peers send it every
/// few seconds and hold back submits until the response arrives, so the
/// session layer answers it on a fast path that never waits on a flush.
#[derive(Clone, Debug, PartialEq)]
pub struct EnquireLink {
    pub sequence_number: u32,
}

/// enquire_link_resp PDU (Section 4.11.2) - Keep-alive response
#[derive(Clone, Debug, PartialEq)]
pub struct EnquireLinkResponse {
    pub sequence_number: u32,
}

impl Decodable for EnquireLink {
    fn decode(header: &PduHeader, _buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        Ok(EnquireLink {
            sequence_number: header.sequence_number,
        })
    }
}

impl EnquireLinkResponse {
    pub fn new(sequence_number: u32) -> Self {
        Self { sequence_number }
    }
}

impl Encodable for EnquireLinkResponse {
    fn encode(&self, buf: &mut BytesMut) {
        let header = PduHeader {
            command_length: PduHeader::SIZE as u32,
            command_id: CommandId::EnquireLinkResp as u32,
            command_status: CommandStatus::Ok as u32,
            sequence_number: self.sequence_number,
        };
        header.encode(buf);
    }
}

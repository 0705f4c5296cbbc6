use crate::codec::{CodecError, Decodable, Encodable, PduHeader};
use crate::datatypes::{CommandId, CommandStatus};
use bytes::BytesMut;
use std::io::Cursor;

/// unbind PDU (Section 4.2.1) - the ESME is closing its SMPP session.
#[derive(Clone, Debug, PartialEq)]
pub struct Unbind {
    pub sequence_number: u32,
}

/// unbind_resp PDU (Section 4.2.2)
#[derive(Clone, Debug, PartialEq)]
pub struct UnbindResponse {
    pub sequence_number: u32,
}

impl Decodable for Unbind {
    fn decode(header: &PduHeader, _buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        Ok(Unbind {
            sequence_number: header.sequence_number,
        })
    }
}

impl UnbindResponse {
    pub fn new(sequence_number: u32) -> Self {
        Self { sequence_number }
    }
}

impl Encodable for UnbindResponse {
    fn encode(&self, buf: &mut BytesMut) {
        let header = PduHeader {
            command_length: PduHeader::SIZE as u32,
            command_id: CommandId::UnbindResp as u32,
            command_status: CommandStatus::Ok as u32,
            sequence_number: self.sequence_number,
        };
        header.encode(buf);
    }
}

use crate::codec::{
    CodecError, Decodable, Encodable, PduHeader, decode_cstring, decode_u8, encode_cstring,
    skip_cstring, skip_octets,
};
use crate::datatypes::{CommandId, CommandStatus};
use bytes::{Buf, BytesMut};
use std::io::Cursor;

/// This operation is used by an ESME to submit a short message to the SMSC
/// (Section 4.4.1). The gateway routes every submit through the HLR
/// decision pipeline, so only the addressing triple is retained; the
/// remaining mandatory fields are walked and discarded, and optional TLVs
/// after the short message are ignored.
#[derive(Clone, Debug, PartialEq)]
pub struct SubmitSm {
    pub sequence_number: u32,

    /// 4.4.1 source_addr: address of the SME which originated the message.
    pub source_addr: String,

    /// 4.4.1 destination_addr: the MSISDN whose fate the HLR decides.
    pub destination_addr: String,

    /// 4.4.1 short_message: up to 254 octets of user data, kept as raw
    /// bytes since the gateway never interprets the payload.
    pub short_message: Vec<u8>,
}

impl Decodable for SubmitSm {
    fn decode(header: &PduHeader, buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        skip_cstring(buf, "service_type")?;
        skip_octets(buf, 2, "source_addr_ton/npi")?;
        let source_addr = decode_cstring(buf, "source_addr")?;
        skip_octets(buf, 2, "dest_addr_ton/npi")?;
        let destination_addr = decode_cstring(buf, "destination_addr")?;
        skip_octets(buf, 3, "esm_class/protocol_id/priority_flag")?;
        skip_cstring(buf, "schedule_delivery_time")?;
        skip_cstring(buf, "validity_period")?;
        skip_octets(buf, 4, "registered_delivery/replace/data_coding/sm_default_msg_id")?;

        let sm_length = decode_u8(buf, "sm_length")? as usize;
        if buf.remaining() < sm_length {
            return Err(CodecError::TruncatedField {
                field: "short_message",
            });
        }
        let short_message = buf.copy_to_bytes(sm_length).to_vec();

        // Anything left is optional TLV parameters; not our concern.
        let trailing = buf.remaining();
        buf.advance(trailing);

        Ok(SubmitSm {
            sequence_number: header.sequence_number,
            source_addr,
            destination_addr,
            short_message,
        })
    }
}

/// submit_sm_resp PDU (Section 4.4.2).
///
/// The message_id body field is always present, encoded as a C-octet
/// string; rejections carry an empty id (a lone NUL), matching what
/// deployed ESMEs expect from this gateway.
#[derive(Clone, Debug, PartialEq)]
pub struct SubmitSmResponse {
    pub command_status: CommandStatus,
    pub sequence_number: u32,
    pub message_id: String,
}

impl SubmitSmResponse {
    pub fn ok(sequence_number: u32, message_id: String) -> Self {
        Self {
            command_status: CommandStatus::Ok,
            sequence_number,
            message_id,
        }
    }

    pub fn error(sequence_number: u32, status: CommandStatus) -> Self {
        Self {
            command_status: status,
            sequence_number,
            message_id: String::new(),
        }
    }
}

impl Encodable for SubmitSmResponse {
    fn encode(&self, buf: &mut BytesMut) {
        let header = PduHeader {
            command_length: 0, // fixed up by to_bytes
            command_id: CommandId::SubmitSmResp as u32,
            command_status: self.command_status as u32,
            sequence_number: self.sequence_number,
        };
        header.encode(buf);
        encode_cstring(buf, &self.message_id);
    }
}

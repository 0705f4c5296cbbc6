use crate::codec::{CodecError, Decodable, Encodable, PduHeader, encode_cstring};
use crate::datatypes::{CommandId, CommandStatus};
use bytes::{BufMut, BytesMut};
use std::io::Cursor;

/// deliver_sm PDU (Section 4.6.1), as emitted by the gateway.
///
/// The only deliver_sm this gateway ever sends is an SMSC delivery
/// receipt, so the PDU is specialized for that shape:
/// esm_class = 0x04 (SMSC Delivery Receipt), TON/NPI = International/ISDN
/// on both addresses, registered_delivery = 1, data_coding = 0 and the
/// receipt text as the short message.
#[derive(Clone, Debug, PartialEq)]
pub struct DeliverSm {
    pub sequence_number: u32,

    /// Originating address of the receipt: the MSISDN the ESME tried to
    /// reach.
    pub source_addr: String,

    /// Receiving address: the ESME's original source address.
    pub destination_addr: String,

    /// ASCII receipt text ("id:... stat:DELIVRD err:000 text:").
    pub short_message: Vec<u8>,
}

/// esm_class for an SMSC delivery receipt (Section 5.2.12).
pub const ESM_CLASS_DELIVERY_RECEIPT: u8 = 0x04;

impl DeliverSm {
    pub fn delivery_receipt(
        sequence_number: u32,
        source_addr: &str,
        destination_addr: &str,
        text: &[u8],
    ) -> Self {
        Self {
            sequence_number,
            source_addr: source_addr.to_string(),
            destination_addr: destination_addr.to_string(),
            short_message: text.to_vec(),
        }
    }
}

impl Encodable for DeliverSm {
    fn encode(&self, buf: &mut BytesMut) {
        let header = PduHeader {
            command_length: 0, // fixed up by to_bytes
            command_id: CommandId::DeliverSm as u32,
            command_status: CommandStatus::Ok as u32,
            sequence_number: self.sequence_number,
        };
        header.encode(buf);

        encode_cstring(buf, ""); // service_type
        buf.put_u8(0x01); // source_addr_ton (International)
        buf.put_u8(0x01); // source_addr_npi (ISDN)
        encode_cstring(buf, &self.source_addr);
        buf.put_u8(0x01); // dest_addr_ton
        buf.put_u8(0x01); // dest_addr_npi
        encode_cstring(buf, &self.destination_addr);
        buf.put_u8(ESM_CLASS_DELIVERY_RECEIPT);
        buf.put_u8(0x00); // protocol_id
        buf.put_u8(0x00); // priority_flag
        encode_cstring(buf, ""); // schedule_delivery_time
        encode_cstring(buf, ""); // validity_period
        buf.put_u8(0x01); // registered_delivery
        buf.put_u8(0x00); // replace_if_present_flag
        buf.put_u8(0x00); // data_coding (SMSC default)
        buf.put_u8(0x00); // sm_default_msg_id
        buf.put_u8(self.short_message.len() as u8);
        buf.put_slice(&self.short_message);
    }
}

/// deliver_sm_resp PDU (Section 4.6.2), received from the ESME after a
/// receipt is delivered. Nothing beyond the header matters to us.
#[derive(Clone, Debug, PartialEq)]
pub struct DeliverSmResponse {
    pub command_status: u32,
    pub sequence_number: u32,
}

impl Decodable for DeliverSmResponse {
    fn decode(header: &PduHeader, _buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        Ok(DeliverSmResponse {
            command_status: header.command_status,
            sequence_number: header.sequence_number,
        })
    }
}

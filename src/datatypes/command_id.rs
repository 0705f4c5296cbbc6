// ABOUTME: Defines the SMPP v3.4 command identifiers the gateway handles
// ABOUTME: Implements command_id field mapping and response bit handling

use num_enum::TryFromPrimitive;

/// SMPP v3.4 Command Identifiers (Table 4-1), restricted to the set an
/// HLR gateway terminates.
///
/// ## Command ID Structure
/// - **Bit 31 (MSB)**: Response indicator bit
///   - 0 = Request PDU
///   - 1 = Response PDU
/// - **Bits 30-0**: Command type identifier
///
/// Identifiers outside this set are not an error: the session layer
/// ignores them and keeps the connection open.
#[derive(TryFromPrimitive)]
#[repr(u32)]
#[derive(Clone, Debug, PartialEq, Eq, Hash, Copy)]
pub enum CommandId {
    /// bind_transmitter PDU (Section 4.1.1) - Bind as message transmitter
    BindTransmitter = 0x0000_0001,
    /// bind_transmitter_resp PDU (Section 4.1.2)
    BindTransmitterResp = 0x8000_0001,
    /// bind_receiver PDU (Section 4.1.1) - Bind as message receiver
    BindReceiver = 0x0000_0002,
    /// bind_receiver_resp PDU (Section 4.1.2)
    BindReceiverResp = 0x8000_0002,

    /// submit_sm PDU (Section 4.4.1) - Submit short message
    SubmitSm = 0x0000_0004,
    /// submit_sm_resp PDU (Section 4.4.2)
    SubmitSmResp = 0x8000_0004,

    /// deliver_sm PDU (Section 4.6.1) - Deliver message to ESME; carries
    /// the delivery receipts this gateway emits
    DeliverSm = 0x0000_0005,
    /// deliver_sm_resp PDU (Section 4.6.2)
    DeliverSmResp = 0x8000_0005,

    /// unbind PDU (Section 4.2.1) - Unbind from the SMSC
    Unbind = 0x0000_0006,
    /// unbind_resp PDU (Section 4.2.2)
    UnbindResp = 0x8000_0006,

    /// bind_transceiver PDU (Section 4.2.5) - Bind as transceiver (TX+RX)
    BindTransceiver = 0x0000_0009,
    /// bind_transceiver_resp PDU (Section 4.2.6)
    BindTransceiverResp = 0x8000_0009,

    /// enquire_link PDU (Section 4.11.1) - Link verification request
    EnquireLink = 0x0000_0015,
    /// enquire_link_resp PDU (Section 4.11.2)
    EnquireLinkResp = 0x8000_0015,
}

impl CommandId {
    /// Check if this command_id represents a response PDU
    pub fn is_response(&self) -> bool {
        (*self as u32) & 0x8000_0000 != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_id_is_response() {
        assert!(!CommandId::SubmitSm.is_response());
        assert!(CommandId::SubmitSmResp.is_response());
        assert!(!CommandId::EnquireLink.is_response());
        assert!(CommandId::DeliverSmResp.is_response());
    }

    #[test]
    fn bind_command_ids_match_the_wire() {
        assert_eq!(CommandId::BindTransmitter as u32, 0x0000_0001);
        assert_eq!(CommandId::BindReceiver as u32, 0x0000_0002);
        assert_eq!(CommandId::BindTransceiver as u32, 0x0000_0009);
        assert_eq!(CommandId::BindTransmitterResp as u32, 0x8000_0001);
        assert_eq!(CommandId::BindReceiverResp as u32, 0x8000_0002);
    }

    #[test]
    fn unknown_command_id_is_not_a_variant() {
        assert!(CommandId::try_from(0x0000_0103u32).is_err());
        assert!(CommandId::try_from(0xDEAD_BEEFu32).is_err());
    }
}

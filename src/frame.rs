//! Provides a type representing an inbound SMPP frame as well as the
//! dispatch from a decoded header to the right PDU parser.

use crate::codec::{CodecError, Decodable, PduHeader};
use crate::datatypes::{
    BindKind, BindRequest, CommandId, DeliverSmResponse, EnquireLink, SubmitSm, Unbind,
};
use std::io::Cursor;

/// One inbound PDU, as seen by the session layer.
///
/// The gateway is a pure server: it parses the requests an ESME can send
/// plus deliver_sm_resp (the ack for the receipts we push). Everything
/// else lands in `Unknown` and is ignored without closing the session.
#[derive(Clone, Debug)]
pub enum Frame {
    Bind(BindRequest),
    SubmitSm(SubmitSm),
    EnquireLink(EnquireLink),
    Unbind(Unbind),
    DeliverSmResp(DeliverSmResponse),
    Unknown { command_id: u32, sequence_number: u32 },
}

impl Frame {
    /// Parse the body for a validated header. The cursor covers exactly
    /// the `command_length - 16` body bytes.
    pub fn parse(header: &PduHeader, buf: &mut Cursor<&[u8]>) -> Result<Frame, CodecError> {
        let command_id = match CommandId::try_from(header.command_id) {
            Ok(id) => id,
            Err(_) => {
                return Ok(Frame::Unknown {
                    command_id: header.command_id,
                    sequence_number: header.sequence_number,
                });
            }
        };

        let frame = match command_id {
            CommandId::BindTransmitter | CommandId::BindReceiver | CommandId::BindTransceiver => {
                // from_command cannot fail for the three ids matched here
                let kind = BindKind::from_command(command_id).unwrap_or(BindKind::Transmitter);
                Frame::Bind(BindRequest::parse(kind, header, buf)?)
            }
            CommandId::SubmitSm => Frame::SubmitSm(SubmitSm::decode(header, buf)?),
            CommandId::EnquireLink => Frame::EnquireLink(EnquireLink::decode(header, buf)?),
            CommandId::Unbind => Frame::Unbind(Unbind::decode(header, buf)?),
            CommandId::DeliverSmResp => {
                Frame::DeliverSmResp(DeliverSmResponse::decode(header, buf)?)
            }
            // Response ids we never expect inbound (we are the SMSC side);
            // treat them like any other command we don't handle.
            _ => Frame::Unknown {
                command_id: header.command_id,
                sequence_number: header.sequence_number,
            },
        };

        Ok(frame)
    }

    /// The command name for logging.
    pub fn command_name(&self) -> &'static str {
        match self {
            Frame::Bind(bind) => match bind.kind {
                BindKind::Transmitter => "BIND_TRANSMITTER",
                BindKind::Receiver => "BIND_RECEIVER",
                BindKind::Transceiver => "BIND_TRANSCEIVER",
            },
            Frame::SubmitSm(_) => "SUBMIT_SM",
            Frame::EnquireLink(_) => "ENQUIRE_LINK",
            Frame::Unbind(_) => "UNBIND",
            Frame::DeliverSmResp(_) => "DELIVER_SM_RESP",
            Frame::Unknown { .. } => "UNKNOWN",
        }
    }

    /// The sequence number carried by this frame.
    pub fn sequence_number(&self) -> u32 {
        match self {
            Frame::Bind(pdu) => pdu.sequence_number,
            Frame::SubmitSm(pdu) => pdu.sequence_number,
            Frame::EnquireLink(pdu) => pdu.sequence_number,
            Frame::Unbind(pdu) => pdu.sequence_number,
            Frame::DeliverSmResp(pdu) => pdu.sequence_number,
            Frame::Unknown {
                sequence_number, ..
            } => *sequence_number,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(command_id: u32, sequence_number: u32, body: &[u8]) -> Result<Frame, CodecError> {
        let header = PduHeader {
            command_length: (PduHeader::SIZE + body.len()) as u32,
            command_id,
            command_status: 0,
            sequence_number,
        };
        let mut cursor = Cursor::new(body);
        Frame::parse(&header, &mut cursor)
    }

    #[test]
    fn parses_bind_transceiver() {
        let frame = parse(0x0000_0009, 2, b"esmeid\0password\0type\0\x34\x00\x00\0").unwrap();
        match frame {
            Frame::Bind(bind) => {
                assert_eq!(bind.kind, BindKind::Transceiver);
                assert_eq!(bind.system_id, "esmeid");
                assert_eq!(bind.password, "password");
            }
            other => panic!("unexpected frame: {other:?}"),
        }
    }

    #[test]
    fn bind_kind_follows_the_command_id() {
        let body = &b"esmeid\0password\0\0\x34\x01\x01\0"[..];

        let frame = parse(0x0000_0001, 1, body).unwrap();
        match frame {
            Frame::Bind(bind) => assert_eq!(bind.kind, BindKind::Transmitter),
            other => panic!("unexpected frame: {other:?}"),
        }

        let frame = parse(0x0000_0002, 1, body).unwrap();
        match frame {
            Frame::Bind(bind) => assert_eq!(bind.kind, BindKind::Receiver),
            other => panic!("unexpected frame: {other:?}"),
        }
    }

    #[test]
    fn parses_enquire_link() {
        let frame = parse(0x0000_0015, 0x12, b"").unwrap();
        assert!(matches!(frame, Frame::EnquireLink(_)));
        assert_eq!(frame.sequence_number(), 0x12);
        assert_eq!(frame.command_name(), "ENQUIRE_LINK");
    }

    #[test]
    fn unknown_command_id_is_tolerated() {
        // data_sm is not part of the gateway's command set
        let frame = parse(0x0000_0103, 4, b"\x01\x02").unwrap();
        match frame {
            Frame::Unknown {
                command_id,
                sequence_number,
            } => {
                assert_eq!(command_id, 0x0000_0103);
                assert_eq!(sequence_number, 4);
            }
            other => panic!("unexpected frame: {other:?}"),
        }
    }

    #[test]
    fn inbound_response_ids_are_tolerated() {
        let frame = parse(0x8000_0002, 6, b"gw\0").unwrap();
        assert!(matches!(frame, Frame::Unknown { .. }));
    }

    #[test]
    fn malformed_submit_sm_is_an_error() {
        // Missing everything after service_type
        let result = parse(0x0000_0004, 1, b"\0\x01\x01");
        assert!(result.is_err());
    }
}

use crate::codec::{CodecError, Encodable, PduHeader, encode_cstring};
use crate::datatypes::{CommandId, CommandStatus};
use bytes::{Buf, BytesMut};
use std::io::Cursor;

/// The three bind operations (Sections 4.1.1 and 4.2.5) folded into one
/// request type. The gateway authenticates all of them identically and
/// only remembers the flavour so the response carries the right
/// command_id and the session knows its direction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BindKind {
    Transmitter,
    Receiver,
    Transceiver,
}

impl BindKind {
    pub fn from_command(command_id: CommandId) -> Option<BindKind> {
        match command_id {
            CommandId::BindTransmitter => Some(BindKind::Transmitter),
            CommandId::BindReceiver => Some(BindKind::Receiver),
            CommandId::BindTransceiver => Some(BindKind::Transceiver),
            _ => None,
        }
    }

    pub fn request_id(&self) -> CommandId {
        match self {
            BindKind::Transmitter => CommandId::BindTransmitter,
            BindKind::Receiver => CommandId::BindReceiver,
            BindKind::Transceiver => CommandId::BindTransceiver,
        }
    }

    pub fn response_id(&self) -> CommandId {
        match self {
            BindKind::Transmitter => CommandId::BindTransmitterResp,
            BindKind::Receiver => CommandId::BindReceiverResp,
            BindKind::Transceiver => CommandId::BindTransceiverResp,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BindKind::Transmitter => "TX",
            BindKind::Receiver => "RX",
            BindKind::Transceiver => "TRX",
        }
    }
}

/// A parsed bind request.
///
/// Only system_id and password matter for authentication. The remaining
/// body fields (system_type, interface_version, addr_ton, addr_npi,
/// address_range per Section 4.1.1) are deliberately not modeled: the
/// body is split on NUL and everything after the second C-string is
/// ignored, which also tolerates clients that send short bodies.
#[derive(Clone, Debug, PartialEq)]
pub struct BindRequest {
    pub kind: BindKind,
    pub sequence_number: u32,
    pub system_id: String,
    pub password: String,
}

impl BindRequest {
    pub fn parse(
        kind: BindKind,
        header: &PduHeader,
        buf: &mut Cursor<&[u8]>,
    ) -> Result<Self, CodecError> {
        let remaining = buf.chunk().to_vec();
        buf.advance(remaining.len());

        let mut fields = remaining.split(|&b| b == 0);
        let system_id = fields
            .next()
            .map(|raw| String::from_utf8_lossy(raw).into_owned())
            .unwrap_or_default();
        let password = fields
            .next()
            .map(|raw| String::from_utf8_lossy(raw).into_owned())
            .unwrap_or_default();

        Ok(BindRequest {
            kind,
            sequence_number: header.sequence_number,
            system_id,
            password,
        })
    }
}

/// Response to any of the three bind flavours.
///
/// On success the body carries the SMSC system_id ("SMPPGateway"); on
/// failure the body is empty and command_status says why.
#[derive(Clone, Debug, PartialEq)]
pub struct BindResponse {
    pub kind: BindKind,
    pub command_status: CommandStatus,
    pub sequence_number: u32,
    pub system_id: Option<String>,
}

impl BindResponse {
    pub fn ok(kind: BindKind, sequence_number: u32, system_id: &str) -> Self {
        Self {
            kind,
            command_status: CommandStatus::Ok,
            sequence_number,
            system_id: Some(system_id.to_string()),
        }
    }

    pub fn error(kind: BindKind, sequence_number: u32, status: CommandStatus) -> Self {
        Self {
            kind,
            command_status: status,
            sequence_number,
            system_id: None,
        }
    }
}

impl Encodable for BindResponse {
    fn encode(&self, buf: &mut BytesMut) {
        let header = PduHeader {
            command_length: 0, // fixed up by to_bytes
            command_id: self.kind.response_id() as u32,
            command_status: self.command_status as u32,
            sequence_number: self.sequence_number,
        };
        header.encode(buf);

        if let Some(system_id) = &self.system_id {
            encode_cstring(buf, system_id);
        }
    }
}

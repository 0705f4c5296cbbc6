// ABOUTME: Defines the SMPP v3.4 command status codes the gateway emits
// ABOUTME: Request PDUs carry status 0; responses carry the result code

use num_enum::TryFromPrimitive;

/// SMPP v3.4 Command Status Codes (Section 5.1.3), restricted to the
/// codes this gateway puts on the wire.
///
/// ## Usage Rules (Section 5.1.3)
/// - **Request PDUs**: always carry command_status 0x00000000 (Ok)
/// - **Response PDUs**: carry the actual result code
#[derive(TryFromPrimitive)]
#[repr(u32)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CommandStatus {
    /// ESME_ROK - No error, operation completed successfully
    Ok = 0x0000_0000,

    /// ESME_RINVBNDSTS - Incorrect bind status for the given command.
    /// Returned to a submit_sm arriving before a successful bind.
    IncorrectBindStatus = 0x0000_0004,

    /// ESME_RSYSERR - System error. Returned when the HLR lookup times
    /// out or fails.
    SystemError = 0x0000_0008,

    /// ESME_RINVDSTADR - Invalid destination address. Returned for
    /// destinations the HLR reports as live subscribers.
    InvalidDestinationAddress = 0x0000_000B,

    /// ESME_RINVPASWD - Invalid password. Returned on failed binds.
    InvalidPassword = 0x0000_000E,
}

impl CommandStatus {
    /// Human readable description for logs.
    pub fn description(&self) -> &'static str {
        match self {
            CommandStatus::Ok => "No Error",
            CommandStatus::IncorrectBindStatus => "Incorrect BIND Status for given command",
            CommandStatus::SystemError => "System Error",
            CommandStatus::InvalidDestinationAddress => "Invalid Destination Address",
            CommandStatus::InvalidPassword => "Invalid Password",
        }
    }
}

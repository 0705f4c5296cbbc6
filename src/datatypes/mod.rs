// SMPP v3.4 data types for the gateway's command set.
//
// One file per PDU family, mirroring the structure of the protocol
// specification. Everything is re-exported flat so call sites can write
// `datatypes::SubmitSm` without caring about the file layout.

mod bind;
mod command_id;
mod command_status;
mod deliver_sm;
pub mod dlr;
mod enquire_link;
mod submit_sm;
mod unbind;

pub use bind::{BindKind, BindRequest, BindResponse};
pub use command_id::CommandId;
pub use command_status::CommandStatus;
pub use deliver_sm::{DeliverSm, DeliverSmResponse, ESM_CLASS_DELIVERY_RECEIPT};
pub use enquire_link::{EnquireLink, EnquireLinkResponse};
pub use submit_sm::{SubmitSm, SubmitSmResponse};
pub use unbind::{Unbind, UnbindResponse};

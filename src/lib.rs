pub mod codec;
pub mod config;
pub mod connection;
pub mod datatypes;
pub mod frame;
pub mod handler;
pub mod hlr;
pub mod metrics;
pub mod server;
pub mod session;
pub mod store;

// Re-export the codec surface for direct access
pub use codec::{CodecError, Decodable, Encodable, MAX_PDU_SIZE, PduHeader};
pub use frame::Frame;

// Re-export the pieces integration tests and the binary wire together
pub use config::Settings;
pub use server::{GatewayServer, Services};

//! Client protocol: message types and codec.

pub mod codec;
pub mod types;

pub use codec::{decode_inbound, encode_outbound};
pub use types::{InboundMessage, OutboundMessage};

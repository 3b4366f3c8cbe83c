//! Gritfall proto -- versioned JSON wire messages.
//!
//! Everything that crosses a socket lives here: client envelopes
//! ([`client`]), server envelopes ([`server`]), and the codec that
//! enforces the wire version ([`codec`]). Marshaling is deterministic:
//! struct fields serialize in declaration order and every map-typed field
//! is a `BTreeMap`, so equal values produce byte-equal JSON.

#![deny(unsafe_code)]

pub mod client;
pub mod codec;
pub mod server;

/// The only wire version this server speaks.
pub const WIRE_VERSION: u8 = 1;

/// Errors produced while decoding inbound messages.
#[derive(Debug, thiserror::Error)]
pub enum ProtoError {
    /// The message was not valid JSON or did not match any known shape.
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The message declared a wire version this server does not speak.
    #[error("unsupported wire version {got} (expected {WIRE_VERSION})")]
    UnsupportedVersion { got: u8 },
}

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::client::{ClientBody, ClientEnvelope};
    pub use crate::codec::{decode_client, encode_server};
    pub use crate::server::{
        JoinResponse, KeyframeMsg, NackReason, ServerBody, StateSnapshot,
    };
    pub use crate::{ProtoError, WIRE_VERSION};
}

//! Encode/decode with wire-version enforcement.

use crate::client::ClientEnvelope;
use crate::server::{ServerBody, ServerEnvelope};
use crate::{ProtoError, WIRE_VERSION};

/// Decode an inbound client message, rejecting unknown wire versions.
pub fn decode_client(text: &str) -> Result<ClientEnvelope, ProtoError> {
    let envelope: ClientEnvelope = serde_json::from_str(text)?;
    if envelope.ver != WIRE_VERSION {
        return Err(ProtoError::UnsupportedVersion { got: envelope.ver });
    }
    Ok(envelope)
}

/// Encode an outbound message, stamping the wire version.
pub fn encode_server(body: &ServerBody) -> String {
    let envelope = ServerEnvelope {
        ver: WIRE_VERSION,
        body: body.clone(),
    };
    serde_json::to_string(&envelope).expect("server messages are always JSON-serializable")
}

/// Decode a server message (client-side helper, used by tests).
pub fn decode_server(text: &str) -> Result<ServerEnvelope, ProtoError> {
    let envelope: ServerEnvelope = serde_json::from_str(text)?;
    if envelope.ver != WIRE_VERSION {
        return Err(ProtoError::UnsupportedVersion { got: envelope.ver });
    }
    Ok(envelope)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

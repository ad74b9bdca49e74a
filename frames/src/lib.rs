//! Shared wire model for the embedded-app message channel.
//!
//! Every message exchanged with the host window is a two-element JSON array:
//! `[opcode, body]`. This crate owns that envelope, the outbound bodies the
//! client produces, and the classifier that turns an inbound `FRAME` body into
//! an [`IncomingPayload`]. Bodies stay flexible (`serde_json::Value`) because
//! the session layer never interprets command-specific data.

pub mod catalog;
pub mod payload;

pub use catalog::{Catalog, DISPATCH, ERROR, READY, SUBSCRIBE, UNSUBSCRIBE};
pub use payload::{IncomingPayload, PayloadKind, classify};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Protocol version announced in the handshake.
pub const PROTOCOL_VERSION: u32 = 1;

/// Body encoding announced in the handshake.
pub const ENCODING: &str = "json";

/// Flat key-value command payload. Alias to reduce noise in signatures.
pub type Data = Map<String, Value>;

/// Error returned while decoding or classifying inbound messages.
///
/// Every variant is a host contract violation; malformed noise on the shared
/// message channel is reported as `Ok(None)` by [`decode_envelope`] instead.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// Element 0 of the envelope is an integer outside the known opcodes.
    #[error("invalid opcode: {0}")]
    InvalidOpcode(i64),
    /// Element 0 of the envelope is present but not an integer.
    #[error("invalid opcode: {0}")]
    NonIntegerOpcode(String),
    /// An event payload named an event outside the known-event set.
    #[error("invalid event: {0}")]
    UnknownEvent(String),
    /// A response payload named a command outside the known-command set.
    #[error("unknown command: {0}")]
    UnknownCommand(String),
    /// A `FRAME` body was not a JSON object.
    #[error("frame body is not an object")]
    NotAnObject,
}

// =============================================================================
// OPCODE
// =============================================================================

/// Outer envelope discriminator, carried as element 0 of every message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Opcode {
    Handshake,
    Frame,
    Close,
    Hello,
}

impl Opcode {
    /// Convert opcode into its wire integer.
    #[must_use]
    pub fn as_i64(self) -> i64 {
        match self {
            Self::Handshake => 0,
            Self::Frame => 1,
            Self::Close => 2,
            Self::Hello => 3,
        }
    }

    /// Parse an opcode from its wire integer.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::InvalidOpcode`] for values outside `0..=3`.
    pub fn from_i64(value: i64) -> Result<Self, CodecError> {
        match value {
            0 => Ok(Self::Handshake),
            1 => Ok(Self::Frame),
            2 => Ok(Self::Close),
            3 => Ok(Self::Hello),
            other => Err(CodecError::InvalidOpcode(other)),
        }
    }
}

// =============================================================================
// ENVELOPE
// =============================================================================

/// A single message on the host channel.
#[derive(Clone, Debug, PartialEq)]
pub struct Envelope {
    pub opcode: Opcode,
    pub body: Value,
}

impl Envelope {
    #[must_use]
    pub fn new(opcode: Opcode, body: Value) -> Self {
        Self { opcode, body }
    }

    /// Encode into the `[opcode, body]` array posted to the host.
    #[must_use]
    pub fn to_value(&self) -> Value {
        Value::Array(vec![Value::from(self.opcode.as_i64()), self.body.clone()])
    }
}

/// Decode an inbound message into an envelope.
///
/// Returns `Ok(None)` when the message is not an array or when element 0 or 1
/// is missing or null. These are dropped silently by the caller.
///
/// # Errors
///
/// Returns [`CodecError::InvalidOpcode`] when element 0 is an integer that
/// does not name a known opcode, and [`CodecError::NonIntegerOpcode`] when it
/// is any other non-null value.
pub fn decode_envelope(message: &Value) -> Result<Option<Envelope>, CodecError> {
    let Some(items) = message.as_array() else {
        return Ok(None);
    };
    let (Some(op), Some(body)) = (items.first(), items.get(1)) else {
        return Ok(None);
    };
    if op.is_null() || body.is_null() {
        return Ok(None);
    }
    let Some(op) = op.as_i64() else {
        return Err(CodecError::NonIntegerOpcode(op.to_string()));
    };

    let opcode = Opcode::from_i64(op)?;
    Ok(Some(Envelope { opcode, body: body.clone() }))
}

// =============================================================================
// OUTBOUND BODIES
// =============================================================================

/// Body of the opening `HANDSHAKE` envelope.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandshakeBody {
    pub v: u32,
    pub encoding: String,
    pub client_id: String,
    pub frame_id: String,
}

impl HandshakeBody {
    #[must_use]
    pub fn new(client_id: impl Into<String>, frame_id: impl Into<String>) -> Self {
        Self {
            v: PROTOCOL_VERSION,
            encoding: ENCODING.to_owned(),
            client_id: client_id.into(),
            frame_id: frame_id.into(),
        }
    }

    /// Wrap into a `HANDSHAKE` envelope.
    #[must_use]
    pub fn into_envelope(self) -> Envelope {
        let body = serde_json::to_value(self).unwrap_or_else(|_| Value::Object(Map::new()));
        Envelope::new(Opcode::Handshake, body)
    }
}

/// Build a command payload `{cmd, args[, evt]}`. The session injects `nonce`.
#[must_use]
pub fn command_body(cmd: &str, args: Value, evt: Option<&str>) -> Data {
    let mut data = Data::new();
    data.insert("cmd".into(), Value::from(cmd));
    data.insert("args".into(), args);
    if let Some(evt) = evt {
        data.insert("evt".into(), Value::from(evt));
    }
    data
}

#[cfg(test)]
#[path = "lib_test.rs"]
mod tests;

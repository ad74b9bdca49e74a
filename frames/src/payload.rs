//! Inbound `FRAME` body classification.
//!
//! DESIGN
//! ======
//! One decoded body resolves to exactly one shape:
//! - `evt == "ERROR"` → error reply to a command
//! - any other `evt` → event (validated against the catalog); when `cmd` is
//!   `DISPATCH` it is an unsolicited host push
//! - no `evt` → plain response (`cmd` validated against the catalog)
//!
//! An `evt` that is absent, null or empty counts as "no evt". Hosts send
//! responses both without the key and with `evt: ""`.

use serde_json::Value;

use crate::CodecError;
use crate::catalog::{Catalog, DISPATCH, ERROR};

/// Shape of an inbound payload, decided by [`classify`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PayloadKind {
    Event,
    Error,
    Response,
}

/// Transient value decoded from one inbound `FRAME` body.
#[derive(Clone, Debug, PartialEq)]
pub struct IncomingPayload {
    pub kind: PayloadKind,
    pub cmd: String,
    /// Empty for plain responses.
    pub evt: String,
    /// Empty only for unsolicited dispatches.
    pub nonce: String,
    /// Opaque body, never interpreted here.
    pub data: Value,
}

impl IncomingPayload {
    /// Unsolicited host push rather than a reply to a command.
    #[must_use]
    pub fn is_dispatch(&self) -> bool {
        self.cmd == DISPATCH
    }
}

/// Classify a `FRAME` body.
///
/// # Errors
///
/// Returns [`CodecError::NotAnObject`] for non-object bodies,
/// [`CodecError::UnknownEvent`] for an event outside the catalog and
/// [`CodecError::UnknownCommand`] for a response naming an unknown command.
pub fn classify(body: &Value, catalog: &Catalog) -> Result<IncomingPayload, CodecError> {
    let Some(fields) = body.as_object() else {
        return Err(CodecError::NotAnObject);
    };

    let cmd = string_field(fields.get("cmd"));
    let nonce = string_field(fields.get("nonce"));
    let data = fields.get("data").cloned().unwrap_or(Value::Null);
    let evt = fields
        .get("evt")
        .and_then(Value::as_str)
        .filter(|evt| !evt.is_empty());

    let (kind, evt) = match evt {
        Some(ERROR) => (PayloadKind::Error, ERROR.to_owned()),
        Some(evt) => {
            if !catalog.is_event(evt) {
                return Err(CodecError::UnknownEvent(evt.to_owned()));
            }
            (PayloadKind::Event, evt.to_owned())
        }
        None => {
            if !catalog.is_command(&cmd) {
                return Err(CodecError::UnknownCommand(cmd));
            }
            (PayloadKind::Response, String::new())
        }
    };

    Ok(IncomingPayload { kind, cmd, evt, nonce, data })
}

fn string_field(value: Option<&Value>) -> String {
    value
        .and_then(Value::as_str)
        .map(ToOwned::to_owned)
        .unwrap_or_default()
}

#[cfg(test)]
#[path = "payload_test.rs"]
mod tests;

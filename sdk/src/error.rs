//! Error types for the session layer.
//!
//! ERROR HANDLING
//! ==============
//! Configuration and protocol contract violations are fatal: they end the
//! session (see [`SdkError::is_fatal`]). Host-reported command failures are
//! not; they reach the caller's completion as a [`CommandError`] and are
//! broadcast on the bus as a [`HostErrorEvent`]. Messages from untrusted
//! origins or with malformed envelopes never become errors at all.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use frames::CodecError;

/// Label carried by every [`HostErrorEvent`].
pub const ERROR_SOURCE: &str = "Discord SDK Error";

/// Error returned by a [`crate::Transport`] when posting to the host fails.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The host side of the channel is gone.
    #[error("host window closed")]
    Closed,
    /// The host environment refused the message.
    #[error("post failed: {0}")]
    Post(String),
}

/// Failure delivered to a pending command's completion.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CommandError {
    /// The host replied with an `ERROR` payload. `data` is the raw error body.
    #[error("host error {code}: {message}")]
    Host { code: i64, message: String, data: Value },
    /// No reply arrived before the configured deadline.
    #[error("command timed out after {0:?}")]
    Timeout(Duration),
    /// The session died while the command was in flight.
    #[error("session terminated: {0}")]
    SessionFailed(String),
    /// The completion was discarded without an outcome.
    #[error("command abandoned")]
    Abandoned,
}

/// Error type for session operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SdkError {
    #[error("missing client id")]
    MissingClientId,
    /// A required launch parameter is absent or empty.
    #[error("missing {0}")]
    MissingParam(&'static str),
    #[error("invalid platform: {0}")]
    InvalidPlatform(String),
    /// A command was issued before the host window was resolved.
    #[error("attempting to send message before initialization")]
    MissingTransport,
    #[error(transparent)]
    Codec(#[from] CodecError),
    /// A plain response arrived without the nonce it was issued with.
    #[error("missing nonce in {cmd} response")]
    MissingNonce { cmd: String },
    #[error("configuration error: {0}")]
    Config(String),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Command(#[from] CommandError),
    /// The session already hit a fatal error.
    #[error("session terminated: {0}")]
    SessionFailed(String),
}

impl SdkError {
    /// Contract violations the client cannot recover from.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::MissingClientId
                | Self::MissingParam(_)
                | Self::InvalidPlatform(_)
                | Self::MissingTransport
                | Self::Codec(_)
                | Self::MissingNonce { .. }
                | Self::Config(_)
        )
    }
}

/// Structured value emitted as the generic `"error"` bus event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostErrorEvent {
    pub code: i64,
    pub message: String,
    pub source: String,
}

impl HostErrorEvent {
    /// Extract `{code, message}` from a host error body.
    #[must_use]
    pub fn from_data(data: &Value) -> Self {
        Self {
            code: data.get("code").and_then(Value::as_i64).unwrap_or_default(),
            message: data
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_owned(),
            source: ERROR_SOURCE.to_owned(),
        }
    }

    /// The error delivered to the originating command.
    #[must_use]
    pub fn to_command_error(&self, data: &Value) -> CommandError {
        CommandError::Host { code: self.code, message: self.message.clone(), data: data.clone() }
    }

    #[must_use]
    pub fn to_value(&self) -> Value {
        serde_json::json!({
            "code": self.code,
            "message": self.message,
            "source": self.source,
        })
    }
}

#[cfg(test)]
#[path = "error_test.rs"]
mod tests;

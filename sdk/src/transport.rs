//! Transport seam between the session and the host window.
//!
//! The embedding environment resolves the host window (the parent's opener
//! when there is one, else the parent) and hands the session a [`HostWindow`].
//! Inbound traffic arrives as [`InboundMessage`]s fed to the dispatcher.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::TransportError;

/// Wildcard target origin used when the host's origin is unknown.
pub const ANY_ORIGIN: &str = "*";

/// Something that can post a message to the host window.
pub trait Transport: Send + Sync {
    /// Post one encoded envelope, addressed to `target_origin`.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] when the host cannot be reached.
    fn post(&self, message: &Value, target_origin: &str) -> Result<(), TransportError>;
}

/// Message received from the host environment's delivery mechanism.
#[derive(Clone, Debug, PartialEq)]
pub struct InboundMessage {
    /// Origin reported by the environment for the sender.
    pub origin: String,
    pub data: Value,
}

impl InboundMessage {
    pub fn new(origin: impl Into<String>, data: Value) -> Self {
        Self { origin: origin.into(), data }
    }
}

/// Message posted by a [`ChannelTransport`].
#[derive(Clone, Debug, PartialEq)]
pub struct OutboundMessage {
    pub message: Value,
    pub target_origin: String,
}

/// Transport that hands every posted message to an in-process channel.
///
/// Native embeddings bridge the receiver to the real host; tests read it
/// directly.
#[derive(Clone)]
pub struct ChannelTransport {
    tx: mpsc::UnboundedSender<OutboundMessage>,
}

impl ChannelTransport {
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<OutboundMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Transport for ChannelTransport {
    fn post(&self, message: &Value, target_origin: &str) -> Result<(), TransportError> {
        self.tx
            .send(OutboundMessage { message: message.clone(), target_origin: target_origin.to_owned() })
            .map_err(|_| TransportError::Closed)
    }
}

/// The resolved host window and what is known about its origin.
#[derive(Clone)]
pub struct HostWindow {
    pub transport: Arc<dyn Transport>,
    /// The embedding document's referrer; empty when unknown.
    pub referrer: String,
}

impl HostWindow {
    /// Pick the parent's opener when present, else the parent itself.
    pub fn resolve(
        parent: Arc<dyn Transport>,
        opener: Option<Arc<dyn Transport>>,
        referrer: impl Into<String>,
    ) -> Self {
        Self { transport: opener.unwrap_or(parent), referrer: referrer.into() }
    }

    /// Origin every outbound message is addressed to.
    #[must_use]
    pub fn trusted_origin(&self) -> String {
        if self.referrer.is_empty() {
            ANY_ORIGIN.to_owned()
        } else {
            self.referrer.clone()
        }
    }
}

/// Everything the embedding environment supplies when a frame starts.
#[derive(Clone)]
pub struct FrameContext {
    /// Origin of the frame's own document.
    pub own_origin: String,
    /// The document's query string, leading `?` optional.
    pub query: String,
    pub host: HostWindow,
}

#[cfg(test)]
#[path = "transport_test.rs"]
mod tests;

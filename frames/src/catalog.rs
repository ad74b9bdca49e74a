//! Known command and event names.
//!
//! The host rejects anything outside these sets, and so does the client: an
//! inbound payload naming an unknown command or event is a contract violation.
//! A [`Catalog`] is built once at startup and only read afterwards.

use std::collections::HashSet;

// =============================================================================
// MARKERS
// =============================================================================

/// `cmd` value of unsolicited host-pushed events.
pub const DISPATCH: &str = "DISPATCH";

/// `evt` value of error replies.
pub const ERROR: &str = "ERROR";

/// Event dispatched by the host once the session is live. Never forwarded.
pub const READY: &str = "READY";

pub const SUBSCRIBE: &str = "SUBSCRIBE";
pub const UNSUBSCRIBE: &str = "UNSUBSCRIBE";

// =============================================================================
// STANDARD SETS
// =============================================================================

pub const COMMANDS: &[&str] = &[
    "AUTHORIZE",
    "AUTHENTICATE",
    "GET_GUILDS",
    "GET_GUILD",
    "GET_CHANNEL",
    "GET_CHANNELS",
    "SELECT_VOICE_CHANNEL",
    "SELECT_TEXT_CHANNEL",
    SUBSCRIBE,
    UNSUBSCRIBE,
    "CAPTURE_SHORTCUT",
    "SET_CERTIFIED_DEVICES",
    "SET_ACTIVITY",
    "GET_SKUS",
    "GET_ENTITLEMENTS",
    "GET_SKUS_EMBEDDED",
    "GET_ENTITLEMENTS_EMBEDDED",
    "START_PURCHASE",
    "SET_CONFIG",
    "SEND_ANALYTICS_EVENT",
    "USER_SETTINGS_GET_LOCALE",
    "OPEN_EXTERNAL_LINK",
    "ENCOURAGE_HW_ACCELERATION",
    "CAPTURE_LOG",
    "SET_ORIENTATION_LOCK_STATE",
    "OPEN_INVITE_DIALOG",
    "GET_PLATFORM_BEHAVIORS",
    "GET_CHANNEL_PERMISSIONS",
    "OPEN_SHARE_MOMENT_DIALOG",
    "INITIATE_IMAGE_UPLOAD",
    "GET_ACTIVITY_INSTANCE_CONNECTED_PARTICIPANTS",
];

pub const EVENTS: &[&str] = &[
    READY,
    ERROR,
    "GUILD_STATUS",
    "GUILD_CREATE",
    "CHANNEL_CREATE",
    "VOICE_CHANNEL_SELECT",
    "VOICE_SETTINGS_UPDATE",
    "VOICE_STATE_CREATE",
    "VOICE_STATE_UPDATE",
    "VOICE_STATE_DELETE",
    "VOICE_CONNECTION_STATUS",
    "MESSAGE_CREATE",
    "MESSAGE_UPDATE",
    "MESSAGE_DELETE",
    "SPEAKING_START",
    "SPEAKING_STOP",
    "NOTIFICATION_CREATE",
    "CAPTURE_SHORTCUT_CHANGE",
    "ACTIVITY_JOIN",
    "ACTIVITY_JOIN_REQUEST",
    "ACTIVITY_PIP_MODE_UPDATE",
    "ACTIVITY_LAYOUT_MODE_UPDATE",
    "ORIENTATION_UPDATE",
    "CURRENT_USER_UPDATE",
    "ENTITLEMENT_CREATE",
    "THERMAL_STATE_UPDATE",
    "ACTIVITY_INSTANCE_PARTICIPANTS_UPDATE",
];

// =============================================================================
// CATALOG
// =============================================================================

/// Immutable known-command and known-event sets.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Catalog {
    commands: HashSet<String>,
    events: HashSet<String>,
}

impl Catalog {
    /// Build a catalog from explicit name lists.
    pub fn new<C, E>(commands: C, events: E) -> Self
    where
        C: IntoIterator,
        C::Item: Into<String>,
        E: IntoIterator,
        E::Item: Into<String>,
    {
        Self {
            commands: commands.into_iter().map(Into::into).collect(),
            events: events.into_iter().map(Into::into).collect(),
        }
    }

    /// The production command and event sets.
    #[must_use]
    pub fn standard() -> Self {
        Self::new(COMMANDS.iter().copied(), EVENTS.iter().copied())
    }

    #[must_use]
    pub fn is_command(&self, name: &str) -> bool {
        self.commands.contains(name)
    }

    #[must_use]
    pub fn is_event(&self, name: &str) -> bool {
        self.events.contains(name)
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
#[path = "catalog_test.rs"]
mod tests;

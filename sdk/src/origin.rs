//! Inbound origin allow-list.
//!
//! Assembled once at startup from the frame's own origin, the first-party host
//! origins and the literal `"null"` (documents loaded from `file://`). A
//! message from any other origin is dropped before decoding, with no side
//! effect and no error.

use std::collections::HashSet;

/// Production and staging origins of the host client.
pub const FIRST_PARTY_ORIGINS: &[&str] = &[
    "https://discord.com",
    "https://discordapp.com",
    "https://ptb.discord.com",
    "https://ptb.discordapp.com",
    "https://canary.discord.com",
    "https://canary.discordapp.com",
    "https://staging.discord.co",
    "http://localhost:3333",
    "https://pax.discord.com",
];

/// Origin reported for `file://` documents.
pub const NULL_ORIGIN: &str = "null";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OriginGuard {
    allowed: HashSet<String>,
}

impl OriginGuard {
    /// Build the allow-list. An empty `own_origin` is skipped.
    pub fn new<I>(own_origin: &str, extra: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        let mut allowed: HashSet<String> = FIRST_PARTY_ORIGINS.iter().map(|o| (*o).to_owned()).collect();
        allowed.insert(NULL_ORIGIN.to_owned());
        if !own_origin.is_empty() {
            allowed.insert(own_origin.to_owned());
        }
        allowed.extend(extra.into_iter().map(Into::into));
        Self { allowed }
    }

    #[must_use]
    pub fn allows(&self, origin: &str) -> bool {
        self.allowed.contains(origin)
    }
}

#[cfg(test)]
#[path = "origin_test.rs"]
mod tests;

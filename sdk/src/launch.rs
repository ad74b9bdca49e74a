//! Launch parameters supplied by the host in the frame's query string.
//!
//! Required: `frame_id`, `instance_id`, `platform` (`desktop` | `mobile`).
//! Optional: `channel_id`, `guild_id` (present only inside a guild context).
//! An empty value counts as missing.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::error::SdkError;

/// Client platform the frame was launched on.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Platform {
    #[default]
    Desktop,
    Mobile,
}

impl Platform {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Desktop => "desktop",
            Self::Mobile => "mobile",
        }
    }
}

impl FromStr for Platform {
    type Err = SdkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "desktop" => Ok(Self::Desktop),
            "mobile" => Ok(Self::Mobile),
            other => Err(SdkError::InvalidPlatform(other.to_owned())),
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Session identifiers read at startup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LaunchParams {
    pub frame_id: String,
    pub instance_id: String,
    pub platform: Platform,
    pub channel_id: Option<String>,
    pub guild_id: Option<String>,
}

impl LaunchParams {
    /// Parse launch parameters from a `?key=value&...` query string.
    ///
    /// # Errors
    ///
    /// Returns [`SdkError::MissingParam`] for an absent required key and
    /// [`SdkError::InvalidPlatform`] for an unrecognized platform.
    pub fn from_query(query: &str) -> Result<Self, SdkError> {
        Self::from_params(&parse_query(query))
    }

    /// Build launch parameters from already-split key/value pairs.
    ///
    /// # Errors
    ///
    /// Same as [`LaunchParams::from_query`].
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self, SdkError> {
        let frame_id = required(params, "frame_id")?;
        let instance_id = required(params, "instance_id")?;
        let platform = required(params, "platform")?.parse::<Platform>()?;

        Ok(Self {
            frame_id,
            instance_id,
            platform,
            channel_id: optional(params, "channel_id"),
            guild_id: optional(params, "guild_id"),
        })
    }
}

/// Split a query string into key/value pairs.
///
/// A leading `?` is ignored. Pairs that do not split into exactly one key and
/// one value are skipped. Values are taken verbatim (no percent-decoding).
#[must_use]
pub fn parse_query(query: &str) -> HashMap<String, String> {
    let query = query.strip_prefix('?').unwrap_or(query);
    query
        .split('&')
        .filter_map(|pair| {
            let mut parts = pair.split('=');
            match (parts.next(), parts.next(), parts.next()) {
                (Some(key), Some(value), None) => Some((key.to_owned(), value.to_owned())),
                _ => None,
            }
        })
        .collect()
}

fn required(params: &HashMap<String, String>, key: &'static str) -> Result<String, SdkError> {
    optional(params, key).ok_or(SdkError::MissingParam(key))
}

fn optional(params: &HashMap<String, String>, key: &str) -> Option<String> {
    params.get(key).filter(|v| !v.is_empty()).cloned()
}

#[cfg(test)]
#[path = "launch_test.rs"]
mod tests;

//! Session configuration parsed from environment variables or built in code.

use std::time::Duration;

use frames::Catalog;

use crate::error::SdkError;

/// Typed session configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SdkConfig {
    /// Application client id announced in the handshake.
    pub client_id: String,
    /// Deadline after which a pending command fails with a timeout.
    /// `None` keeps commands pending until the host replies.
    pub command_timeout: Option<Duration>,
    /// Origins trusted in addition to the built-in allow-list.
    pub extra_origins: Vec<String>,
    /// Carried for embeddings that forward console output to the host.
    pub disable_console_log_override: bool,
    /// Known commands and events.
    pub catalog: Catalog,
}

impl SdkConfig {
    #[must_use]
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            command_timeout: None,
            extra_origins: Vec::new(),
            disable_console_log_override: false,
            catalog: Catalog::standard(),
        }
    }

    #[must_use]
    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn with_extra_origin(mut self, origin: impl Into<String>) -> Self {
        self.extra_origins.push(origin.into());
        self
    }

    #[must_use]
    pub fn with_catalog(mut self, catalog: Catalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Build config from environment variables.
    ///
    /// Required:
    /// - `SDK_CLIENT_ID`
    ///
    /// Optional:
    /// - `SDK_COMMAND_TIMEOUT_MS`: unset or `0` disables the deadline
    /// - `SDK_EXTRA_ORIGINS`: comma-separated origins
    /// - `SDK_DISABLE_CONSOLE_LOG_OVERRIDE`: `true` / `1`
    ///
    /// # Errors
    ///
    /// Returns [`SdkError::MissingClientId`] when the client id is unset and
    /// [`SdkError::Config`] when the timeout is not a number.
    pub fn from_env() -> Result<Self, SdkError> {
        let client_id = std::env::var("SDK_CLIENT_ID")
            .ok()
            .filter(|s| !s.is_empty())
            .ok_or(SdkError::MissingClientId)?;

        let command_timeout = parse_timeout(std::env::var("SDK_COMMAND_TIMEOUT_MS").ok().as_deref())?;
        let extra_origins = std::env::var("SDK_EXTRA_ORIGINS")
            .map(|raw| parse_origins(&raw))
            .unwrap_or_default();
        let disable_console_log_override = std::env::var("SDK_DISABLE_CONSOLE_LOG_OVERRIDE")
            .map(|v| matches!(v.as_str(), "1" | "true"))
            .unwrap_or(false);

        Ok(Self { command_timeout, extra_origins, disable_console_log_override, ..Self::new(client_id) })
    }
}

fn parse_timeout(raw: Option<&str>) -> Result<Option<Duration>, SdkError> {
    let Some(raw) = raw.filter(|s| !s.trim().is_empty()) else {
        return Ok(None);
    };
    let ms = raw
        .trim()
        .parse::<u64>()
        .map_err(|_| SdkError::Config(format!("invalid SDK_COMMAND_TIMEOUT_MS: {raw}")))?;
    Ok((ms > 0).then(|| Duration::from_millis(ms)))
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;

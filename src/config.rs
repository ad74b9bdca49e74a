//! Dev server configuration parsed from environment variables.

use std::path::PathBuf;

use crate::ServerError;

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_ASSET_DIR: &str = "./public";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerConfig {
    pub port: u16,
    /// Directory whose files are served at `/`.
    pub asset_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: DEFAULT_PORT, asset_dir: PathBuf::from(DEFAULT_ASSET_DIR) }
    }
}

impl ServerConfig {
    /// Build config from environment variables.
    ///
    /// Optional:
    /// - `PORT` (default 3000)
    /// - `ASSET_DIR` (default `./public`)
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Config`] when `PORT` is not a valid port number.
    pub fn from_env() -> Result<Self, ServerError> {
        let port = match std::env::var("PORT") {
            Ok(raw) if !raw.trim().is_empty() => raw
                .trim()
                .parse::<u16>()
                .map_err(|_| ServerError::Config(format!("invalid PORT: {raw}")))?,
            _ => DEFAULT_PORT,
        };
        let asset_dir = std::env::var("ASSET_DIR")
            .ok()
            .filter(|s| !s.is_empty())
            .map_or_else(|| PathBuf::from(DEFAULT_ASSET_DIR), PathBuf::from);

        Ok(Self { port, asset_dir })
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;

//! Client side of the embedded-app host channel.
//!
//! An app running inside a host frame talks to the host over a message
//! channel carrying `[opcode, body]` envelopes (see the `frames` crate). This
//! crate owns the session on top of that channel:
//!
//! - [`Session`]: handshake, readiness, commands with nonce correlation,
//!   refcounted event subscriptions and inbound routing.
//! - [`connect`] / [`run_dispatcher`]: the async pump feeding inbound
//!   messages into a session.
//! - [`Transport`]: the seam to whatever actually posts messages to the host.
//!
//! ```ignore
//! let conn = embedded_sdk::connect(SdkConfig::from_env()?, Some(frame))?;
//! conn.session.wait_until_ready().await?;
//! let guild = conn.session.command(command_body("GET_GUILD", args, None)).await?;
//! ```

pub mod config;
pub mod dispatch;
pub mod error;
pub mod event_bus;
pub mod launch;
pub mod origin;
pub mod pending;
pub mod session;
pub mod subscriptions;
pub mod transport;

pub use config::SdkConfig;
pub use dispatch::{Connection, connect, run_dispatcher, spawn_dispatcher};
pub use error::{CommandError, HostErrorEvent, SdkError, TransportError};
pub use event_bus::{EventBus, ListenerId};
pub use launch::{LaunchParams, Platform};
pub use origin::OriginGuard;
pub use session::{CLOSE_EVENT, ERROR_EVENT, Session, SessionInfo, SessionState};
pub use subscriptions::Subscription;
pub use transport::{ChannelTransport, FrameContext, HostWindow, InboundMessage, OutboundMessage, Transport};

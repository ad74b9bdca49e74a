//! Inbound message loop.
//!
//! Each accepted message is routed on its own task, so a slow listener never
//! stalls delivery of the next message. Decoding and the origin check stay on
//! the loop. The loop ends when the inbound channel closes (`Ok`) or the
//! session turns fatal (`Err` with the terminating error).

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::SdkConfig;
use crate::error::SdkError;
use crate::session::{Session, SessionState};
use crate::transport::{FrameContext, InboundMessage};

/// A started session with its inbound pump.
pub struct Connection {
    pub session: Arc<Session>,
    /// Feed host messages here, tagged with their sender origin.
    pub inbound: mpsc::UnboundedSender<InboundMessage>,
    pub dispatcher: JoinHandle<Result<(), SdkError>>,
}

/// Start a session and its dispatcher on the current runtime.
///
/// # Errors
///
/// Returns the [`Session::new`] error.
pub fn connect(config: SdkConfig, frame: Option<FrameContext>) -> Result<Connection, SdkError> {
    let session = Session::new(config, frame)?;
    let (inbound, rx) = mpsc::unbounded_channel();
    let dispatcher = spawn_dispatcher(Arc::clone(&session), rx);
    Ok(Connection { session, inbound, dispatcher })
}

pub fn spawn_dispatcher(
    session: Arc<Session>,
    inbound: mpsc::UnboundedReceiver<InboundMessage>,
) -> JoinHandle<Result<(), SdkError>> {
    tokio::spawn(run_dispatcher(session, inbound))
}

/// Drive `session` from `inbound` until the channel closes or the session fails.
///
/// # Errors
///
/// Returns the error that made the session fatal.
pub async fn run_dispatcher(
    session: Arc<Session>,
    mut inbound: mpsc::UnboundedReceiver<InboundMessage>,
) -> Result<(), SdkError> {
    let mut state = session.watch_state();
    if *state.borrow_and_update() == SessionState::Fatal {
        return Err(terminal_error(&session));
    }

    loop {
        tokio::select! {
            message = inbound.recv() => {
                let Some(message) = message else {
                    debug!("inbound channel closed; dispatcher stopping");
                    return Ok(());
                };
                let envelope = match session.accept(&message.origin, &message.data) {
                    Ok(Some(envelope)) => envelope,
                    Ok(None) => continue,
                    Err(e) => {
                        session.fail(&e);
                        return Err(terminal_error(&session));
                    }
                };

                let worker = Arc::clone(&session);
                tokio::spawn(async move {
                    if let Err(e) = worker.route(envelope) {
                        if e.is_fatal() {
                            worker.fail(&e);
                        } else {
                            warn!(error = %e, "inbound message failed");
                        }
                    }
                });
            }
            changed = state.changed() => {
                if changed.is_err() || *state.borrow_and_update() == SessionState::Fatal {
                    return Err(terminal_error(&session));
                }
            }
        }
    }
}

fn terminal_error(session: &Session) -> SdkError {
    session
        .failure()
        .unwrap_or_else(|| SdkError::SessionFailed("session state closed".into()))
}

#[cfg(test)]
#[path = "dispatch_test.rs"]
mod tests;

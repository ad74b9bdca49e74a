//! Pending command table: nonce → completion.
//!
//! A completion is taken out of the table under the lock and invoked after the
//! lock is released, so whichever path removes it first (reply, error reply,
//! timeout, session failure) is the only one that runs it. A command's
//! deadline task is aborted whenever its entry leaves the table.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use serde_json::Value;
use tokio::task::AbortHandle;

use crate::error::CommandError;

/// Outcome delivered to a command's completion.
pub type CommandOutcome = Result<Value, CommandError>;

/// Completion invoked exactly once per issued command.
pub type Completion = Box<dyn FnOnce(CommandOutcome) + Send>;

struct Entry {
    completion: Completion,
    deadline: Option<AbortHandle>,
}

impl Entry {
    fn take(self) -> Completion {
        if let Some(deadline) = self.deadline {
            deadline.abort();
        }
        self.completion
    }
}

#[derive(Default)]
pub struct PendingCommands {
    entries: Mutex<HashMap<String, Entry>>,
}

impl PendingCommands {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, nonce: String, completion: Completion) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(nonce, Entry { completion, deadline: None });
    }

    /// Attach the task enforcing `nonce`'s deadline. Aborted at once if the
    /// command already left the table.
    pub fn set_deadline(&self, nonce: &str, deadline: AbortHandle) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        match entries.get_mut(nonce) {
            Some(entry) => entry.deadline = Some(deadline),
            None => deadline.abort(),
        }
    }

    /// Take the completion for `nonce` without invoking it.
    pub fn remove(&self, nonce: &str) -> Option<Completion> {
        let entry = {
            let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
            entries.remove(nonce)
        };
        entry.map(Entry::take)
    }

    /// Remove and invoke the completion for `nonce`. Returns false when the
    /// nonce is unknown or already resolved.
    pub fn resolve(&self, nonce: &str, outcome: CommandOutcome) -> bool {
        let Some(completion) = self.remove(nonce) else {
            return false;
        };
        completion(outcome);
        true
    }

    /// Fail every pending command with `error`. Returns how many were failed.
    pub fn fail_all(&self, error: &CommandError) -> usize {
        let drained: Vec<Completion> = {
            let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
            entries.drain().map(|(_, entry)| entry.take()).collect()
        };
        let count = drained.len();
        for completion in drained {
            completion(Err(error.clone()));
        }
        count
    }

    #[must_use]
    pub fn contains(&self, nonce: &str) -> bool {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.contains_key(nonce)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
#[path = "pending_test.rs"]
mod tests;

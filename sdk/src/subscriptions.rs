//! Reference counts of local subscribers per event.
//!
//! The host is told to start pushing an event on the 0→1 transition and to
//! stop on 1→0, however many local listeners come and go in between.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use crate::event_bus::ListenerId;

#[derive(Default)]
pub struct SubscriptionTable {
    counts: Mutex<HashMap<String, usize>>,
}

impl SubscriptionTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one more subscriber. On the 0→1 transition `on_first` runs
    /// before the count is taken, with the table locked, so the host-side
    /// subscribe and unsubscribe of one event can never cross on the wire.
    /// If `on_first` fails the count is left untouched.
    ///
    /// # Errors
    ///
    /// Returns the `on_first` error.
    pub fn acquire<F, E>(&self, event: &str, on_first: F) -> Result<(), E>
    where
        F: FnOnce() -> Result<(), E>,
    {
        let mut counts = self.counts.lock().unwrap_or_else(PoisonError::into_inner);
        if !counts.contains_key(event) {
            on_first()?;
        }
        *counts.entry(event.to_owned()).or_insert(0) += 1;
        Ok(())
    }

    /// Count one subscriber fewer. On the 1→0 transition `on_last` runs with
    /// the table locked, after the count is dropped. Returns false when
    /// nothing was held.
    ///
    /// # Errors
    ///
    /// Returns the `on_last` error. The count is dropped regardless.
    pub fn release<F, E>(&self, event: &str, on_last: F) -> Result<bool, E>
    where
        F: FnOnce() -> Result<(), E>,
    {
        let mut counts = self.counts.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(count) = counts.get_mut(event) else {
            return Ok(false);
        };
        if *count > 1 {
            *count -= 1;
            return Ok(true);
        }
        counts.remove(event);
        on_last()?;
        Ok(true)
    }

    #[must_use]
    pub fn count(&self, event: &str) -> usize {
        let counts = self.counts.lock().unwrap_or_else(PoisonError::into_inner);
        counts.get(event).copied().unwrap_or(0)
    }
}

/// Handle returned by [`crate::Session::subscribe`]; pass it back to
/// [`crate::Session::unsubscribe`].
#[derive(Debug, PartialEq)]
pub struct Subscription {
    pub(crate) event: String,
    pub(crate) listener: ListenerId,
    pub(crate) args: serde_json::Value,
}

impl Subscription {
    #[must_use]
    pub fn event(&self) -> &str {
        &self.event
    }
}

#[cfg(test)]
#[path = "subscriptions_test.rs"]
mod tests;

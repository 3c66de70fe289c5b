//! Document-level dismissal listeners for open flyouts.
//!
//! A flyout acquires a [`DismissSubscription`] when it opens and holds it
//! for exactly as long as it stays open. Dropping the subscription releases
//! whatever the host registered, so every exit path (selection, outside
//! click, Escape, the panel closing, unmount) unregisters through the same
//! `Drop`.

use std::any::Any;
use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DismissEvent {
    OutsideClick,
    Escape,
}

impl DismissEvent {
    /// Maps a `KeyboardEvent.key` value; only Escape dismisses.
    pub fn from_key(key: &str) -> Option<Self> {
        (key == "Escape").then_some(Self::Escape)
    }
}

pub struct DismissSubscription {
    owner: String,
    guard: Option<Box<dyn Any>>,
}

impl DismissSubscription {
    /// Wraps a host-specific guard; its `Drop` performs the unregistering.
    pub fn new<G: 'static>(owner: impl Into<String>, guard: G) -> Self {
        Self {
            owner: owner.into(),
            guard: Some(Box::new(guard)),
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }
}

impl fmt::Debug for DismissSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DismissSubscription")
            .field("owner", &self.owner)
            .finish_non_exhaustive()
    }
}

impl Drop for DismissSubscription {
    fn drop(&mut self) {
        drop(self.guard.take());
        trace!(owner = %self.owner, "released dismiss listeners");
    }
}

/// Registers outside-click and Escape listeners for one flyout.
pub trait DismissHost {
    fn subscribe(&self, owner: &str) -> DismissSubscription;
}

/// Host with nothing to listen to, for headless sessions.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopDismissHost;

impl DismissHost for NoopDismissHost {
    fn subscribe(&self, owner: &str) -> DismissSubscription {
        DismissSubscription::new(owner, ())
    }
}

/// Counts live and total subscriptions. Clones share their counters.
#[derive(Debug, Clone, Default)]
pub struct TrackingDismissHost {
    active: Rc<Cell<usize>>,
    acquired: Rc<Cell<usize>>,
}

struct TrackingGuard {
    active: Rc<Cell<usize>>,
}

impl Drop for TrackingGuard {
    fn drop(&mut self) {
        self.active.set(self.active.get().saturating_sub(1));
    }
}

impl TrackingDismissHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscriptions currently held.
    pub fn active(&self) -> usize {
        self.active.get()
    }

    /// Subscriptions ever handed out.
    pub fn acquired(&self) -> usize {
        self.acquired.get()
    }
}

impl DismissHost for TrackingDismissHost {
    fn subscribe(&self, owner: &str) -> DismissSubscription {
        self.active.set(self.active.get() + 1);
        self.acquired.set(self.acquired.get() + 1);
        trace!(owner, active = self.active.get(), "acquired dismiss listeners");
        DismissSubscription::new(
            owner,
            TrackingGuard {
                active: Rc::clone(&self.active),
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dropping_subscription_releases_guard() {
        let host = TrackingDismissHost::new();
        let first = host.subscribe("dateFrom");
        let second = host.subscribe("dateTo");
        assert_eq!(host.active(), 2);
        assert_eq!(first.owner(), "dateFrom");

        drop(first);
        assert_eq!(host.active(), 1);
        drop(second);
        assert_eq!(host.active(), 0);
        assert_eq!(host.acquired(), 2);
    }

    #[test]
    fn only_escape_key_dismisses() {
        assert_eq!(DismissEvent::from_key("Escape"), Some(DismissEvent::Escape));
        assert_eq!(DismissEvent::from_key("Enter"), None);
        assert_eq!(DismissEvent::from_key("Esc"), None);
    }
}

//! Change notification.
//!
//! Notifications are fire-and-forget: a successful write signals the
//! locator it touched so observers watching it can refresh. No delivery
//! guarantee is tracked here.

use std::sync::Mutex;

use crate::locator::Locator;

/// Transport for change signals.
pub trait ChangeNotifier: Send + Sync {
    /// Signals that data under `locator` changed.
    fn notify_change(&self, locator: &Locator);
}

/// Discards every notification. Default wiring for routers.
#[derive(Debug, Default)]
pub struct NoopNotifier;

impl ChangeNotifier for NoopNotifier {
    fn notify_change(&self, _locator: &Locator) {}
}

/// Records notifications in memory for assertions.
#[derive(Debug, Default)]
pub struct MemoryNotifier {
    notified: Mutex<Vec<Locator>>,
}

impl MemoryNotifier {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// All notifications received so far, in order.
    pub fn notifications(&self) -> Vec<Locator> {
        self.notified.lock().unwrap().clone()
    }

    /// Number of notifications received.
    pub fn len(&self) -> usize {
        self.notified.lock().unwrap().len()
    }

    /// True when nothing has been notified.
    pub fn is_empty(&self) -> bool {
        self.notified.lock().unwrap().is_empty()
    }
}

impl ChangeNotifier for MemoryNotifier {
    fn notify_change(&self, locator: &Locator) {
        self.notified.lock().unwrap().push(locator.clone());
    }
}

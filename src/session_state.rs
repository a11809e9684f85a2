//! Logged-in flag with change notification

use tokio::sync::watch;
use tracing::info;

/// The single source of truth for "is a user logged in"
///
/// Listeners subscribe to a `watch` channel and are only woken on an actual
/// transition; setting the current value again is a no-op.
pub struct SessionState {
    logged_in: watch::Sender<bool>,
}

impl SessionState {
    pub fn new() -> Self {
        let (logged_in, _) = watch::channel(false);
        Self { logged_in }
    }

    pub fn is_logged_in(&self) -> bool {
        *self.logged_in.borrow()
    }

    /// Returns whether the flag actually changed.
    pub fn set_logged_in(&self, value: bool) -> bool {
        let changed = self.logged_in.send_if_modified(|current| {
            if *current == value {
                return false;
            }
            *current = value;
            true
        });

        if changed {
            info!(logged_in = value, "Session state changed");
        }
        changed
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.logged_in.subscribe()
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Notify;
use tokio::time::{self, Duration};

/// Cooperative shutdown flag shared between the signal handler and the worker.
///
/// Workers poll [`Shutdown::is_requested`] at safe boundaries. Sleeps done through
/// [`Shutdown::sleep`] end early once shutdown is requested.
#[derive(Debug, Default)]
pub struct Shutdown {
    requested: AtomicBool,
    notify: Notify,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.requested.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    /// Sleeps for `duration` unless shutdown is requested first.
    ///
    /// Returns true if the whole duration elapsed.
    pub async fn sleep(&self, duration: Duration) -> bool {
        let notified = self.notify.notified();
        if self.is_requested() {
            return false;
        }

        tokio::select! {
            _ = notified => false,
            _ = time::sleep(duration) => !self.is_requested(),
        }
    }
}

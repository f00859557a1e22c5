use std::sync::{Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::queue::lock;

/// A one-way flag that threads can wait on.
#[derive(Default)]
pub struct Signal {
    set: Mutex<bool>,
    changed: Condvar,
}

impl Signal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the flag and wake every waiter.
    pub fn set(&self) {
        *lock(&self.set) = true;
        self.changed.notify_all();
    }

    /// Lower the flag.
    pub fn reset(&self) {
        *lock(&self.set) = false;
    }

    pub fn is_set(&self) -> bool {
        *lock(&self.set)
    }

    /// Wait until the flag is raised or `timeout` passes. Returns the flag.
    pub fn wait(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut set = lock(&self.set);
        while !*set {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            set = self
                .changed
                .wait_timeout(set, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    #[test]
    fn wait_returns_once_set() {
        let signal = Arc::new(Signal::new());
        let setter = Arc::clone(&signal);
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            setter.set();
        });
        assert!(signal.wait(Duration::from_secs(2)));
        handle.join().unwrap();
    }

    #[test]
    fn wait_times_out_and_reset_lowers() {
        let signal = Signal::new();
        assert!(!signal.wait(Duration::from_millis(10)));
        signal.set();
        assert!(signal.is_set());
        signal.reset();
        assert!(!signal.is_set());
    }
}

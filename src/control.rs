use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
struct Flags {
    paused: bool,
    stopped: bool,
}

#[derive(Debug, Default)]
struct Inner {
    flags: Mutex<Flags>,
    changed: Condvar,
}

/// Pause/resume/stop signals shared between a running session and its
/// controller. Cloning yields another handle to the same signals.
#[derive(Debug, Clone, Default)]
pub struct SessionControl {
    inner: Arc<Inner>,
}

impl SessionControl {
    pub fn new() -> Self {
        Self::default()
    }

    fn flags(&self) -> MutexGuard<'_, Flags> {
        // The flags are plain booleans; a panicked holder cannot leave them torn.
        self.inner
            .flags
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn pause(&self) {
        self.flags().paused = true;
        self.inner.changed.notify_all();
    }

    pub fn resume(&self) {
        self.flags().paused = false;
        self.inner.changed.notify_all();
    }

    /// Request cancellation. Also releases a paused session so it can exit.
    pub fn stop(&self) {
        let mut flags = self.flags();
        flags.stopped = true;
        flags.paused = false;
        drop(flags);
        self.inner.changed.notify_all();
    }

    pub fn is_paused(&self) -> bool {
        self.flags().paused
    }

    pub fn is_stopped(&self) -> bool {
        self.flags().stopped
    }

    /// Block until the session is not paused. Returns `false` if it was stopped.
    pub fn wait_while_paused(&self) -> bool {
        let mut flags = self.flags();
        while flags.paused && !flags.stopped {
            flags = self
                .inner
                .changed
                .wait(flags)
                .unwrap_or_else(PoisonError::into_inner);
        }
        !flags.stopped
    }

    /// Sleep for `dur` of wall time, waking early on stop.
    /// Returns `false` if the session was stopped.
    pub fn sleep(&self, dur: Duration) -> bool {
        let deadline = Instant::now() + dur;
        let mut flags = self.flags();
        while !flags.stopped {
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            flags = self
                .inner
                .changed
                .wait_timeout(flags, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        false
    }
}

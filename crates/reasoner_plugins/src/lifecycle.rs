//! A pause/resume/shutdown gate shared by every plugin. Pausing doesn't
//! preempt work in flight; plugins cooperatively call [`Lifecycle::gate`]
//! between units of work (one rule, one rewrite candidate, one
//! instantiation) so a pause takes effect promptly without needing to
//! interrupt anything.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex};

use reasoner_bus::EventBus;

pub struct Lifecycle {
    running: AtomicBool,
    paused: AtomicBool,
    mutex: Mutex<()>,
    condvar: Condvar,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    pub fn new() -> Self {
        Lifecycle {
            running: AtomicBool::new(true),
            paused: AtomicBool::new(false),
            mutex: Mutex::new(()),
            condvar: Condvar::new(),
        }
    }

    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
        self.condvar.notify_all();
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Block the calling thread while paused. Returns immediately once
    /// shut down, so a plugin blocked here during shutdown doesn't hang.
    pub fn gate(&self) {
        let mut guard = self.mutex.lock().unwrap();
        while self.paused.load(Ordering::SeqCst) && self.running.load(Ordering::SeqCst) {
            guard = self.condvar.wait(guard).unwrap();
        }
    }

    /// Set `running` false, wake anything blocked in `gate`, and stop the
    /// bus from accepting new publishes. Already-queued bus deliveries
    /// still drain.
    pub fn shutdown(&self, bus: &EventBus) {
        self.running.store(false, Ordering::SeqCst);
        self.paused.store(false, Ordering::SeqCst);
        self.condvar.notify_all();
        bus.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gate_returns_immediately_when_not_paused() {
        let lc = Lifecycle::new();
        lc.gate();
    }

    #[test]
    fn shutdown_releases_a_paused_gate() {
        let lc = std::sync::Arc::new(Lifecycle::new());
        lc.pause();
        let lc2 = lc.clone();
        let handle = std::thread::spawn(move || lc2.gate());
        std::thread::sleep(std::time::Duration::from_millis(20));
        let bus = EventBus::new();
        lc.shutdown(&bus);
        handle.join().unwrap();
        assert!(!lc.is_running());
    }
}

//! One-shot deadline timers.

use tokio::task::JoinHandle;

/// Holds at most one scheduled task. Arming replaces, disarming aborts.
#[derive(Debug, Default)]
pub(crate) struct TimerSlot {
    handle: Option<JoinHandle<()>>,
}

impl TimerSlot {
    pub(crate) fn arm(&mut self, handle: Option<JoinHandle<()>>) {
        self.disarm();
        self.handle = handle;
    }

    pub(crate) fn disarm(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    #[cfg(test)]
    pub(crate) fn is_armed(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for TimerSlot {
    fn drop(&mut self) {
        self.disarm();
    }
}

//! Re-armable idle timers.

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Delivers a value on a channel once `delay` has passed without another
/// [`schedule`](Debouncer::schedule) call.
///
/// Every `schedule` cancels the pending firing and starts the wait over, so
/// only the last call of a burst is delivered. Dropping the debouncer cancels
/// any pending firing. Must be used inside a tokio runtime.
pub struct Debouncer<T> {
    delay: Duration,
    target: mpsc::UnboundedSender<T>,
    pending: Option<JoinHandle<()>>,
}

impl<T: Send + 'static> Debouncer<T> {
    pub fn new(delay: Duration, target: mpsc::UnboundedSender<T>) -> Self {
        Self {
            delay,
            target,
            pending: None,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// (Re-)arms the timer to deliver `value` after the idle period.
    pub fn schedule(&mut self, value: T) {
        self.cancel();

        let target = self.target.clone();
        let delay = self.delay;
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // Receiver gone means the owner shut down.
            let _ = target.send(value);
        }));
    }

    /// Cancels the pending firing. Returns true if one was still waiting.
    pub fn cancel(&mut self) -> bool {
        match self.pending.take() {
            Some(handle) => {
                let was_waiting = !handle.is_finished();
                handle.abort();
                was_waiting
            }
            None => false,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl<T> Drop for Debouncer<T> {
    fn drop(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }
}

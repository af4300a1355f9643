//! Cooperative stop signal shared between the reply flow and the speaker
//!
//! A [`StopSignal`] is created per assistant turn. Triggering it is sticky:
//! once stopped it never resets. Besides the flag it exposes a channel
//! receiver that becomes ready (disconnected) the moment the signal fires,
//! so blocking waits can `select!` on it instead of polling.

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug)]
struct StopInner {
    stopped: AtomicBool,
    trigger_tx: Mutex<Option<Sender<()>>>,
    trigger_rx: Receiver<()>,
}

/// Cloneable, sticky cancellation token
#[derive(Clone, Debug)]
pub struct StopSignal {
    inner: Arc<StopInner>,
}

impl StopSignal {
    /// Create a new, untriggered signal
    pub fn new() -> Self {
        let (trigger_tx, trigger_rx) = bounded(0);
        Self {
            inner: Arc::new(StopInner {
                stopped: AtomicBool::new(false),
                trigger_tx: Mutex::new(Some(trigger_tx)),
                trigger_rx,
            }),
        }
    }

    /// Fire the signal. Returns `true` if this call was the one that fired it.
    pub fn trigger(&self) -> bool {
        if self.inner.stopped.swap(true, Ordering::SeqCst) {
            return false;
        }
        // Dropping the only sender disconnects every receiver clone.
        self.inner.trigger_tx.lock().take();
        true
    }

    /// Check whether the signal has fired
    pub fn is_stopped(&self) -> bool {
        self.inner.stopped.load(Ordering::SeqCst)
    }

    /// Receiver that becomes ready once the signal fires (for `select!`)
    pub fn receiver(&self) -> &Receiver<()> {
        &self.inner.trigger_rx
    }

    /// Sleep for up to `timeout`, waking early if the signal fires.
    ///
    /// Returns `true` if the signal has fired.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        if self.is_stopped() {
            return true;
        }
        match self.inner.trigger_rx.recv_timeout(timeout) {
            Err(RecvTimeoutError::Disconnected) => true,
            _ => self.is_stopped(),
        }
    }
}

impl Default for StopSignal {
    fn default() -> Self {
        Self::new()
    }
}

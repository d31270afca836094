//! Cancellable waits.
//!
//! Blocking suspension points (rate-limit backoff) go through [`Waiter`] so the
//! exact durations are observable in tests and a wait can be cut short.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

use tracing::debug;

/// The human cancelled the run.
///
/// Raised by an interrupted wait or a cancelled terminal prompt. This never
/// becomes a tool result; it unwinds to the binary, which exits non-zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("interrupted by user")]
pub struct Interrupted;

pub trait Waiter {
    /// Block for `delay` unless interrupted first.
    fn wait(&self, delay: Duration) -> Result<(), Interrupted>;
}

impl<W: Waiter + ?Sized> Waiter for &W {
    fn wait(&self, delay: Duration) -> Result<(), Interrupted> {
        (**self).wait(delay)
    }
}

/// Timer plus interrupt channel.
///
/// The waiter keeps its own sender so the channel never disconnects; a wait
/// ends either on timeout or on a message from an [`InterruptHandle`].
#[derive(Debug)]
pub struct ChannelWaiter {
    tx: Sender<()>,
    rx: Receiver<()>,
    waiting: Arc<AtomicBool>,
}

/// Cancels the current (or next) wait of a [`ChannelWaiter`].
///
/// The binary hands one to its SIGINT handler.
#[derive(Debug, Clone)]
pub struct InterruptHandle {
    tx: Sender<()>,
    waiting: Arc<AtomicBool>,
}

impl InterruptHandle {
    pub fn interrupt(&self) {
        // The waiter owns a sender too, so the receiver outlives every handle.
        let _ = self.tx.send(());
    }

    /// Whether the waiter is blocked in [`Waiter::wait`] right now.
    pub fn is_waiting(&self) -> bool {
        self.waiting.load(Ordering::SeqCst)
    }

    /// React to a user interrupt: cut a running wait short, otherwise tell
    /// the caller to end the process.
    pub fn on_signal(&self) -> SignalAction {
        if self.is_waiting() {
            self.interrupt();
            SignalAction::CancelledWait
        } else {
            SignalAction::Exit
        }
    }
}

/// What a user interrupt should do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalAction {
    /// A backoff wait was cancelled; the run unwinds as [`Interrupted`].
    CancelledWait,
    /// Nothing interruptible is running.
    Exit,
}

impl ChannelWaiter {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            tx,
            rx,
            waiting: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn interrupt_handle(&self) -> InterruptHandle {
        InterruptHandle {
            tx: self.tx.clone(),
            waiting: Arc::clone(&self.waiting),
        }
    }
}

impl Default for ChannelWaiter {
    fn default() -> Self {
        Self::new()
    }
}

impl Waiter for ChannelWaiter {
    fn wait(&self, delay: Duration) -> Result<(), Interrupted> {
        debug!(delay_ms = delay.as_millis() as u64, "waiting");
        self.waiting.store(true, Ordering::SeqCst);
        let received = self.rx.recv_timeout(delay);
        self.waiting.store(false, Ordering::SeqCst);
        match received {
            Ok(()) => Err(Interrupted),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => Ok(()),
        }
    }
}

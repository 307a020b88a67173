//! Cooperative dispatch of external signals.
//!
//! Signals are never handled where they arrive. Whatever receives them (an
//! OS signal handler, a watcher thread) only marks them pending through a
//! [`SignalNotifier`]. The registered handlers then run on the transport's
//! own thread at a single point: right after the readiness primitive returns
//! inside [`Transport::select`](crate::transport::Transport::select).
//!
//! # Example
//!
//! ```
//! use amqp_io::signal::{SignalDispatcher, SignalQueue};
//! use amqp_io::TransportError;
//!
//! let mut queue = SignalQueue::new();
//! queue
//!     .register(15, |signo| Err(TransportError::Signal(format!("terminated by {signo}"))))
//!     .unwrap();
//!
//! let notifier = queue.notifier();
//! std::thread::spawn(move || notifier.notify(15)).join().unwrap();
//!
//! let err = queue.dispatch_pending().unwrap_err();
//! assert_eq!(err.to_string(), "Signal handler error: terminated by 15");
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::{Result, TransportError};

/// Highest signal number a [`SignalQueue`] can track.
pub const MAX_SIGNAL: i32 = 63;

/// Whether this platform delivers external signals that can be dispatched.
pub fn signal_dispatch_supported() -> bool {
    cfg!(unix)
}

/// Runs pending signal handlers at the dispatch point.
///
/// `Send`, so a [`Transport`](crate::transport::Transport) can be handed to
/// another thread before it is driven.
pub trait SignalDispatcher: Send {
    /// Run handlers for every signal marked pending since the last call.
    ///
    /// A handler error stops dispatch and is returned to the caller of
    /// `select`.
    fn dispatch_pending(&mut self) -> Result<()>;
}

/// Dispatcher with nothing to dispatch.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSignals;

impl SignalDispatcher for NoSignals {
    #[inline]
    fn dispatch_pending(&mut self) -> Result<()> {
        Ok(())
    }
}

type Handler = Box<dyn FnMut(i32) -> Result<()> + Send>;

/// Pending-signal set plus the handlers to run for each signal.
pub struct SignalQueue {
    pending: Arc<AtomicU64>,
    handlers: Vec<(i32, Handler)>,
}

impl SignalQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self {
            pending: Arc::new(AtomicU64::new(0)),
            handlers: Vec::new(),
        }
    }

    /// Register a handler for `signo` (1..=63).
    ///
    /// Several handlers may share a signal; they run in registration order.
    pub fn register<F>(&mut self, signo: i32, handler: F) -> Result<()>
    where
        F: FnMut(i32) -> Result<()> + Send + 'static,
    {
        if signal_bit(signo).is_none() {
            return Err(TransportError::Config(format!(
                "Signal number {signo} outside 1..={MAX_SIGNAL}"
            )));
        }
        self.handlers.push((signo, Box::new(handler)));
        Ok(())
    }

    /// Handle used to mark signals pending from elsewhere.
    pub fn notifier(&self) -> SignalNotifier {
        SignalNotifier {
            pending: self.pending.clone(),
        }
    }

    /// Whether any signal is waiting for dispatch.
    pub fn has_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire) != 0
    }
}

impl Default for SignalQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SignalQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalQueue")
            .field("pending", &self.pending.load(Ordering::Relaxed))
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

impl SignalDispatcher for SignalQueue {
    fn dispatch_pending(&mut self) -> Result<()> {
        let pending = self.pending.swap(0, Ordering::AcqRel);
        if pending == 0 {
            return Ok(());
        }

        for signo in 1..=MAX_SIGNAL {
            let Some(bit) = signal_bit(signo) else {
                continue;
            };
            if pending & bit == 0 {
                continue;
            }
            tracing::debug!(signo, "Dispatching signal");

            for (registered, handler) in self.handlers.iter_mut() {
                if *registered != signo {
                    continue;
                }
                if let Err(e) = handler(signo) {
                    // Signals after this one stay pending for the next dispatch.
                    let rest = pending & !(bit | (bit - 1));
                    self.pending.fetch_or(rest, Ordering::AcqRel);
                    tracing::error!(signo, "Signal handler error: {}", e);
                    return Err(e);
                }
            }
        }
        Ok(())
    }
}

/// Cloneable, thread-safe handle that marks signals pending.
///
/// [`notify`](Self::notify) is a single atomic operation and may be called
/// from an OS signal handler.
#[derive(Debug, Clone)]
pub struct SignalNotifier {
    pending: Arc<AtomicU64>,
}

impl SignalNotifier {
    /// Mark `signo` pending. Out-of-range numbers are ignored.
    pub fn notify(&self, signo: i32) {
        if let Some(bit) = signal_bit(signo) {
            self.pending.fetch_or(bit, Ordering::AcqRel);
        }
    }
}

fn signal_bit(signo: i32) -> Option<u64> {
    if (1..=MAX_SIGNAL).contains(&signo) {
        Some(1u64 << signo)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_no_signals_is_noop() {
        assert!(NoSignals.dispatch_pending().is_ok());
    }

    #[test]
    fn test_dispatch_runs_only_pending_handlers() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut queue = SignalQueue::new();
        for signo in [2, 10, 15] {
            let seen = seen.clone();
            queue
                .register(signo, move |s| {
                    seen.lock().unwrap().push(s);
                    Ok(())
                })
                .unwrap();
        }

        let notifier = queue.notifier();
        notifier.notify(15);
        notifier.notify(2);
        assert!(queue.has_pending());

        queue.dispatch_pending().unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![2, 15]);
        assert!(!queue.has_pending());

        queue.dispatch_pending().unwrap();
        assert_eq!(seen.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_handler_error_keeps_later_signals_pending() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut queue = SignalQueue::new();
        queue
            .register(2, |_| Err(TransportError::Signal("interrupted".into())))
            .unwrap();
        let seen_clone = seen.clone();
        queue
            .register(15, move |s| {
                seen_clone.lock().unwrap().push(s);
                Ok(())
            })
            .unwrap();

        let notifier = queue.notifier();
        notifier.notify(2);
        notifier.notify(15);

        assert!(matches!(
            queue.dispatch_pending(),
            Err(TransportError::Signal(_))
        ));
        assert!(seen.lock().unwrap().is_empty());

        queue.dispatch_pending().unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![15]);
    }

    #[test]
    fn test_register_rejects_out_of_range() {
        let mut queue = SignalQueue::new();
        assert!(queue.register(0, |_| Ok(())).is_err());
        assert!(queue.register(64, |_| Ok(())).is_err());
        assert!(queue.register(MAX_SIGNAL, |_| Ok(())).is_ok());
    }

    #[test]
    fn test_notify_ignores_out_of_range() {
        let queue = SignalQueue::new();
        queue.notifier().notify(-1);
        queue.notifier().notify(200);
        assert!(!queue.has_pending());
    }

    #[test]
    fn test_queue_dispatches_from_another_thread() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut queue = SignalQueue::new();
        let seen_clone = seen.clone();
        queue
            .register(10, move |s| {
                seen_clone.lock().unwrap().push(s);
                Ok(())
            })
            .unwrap();
        queue.notifier().notify(10);

        std::thread::spawn(move || queue.dispatch_pending())
            .join()
            .unwrap()
            .unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![10]);
    }

    #[test]
    fn test_supported_on_unix() {
        assert_eq!(signal_dispatch_supported(), cfg!(unix));
    }
}

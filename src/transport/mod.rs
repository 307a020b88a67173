//! Transport module - the contract concrete transports implement and the
//! transport-independent logic layered on top of it.
//!
//! - [`RawTransport`]: blocking primitives supplied by a concrete transport
//!   (connect, close, read, write, native handle, readiness primitive).
//! - [`Transport`]: owns a raw transport together with its heartbeat state
//!   and signal dispatcher, and provides `select`, `reconnect` and the
//!   heartbeat toggles.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use amqp_io::{TcpTransport, Transport, TransportConfig};
//!
//! let config = TransportConfig::from_json(r#"{"host": "broker", "heartbeat": 30, "read_write_timeout": 60}"#)?;
//! let mut transport = Transport::new(TcpTransport::new(&config), &config)?;
//! transport.connect()?;
//!
//! loop {
//!     if transport.select(Some(Duration::from_secs(1)))? > 0 {
//!         let header = transport.read(7)?;
//!         // hand over to the frame codec
//!     }
//! }
//! ```

#[cfg(unix)]
mod tcp;

#[cfg(unix)]
pub use tcp::TcpTransport;

use std::time::Duration;

use bytes::Bytes;

use crate::config::TransportConfig;
use crate::error::{Result, TransportError};
use crate::fault;
use crate::heartbeat::{HeartbeatCheck, HeartbeatState};
use crate::protocol::HEARTBEAT_FRAME;
use crate::signal::{signal_dispatch_supported, NoSignals, SignalDispatcher};
use crate::time::{Clock, SystemClock};

/// Native descriptor exposed for external multiplexing.
#[cfg(unix)]
pub type NativeHandle = std::os::fd::RawFd;

/// Native descriptor exposed for external multiplexing.
#[cfg(windows)]
pub type NativeHandle = std::os::windows::io::RawSocket;

/// Blocking primitives of a concrete transport.
///
/// Implementations report connectivity failures through their own errors,
/// which are passed through unchanged. The readiness primitive may also
/// report faults out-of-band with [`fault::report`]; those are turned into
/// [`TransportError::IoWait`] by [`Transport::select`].
pub trait RawTransport {
    /// Establish the connection.
    fn connect(&mut self) -> Result<()>;

    /// Release the connection.
    fn close(&mut self) -> Result<()>;

    /// Read exactly `len` bytes.
    fn read(&mut self, len: usize) -> Result<Bytes>;

    /// Write `data`, returning the number of bytes written.
    fn write(&mut self, data: &[u8]) -> Result<usize>;

    /// Native descriptor, if connected.
    fn socket(&self) -> Option<NativeHandle>;

    /// Wait until data is readable or `timeout` elapses.
    ///
    /// `None` timeout blocks indefinitely. Returns the number of ready
    /// descriptors, or `None` when nothing became ready (timeout or
    /// interrupted).
    fn do_select(&mut self, timeout: Option<Duration>) -> Result<Option<usize>>;
}

/// A raw transport plus heartbeat monitoring and readiness waiting.
///
/// Every operation takes `&mut self`: a transport is driven by one thread of
/// control at a time.
pub struct Transport<T, C = SystemClock> {
    raw: T,
    clock: C,
    heartbeat: HeartbeatState,
    signals: Box<dyn SignalDispatcher>,
    dispatch_signals: bool,
}

impl<T: RawTransport> Transport<T> {
    /// Create a transport from validated configuration.
    pub fn new(raw: T, config: &TransportConfig) -> Result<Self> {
        config.validate()?;
        Ok(TransportBuilder::new(raw).config(config).build())
    }

    /// Start building a transport around `raw`.
    pub fn builder(raw: T) -> TransportBuilder<T> {
        TransportBuilder::new(raw)
    }
}

impl<T: RawTransport, C: Clock> Transport<T, C> {
    /// Establish the underlying connection.
    pub fn connect(&mut self) -> Result<()> {
        self.raw.connect()?;
        tracing::debug!("Transport connected");
        Ok(())
    }

    /// Close the underlying connection.
    ///
    /// On success the activity timestamps are cleared, so heartbeat checks
    /// stay idle until traffic flows again. A failed close leaves them as
    /// they were.
    pub fn close(&mut self) -> Result<()> {
        self.raw.close()?;
        self.heartbeat = HeartbeatState::with_initial(
            self.heartbeat.interval(),
            self.heartbeat.initial_interval(),
        );
        tracing::debug!("Transport closed");
        Ok(())
    }

    /// Close, then connect. No retry and no delay.
    ///
    /// If closing fails the error is returned and no connect is attempted.
    pub fn reconnect(&mut self) -> Result<()> {
        self.close()?;
        self.connect()
    }

    /// Read exactly `len` bytes and record read activity.
    pub fn read(&mut self, len: usize) -> Result<Bytes> {
        let data = self.raw.read(len)?;
        self.heartbeat.record_read(self.clock.now());
        Ok(data)
    }

    /// Write `data` and record write activity.
    pub fn write(&mut self, data: &[u8]) -> Result<usize> {
        let written = self.raw.write(data)?;
        self.heartbeat.record_write(self.clock.now());
        Ok(written)
    }

    /// Native descriptor, for registration in an external event loop.
    pub fn socket(&self) -> Option<NativeHandle> {
        self.raw.socket()
    }

    /// Stop heartbeat monitoring.
    pub fn disable_heartbeat(&mut self) -> &mut Self {
        self.heartbeat.disable();
        self
    }

    /// Restore the interval the transport was built with.
    pub fn reenable_heartbeat(&mut self) -> &mut Self {
        self.heartbeat.reenable();
        self
    }

    /// Heartbeat interval and activity timestamps.
    pub fn heartbeat(&self) -> &HeartbeatState {
        &self.heartbeat
    }

    /// Whether `select` dispatches pending signals.
    pub fn can_dispatch_signals(&self) -> bool {
        self.dispatch_signals
    }

    /// Check peer liveness and send a heartbeat if one is due.
    ///
    /// When nothing was read for more than twice the interval the transport
    /// is closed and [`TransportError::HeartbeatMissed`] is returned. If that
    /// close fails, its error travels inside the returned error.
    pub fn check_heartbeat(&mut self) -> Result<()> {
        match self.heartbeat.check(self.clock.now()) {
            HeartbeatCheck::Skipped | HeartbeatCheck::Healthy => Ok(()),
            HeartbeatCheck::Missed { since_read } => {
                let interval = self.heartbeat.interval();
                tracing::warn!(since_read, interval, "Missed server heartbeat");
                let close_error = self.close().err().map(|e| {
                    tracing::warn!("Failed to close after missed heartbeat: {}", e);
                    Box::new(e)
                });
                Err(TransportError::HeartbeatMissed {
                    elapsed: since_read,
                    interval,
                    close_error,
                })
            }
            HeartbeatCheck::Due { since_write } => {
                tracing::debug!(since_write, "Sending heartbeat");
                self.write(&HEARTBEAT_FRAME)?;
                Ok(())
            }
        }
    }

    /// Wait for readiness, bounded by `timeout` (`None` blocks indefinitely).
    ///
    /// Runs the heartbeat check first, then the readiness primitive inside a
    /// fault-capture scope, then any pending signal handlers. Returns the
    /// number of ready descriptors; 0 means timeout, or interrupted with
    /// nothing ready.
    pub fn select(&mut self, timeout: Option<Duration>) -> Result<usize> {
        self.check_heartbeat()?;

        let raw = &mut self.raw;
        let ready = fault::capture(|| raw.do_select(timeout)).map_err(|fault| {
            tracing::debug!(code = fault.code(), "Readiness wait failed: {}", fault);
            TransportError::IoWait(fault)
        })??;

        if self.dispatch_signals {
            self.signals.dispatch_pending()?;
        }

        Ok(ready.unwrap_or(0))
    }

    /// Reference to the raw transport.
    pub fn get_ref(&self) -> &T {
        &self.raw
    }

    /// Mutable reference to the raw transport.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.raw
    }

    /// Give back the raw transport.
    pub fn into_inner(self) -> T {
        self.raw
    }
}

impl<T: std::fmt::Debug, C> std::fmt::Debug for Transport<T, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport")
            .field("raw", &self.raw)
            .field("heartbeat", &self.heartbeat)
            .field("dispatch_signals", &self.dispatch_signals)
            .finish_non_exhaustive()
    }
}

/// Builder for [`Transport`].
pub struct TransportBuilder<T, C = SystemClock> {
    raw: T,
    clock: C,
    heartbeat: u64,
    initial_heartbeat: Option<u64>,
    dispatch_signals: bool,
    signals: Box<dyn SignalDispatcher>,
}

impl<T: RawTransport> TransportBuilder<T> {
    /// Create a builder with heartbeats disabled.
    pub fn new(raw: T) -> Self {
        Self {
            raw,
            clock: SystemClock,
            heartbeat: 0,
            initial_heartbeat: None,
            dispatch_signals: true,
            signals: Box::new(NoSignals),
        }
    }
}

impl<T: RawTransport, C: Clock> TransportBuilder<T, C> {
    /// Apply the heartbeat and signal options of `config`.
    pub fn config(mut self, config: &TransportConfig) -> Self {
        self.heartbeat = config.heartbeat;
        self.initial_heartbeat = config.initial_heartbeat;
        self.dispatch_signals = config.dispatch_signals;
        self
    }

    /// Set the heartbeat interval in seconds (0 disables).
    pub fn heartbeat(mut self, secs: u64) -> Self {
        self.heartbeat = secs;
        self
    }

    /// Set the interval restored by `reenable_heartbeat`.
    ///
    /// Default: the heartbeat interval.
    pub fn initial_heartbeat(mut self, secs: u64) -> Self {
        self.initial_heartbeat = Some(secs);
        self
    }

    /// Opt out of (or back into) signal dispatch.
    ///
    /// Dispatch only happens on platforms that support it.
    pub fn dispatch_signals(mut self, enabled: bool) -> Self {
        self.dispatch_signals = enabled;
        self
    }

    /// Set the dispatcher run after each readiness wait.
    pub fn signals(mut self, dispatcher: impl SignalDispatcher + 'static) -> Self {
        self.signals = Box::new(dispatcher);
        self
    }

    /// Use a different time source.
    pub fn clock<C2: Clock>(self, clock: C2) -> TransportBuilder<T, C2> {
        TransportBuilder {
            raw: self.raw,
            clock,
            heartbeat: self.heartbeat,
            initial_heartbeat: self.initial_heartbeat,
            dispatch_signals: self.dispatch_signals,
            signals: self.signals,
        }
    }

    /// Build the transport.
    pub fn build(self) -> Transport<T, C> {
        let initial = self.initial_heartbeat.unwrap_or(self.heartbeat);
        Transport {
            raw: self.raw,
            clock: self.clock,
            heartbeat: HeartbeatState::with_initial(self.heartbeat, initial),
            signals: self.signals,
            dispatch_signals: self.dispatch_signals && signal_dispatch_supported(),
        }
    }
}

//! Error types for amqp-io.

use thiserror::Error;

use crate::fault::Fault;

/// Main error type for all transport operations.
#[derive(Debug, Error)]
pub enum TransportError {
    /// I/O error raised by the concrete transport.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON configuration could not be parsed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid configuration value.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Protocol error (malformed frame header, bad frame end).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// No read from the peer within twice the heartbeat interval.
    ///
    /// The transport has already been closed when this is returned, unless
    /// `close_error` says otherwise.
    #[error("Missed server heartbeat: {elapsed}s since last read, interval {interval}s")]
    HeartbeatMissed {
        /// Rounded seconds since the last successful read.
        elapsed: u64,
        /// Heartbeat interval in effect.
        interval: u64,
        /// Error from closing the transport after the miss, if any.
        close_error: Option<Box<TransportError>>,
    },

    /// A fault was captured while waiting for readiness.
    ///
    /// Displays as the captured fault message.
    #[error("{0}")]
    IoWait(Fault),

    /// A fault was captured during a guarded operation.
    #[error("{0}")]
    Fault(#[from] Fault),

    /// A signal handler failed during cooperative dispatch.
    #[error("Signal handler error: {0}")]
    Signal(String),

    /// The peer closed the connection.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Operation requires a connected transport.
    #[error("Transport is not connected")]
    NotConnected,
}

impl TransportError {
    /// The captured fault behind this error, if any.
    pub fn fault(&self) -> Option<&Fault> {
        match self {
            TransportError::IoWait(fault) | TransportError::Fault(fault) => Some(fault),
            _ => None,
        }
    }

    /// Whether the connection must be treated as dead.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            TransportError::HeartbeatMissed { .. } | TransportError::ConnectionClosed
        )
    }
}

/// Result type alias using TransportError.
pub type Result<T> = std::result::Result<T, TransportError>;

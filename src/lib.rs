//! # amqp-io
//!
//! Transport layer of an AMQP 0-9-1 client.
//!
//! This crate defines the contract every concrete transport satisfies and
//! the transport-independent logic layered on top of it:
//!
//! - **Heartbeats**: before every readiness wait the peer's liveness is
//!   checked. A silent peer closes the transport with
//!   [`TransportError::HeartbeatMissed`]; an idle local side sends the
//!   8-byte heartbeat frame.
//! - **Readiness wait**: [`Transport::select`] wraps the transport's poll
//!   primitive, normalizes "nothing ready" to `0`, and dispatches pending
//!   signals cooperatively.
//! - **Fault capture**: faults reported out-of-band during the wait are
//!   turned into [`TransportError::IoWait`].
//!
//! ## Architecture
//!
//! - [`RawTransport`]: blocking primitives (`connect`, `close`, `read`,
//!   `write`, `socket`, `do_select`) implemented by concrete transports.
//! - [`Transport`]: owns a raw transport, its [`HeartbeatState`] and a
//!   [`SignalDispatcher`].
//!
//! ## Example
//!
//! ```ignore
//! use std::time::Duration;
//! use amqp_io::{TcpTransport, Transport, TransportConfig};
//!
//! let config = TransportConfig::from_json(r#"{"host": "broker", "heartbeat": 30, "read_write_timeout": 60}"#)?;
//! let mut transport = Transport::new(TcpTransport::new(&config), &config)?;
//! transport.connect()?;
//!
//! match transport.select(Some(Duration::from_secs(1))) {
//!     Ok(0) => { /* timeout */ }
//!     Ok(_) => { let header = transport.read(7)?; }
//!     Err(e) if e.is_fatal() => transport.reconnect()?,
//!     Err(e) => return Err(e),
//! }
//! ```

pub mod config;
pub mod error;
pub mod fault;
pub mod heartbeat;
pub mod protocol;
pub mod signal;
pub mod time;
pub mod transport;

pub use config::{Endpoint, TransportConfig};
pub use error::{Result, TransportError};
pub use fault::Fault;
pub use heartbeat::{HeartbeatCheck, HeartbeatState};
pub use signal::{SignalDispatcher, SignalQueue};
#[cfg(unix)]
pub use transport::TcpTransport;
pub use transport::{NativeHandle, RawTransport, Transport, TransportBuilder};

//! Transport configuration.
//!
//! # Example
//!
//! ```
//! use amqp_io::TransportConfig;
//!
//! let config = TransportConfig::from_json(
//!     r#"{"host": "broker", "port": 5672, "heartbeat": 30, "read_write_timeout": 60.0}"#,
//! )
//! .unwrap();
//!
//! assert_eq!(config.endpoint().to_string(), "broker:5672");
//! assert_eq!(config.initial_heartbeat(), 30);
//! ```

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TransportError};

/// Default broker port.
pub const DEFAULT_PORT: u16 = 5672;

/// Default connect timeout in seconds.
pub const DEFAULT_CONNECTION_TIMEOUT: f64 = 3.0;

/// Default blocking read/write timeout in seconds.
pub const DEFAULT_READ_WRITE_TIMEOUT: f64 = 3.0;

/// Remote host and port.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    /// Host name or address.
    pub host: String,
    /// TCP port.
    pub port: u16,
}

impl Endpoint {
    /// Create an endpoint.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Options recognized by the transport layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Broker host.
    pub host: String,
    /// Broker port.
    pub port: u16,
    /// Heartbeat interval in seconds, 0 disables.
    pub heartbeat: u64,
    /// Interval restored by `reenable_heartbeat`; defaults to `heartbeat`.
    pub initial_heartbeat: Option<u64>,
    /// Enable TCP keepalive on the socket.
    pub keepalive: bool,
    /// Allow cooperative signal dispatch where the platform supports it.
    pub dispatch_signals: bool,
    /// Connect timeout in seconds.
    pub connection_timeout: f64,
    /// Blocking read/write timeout in seconds.
    pub read_write_timeout: f64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: DEFAULT_PORT,
            heartbeat: 0,
            initial_heartbeat: None,
            keepalive: false,
            dispatch_signals: true,
            connection_timeout: DEFAULT_CONNECTION_TIMEOUT,
            read_write_timeout: DEFAULT_READ_WRITE_TIMEOUT,
        }
    }
}

impl TransportConfig {
    /// Parse and validate a JSON configuration.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check option consistency.
    ///
    /// With heartbeats enabled, a blocking read must be allowed to last at
    /// least two intervals so a missed heartbeat is detected by the monitor
    /// rather than by a read timeout.
    pub fn validate(&self) -> Result<()> {
        if self.host.is_empty() {
            return Err(TransportError::Config("host must not be empty".to_string()));
        }
        for (name, value) in [
            ("connection_timeout", self.connection_timeout),
            ("read_write_timeout", self.read_write_timeout),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(TransportError::Config(format!(
                    "{name} must be a non-negative number of seconds, got {value}"
                )));
            }
        }
        if self.heartbeat != 0 && self.read_write_timeout < (self.heartbeat as f64) * 2.0 {
            return Err(TransportError::Config(format!(
                "read_write_timeout ({}s) must be at least 2x the heartbeat ({}s)",
                self.read_write_timeout, self.heartbeat
            )));
        }
        Ok(())
    }

    /// Remote endpoint.
    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new(self.host.clone(), self.port)
    }

    /// Interval restored by `reenable_heartbeat`.
    pub fn initial_heartbeat(&self) -> u64 {
        self.initial_heartbeat.unwrap_or(self.heartbeat)
    }

    /// Connect timeout, `None` when 0 (block indefinitely).
    pub fn connection_timeout(&self) -> Option<Duration> {
        secs_to_duration(self.connection_timeout)
    }

    /// Read/write timeout, `None` when 0 (block indefinitely).
    pub fn read_write_timeout(&self) -> Option<Duration> {
        secs_to_duration(self.read_write_timeout)
    }
}

fn secs_to_duration(secs: f64) -> Option<Duration> {
    if secs > 0.0 && secs.is_finite() {
        Some(Duration::from_secs_f64(secs))
    } else {
        None
    }
}

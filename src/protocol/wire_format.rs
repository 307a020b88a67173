//! Frame header encoding and decoding.
//!
//! Every frame starts with a 7-byte header and ends with a single
//! frame-end octet:
//! ```text
//! ┌──────────┬──────────┬──────────────┬─────────┬───────────┐
//! │ Type     │ Channel  │ Payload size │ Payload │ Frame end │
//! │ 1 byte   │ 2 bytes  │ 4 bytes      │ N bytes │ 1 byte    │
//! │          │ uint16 BE│ uint32 BE    │         │ 0xCE      │
//! └──────────┴──────────┴──────────────┴─────────┴───────────┘
//! ```
//!
//! All multi-byte integers are Big Endian.

use crate::error::{Result, TransportError};

/// Header size in bytes (fixed, exactly 7).
pub const HEADER_SIZE: usize = 7;

/// Frame-end marker terminating every frame.
pub const FRAME_END: u8 = 0xCE;

/// Frame type octets handled by the transport layer.
pub mod frame_type {
    /// Heartbeat frame.
    pub const HEARTBEAT: u8 = 8;
}

/// Decoded frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Frame type (see `frame_type` module).
    pub frame_type: u8,
    /// Channel number (0 = connection-level).
    pub channel: u16,
    /// Payload length in bytes.
    pub payload_size: u32,
}

impl FrameHeader {
    /// Create a new header.
    pub const fn new(frame_type: u8, channel: u16, payload_size: u32) -> Self {
        Self {
            frame_type,
            channel,
            payload_size,
        }
    }

    /// Encode header to bytes (Big Endian).
    pub const fn encode(&self) -> [u8; HEADER_SIZE] {
        let channel = self.channel.to_be_bytes();
        let size = self.payload_size.to_be_bytes();
        [
            self.frame_type,
            channel[0],
            channel[1],
            size[0],
            size[1],
            size[2],
            size[3],
        ]
    }

    /// Decode header from bytes.
    ///
    /// Returns `None` if buffer is too short.
    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() < HEADER_SIZE {
            return None;
        }
        Some(Self {
            frame_type: buf[0],
            channel: u16::from_be_bytes([buf[1], buf[2]]),
            payload_size: u32::from_be_bytes([buf[3], buf[4], buf[5], buf[6]]),
        })
    }

    /// Check a heartbeat header for protocol compliance.
    ///
    /// Heartbeats travel on channel 0 and carry no payload.
    pub fn validate_heartbeat(&self) -> Result<()> {
        if !self.is_heartbeat() {
            return Err(TransportError::Protocol(format!(
                "Expected heartbeat frame, got type {}",
                self.frame_type
            )));
        }
        if self.channel != 0 {
            return Err(TransportError::Protocol(format!(
                "Heartbeat on channel {}",
                self.channel
            )));
        }
        if self.payload_size != 0 {
            return Err(TransportError::Protocol(format!(
                "Heartbeat with {} payload bytes",
                self.payload_size
            )));
        }
        Ok(())
    }

    /// Check if this is a heartbeat.
    #[inline]
    pub fn is_heartbeat(&self) -> bool {
        self.frame_type == frame_type::HEARTBEAT
    }
}

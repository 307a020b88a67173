//! The heartbeat frame.
//!
//! # Example
//!
//! ```
//! use amqp_io::protocol::{parse_heartbeat, HEARTBEAT_FRAME};
//!
//! let header = parse_heartbeat(&HEARTBEAT_FRAME).unwrap();
//! assert!(header.is_heartbeat());
//! assert_eq!((header.channel, header.payload_size), (0, 0));
//! ```

use super::wire_format::{frame_type, FrameHeader, FRAME_END, HEADER_SIZE};
use crate::error::{Result, TransportError};

/// Size of the heartbeat frame on the wire.
pub const HEARTBEAT_FRAME_SIZE: usize = HEADER_SIZE + 1;

/// The heartbeat frame: type 8, channel 0, empty payload, frame end.
pub const HEARTBEAT_FRAME: [u8; HEARTBEAT_FRAME_SIZE] = heartbeat_bytes();

const fn heartbeat_bytes() -> [u8; HEARTBEAT_FRAME_SIZE] {
    let header = FrameHeader::new(frame_type::HEARTBEAT, 0, 0).encode();
    let mut frame = [FRAME_END; HEARTBEAT_FRAME_SIZE];
    let mut i = 0;
    while i < HEADER_SIZE {
        frame[i] = header[i];
        i += 1;
    }
    frame
}

/// Parse and validate a heartbeat frame received from the peer.
pub fn parse_heartbeat(buf: &[u8]) -> Result<FrameHeader> {
    if buf.len() != HEARTBEAT_FRAME_SIZE {
        return Err(TransportError::Protocol(format!(
            "Heartbeat frame must be {} bytes, got {}",
            HEARTBEAT_FRAME_SIZE,
            buf.len()
        )));
    }
    // Length checked above.
    let header = FrameHeader::decode(buf)
        .ok_or_else(|| TransportError::Protocol("Truncated frame header".to_string()))?;
    header.validate_heartbeat()?;

    let end = buf[HEADER_SIZE];
    if end != FRAME_END {
        return Err(TransportError::Protocol(format!(
            "Invalid frame end 0x{end:02X}"
        )));
    }
    Ok(header)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heartbeat_frame_bytes() {
        assert_eq!(
            HEARTBEAT_FRAME,
            [0x08, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xCE]
        );
    }

    #[test]
    fn test_heartbeat_frame_matches_header_encoding() {
        let header = FrameHeader::new(frame_type::HEARTBEAT, 0, 0);
        assert_eq!(FrameHeader::decode(&HEARTBEAT_FRAME), Some(header));
        assert_eq!(&HEARTBEAT_FRAME[..HEADER_SIZE], &header.encode()[..]);
        assert_eq!(HEARTBEAT_FRAME[HEADER_SIZE], FRAME_END);
    }

    #[test]
    fn test_parse_heartbeat() {
        let header = parse_heartbeat(&HEARTBEAT_FRAME).unwrap();
        assert!(header.is_heartbeat());
    }

    #[test]
    fn test_parse_heartbeat_rejects_bad_frame_end() {
        let mut frame = HEARTBEAT_FRAME;
        frame[7] = 0x00;
        let err = parse_heartbeat(&frame).unwrap_err();
        assert!(err.to_string().contains("Invalid frame end 0x00"));
    }

    #[test]
    fn test_parse_heartbeat_rejects_wrong_length() {
        assert!(parse_heartbeat(&HEARTBEAT_FRAME[..7]).is_err());
    }
}

//! Protocol module - frame header layout and the heartbeat frame.
//!
//! Only the general frame envelope is handled here; method, content header
//! and body payloads belong to the codec layer above the transport.

mod frame;
mod wire_format;

pub use frame::{parse_heartbeat, HEARTBEAT_FRAME, HEARTBEAT_FRAME_SIZE};
pub use wire_format::{frame_type, FrameHeader, FRAME_END, HEADER_SIZE};

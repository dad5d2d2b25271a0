//! Relay wire protocol
//!
//! Framing and message types exchanged between relay clients and the server.
//!
//! Every frame is a 4-byte big-endian payload length followed by the payload.
//! The first payload byte is a marker identifying the frame kind:
//! ```text
//! 0x01 - Connect (subscriber registration: user id, display name, active flag)
//! 0x02 - Message (publisher id, content, optional timestamp)
//! 0x03 - Close   (publish acknowledgement / orderly end of exchange)
//! ```
//! The first frame a peer sends selects its role: `Connect` opens a
//! long-lived subscriber stream on which the server delivers `Message`
//! frames until either side goes away; `Message` performs a single publish
//! which the server acknowledges with `Close`.

pub mod codec;
pub mod frame;

pub use codec::{decode_frame, encode_frame, read_frame, write_frame, DEFAULT_MAX_FRAME_SIZE};
pub use frame::{ConnectRequest, Frame, RelayMessage, UserInfo};

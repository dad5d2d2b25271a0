//! Frame encoder and decoder
//!
//! Wire layout:
//! ```text
//! u32  payload length (big-endian, excludes this prefix)
//! u8   frame marker
//! ...  marker-specific fields
//! ```
//! Strings are UTF-8 with a 16-bit big-endian length prefix, except message
//! content which uses a 32-bit prefix. Timestamps travel as a presence byte
//! followed by signed 64-bit Unix milliseconds when present.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use chrono::{DateTime, Utc};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::frame::{ConnectRequest, Frame, RelayMessage, UserInfo};
use crate::error::{Error, ProtocolError, Result};

// Frame markers
const MARKER_CONNECT: u8 = 0x01;
const MARKER_MESSAGE: u8 = 0x02;
const MARKER_CLOSE: u8 = 0x03;

/// Default cap on a single frame's payload
pub const DEFAULT_MAX_FRAME_SIZE: usize = 64 * 1024;

/// Encode a frame payload (marker plus fields, without the length prefix)
pub fn encode_frame(frame: &Frame) -> Bytes {
    let mut buf = BytesMut::with_capacity(64);
    match frame {
        Frame::Connect(request) => {
            buf.put_u8(MARKER_CONNECT);
            write_short_string(&mut buf, &request.user.id);
            write_short_string(&mut buf, &request.user.name);
            buf.put_u8(if request.active { 1 } else { 0 });
        }
        Frame::Message(message) => {
            buf.put_u8(MARKER_MESSAGE);
            write_short_string(&mut buf, &message.publisher_id);
            write_long_string(&mut buf, &message.content);
            match &message.timestamp {
                Some(ts) => {
                    buf.put_u8(1);
                    buf.put_i64(ts.timestamp_millis());
                }
                None => buf.put_u8(0),
            }
        }
        Frame::Close => {
            buf.put_u8(MARKER_CLOSE);
        }
    }
    buf.freeze()
}

/// Decode a frame payload (without the length prefix)
pub fn decode_frame(buf: &mut Bytes) -> std::result::Result<Frame, ProtocolError> {
    if buf.is_empty() {
        return Err(ProtocolError::Truncated);
    }

    let marker = buf.get_u8();
    match marker {
        MARKER_CONNECT => {
            let id = read_short_string(buf)?;
            let name = read_short_string(buf)?;
            if buf.is_empty() {
                return Err(ProtocolError::Truncated);
            }
            let active = buf.get_u8() != 0;
            Ok(Frame::Connect(ConnectRequest {
                user: UserInfo { id, name },
                active,
            }))
        }
        MARKER_MESSAGE => {
            let publisher_id = read_short_string(buf)?;
            let content = read_long_string(buf)?;
            if buf.is_empty() {
                return Err(ProtocolError::Truncated);
            }
            let has_timestamp = buf.get_u8() != 0;
            let timestamp = if has_timestamp {
                if buf.remaining() < 8 {
                    return Err(ProtocolError::Truncated);
                }
                // Out-of-range stamps decode as absent; the server will
                // assign a fresh one during fan-out.
                DateTime::<Utc>::from_timestamp_millis(buf.get_i64())
            } else {
                None
            };
            Ok(Frame::Message(RelayMessage {
                publisher_id,
                content,
                timestamp,
            }))
        }
        MARKER_CLOSE => Ok(Frame::Close),
        other => Err(ProtocolError::UnknownMarker(other)),
    }
}

/// Write one length-prefixed frame and flush
pub async fn write_frame<W>(writer: &mut W, frame: &Frame) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let payload = encode_frame(frame);
    let mut buf = BytesMut::with_capacity(payload.len() + 4);
    buf.put_u32(payload.len() as u32);
    buf.put_slice(&payload);
    writer.write_all(&buf).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one length-prefixed frame
///
/// Returns `Ok(None)` when the stream ends before a complete length
/// prefix (the peer closed cleanly between frames). EOF inside a frame
/// payload is a protocol error.
pub async fn read_frame<R>(reader: &mut R, max_frame_size: usize) -> Result<Option<Frame>>
where
    R: AsyncRead + Unpin,
{
    let mut prefix = [0u8; 4];
    match reader.read_exact(&mut prefix).await {
        Ok(_) => {}
        Err(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(err) => return Err(err.into()),
    }

    let len = u32::from_be_bytes(prefix) as usize;
    if len > max_frame_size {
        return Err(ProtocolError::FrameTooLarge {
            size: len,
            max: max_frame_size,
        }
        .into());
    }

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await.map_err(|err| {
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            Error::Protocol(ProtocolError::UnexpectedEof)
        } else {
            Error::Io(err)
        }
    })?;

    let mut buf = Bytes::from(payload);
    let frame = decode_frame(&mut buf)?;
    Ok(Some(frame))
}

/// Write a UTF-8 string with 16-bit length prefix
///
/// Longer strings are clamped so the prefix always agrees with the bytes
/// that follow it.
fn write_short_string(buf: &mut BytesMut, s: &str) {
    let len = clamp_len(s, 0xFFFF);
    buf.put_u16(len as u16);
    buf.put_slice(&s.as_bytes()[..len]);
}

/// Write a UTF-8 string with 32-bit length prefix
fn write_long_string(buf: &mut BytesMut, s: &str) {
    let len = clamp_len(s, u32::MAX as usize);
    buf.put_u32(len as u32);
    buf.put_slice(&s.as_bytes()[..len]);
}

/// Largest prefix of `s` that fits in `max` bytes without splitting a char
fn clamp_len(s: &str, max: usize) -> usize {
    if s.len() <= max {
        return s.len();
    }
    let mut len = max;
    while !s.is_char_boundary(len) {
        len -= 1;
    }
    len
}

/// Read a UTF-8 string with 16-bit length prefix
fn read_short_string(buf: &mut Bytes) -> std::result::Result<String, ProtocolError> {
    if buf.remaining() < 2 {
        return Err(ProtocolError::Truncated);
    }
    let len = buf.get_u16() as usize;
    if buf.remaining() < len {
        return Err(ProtocolError::Truncated);
    }
    let bytes = buf.copy_to_bytes(len);
    String::from_utf8(bytes.to_vec()).map_err(|_| ProtocolError::InvalidUtf8)
}

/// Read a UTF-8 string with 32-bit length prefix
fn read_long_string(buf: &mut Bytes) -> std::result::Result<String, ProtocolError> {
    if buf.remaining() < 4 {
        return Err(ProtocolError::Truncated);
    }
    let len = buf.get_u32() as usize;
    if buf.remaining() < len {
        return Err(ProtocolError::Truncated);
    }
    let bytes = buf.copy_to_bytes(len);
    String::from_utf8(bytes.to_vec()).map_err(|_| ProtocolError::InvalidUtf8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_roundtrip() {
        let frame = Frame::Connect(ConnectRequest::new(UserInfo::new("u-1", "Zoë")));
        let mut encoded = encode_frame(&frame);
        let decoded = decode_frame(&mut encoded).unwrap();
        assert_eq!(decoded, frame);
    }

    #[test]
    fn test_message_timestamp_presence() {
        let stamped = Frame::Message(
            RelayMessage::new("u-1", "hello").with_timestamp(
                DateTime::<Utc>::from_timestamp_millis(1_700_000_123_456).unwrap(),
            ),
        );
        let mut encoded = encode_frame(&stamped);
        assert_eq!(decode_frame(&mut encoded).unwrap(), stamped);

        let unstamped = Frame::Message(RelayMessage::new("u-2", "no clock"));
        let mut encoded = encode_frame(&unstamped);
        match decode_frame(&mut encoded).unwrap() {
            Frame::Message(message) => assert!(message.timestamp.is_none()),
            other => panic!("unexpected frame: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_marker_rejected() {
        let mut buf = Bytes::from_static(&[0x7f, 0x00]);
        assert_eq!(
            decode_frame(&mut buf),
            Err(ProtocolError::UnknownMarker(0x7f))
        );
    }

    #[test]
    fn test_truncated_payload_rejected() {
        let frame = Frame::Message(RelayMessage::new("u-1", "hello"));
        let encoded = encode_frame(&frame);
        let mut truncated = encoded.slice(..encoded.len() - 3);
        assert_eq!(decode_frame(&mut truncated), Err(ProtocolError::Truncated));
    }

    #[test]
    fn test_invalid_utf8_rejected() {
        // Connect frame whose id field is not valid UTF-8
        let mut buf = BytesMut::new();
        buf.put_u8(MARKER_CONNECT);
        buf.put_u16(2);
        buf.put_slice(&[0xff, 0xfe]);
        let mut bytes = buf.freeze();

        assert_eq!(decode_frame(&mut bytes), Err(ProtocolError::InvalidUtf8));
    }

    #[test]
    fn test_oversized_id_clamped_at_char_boundary() {
        // 35,000 two-byte chars: 70,000 bytes, and the 0xFFFF cap lands
        // mid-char, so the clamp has to step back one byte
        let id = "é".repeat(35_000);
        let frame = Frame::Connect(ConnectRequest::new(UserInfo::new(id, "Alice")));

        let mut encoded = encode_frame(&frame);
        match decode_frame(&mut encoded).unwrap() {
            Frame::Connect(request) => {
                assert_eq!(request.user.id.len(), 0xFFFF - 1);
                assert!(request.user.id.chars().all(|c| c == 'é'));
                // The fields after the clamped id still parse in place
                assert_eq!(request.user.name, "Alice");
                assert!(request.active);
            }
            other => panic!("unexpected frame: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_read_frame_enforces_max_size() {
        let (mut client, mut server) = tokio::io::duplex(1024);
        let frame = Frame::Message(RelayMessage::new("u-1", "x".repeat(256)));
        write_frame(&mut client, &frame).await.unwrap();

        match read_frame(&mut server, 16).await {
            Err(Error::Protocol(ProtocolError::FrameTooLarge { max: 16, .. })) => {}
            other => panic!("expected FrameTooLarge, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_read_frame_clean_eof() {
        let (mut client, mut server) = tokio::io::duplex(1024);
        write_frame(&mut client, &Frame::Close).await.unwrap();
        drop(client);

        assert_eq!(
            read_frame(&mut server, DEFAULT_MAX_FRAME_SIZE).await.unwrap(),
            Some(Frame::Close)
        );
        assert_eq!(
            read_frame(&mut server, DEFAULT_MAX_FRAME_SIZE).await.unwrap(),
            None
        );
    }
}

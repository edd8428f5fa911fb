//! Native messaging framing.
//!
//! Each message is UTF-8 JSON preceded by its byte length as a 32-bit
//! unsigned integer in native byte order:
//!
//! ```text
//! ┌──────────────┬───────────────────────────┐
//! │ len: u32 (NE)│ JSON body (len bytes)     │
//! └──────────────┴───────────────────────────┘
//! ```

// ============================================================================
// Imports
// ============================================================================

use bytes::{Bytes, BytesMut};
use serde::Serialize;
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{Encoder, FramedRead, FramedWrite, LengthDelimitedCodec};

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Default maximum message body size (1 MiB, the browser's limit for
/// messages from a native host).
pub const DEFAULT_MAX_MESSAGE_BYTES: usize = 1024 * 1024;

/// Size of the length header in bytes.
pub const HEADER_LEN: usize = 4;

// ============================================================================
// Codec Construction
// ============================================================================

/// Creates the length-delimited codec used on both directions of a channel.
#[must_use]
pub fn codec(max_message_bytes: usize) -> LengthDelimitedCodec {
    LengthDelimitedCodec::builder()
        .native_endian()
        .length_field_length(HEADER_LEN)
        .max_frame_length(max_message_bytes)
        .new_codec()
}

/// Wraps an input stream in the native messaging codec.
pub fn reader<R: AsyncRead>(io: R, max_message_bytes: usize) -> FramedRead<R, LengthDelimitedCodec> {
    FramedRead::new(io, codec(max_message_bytes))
}

/// Wraps an output stream in the native messaging codec.
pub fn writer<W: AsyncWrite>(
    io: W,
    max_message_bytes: usize,
) -> FramedWrite<W, LengthDelimitedCodec> {
    FramedWrite::new(io, codec(max_message_bytes))
}

// ============================================================================
// Message Encoding
// ============================================================================

/// Serializes a message into a frame body.
///
/// # Errors
///
/// - [`Error::Json`] if the message cannot be serialized
/// - [`Error::MessageTooLarge`] if the body exceeds `max_message_bytes`
pub fn encode_message<T: Serialize + ?Sized>(message: &T, max_message_bytes: usize) -> Result<Bytes> {
    let body = serde_json::to_vec(message)?;

    if body.len() > max_message_bytes {
        return Err(Error::message_too_large(body.len(), max_message_bytes));
    }

    Ok(Bytes::from(body))
}

/// Serializes a message into a complete frame, header included.
///
/// # Errors
///
/// Same as [`encode_message`].
pub fn encode_frame<T: Serialize + ?Sized>(message: &T, max_message_bytes: usize) -> Result<BytesMut> {
    let body = encode_message(message, max_message_bytes)?;
    let mut frame = BytesMut::with_capacity(HEADER_LEN + body.len());
    codec(max_message_bytes).encode(body, &mut frame)?;
    Ok(frame)
}

/// Parses a frame body into a structured record.
///
/// # Errors
///
/// Returns [`Error::Json`] if the body is not valid JSON.
pub fn decode_message(body: &[u8]) -> Result<Value> {
    Ok(serde_json::from_slice(body)?)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use futures_util::{SinkExt, StreamExt};
    use serde_json::json;

    fn framed(body: &[u8]) -> Vec<u8> {
        let mut frame = (body.len() as u32).to_ne_bytes().to_vec();
        frame.extend_from_slice(body);
        frame
    }

    #[test]
    fn test_frame_header_is_native_endian() {
        let frame = encode_frame(&json!({ "type": "end" }), DEFAULT_MAX_MESSAGE_BYTES)
            .expect("encode");

        let body = br#"{"type":"end"}"#;
        assert_eq!(&frame[..HEADER_LEN], &(body.len() as u32).to_ne_bytes());
        assert_eq!(&frame[HEADER_LEN..], body);
    }

    #[test]
    fn test_oversized_message_rejected() {
        let err = encode_message(&json!({ "url": "x".repeat(64) }), 32).unwrap_err();
        assert!(matches!(err, Error::MessageTooLarge { max: 32, .. }));
    }

    #[test]
    fn test_decode_rejects_invalid_json() {
        assert!(matches!(decode_message(b"{not json"), Err(Error::Json(_))));
    }

    #[tokio::test]
    async fn test_reader_splits_frames() {
        let first = framed(br#"{"type":"navigate","url":"http://b.test/"}"#);
        let second = framed(br#"{"type":"noop"}"#);

        // Second frame arrives split across two reads
        let mock = tokio_test::io::Builder::new()
            .read(&first)
            .read(&second[..3])
            .read(&second[3..])
            .build();

        let mut frames = reader(mock, DEFAULT_MAX_MESSAGE_BYTES);

        let one = frames.next().await.expect("frame").expect("read");
        assert_eq!(decode_message(&one).expect("json")["type"], "navigate");

        let two = frames.next().await.expect("frame").expect("read");
        assert_eq!(decode_message(&two).expect("json")["type"], "noop");

        assert!(frames.next().await.is_none());
    }

    #[tokio::test]
    async fn test_reader_rejects_oversized_frame() {
        let mock = tokio_test::io::Builder::new()
            .read(&framed(&[b'a'; 64]))
            .build();

        let mut frames = reader(mock, 16);
        assert!(frames.next().await.expect("frame").is_err());
    }

    #[tokio::test]
    async fn test_writer_emits_header_and_body() {
        let body = br#"{"type":"start","url":"http://a.test/x","time":1.0}"#;
        let mock = tokio_test::io::Builder::new().write(&framed(body)).build();

        let mut frames = writer(mock, DEFAULT_MAX_MESSAGE_BYTES);
        frames
            .send(Bytes::from_static(body))
            .await
            .expect("write frame");
    }
}

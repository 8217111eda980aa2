//! `tokio_util` codec turning a TCP byte stream into [`Message`]s.

use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::AtonError;
use crate::header::{HEADER_SIZE, HeaderBytes, MessageHeader};
use crate::message::{Message, MessageType};

/// Largest payload the decoder will buffer (a 4K RGBA float frame is ~130 MiB).
pub const MAX_PAYLOAD_SIZE: usize = 256 * 1024 * 1024;

#[derive(Debug, Default)]
pub struct AtonCodec {}

impl AtonCodec {
    pub fn new() -> Self {
        Self {}
    }
}

impl Decoder for AtonCodec {
    type Item = Message;
    type Error = AtonError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < HEADER_SIZE {
            return Ok(None);
        }

        let mut header_bytes: HeaderBytes = [0; HEADER_SIZE];
        header_bytes.copy_from_slice(&src[..HEADER_SIZE]);
        let header = MessageHeader::from_bytes(&header_bytes)?;

        // Reject bad tags before waiting on a payload that may never come.
        let message_type = MessageType::try_from(header.message_type())?;

        let payload_length = header.payload_length();
        if payload_length > MAX_PAYLOAD_SIZE {
            return Err(AtonError::PayloadTooLarge {
                size: payload_length,
                max: MAX_PAYLOAD_SIZE,
            });
        }

        let frame_length = HEADER_SIZE + payload_length;
        if src.len() < frame_length {
            src.reserve(frame_length - src.len());
            return Ok(None);
        }

        src.advance(HEADER_SIZE);
        let payload = src.split_to(payload_length).freeze();

        if !header.validate(&payload) {
            return Err(AtonError::ChecksumMismatch);
        }

        Message::decode_payload(message_type, payload).map(Some)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(src)? {
            Some(message) => Ok(Some(message)),
            None if src.is_empty() => Ok(None),
            None => Err(AtonError::Truncated(src.len())),
        }
    }
}

impl Encoder<Message> for AtonCodec {
    type Error = AtonError;

    fn encode(&mut self, item: Message, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let payload = item.encode_payload();
        if payload.len() > MAX_PAYLOAD_SIZE {
            return Err(AtonError::PayloadTooLarge {
                size: payload.len(),
                max: MAX_PAYLOAD_SIZE,
            });
        }

        let header = MessageHeader::for_payload(item.message_type() as u32, &payload);
        dst.reserve(HEADER_SIZE + payload.len());
        dst.extend_from_slice(&header.to_bytes());
        dst.extend_from_slice(&payload);
        Ok(())
    }
}

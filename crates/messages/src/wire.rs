//! Message encoding and decoding for network transport.
//!
//! # Wire Format
//!
//! ```text
//! [len: u32 BE][kind: u8][version: u8][payload: SBOR-encoded message]
//! ```
//!
//! - `len` counts everything after the prefix (kind byte onward)
//! - `kind` is the message tag byte, kept outside the payload so transports
//!   can route without decoding
//! - Version is currently `1`
//! - Payload is the SBOR-encoded [`ConsensusMessage`]
//!
//! The kind byte must agree with the decoded message's own tag; a mismatch is
//! rejected rather than trusting either side.

use thiserror::Error;

use crate::consensus::{ConsensusMessage, MessageKind};

/// Current wire format version.
pub const WIRE_VERSION: u8 = 1;

/// Length-prefix size in bytes.
const LEN_PREFIX: usize = 4;

/// Errors that can occur during message encoding/decoding.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("unknown wire version: {0}")]
    UnknownVersion(u8),

    #[error("unknown message kind: {0}")]
    UnknownKind(u8),

    #[error("frame too short: {0} bytes")]
    FrameTooShort(usize),

    #[error("frame length prefix {declared} does not match body length {actual}")]
    LengthMismatch { declared: usize, actual: usize },

    #[error("kind byte {kind:?} does not match decoded {decoded:?} message")]
    KindMismatch {
        kind: MessageKind,
        decoded: MessageKind,
    },

    #[error("evidence payload is {got} bytes, need at least {need}")]
    ShortEvidence { got: usize, need: usize },

    #[error("SBOR decode error: {0}")]
    SborDecode(String),

    #[error("SBOR encode error: {0}")]
    SborEncode(String),
}

/// Encode a message body (no framing): version byte plus SBOR payload.
///
/// This is what the validator hands to the transport together with the kind
/// byte; the transport frames it with [`encode_frame`].
pub fn encode_message(message: &ConsensusMessage) -> Result<Vec<u8>, CodecError> {
    let payload =
        sbor::basic_encode(message).map_err(|e| CodecError::SborEncode(format!("{:?}", e)))?;
    let mut bytes = Vec::with_capacity(1 + payload.len());
    bytes.push(WIRE_VERSION);
    bytes.extend(payload);
    Ok(bytes)
}

/// Decode a message body previously produced by [`encode_message`], checking
/// that the routed kind byte agrees with the decoded tag.
pub fn decode_message(kind: MessageKind, data: &[u8]) -> Result<ConsensusMessage, CodecError> {
    if data.is_empty() {
        return Err(CodecError::FrameTooShort(0));
    }
    let version = data[0];
    if version != WIRE_VERSION {
        return Err(CodecError::UnknownVersion(version));
    }
    let message: ConsensusMessage = sbor::basic_decode(&data[1..])
        .map_err(|e| CodecError::SborDecode(format!("{:?}", e)))?;
    if message.kind() != kind {
        return Err(CodecError::KindMismatch {
            kind,
            decoded: message.kind(),
        });
    }
    Ok(message)
}

/// Wrap an encoded message body in the length-prefixed frame.
pub fn encode_frame(kind: MessageKind, body: &[u8]) -> Vec<u8> {
    let len = 1 + body.len();
    let mut frame = Vec::with_capacity(LEN_PREFIX + len);
    frame.extend_from_slice(&(len as u32).to_be_bytes());
    frame.push(kind.as_byte());
    frame.extend_from_slice(body);
    frame
}

/// Decode a full wire frame into a tagged consensus message.
pub fn decode_frame(data: &[u8]) -> Result<ConsensusMessage, CodecError> {
    if data.len() < LEN_PREFIX + 2 {
        return Err(CodecError::FrameTooShort(data.len()));
    }
    let declared = u32::from_be_bytes(
        data[..LEN_PREFIX]
            .try_into()
            .expect("slice is exactly 4 bytes"),
    ) as usize;
    let body = &data[LEN_PREFIX..];
    if declared != body.len() {
        return Err(CodecError::LengthMismatch {
            declared,
            actual: body.len(),
        });
    }
    let kind = MessageKind::from_byte(body[0]).ok_or(CodecError::UnknownKind(body[0]))?;
    decode_message(kind, &body[1..])
}

/// Encode a message straight to a framed wire buffer.
pub fn encode_framed(message: &ConsensusMessage) -> Result<Vec<u8>, CodecError> {
    Ok(encode_frame(message.kind(), &encode_message(message)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use helix_types::{Hash, KeyPair};

    fn make_message() -> ConsensusMessage {
        let key = KeyPair::from_seed(&[9u8; 32]);
        ConsensusMessage::new_signed(
            MessageKind::Prepared,
            7,
            Hash::from_bytes(b"block"),
            vec![1, 2, 3],
            &key,
        )
    }

    #[test]
    fn test_frame_round_trip() {
        let message = make_message();
        let frame = encode_framed(&message).unwrap();
        let decoded = decode_frame(&frame).unwrap();
        assert_eq!(decoded, message);
    }

    #[test]
    fn test_unknown_version() {
        let message = make_message();
        let mut body = encode_message(&message).unwrap();
        body[0] = 99;
        let frame = encode_frame(message.kind(), &body);
        assert!(matches!(
            decode_frame(&frame),
            Err(CodecError::UnknownVersion(99))
        ));
    }

    #[test]
    fn test_unknown_kind() {
        let message = make_message();
        let mut frame = encode_framed(&message).unwrap();
        frame[4] = 0xee;
        assert!(matches!(
            decode_frame(&frame),
            Err(CodecError::UnknownKind(0xee))
        ));
    }

    #[test]
    fn test_length_mismatch() {
        let message = make_message();
        let mut frame = encode_framed(&message).unwrap();
        frame.truncate(frame.len() - 1);
        assert!(matches!(
            decode_frame(&frame),
            Err(CodecError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn test_kind_mismatch() {
        let message = make_message();
        let body = encode_message(&message).unwrap();
        // Route a PREPARED body under the ANNOUNCE kind byte.
        let frame = encode_frame(MessageKind::Announce, &body);
        assert!(matches!(
            decode_frame(&frame),
            Err(CodecError::KindMismatch { .. })
        ));
    }

    #[test]
    fn test_short_frame() {
        assert!(matches!(
            decode_frame(&[0, 0]),
            Err(CodecError::FrameTooShort(2))
        ));
    }
}

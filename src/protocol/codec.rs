//! Binary encoder and decoder for signaling messages
//!
//! Frame layout:
//! ```text
//! +--------+----------------------------------------+
//! | tag u8 | fields, in declaration order           |
//! +--------+----------------------------------------+
//!
//! string : u32 BE length | UTF-8 bytes
//! blob   : u32 BE length | raw bytes (never inspected)
//! list   : u32 BE count  | string * count
//! ```
//!
//! A frame carries exactly one message; leftover bytes are an error. Blob
//! fields decode as slices of the inbound frame, so relaying an SDP to
//! several peers never copies it.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::constants::*;
use super::message::SignalMessage;
use crate::error::CodecError;

/// Encode a message into a single frame
pub fn encode(message: &SignalMessage) -> Bytes {
    let mut encoder = SignalEncoder::with_capacity(encoded_len_hint(message));
    encoder.encode(message);
    encoder.finish()
}

/// Decode a single frame
pub fn decode(frame: Bytes) -> Result<SignalMessage, CodecError> {
    SignalDecoder::new(frame).decode()
}

fn encoded_len_hint(message: &SignalMessage) -> usize {
    let payload = match message {
        SignalMessage::Offer { sdp, .. } | SignalMessage::Answer { sdp, .. } => sdp.len(),
        SignalMessage::IceCandidate { candidate, .. } => candidate.len(),
        _ => 0,
    };
    64 + payload
}

/// Message encoder writing into a growable buffer
pub struct SignalEncoder {
    buf: BytesMut,
}

impl SignalEncoder {
    pub fn new() -> Self {
        Self {
            buf: BytesMut::new(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
        }
    }

    /// Append one message
    pub fn encode(&mut self, message: &SignalMessage) {
        match message {
            SignalMessage::JoinRequest { session } => {
                self.buf.put_u8(TAG_JOIN_REQUEST);
                self.put_string(session);
            }
            SignalMessage::LeaveNotice { session } => {
                self.buf.put_u8(TAG_LEAVE_NOTICE);
                self.put_string(session);
            }
            SignalMessage::Offer { session, sdp } => {
                self.buf.put_u8(TAG_OFFER);
                self.put_string(session);
                self.put_blob(sdp);
            }
            SignalMessage::Answer { session, sdp } => {
                self.buf.put_u8(TAG_ANSWER);
                self.put_string(session);
                self.put_blob(sdp);
            }
            SignalMessage::IceCandidate { session, candidate } => {
                self.buf.put_u8(TAG_ICE_CANDIDATE);
                self.put_string(session);
                self.put_blob(candidate);
            }
            SignalMessage::EndOfCandidates { session } => {
                self.buf.put_u8(TAG_END_OF_CANDIDATES);
                self.put_string(session);
            }
            SignalMessage::PeerJoined { session, peer_id } => {
                self.buf.put_u8(TAG_PEER_JOINED);
                self.put_string(session);
                self.put_string(peer_id);
            }
            SignalMessage::PeerLeft { session, peer_id } => {
                self.buf.put_u8(TAG_PEER_LEFT);
                self.put_string(session);
                self.put_string(peer_id);
            }
            SignalMessage::Joined { session, peer_id } => {
                self.buf.put_u8(TAG_JOINED);
                self.put_string(session);
                self.put_string(peer_id);
            }
            SignalMessage::ListSessions => {
                self.buf.put_u8(TAG_LIST_SESSIONS);
            }
            SignalMessage::SessionList { sessions } => {
                self.buf.put_u8(TAG_SESSION_LIST);
                self.buf.put_u32(wire_len(sessions.len()));
                for session in sessions {
                    self.put_string(session);
                }
            }
            SignalMessage::Error { reason } => {
                self.buf.put_u8(TAG_ERROR);
                self.put_string(reason);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Take the encoded bytes
    pub fn finish(self) -> Bytes {
        self.buf.freeze()
    }

    fn put_string(&mut self, s: &str) {
        self.put_blob(s.as_bytes());
    }

    fn put_blob(&mut self, data: &[u8]) {
        self.buf.put_u32(wire_len(data.len()));
        self.buf.put_slice(data);
    }
}

/// Length or count as written on the wire
///
/// Everything the relay encodes came in through a frame capped far below
/// 4 GiB, so a longer input is a caller bug.
fn wire_len(len: usize) -> u32 {
    debug_assert!(
        u32::try_from(len).is_ok(),
        "length {} does not fit the u32 wire prefix",
        len
    );
    len as u32
}

impl Default for SignalEncoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Decoder over one inbound frame
pub struct SignalDecoder {
    buf: Bytes,
}

impl SignalDecoder {
    pub fn new(frame: Bytes) -> Self {
        Self { buf: frame }
    }

    /// Decode the frame's message, requiring the frame to be fully consumed
    pub fn decode(mut self) -> Result<SignalMessage, CodecError> {
        if !self.buf.has_remaining() {
            return Err(CodecError::EmptyFrame);
        }

        let tag = self.buf.get_u8();
        let message = match tag {
            TAG_JOIN_REQUEST => SignalMessage::JoinRequest {
                session: self.string()?,
            },
            TAG_LEAVE_NOTICE => SignalMessage::LeaveNotice {
                session: self.string()?,
            },
            TAG_OFFER => SignalMessage::Offer {
                session: self.string()?,
                sdp: self.blob()?,
            },
            TAG_ANSWER => SignalMessage::Answer {
                session: self.string()?,
                sdp: self.blob()?,
            },
            TAG_ICE_CANDIDATE => SignalMessage::IceCandidate {
                session: self.string()?,
                candidate: self.blob()?,
            },
            TAG_END_OF_CANDIDATES => SignalMessage::EndOfCandidates {
                session: self.string()?,
            },
            TAG_PEER_JOINED => SignalMessage::PeerJoined {
                session: self.string()?,
                peer_id: self.string()?,
            },
            TAG_PEER_LEFT => SignalMessage::PeerLeft {
                session: self.string()?,
                peer_id: self.string()?,
            },
            TAG_JOINED => SignalMessage::Joined {
                session: self.string()?,
                peer_id: self.string()?,
            },
            TAG_LIST_SESSIONS => SignalMessage::ListSessions,
            TAG_SESSION_LIST => {
                let count = self.u32()? as usize;
                // Every entry needs at least its length prefix
                if count > self.buf.remaining() / 4 {
                    return Err(CodecError::UnexpectedEof);
                }
                let mut sessions = Vec::with_capacity(count);
                for _ in 0..count {
                    sessions.push(self.string()?);
                }
                SignalMessage::SessionList { sessions }
            }
            TAG_ERROR => SignalMessage::Error {
                reason: self.string()?,
            },
            other => return Err(CodecError::UnknownTag(other)),
        };

        if self.buf.has_remaining() {
            return Err(CodecError::TrailingBytes(self.buf.remaining()));
        }

        Ok(message)
    }

    fn u32(&mut self) -> Result<u32, CodecError> {
        if self.buf.remaining() < 4 {
            return Err(CodecError::UnexpectedEof);
        }
        Ok(self.buf.get_u32())
    }

    fn blob(&mut self) -> Result<Bytes, CodecError> {
        let len = self.u32()? as usize;
        if self.buf.remaining() < len {
            return Err(CodecError::UnexpectedEof);
        }
        Ok(self.buf.split_to(len))
    }

    fn string(&mut self) -> Result<String, CodecError> {
        let raw = self.blob()?;
        String::from_utf8(raw.to_vec()).map_err(|_| CodecError::InvalidUtf8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(message: SignalMessage) {
        let encoded = encode(&message);
        let decoded = decode(encoded).unwrap();
        assert_eq!(decoded, message);
    }

    #[test]
    fn test_roundtrip_all_variants() {
        let messages = vec![
            SignalMessage::join("room1"),
            SignalMessage::leave("room1"),
            SignalMessage::offer("room1", Bytes::from_static(b"v=0\r\no=- 46117 2 IN IP4 0.0.0.0")),
            SignalMessage::answer("room1", Bytes::from_static(b"v=0\r\n")),
            SignalMessage::ice_candidate(
                "room1",
                Bytes::from_static(b"candidate:1 1 UDP 2122252543 192.168.1.2 50000 typ host"),
            ),
            SignalMessage::EndOfCandidates {
                session: "room1".into(),
            },
            SignalMessage::PeerJoined {
                session: "room1".into(),
                peer_id: "7".into(),
            },
            SignalMessage::PeerLeft {
                session: "room1".into(),
                peer_id: "7".into(),
            },
            SignalMessage::Joined {
                session: "room1".into(),
                peer_id: "3".into(),
            },
            SignalMessage::ListSessions,
            SignalMessage::SessionList {
                sessions: vec!["a".into(), "b".into()],
            },
            SignalMessage::SessionList { sessions: vec![] },
            SignalMessage::error("not a member of session `x`"),
        ];

        for message in messages {
            roundtrip(message);
        }
    }

    #[test]
    fn test_binary_payload_is_opaque() {
        // Not UTF-8, contains zero bytes and a fake tag
        let blob = Bytes::from_static(&[0x00, 0xff, 0xfe, TAG_OFFER, 0x00, 0x00]);
        roundtrip(SignalMessage::offer("s", blob.clone()));
        roundtrip(SignalMessage::ice_candidate("s", blob));
        roundtrip(SignalMessage::answer("s", Bytes::new()));
    }

    #[test]
    fn test_unicode_session_name() {
        roundtrip(SignalMessage::join("комната-🎥"));
    }

    #[test]
    fn test_layout() {
        let encoded = encode(&SignalMessage::join("ab"));
        assert_eq!(&encoded[..], &[TAG_JOIN_REQUEST, 0, 0, 0, 2, b'a', b'b']);
    }

    #[test]
    fn test_decode_empty_frame() {
        assert_eq!(decode(Bytes::new()), Err(CodecError::EmptyFrame));
    }

    #[test]
    fn test_decode_unknown_tag() {
        let result = decode(Bytes::from_static(&[0xEE]));
        assert_eq!(result, Err(CodecError::UnknownTag(0xEE)));
    }

    #[test]
    fn test_decode_truncated_length() {
        let result = decode(Bytes::from_static(&[TAG_JOIN_REQUEST, 0x00, 0x00]));
        assert_eq!(result, Err(CodecError::UnexpectedEof));
    }

    #[test]
    fn test_decode_truncated_blob() {
        // Offer declares a 16 byte SDP but carries 2
        let data = [TAG_OFFER, 0, 0, 0, 1, b's', 0, 0, 0, 16, b'v', b'='];
        let result = decode(Bytes::copy_from_slice(&data));
        assert_eq!(result, Err(CodecError::UnexpectedEof));
    }

    #[test]
    fn test_decode_invalid_utf8() {
        let data = [TAG_JOIN_REQUEST, 0, 0, 0, 2, 0xC3, 0x28];
        let result = decode(Bytes::copy_from_slice(&data));
        assert_eq!(result, Err(CodecError::InvalidUtf8));
    }

    #[test]
    fn test_decode_trailing_bytes() {
        let mut frame = BytesMut::from(&encode(&SignalMessage::leave("s"))[..]);
        frame.put_slice(&[1, 2, 3]);
        let result = decode(frame.freeze());
        assert_eq!(result, Err(CodecError::TrailingBytes(3)));
    }

    #[test]
    fn test_decode_session_list_bogus_count() {
        let data = [TAG_SESSION_LIST, 0xff, 0xff, 0xff, 0xff];
        let result = decode(Bytes::copy_from_slice(&data));
        assert_eq!(result, Err(CodecError::UnexpectedEof));
    }

    #[test]
    fn test_encoder_len_and_empty() {
        let mut encoder = SignalEncoder::new();
        assert!(encoder.is_empty());

        encoder.encode(&SignalMessage::ListSessions);
        assert_eq!(encoder.len(), 1);
    }

    #[test]
    fn test_decoded_blob_shares_frame() {
        let encoded = encode(&SignalMessage::offer("s", Bytes::from_static(b"sdp-body")));
        let frame_ptr = encoded.as_ptr() as usize;
        let frame_end = frame_ptr + encoded.len();

        if let SignalMessage::Offer { sdp, .. } = decode(encoded).unwrap() {
            let sdp_ptr = sdp.as_ptr() as usize;
            assert!(sdp_ptr >= frame_ptr && sdp_ptr < frame_end);
        } else {
            panic!("Expected Offer");
        }
    }

    #[test]
    fn test_wire_len_fits() {
        assert_eq!(wire_len(0), 0);
        assert_eq!(wire_len(u32::MAX as usize), u32::MAX);
    }

    #[cfg(all(debug_assertions, target_pointer_width = "64"))]
    #[test]
    #[should_panic(expected = "does not fit the u32 wire prefix")]
    fn test_wire_len_overflow_panics() {
        wire_len(u32::MAX as usize + 1);
    }
}

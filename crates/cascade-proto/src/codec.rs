use crate::error::{ProtoError, ProtoResult};
use crate::message::{Request, MAX_MESSAGE_SIZE};

/// Wire version of the request frame. Bumped on any incompatible change
/// to the layout or the payload encoding.
pub const FRAME_VERSION: u8 = 1;

/// Bytes of frame header following the length: version and tag.
const FRAME_HEADER: usize = 2;

/// Codec for framed Cascade requests.
///
/// Frame layout: `[4 bytes len][1 byte version][1 byte tag][bincode
/// payload]`, length big-endian and covering version, tag, and payload.
/// The tag duplicates the request's type tag so a receiver can reject a
/// frame whose header and body disagree without trusting the payload.
pub struct CascadeCodec;

impl CascadeCodec {
    /// Encode a request with framing.
    pub fn encode(msg: &Request) -> ProtoResult<Vec<u8>> {
        let payload =
            bincode::serialize(msg).map_err(|e| ProtoError::Serialization(e.to_string()))?;
        if payload.len() > MAX_MESSAGE_SIZE {
            return Err(ProtoError::MessageTooLarge {
                size: payload.len(),
                max: MAX_MESSAGE_SIZE,
            });
        }
        let len = (payload.len() + FRAME_HEADER) as u32;
        let mut buf = Vec::with_capacity(4 + FRAME_HEADER + payload.len());
        buf.extend_from_slice(&len.to_be_bytes());
        buf.push(FRAME_VERSION);
        buf.push(msg.type_tag());
        buf.extend_from_slice(&payload);
        Ok(buf)
    }

    /// Decode a framed request. Returns (request, bytes consumed).
    pub fn decode(data: &[u8]) -> ProtoResult<(Request, usize)> {
        if data.len() < 4 + FRAME_HEADER {
            return Err(ProtoError::FramingError("too short".into()));
        }
        let len = u32::from_be_bytes(data[0..4].try_into().expect("checked")) as usize;
        if len < FRAME_HEADER {
            return Err(ProtoError::FramingError("truncated frame header".into()));
        }
        if len - FRAME_HEADER > MAX_MESSAGE_SIZE {
            return Err(ProtoError::MessageTooLarge {
                size: len - FRAME_HEADER,
                max: MAX_MESSAGE_SIZE,
            });
        }
        let total = 4 + len;
        if data.len() < total {
            return Err(ProtoError::FramingError(format!(
                "incomplete: have {}, need {}",
                data.len(),
                total
            )));
        }
        let version = data[4];
        if version != FRAME_VERSION {
            return Err(ProtoError::FramingError(format!(
                "unsupported frame version {version}, expected {FRAME_VERSION}"
            )));
        }
        let tag = data[5];
        let payload = &data[4 + FRAME_HEADER..total];
        let msg: Request =
            bincode::deserialize(payload).map_err(|e| ProtoError::Deserialization(e.to_string()))?;
        if msg.type_tag() != tag {
            return Err(ProtoError::FramingError(format!(
                "frame tag {tag} does not match payload tag {}",
                msg.type_tag()
            )));
        }
        Ok((msg, total))
    }
}

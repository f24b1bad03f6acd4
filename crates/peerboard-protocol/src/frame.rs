//! Byte framing for the short-range point-to-point link.
//!
//! ```text
//! ┌──────────────┬─────────────┬────┬──────────────┐
//! │ len: u32 BE  │ action name │ \n │ JSON payload │
//! └──────────────┴─────────────┴────┴──────────────┘
//!                 └──────────── len bytes ─────────┘
//! ```
//!
//! Frames longer than the link's write limit are cut into consecutive
//! chunks. The link delivers bytes in order, so the receiver reassembles
//! them with a plain accumulator and needs no chunk numbering.

use serde::Serialize;

use crate::ProtocolError;

const PREFIX_LEN: usize = 4;

/// Encodes one message as a length-prefixed frame.
///
/// # Errors
/// [`ProtocolError::Encode`] if the payload cannot be serialized, or
/// [`ProtocolError::FrameTooLarge`] if it does not fit a `u32` length.
pub fn encode_frame<T: Serialize + ?Sized>(
    action: &str,
    payload: &T,
) -> Result<Vec<u8>, ProtocolError> {
    let json = serde_json::to_vec(payload).map_err(ProtocolError::Encode)?;
    let body_len = action.len() + 1 + json.len();
    let len = u32::try_from(body_len).map_err(|_| ProtocolError::FrameTooLarge(body_len))?;

    let mut frame = Vec::with_capacity(PREFIX_LEN + body_len);
    frame.extend_from_slice(&len.to_be_bytes());
    frame.extend_from_slice(action.as_bytes());
    frame.push(b'\n');
    frame.extend_from_slice(&json);
    Ok(frame)
}

/// Splits an encoded frame into writes of at most `max_chunk` bytes.
///
/// A frame that already fits is returned as a single chunk.
pub fn chunk_frame(frame: &[u8], max_chunk: usize) -> impl Iterator<Item = &[u8]> {
    frame.chunks(max_chunk.max(1))
}

/// A decoded frame body.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub action: String,
    pub payload: serde_json::Value,
}

/// Reassembles frames from arbitrarily sized inbound chunks.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `chunk` and returns every frame it completed, in order.
    ///
    /// A frame whose body fails to decode yields an `Err` in its slot; the
    /// frames around it are unaffected and the stream stays in sync, since
    /// the length prefix alone delimits frames.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Result<Frame, ProtocolError>> {
        self.buf.extend_from_slice(chunk);

        let mut out = Vec::new();
        let mut start = 0;
        while self.buf.len() - start >= PREFIX_LEN {
            let mut prefix = [0u8; PREFIX_LEN];
            prefix.copy_from_slice(&self.buf[start..start + PREFIX_LEN]);
            let len = u32::from_be_bytes(prefix) as usize;
            let body_start = start + PREFIX_LEN;
            if self.buf.len() - body_start < len {
                break;
            }
            out.push(decode_body(&self.buf[body_start..body_start + len]));
            start = body_start + len;
        }
        self.buf.drain(..start);
        out
    }

    /// Bytes held back waiting for the rest of a frame.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }
}

fn decode_body(body: &[u8]) -> Result<Frame, ProtocolError> {
    let sep = body
        .iter()
        .position(|&b| b == b'\n')
        .ok_or(ProtocolError::MissingSeparator)?;
    let action = std::str::from_utf8(&body[..sep])
        .map_err(|_| ProtocolError::InvalidActionName)?
        .to_owned();
    let payload = serde_json::from_slice(&body[sep + 1..]).map_err(ProtocolError::Decode)?;
    Ok(Frame { action, payload })
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[test]
    fn test_encode_frame_layout() {
        let frame = encode_frame("chat", &json!({"t": 1})).unwrap();
        let body = b"chat\n{\"t\":1}";
        assert_eq!(&frame[..4], &(body.len() as u32).to_be_bytes());
        assert_eq!(&frame[4..], body);
    }

    #[test]
    fn test_chunk_frame_respects_limit() {
        let frame = vec![7u8; 1100];
        let chunks: Vec<_> = chunk_frame(&frame, 512).collect();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].len(), 512);
        assert_eq!(chunks[2].len(), 76);
    }

    #[test]
    fn test_decoder_waits_for_full_prefix() {
        let frame = encode_frame("a", &json!(1)).unwrap();
        let mut dec = FrameDecoder::new();
        assert!(dec.push(&frame[..3]).is_empty());
        assert_eq!(dec.buffered(), 3);
        let got = dec.push(&frame[3..]);
        assert_eq!(got.len(), 1);
        assert_eq!(dec.buffered(), 0);
    }

    #[test]
    fn test_decoder_yields_multiple_frames_from_one_chunk() {
        let mut bytes = encode_frame("a", &json!({"n": 1})).unwrap();
        bytes.extend(encode_frame("b", &json!({"n": 2})).unwrap());
        let got: Vec<Frame> = FrameDecoder::new()
            .push(&bytes)
            .into_iter()
            .map(Result::unwrap)
            .collect();
        assert_eq!(got[0].action, "a");
        assert_eq!(got[1].payload, json!({"n": 2}));
    }

    #[test]
    fn test_malformed_frame_is_isolated() {
        let bad_body = b"nosep";
        let mut bytes = (bad_body.len() as u32).to_be_bytes().to_vec();
        bytes.extend_from_slice(bad_body);
        let bad_json = b"x\n{oops";
        bytes.extend_from_slice(&(bad_json.len() as u32).to_be_bytes());
        bytes.extend_from_slice(bad_json);
        bytes.extend(encode_frame("ok", &json!(true)).unwrap());

        let got = FrameDecoder::new().push(&bytes);
        assert_eq!(got.len(), 3);
        assert!(matches!(got[0], Err(ProtocolError::MissingSeparator)));
        assert!(matches!(got[1], Err(ProtocolError::Decode(_))));
        assert_eq!(got[2].as_ref().unwrap().action, "ok");
    }
}

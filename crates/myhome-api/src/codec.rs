//! Stream framing for `tokio_util::codec::Framed`.
//!
//! The gateway writes frames back to back without separators, so the
//! decoder splits on the `##` terminator. Bytes before the first `*` of a
//! frame are line noise and are dropped; oversized garbage is discarded
//! instead of growing the buffer forever.

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::warn;

use crate::error::Error;
use crate::frame::TERMINATOR;

/// Upper bound for one frame; real frames stay well under 100 bytes.
pub const MAX_FRAME_LEN: usize = 1024;

/// Splits a byte stream into raw frame strings.
#[derive(Debug, Clone, Default)]
pub struct FrameCodec {
    /// Bytes already scanned for a terminator, so scanning resumes where
    /// the previous call stopped.
    scanned: usize,
}

impl FrameCodec {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Decoder for FrameCodec {
    type Item = String;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<String>, Error> {
        loop {
            // A terminator may straddle the previous scan boundary.
            let from = self.scanned.saturating_sub(1);
            let found = src[from..]
                .windows(TERMINATOR.len())
                .position(|w| w == TERMINATOR.as_bytes())
                .map(|pos| from + pos + TERMINATOR.len());

            let Some(end) = found else {
                if src.len() > MAX_FRAME_LEN {
                    warn!(discarded = src.len(), "discarding oversized unterminated frame");
                    src.clear();
                    self.scanned = 0;
                } else {
                    self.scanned = src.len();
                }
                return Ok(None);
            };

            self.scanned = 0;
            let chunk = src.split_to(end);
            let Some(start) = chunk.iter().position(|b| *b == b'*') else {
                continue;
            };
            return Ok(Some(String::from_utf8_lossy(&chunk[start..]).into_owned()));
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<String>, Error> {
        match self.decode(src)? {
            Some(frame) => Ok(Some(frame)),
            None => {
                // Trailing partial frame on close carries no information.
                src.advance(src.len());
                self.scanned = 0;
                Ok(None)
            }
        }
    }
}

impl Encoder<String> for FrameCodec {
    type Error = Error;

    fn encode(&mut self, item: String, dst: &mut BytesMut) -> Result<(), Error> {
        dst.reserve(item.len());
        dst.put(item.as_bytes());
        Ok(())
    }
}

impl Encoder<&str> for FrameCodec {
    type Error = Error;

    fn encode(&mut self, item: &str, dst: &mut BytesMut) -> Result<(), Error> {
        dst.reserve(item.len());
        dst.put(item.as_bytes());
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn feed(codec: &mut FrameCodec, buf: &mut BytesMut, data: &[u8]) -> Vec<String> {
        buf.extend_from_slice(data);
        let mut out = Vec::new();
        while let Some(frame) = codec.decode(buf).unwrap() {
            out.push(frame);
        }
        out
    }

    #[test]
    fn splits_back_to_back_frames() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();
        let frames = feed(&mut codec, &mut buf, b"*#*1##*1*1*12##*1*0*13##");
        assert_eq!(frames, ["*#*1##", "*1*1*12##", "*1*0*13##"]);
        assert!(buf.is_empty());
    }

    #[test]
    fn buffers_partial_frames() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();
        assert!(feed(&mut codec, &mut buf, b"*1*1*1").is_empty());
        assert!(feed(&mut codec, &mut buf, b"2#").is_empty());
        assert_eq!(feed(&mut codec, &mut buf, b"#*1*0"), ["*1*1*12##"]);
        assert_eq!(feed(&mut codec, &mut buf, b"*12##"), ["*1*0*12##"]);
    }

    #[test]
    fn drops_leading_noise() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();
        let frames = feed(&mut codec, &mut buf, b"\r\n\0*#*1##garbage##*1*1*12##");
        assert_eq!(frames, ["*#*1##", "*1*1*12##"]);
    }

    #[test]
    fn invalid_utf8_is_lossy_not_fatal() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();
        let frames = feed(&mut codec, &mut buf, b"*1*\xff*12##");
        assert_eq!(frames.len(), 1);
        assert!(crate::Message::parse(&frames[0]).is_err());
    }

    #[test]
    fn discards_oversized_garbage() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();
        let junk = vec![b'1'; MAX_FRAME_LEN + 1];
        assert!(feed(&mut codec, &mut buf, &junk).is_empty());
        assert!(buf.is_empty());
        assert_eq!(feed(&mut codec, &mut buf, b"*#*1##"), ["*#*1##"]);
    }

    #[test]
    fn encodes_raw_text() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();
        codec.encode("*99*9##", &mut buf).unwrap();
        codec.encode(String::from("*#*1##"), &mut buf).unwrap();
        assert_eq!(&buf[..], b"*99*9##*#*1##");
    }
}

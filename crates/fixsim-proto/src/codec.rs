//! Wire encoding and stream framing.
//!
//! Encoding always recomputes BodyLength (9) and CheckSum (10); whatever the
//! message carried for those tags is ignored. Decoding splits a byte stream
//! on the `SOH 10=NNN SOH` trailer.

use bytes::{Bytes, BytesMut};

use crate::{
    dictionary::{DEFAULT_BEGIN_STRING, Dictionary},
    errors::{FrameError, ParseError},
    message::{Message, SOH},
    tags,
};

/// Default upper bound for a single buffered frame.
pub const DEFAULT_MAX_FRAME_SIZE: usize = 64 * 1024;

/// `SOH 10=`
const TRAILER_MARKER: &[u8] = b"\x0110=";

/// Length of `SOH 10=NNN SOH`.
const TRAILER_LEN: usize = 8;

/// Sum of bytes modulo 256.
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, b| acc.wrapping_add(*b))
}

impl Message {
    /// Encode to wire text.
    ///
    /// Field order: `8`, `9`, `35`, remaining header fields, body fields,
    /// `10`.
    pub fn to_wire(&self) -> String {
        let begin_string = self.header().get(tags::BEGIN_STRING).unwrap_or(DEFAULT_BEGIN_STRING);

        let mut body = String::new();
        if let Some(msg_type) = self.msg_type_str() {
            push_field(&mut body, tags::MSG_TYPE, msg_type);
        }
        for (tag, value) in self.header().iter() {
            if matches!(tag, tags::BEGIN_STRING | tags::BODY_LENGTH | tags::MSG_TYPE) {
                continue;
            }
            push_field(&mut body, tag, value);
        }
        for (tag, value) in self.body().iter() {
            push_field(&mut body, tag, value);
        }

        let mut wire = String::with_capacity(body.len() + 32);
        push_field(&mut wire, tags::BEGIN_STRING, begin_string);
        push_field(&mut wire, tags::BODY_LENGTH, &body.len().to_string());
        wire.push_str(&body);

        let sum = checksum(wire.as_bytes());
        push_field(&mut wire, tags::CHECK_SUM, &format!("{sum:03}"));
        wire
    }

    /// Parse a complete wire frame.
    pub fn from_wire(frame: &[u8], dictionary: &Dictionary) -> Result<Self, ParseError> {
        let text = std::str::from_utf8(frame).map_err(|_| ParseError::InvalidUtf8)?;
        Self::parse(text, dictionary)
    }
}

fn push_field(out: &mut String, tag: tags::Tag, value: &str) {
    out.push_str(&tag.to_string());
    out.push('=');
    out.push_str(value);
    out.push(SOH);
}

/// Check the declared CheckSum of a complete frame.
pub fn verify_checksum(frame: &[u8]) -> Result<(), FrameError> {
    let marker = find_marker(frame).ok_or(FrameError::MalformedTrailer)?;
    let digits = frame.get(marker + 4..marker + 7).ok_or(FrameError::MalformedTrailer)?;
    let declared = parse_digits(digits).ok_or(FrameError::MalformedTrailer)?;
    let computed = checksum(&frame[..=marker]);

    if declared == computed {
        Ok(())
    } else {
        Err(FrameError::ChecksumMismatch { declared, computed })
    }
}

fn find_marker(bytes: &[u8]) -> Option<usize> {
    bytes.windows(TRAILER_MARKER.len()).position(|w| w == TRAILER_MARKER)
}

fn parse_digits(digits: &[u8]) -> Option<u8> {
    if digits.len() != 3 || !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }
    let value = digits.iter().fold(0u16, |acc, d| acc * 10 + u16::from(d - b'0'));
    u8::try_from(value).ok()
}

/// Incremental frame splitter for a byte stream.
///
/// Feed bytes with [`FrameDecoder::extend`] (or read straight into
/// [`FrameDecoder::buffer_mut`]) and pull complete frames with
/// [`FrameDecoder::decode`]. After an error the stream is unusable and the
/// connection should be closed.
#[derive(Debug)]
pub struct FrameDecoder {
    buffer: BytesMut,
    max_frame_size: usize,
}

impl FrameDecoder {
    /// Decoder with [`DEFAULT_MAX_FRAME_SIZE`].
    pub fn new() -> Self {
        Self::with_max_frame_size(DEFAULT_MAX_FRAME_SIZE)
    }

    /// Decoder with a custom frame limit.
    pub fn with_max_frame_size(max_frame_size: usize) -> Self {
        Self { buffer: BytesMut::with_capacity(4096), max_frame_size }
    }

    /// Append received bytes.
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Underlying buffer, for reading directly from a socket.
    pub fn buffer_mut(&mut self) -> &mut BytesMut {
        &mut self.buffer
    }

    /// Bytes buffered but not yet returned as a frame.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Next complete frame, if one is buffered.
    pub fn decode(&mut self) -> Result<Option<Bytes>, FrameError> {
        if self.buffer.is_empty() {
            return Ok(None);
        }

        let prefix = self.buffer.len().min(2);
        if self.buffer[..prefix] != b"8="[..prefix] {
            return Err(FrameError::MissingBeginString);
        }

        let Some(marker) = find_marker(&self.buffer) else {
            return self.incomplete();
        };

        let end = marker + TRAILER_LEN;
        if end > self.max_frame_size {
            return Err(FrameError::FrameTooLarge { size: end, max: self.max_frame_size });
        }
        if self.buffer.len() < end {
            return self.incomplete();
        }
        if parse_digits(&self.buffer[marker + 4..marker + 7]).is_none()
            || self.buffer[end - 1] != 0x01
        {
            return Err(FrameError::MalformedTrailer);
        }

        Ok(Some(self.buffer.split_to(end).freeze()))
    }

    fn incomplete(&self) -> Result<Option<Bytes>, FrameError> {
        if self.buffer.len() > self.max_frame_size {
            return Err(FrameError::FrameTooLarge {
                size: self.buffer.len(),
                max: self.max_frame_size,
            });
        }
        Ok(None)
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use insta::assert_snapshot;

    use super::*;
    use crate::tags::MsgType;

    fn order() -> Message {
        let dd = Dictionary::fix44();
        Message::parse("35=D\u{1}49=CLI\u{1}56=BRK\u{1}11=42\u{1}55=FOO\u{1}", &dd).unwrap()
    }

    #[test]
    fn encode_computes_length_and_checksum() {
        assert_snapshot!(
            order().pretty(),
            @"8=FIX.4.4|9=32|35=D|49=CLI|56=BRK|11=42|55=FOO|10=132|"
        );
    }

    #[test]
    fn encode_ignores_stale_length_and_checksum() {
        let dd = Dictionary::fix44();
        let msg = Message::parse("8=FIX.4.4\u{1}9=999\u{1}35=0\u{1}10=000\u{1}", &dd).unwrap();
        assert_eq!(msg.to_wire(), "8=FIX.4.4\u{1}9=5\u{1}35=0\u{1}10=163\u{1}");
    }

    #[test]
    fn encoded_frame_verifies_and_reparses() {
        let wire = order().to_wire();
        verify_checksum(wire.as_bytes()).unwrap();

        let reparsed = Message::from_wire(wire.as_bytes(), &Dictionary::fix44()).unwrap();
        assert_eq!(reparsed.get(tags::CL_ORD_ID), Some("42"));
        assert_eq!(reparsed.msg_type(), Some(MsgType::NewOrderSingle));
        assert_eq!(reparsed.to_wire(), wire);
    }

    #[test]
    fn checksum_mismatch_detected() {
        let wire = order().to_wire().replace("10=132", "10=131");
        assert_eq!(
            verify_checksum(wire.as_bytes()),
            Err(FrameError::ChecksumMismatch { declared: 131, computed: 132 })
        );
    }

    #[test]
    fn decoder_splits_concatenated_frames() {
        let wire = order().to_wire();
        let mut decoder = FrameDecoder::new();
        decoder.extend(wire.as_bytes());
        decoder.extend(wire.as_bytes());

        assert_eq!(decoder.decode().unwrap().unwrap(), wire.as_bytes());
        assert_eq!(decoder.decode().unwrap().unwrap(), wire.as_bytes());
        assert_eq!(decoder.decode().unwrap(), None);
        assert_eq!(decoder.buffered(), 0);
    }

    #[test]
    fn decoder_waits_for_partial_frame() {
        let wire = order().to_wire();
        let (first, second) = wire.as_bytes().split_at(wire.len() - 3);

        let mut decoder = FrameDecoder::new();
        decoder.extend(first);
        assert_eq!(decoder.decode().unwrap(), None);

        decoder.extend(second);
        assert_eq!(decoder.decode().unwrap().unwrap(), wire.as_bytes());
    }

    #[test]
    fn decoder_rejects_garbage_prefix() {
        let mut decoder = FrameDecoder::new();
        decoder.extend(b"hello");
        assert_eq!(decoder.decode(), Err(FrameError::MissingBeginString));
    }

    #[test]
    fn decoder_rejects_malformed_trailer() {
        let mut decoder = FrameDecoder::new();
        decoder.extend(b"8=FIX.4.4\x019=5\x0135=0\x0110=1x3\x01");
        assert_eq!(decoder.decode(), Err(FrameError::MalformedTrailer));
    }

    #[test]
    fn decoder_enforces_frame_limit() {
        let mut decoder = FrameDecoder::with_max_frame_size(16);
        decoder.extend(b"8=FIX.4.4\x019=500\x0135=D\x0158=aaaaaaaaaaaa");
        assert!(matches!(decoder.decode(), Err(FrameError::FrameTooLarge { max: 16, .. })));
    }
}

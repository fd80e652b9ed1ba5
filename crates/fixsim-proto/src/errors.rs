//! Error types for message parsing and stream framing.

use thiserror::Error;

use crate::tags::Tag;

/// Errors produced while turning text into a [`Message`](crate::Message).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Input contained no fields at all
    #[error("empty message")]
    Empty,

    /// A field was not of the form `tag=value`
    #[error("malformed field #{position}: {field:?}")]
    MalformedField {
        /// 1-based field position within the message
        position: usize,
        /// Raw field text
        field: String,
    },

    /// Tag was not a positive integer
    #[error("invalid tag {tag:?} in field #{position}")]
    InvalidTag {
        /// 1-based field position within the message
        position: usize,
        /// Raw tag text
        tag: String,
    },

    /// Field had a tag but no value
    #[error("tag {0} has an empty value")]
    EmptyValue(Tag),

    /// A header or trailer tag appeared more than once
    #[error("duplicate tag {0}")]
    DuplicateTag(Tag),

    /// Tag 35 was not present
    #[error("missing MsgType (35)")]
    MissingMsgType,

    /// Input was not valid UTF-8
    #[error("message is not valid UTF-8")]
    InvalidUtf8,
}

/// Errors produced by [`FrameDecoder`](crate::FrameDecoder).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// Buffered bytes exceed the frame limit without a complete trailer
    #[error("frame too large: {size} bytes exceeds maximum {max}")]
    FrameTooLarge {
        /// Bytes buffered so far
        size: usize,
        /// Configured limit
        max: usize,
    },

    /// Frame did not start with `8=`
    #[error("frame does not start with BeginString")]
    MissingBeginString,

    /// `10=` was not followed by three digits and SOH
    #[error("malformed CheckSum trailer")]
    MalformedTrailer,

    /// Declared checksum does not match the frame bytes
    #[error("checksum mismatch: declared {declared:03}, computed {computed:03}")]
    ChecksumMismatch {
        /// Value carried in tag 10
        declared: u8,
        /// Value computed over the frame
        computed: u8,
    },
}

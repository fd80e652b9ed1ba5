//! # fixsim protocol layer
//!
//! Tag/value message model for the order and execution flows the scenario
//! harness drives.
//!
//! ## Contents
//!
//! - [`Message`]: header, body and trailer field lists, order preserving
//! - [`Dictionary`]: tag placement (header / body / trailer) and BeginString
//! - [`tags`]: tag constants and [`MsgType`]
//! - Wire codec: [`Message::to_wire`] recomputes BodyLength and CheckSum,
//!   [`FrameDecoder`] splits a byte stream into frames
//!
//! Parsing is lenient where scripts need it to be: a bare first field is
//! MsgType shorthand and BodyLength / CheckSum are never validated on parse.
//! Stream input should go through [`verify_checksum`] first.
#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod codec;
pub mod dictionary;
pub mod errors;
pub mod message;
pub mod tags;

pub use codec::{DEFAULT_MAX_FRAME_SIZE, FrameDecoder, checksum, verify_checksum};
pub use dictionary::{DEFAULT_BEGIN_STRING, Dictionary, Section, field_name};
pub use errors::{FrameError, ParseError};
pub use message::{FieldMap, Message, SOH};
pub use tags::{MsgType, Tag};

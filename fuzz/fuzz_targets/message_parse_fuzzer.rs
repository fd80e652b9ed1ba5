//! Fuzz target for [`Message::parse`] and the wire encoder
//!
//! Script lines and relayed messages both go through the parser, so any
//! text must either parse or fail with a `ParseError`.
//!
//! # Strategy
//!
//! - Raw text: arbitrary strings, SOH separated
//! - Script lines: the same text run through the pipe normalisation the
//!   loader applies
//!
//! # Invariants
//!
//! - NEVER panic on any input
//! - A parsed message encodes to a frame whose checksum verifies
//! - That frame is split back out whole by `FrameDecoder`
//! - Re-parsing the frame keeps MsgType and every body field in order

#![no_main]

use arbitrary::Arbitrary;
use fixsim_proto::{verify_checksum, Dictionary, FrameDecoder, Message, SOH};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct FuzzInput {
    text: String,
    pipes_as_soh: bool,
}

fuzz_target!(|input: FuzzInput| {
    let dictionary = Dictionary::fix44();
    let text = if input.pipes_as_soh { input.text.replace('|', &SOH.to_string()) } else { input.text };

    let Ok(message) = Message::parse(&text, &dictionary) else {
        return;
    };
    if message.msg_type_str().is_none_or(str::is_empty) {
        return;
    }

    let wire = message.to_wire();
    assert!(verify_checksum(wire.as_bytes()).is_ok(), "checksum of own encoding: {wire:?}");

    let mut decoder = FrameDecoder::with_max_frame_size(wire.len());
    decoder.extend(wire.as_bytes());
    let frame = decoder.decode().expect("frame error on own encoding").expect("incomplete frame");
    assert_eq!(frame.len(), wire.len());
    assert_eq!(decoder.buffered(), 0);

    let reparsed = Message::from_wire(&frame, &dictionary).expect("reparse of own encoding");
    assert_eq!(reparsed.msg_type_str(), message.msg_type_str());
    assert!(reparsed.body().iter().eq(message.body().iter()));
});

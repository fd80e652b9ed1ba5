//! Fuzz target for [`FrameDecoder`]
//!
//! Sockets hand the decoder arbitrary chunk boundaries and, from a broken
//! peer, arbitrary bytes.
//!
//! # Strategy
//!
//! - Chunking: the same byte stream split at fuzzer-chosen points
//! - Garbage: random bytes mixed with well-formed frames
//! - Limits: small maximum frame sizes
//!
//! # Invariants
//!
//! - NEVER panic, whatever the bytes
//! - Every returned frame starts with `8=` and ends with `10=NNN<SOH>`
//! - No frame exceeds the configured limit
//! - Frames returned never overlap: their lengths sum to at most the input
//! - After an error nothing else is inspected (stream is dead)

#![no_main]

use arbitrary::Arbitrary;
use fixsim_proto::{verify_checksum, FrameDecoder};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct FuzzInput {
    max_frame_size: u16,
    chunks: Vec<Vec<u8>>,
}

fuzz_target!(|input: FuzzInput| {
    let max_frame_size = usize::from(input.max_frame_size.max(8));
    let mut decoder = FrameDecoder::with_max_frame_size(max_frame_size);
    let mut fed = 0usize;
    let mut returned = 0usize;

    'stream: for chunk in &input.chunks {
        decoder.extend(chunk);
        fed += chunk.len();

        loop {
            match decoder.decode() {
                Ok(Some(frame)) => {
                    assert!(frame.starts_with(b"8="));
                    assert_eq!(frame.last(), Some(&0x01));
                    assert!(frame.len() <= max_frame_size);
                    // Checksum may be wrong, but must be checkable without panicking.
                    let _ = verify_checksum(&frame);
                    returned += frame.len();
                    assert!(returned <= fed);
                },
                Ok(None) => break,
                Err(_) => break 'stream,
            }
        }
    }
});

//! Fuzz target for Frame::decode
//!
//! Arbitrary byte sequences must never panic the header or frame parser,
//! overflow a size calculation or read past the input. Invalid input returns
//! an error.

#![no_main]

use libfuzzer_sys::fuzz_target;
use parley_proto::Frame;

fuzz_target!(|data: &[u8]| {
    let _ = Frame::encoded_len(data);

    if let Ok(frame) = Frame::decode(data) {
        // A frame that decoded must encode back to the bytes it came from.
        let bytes = frame.to_bytes().unwrap();
        assert_eq!(&bytes[..], &data[..bytes.len()]);
    }
});

#![no_main]

use infinity_bus::bus::reassembly::{FrameReassembler, Reassembled};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }
    // First byte picks the read size, the rest is the line.
    let chunk = usize::from(data[0]).max(1);
    let mut reassembler = FrameReassembler::new();

    for piece in data[1..].chunks(chunk) {
        reassembler.push(piece);
        while let Some(out) = reassembler.next_frame() {
            if let Reassembled::Frame(frame) = out {
                assert!(frame.verify().is_ok());
            }
        }
        assert!(reassembler.buffered() <= 1024);
    }
});

#![no_main]

use infinity_bus::bus::frame::{parse_frame, InfinityFrame};
use infinity_bus::decode::SnoopReport;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok((frame, _rest)) = parse_frame(data) else {
        return;
    };

    // Anything that decodes must re-encode to the bytes it came from.
    let bytes = frame.encode().expect("decoded payload fits the length byte");
    assert_eq!(&bytes[..], &data[..bytes.len()]);
    assert_eq!(InfinityFrame::decode(&bytes).as_ref(), Ok(&frame));

    let _ = SnoopReport::parse(&frame.data);
});

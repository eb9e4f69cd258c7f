#![no_main]

use echonet_audit::echonet::frame::{pack_frame, parse_frame};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Any input either decodes or reports the field it stopped at
    let Ok(frame) = parse_frame(data) else {
        return;
    };

    // A decoded frame re-encodes to an equivalent one
    let packed = pack_frame(&frame);
    if let Ok(again) = parse_frame(&packed) {
        assert_eq!(again.transaction_id, frame.transaction_id);
        assert_eq!(again.service, frame.service);
        assert_eq!(again.properties.len(), frame.properties.len());
    }

    // Cutting the frame short must never panic
    for len in 0..data.len().min(32) {
        let _ = parse_frame(&data[..len]);
    }
});

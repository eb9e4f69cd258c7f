#![no_main]

use echonet_audit::echonet::property_map::{decode_property_map, encode_property_map};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let _ = decode_property_map(data);

    // Any code list encodes to a map that decodes to its property codes
    let mut expected: Vec<u8> = data.iter().copied().filter(|&code| code >= 0x80).collect();
    expected.sort_unstable();
    expected.dedup();
    let mut decoded = decode_property_map(&encode_property_map(data))
        .expect("encoder output must decode");
    decoded.sort_unstable();
    assert_eq!(decoded, expected);
});

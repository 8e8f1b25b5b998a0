#![no_main]

use libfuzzer_sys::fuzz_target;

use dexor::{decode, find_decode_key, signatures};

fuzz_target!(|data: &[u8]| {
    if let Ok(found) = find_decode_key(data, signatures()) {
        let magic = found.signature.magic();
        let decoded = decode(&data[..magic.len()], found.key);
        assert_eq!(decoded, magic);
    }
});

#![no_main]

use libfuzzer_sys::fuzz_target;
use skulk_block::{DataBlockReader, ReaderConfig};

fuzz_target!(|data: &[u8]| {
    // Arbitrary bytes must be rejected or decoded, never panic. Skipping the
    // checksum lets the stream decoders see the mutated payload.
    for verify_checksum in [true, false] {
        let config = ReaderConfig { verify_checksum };
        if let Ok(reader) = DataBlockReader::with_config(data, config) {
            for sample in reader {
                if let Err(e) = sample {
                    assert!(e.is_corrupt());
                }
            }
        }
    }
});

#![no_main]

use libfuzzer_sys::fuzz_target;
use skulk_block::{max_block_size, DataBlockReader, DataBlockWriter, Sample};

fuzz_target!(|data: &[u8]| {
    // Each 16 bytes = little-endian (timestamp, value bits)
    let samples: Vec<Sample> = data
        .chunks_exact(16)
        .map(|chunk| {
            let (ts, value) = chunk.split_at(8);
            let ts = i64::from_le_bytes(ts.try_into().unwrap());
            let value = f64::from_bits(u64::from_le_bytes(value.try_into().unwrap()));
            (ts, value)
        })
        .collect();

    let mut buf = vec![0u8; max_block_size(samples.len())];
    let mut writer = DataBlockWriter::new(42, &mut buf).unwrap();
    for (i, &(ts, value)) in samples.iter().enumerate() {
        if let Err(e) = writer.put(ts, value) {
            panic!("put failed at {}: {}", i, e);
        }
    }
    let block = writer.finish();

    let mut reader = DataBlockReader::new(block).unwrap();
    for (i, &(ts, value)) in samples.iter().enumerate() {
        let (decoded_ts, decoded_value) = match reader.next_sample() {
            Ok(sample) => sample,
            Err(e) => panic!("next failed at {}: {}", i, e),
        };
        assert_eq!(decoded_ts, ts, "bad timestamp at {}", i);
        assert_eq!(decoded_value.to_bits(), value.to_bits(), "bad value at {}", i);
    }
    assert!(reader.next_sample().is_err());
});

#![no_main]
use libfuzzer_sys::fuzz_target;
use memtrace::trace::{self, DiffRecord, FieldExtractor};

fuzz_target!(|data: &[u8]| {
    let split = data.len() / 2;
    let (a, b) = data.split_at(split);

    // Differ must never panic, and swapping inputs only swaps sides.
    let forward = trace::diff(a, b, "reset").unwrap();
    let backward: Vec<DiffRecord> = trace::diff(b, a, "reset")
        .unwrap()
        .into_iter()
        .map(DiffRecord::swapped)
        .collect();
    assert_eq!(forward, backward);

    let mut out = Vec::new();
    let _ = trace::dedup(a, &mut out, &FieldExtractor::default());
});

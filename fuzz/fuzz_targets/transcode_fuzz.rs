#![no_main]
use libfuzzer_sys::fuzz_target;
use memtrace::image::{self, AddressUnit, OutputMode, TranscodeOptions, WordAssembly};

fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }

    // First byte selects the options; the rest is the dump.
    let flags = data[0];
    let opts = TranscodeOptions {
        mode: if flags & 1 != 0 { OutputMode::Open } else { OutputMode::Closed },
        assembly: if flags & 2 != 0 { WordAssembly::ByteSwapped } else { WordAssembly::Direct },
        address_unit: if flags & 4 != 0 { AddressUnit::Byte } else { AddressUnit::Word },
        uppercase: flags & 8 != 0,
        max_fill: Some(1 << 16),
    };

    // `max_fill` keeps fill output bounded.
    let text = String::from_utf8_lossy(&data[1..]);
    let _ = image::transcode_str(&text, opts);
});

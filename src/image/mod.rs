// Sparse-to-dense memory image transcoding.
//
// # Modules
//
// - `record`: Sparse dump line parsing (directives, data lines)
// - `assemble`: Token-to-word assembly (direct, byte-swapped)
// - `writer`: Closed (`.coe`) and Open (`.mem`) framing
// - `transcoder`: Gap filling and the line-at-a-time driver

pub mod assemble;
pub mod record;
pub mod transcoder;
pub mod writer;

// Re-export key types for convenience.
pub use assemble::WordAssembly;
pub use record::{DIRECTIVE_MARKER, DataLine, ParseError, SparseRecord, parse_line};
pub use transcoder::{
    AddressUnit, LARGE_FILL_WORDS, TranscodeError, TranscodeOptions, TranscodeStats, Transcoder,
    transcode, transcode_str,
};
pub use writer::{COE_PREAMBLE, FILL_WORD, ImageWriter, OutputMode};

//! memtrace: memory-image transcoding and trace log comparison for
//! hardware bring-up.
//!
//! The crate provides:
//! - A sparse-to-dense memory image transcoder (`image`): `@address` hex
//!   dumps to Xilinx `.coe` vectors or padded `.mem` listings
//! - A drift-tolerant dual-stream log differ (`trace`) with duplicate
//!   filtering and unknown-value scrubbing
//! - File-oriented helpers (`io`)
//! - An optional CLI (`cli` feature)
//!
//! # Quick Start
//!
//! ```
//! use memtrace::image::{self, TranscodeOptions};
//! use memtrace::trace;
//!
//! let coe = image::transcode_str("@00000002\ndeadbeef\n", TranscodeOptions::default()).unwrap();
//! assert!(coe.ends_with("00000000,\n00000000,\ndeadbeef;"));
//!
//! let a = "reset\naddr=1\naddr=2\n";
//! let b = "reset\naddr=1\naddr=3\n";
//! let records = trace::diff(a.as_bytes(), b.as_bytes(), "reset").unwrap();
//! assert_eq!((records[0].line_a, records[0].line_b), (3, 3));
//! ```

pub mod image;
pub mod io;
pub mod trace;

#[cfg(feature = "cli")]
pub mod cli;

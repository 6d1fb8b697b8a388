// Trace log comparison.
//
// # Modules
//
// - `stream`: Line cursor with per-stream numbering and EOF padding
// - `differ`: Marker synchronization and lockstep comparison
// - `report`: Header and record rendering
// - `filter`: Duplicate removal and unknown-value scrubbing

pub mod differ;
pub mod filter;
pub mod report;
pub mod stream;

// Re-export key types for convenience.
pub use differ::{DEFAULT_SYNC_MARKER, DiffOptions, DiffRecord, DiffSummary, LogDiffer, diff};
pub use filter::{FieldExtractor, FieldSpec, FilterStats, Scrubber, dedup, scrub};
pub use report::{DiffReport, ReportFormat};
pub use stream::LogStream;

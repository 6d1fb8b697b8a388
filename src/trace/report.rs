// Diff report rendering.
//
// A header naming both inputs, then one line per record:
//
//   Lines: 12: addr_A=0x00000010 || 9: addr_A=0x00000014     (Dual)
//   InLines 4: addr_A=0x00000010 || addr_A=0x00000014        (Positional)

use std::io::{self, Write};

use super::differ::DiffRecord;

/// Width each input name is centered in on the header line.
const HEADER_COLUMN: usize = 72;

/// Record line layout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReportFormat {
    /// Each side carries its own line number.
    #[default]
    Dual,
    /// One lockstep position for both sides.
    Positional,
}

/// Writes a diff report to any sink.
pub struct DiffReport<W: Write> {
    out: W,
    format: ReportFormat,
    records: u64,
}

impl<W: Write> DiffReport<W> {
    pub fn new(out: W, format: ReportFormat) -> Self {
        Self {
            out,
            format,
            records: 0,
        }
    }

    pub fn write_header(&mut self, name_a: &str, name_b: &str) -> io::Result<()> {
        writeln!(
            self.out,
            "{name_a:^width$}||{name_b:^width$}",
            width = HEADER_COLUMN
        )
    }

    pub fn write_record(&mut self, r: &DiffRecord) -> io::Result<()> {
        self.records += 1;
        match self.format {
            ReportFormat::Dual => writeln!(
                self.out,
                "Lines: {}: {} || {}: {}",
                r.line_a, r.text_a, r.line_b, r.text_b
            ),
            ReportFormat::Positional => writeln!(
                self.out,
                "InLines {}: {} || {}",
                r.position, r.text_a, r.text_b
            ),
        }
    }

    pub fn records_written(&self) -> u64 {
        self.records
    }

    /// Flush and return the sink.
    pub fn finish(mut self) -> io::Result<W> {
        self.out.flush()?;
        Ok(self.out)
    }
}

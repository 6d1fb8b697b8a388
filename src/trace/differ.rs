// Drift-tolerant lockstep log comparison.
//
// Two phases:
//
// 1. Seek: each stream independently skips lines until one starts with the
//    sync marker. The two sync points may sit at different line numbers.
// 2. Lockstep: both streams advance one line per step. Raw bytes (line
//    ending included) are compared; an exhausted stream contributes an
//    empty line. Text is decoded only for the records. Each difference yields a `DiffRecord` carrying both
//    streams' own line numbers.
//
// There is no realignment: an inserted line in one log shows up as a run
// of differences until the logs happen to agree again.

use std::io::{self, BufRead};

use log::{debug, warn};

use super::report::ReportFormat;
use super::stream::{LogStream, line_text};

/// Marker of the first comparable line in simulator traces.
pub const DEFAULT_SYNC_MARKER: &str = "reset";

/// Differ configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffOptions {
    /// Prefix of the sync line in both streams.
    pub marker: String,
    pub format: ReportFormat,
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self {
            marker: DEFAULT_SYNC_MARKER.to_string(),
            format: ReportFormat::default(),
        }
    }
}

/// One position where the two streams disagree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffRecord {
    /// Lockstep step, 1 at the sync lines.
    pub position: u64,
    pub line_a: u64,
    pub text_a: String,
    pub line_b: u64,
    pub text_b: String,
}

impl DiffRecord {
    /// The same record seen from the other side.
    pub fn swapped(self) -> Self {
        Self {
            position: self.position,
            line_a: self.line_b,
            text_a: self.text_b,
            line_b: self.line_a,
            text_b: self.text_a,
        }
    }
}

/// Where each stream synchronized, and how much was compared.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffSummary {
    /// Line number of the sync line in stream A, if found.
    pub sync_a: Option<u64>,
    pub sync_b: Option<u64>,
    /// Lockstep steps taken.
    pub positions: u64,
    /// Records emitted.
    pub records: u64,
}

/// Lazily compares two log streams, yielding one record per difference.
pub struct LogDiffer<A, B> {
    a: LogStream<A>,
    b: LogStream<B>,
    marker: String,
    synced: bool,
    done: bool,
    cur_a: Option<Vec<u8>>,
    cur_b: Option<Vec<u8>>,
    summary: DiffSummary,
}

impl<A: BufRead, B: BufRead> LogDiffer<A, B> {
    pub fn new(a: A, b: B, marker: impl Into<String>) -> Self {
        Self {
            a: LogStream::new(a),
            b: LogStream::new(b),
            marker: marker.into(),
            synced: false,
            done: false,
            cur_a: None,
            cur_b: None,
            summary: DiffSummary::default(),
        }
    }

    /// Progress so far; final once the iterator has returned `None`.
    pub fn summary(&self) -> &DiffSummary {
        &self.summary
    }

    fn sync(&mut self) -> io::Result<()> {
        self.synced = true;
        self.cur_a = self.a.seek_marker(&self.marker)?;
        self.cur_b = self.b.seek_marker(&self.marker)?;

        self.summary.sync_a = self.cur_a.is_some().then(|| self.a.line_no());
        self.summary.sync_b = self.cur_b.is_some().then(|| self.b.line_no());
        if let (Some(la), Some(lb)) = (self.summary.sync_a, self.summary.sync_b) {
            debug!("synchronized at lines {la} / {lb}");
        }
        if self.summary.sync_a.is_none() {
            warn!("sync marker {:?} not found in stream A", self.marker);
        }
        if self.summary.sync_b.is_none() {
            warn!("sync marker {:?} not found in stream B", self.marker);
        }
        Ok(())
    }

    fn step(&mut self) -> io::Result<Option<DiffRecord>> {
        let raw_a = self.cur_a.take().unwrap_or_default();
        let raw_b = self.cur_b.take().unwrap_or_default();
        self.summary.positions += 1;

        let record = (raw_a != raw_b).then(|| DiffRecord {
            position: self.summary.positions,
            line_a: self.a.line_no(),
            text_a: line_text(&raw_a),
            line_b: self.b.line_no(),
            text_b: line_text(&raw_b),
        });

        self.cur_a = self.a.next_line()?;
        self.cur_b = self.b.next_line()?;
        Ok(record)
    }

    fn advance(&mut self) -> io::Result<Option<DiffRecord>> {
        if !self.synced {
            self.sync()?;
        }
        while self.cur_a.is_some() || self.cur_b.is_some() {
            if let Some(record) = self.step()? {
                self.summary.records += 1;
                return Ok(Some(record));
            }
        }
        Ok(None)
    }
}

impl<A: BufRead, B: BufRead> Iterator for LogDiffer<A, B> {
    type Item = io::Result<DiffRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.advance() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Compare two streams and collect every difference.
pub fn diff<A: BufRead, B: BufRead>(a: A, b: B, marker: &str) -> io::Result<Vec<DiffRecord>> {
    LogDiffer::new(a, b, marker).collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn run(a: &str, b: &str) -> Vec<DiffRecord> {
        diff(a.as_bytes(), b.as_bytes(), DEFAULT_SYNC_MARKER).unwrap()
    }

    fn rec(position: u64, la: u64, ta: &str, lb: u64, tb: &str) -> DiffRecord {
        DiffRecord {
            position,
            line_a: la,
            text_a: ta.to_string(),
            line_b: lb,
            text_b: tb.to_string(),
        }
    }

    #[test]
    fn single_divergence() {
        let records = run("reset\naddr=1\naddr=2\n", "reset\naddr=1\naddr=3\n");
        assert_eq!(records, vec![rec(3, 3, "addr=2", 3, "addr=3")]);
    }

    #[test]
    fn identical_logs_produce_nothing() {
        let log = "boot\nreset\na\nb\n";
        assert!(run(log, log).is_empty());
    }

    #[test]
    fn sync_points_are_independent() {
        let a = "junk\njunk\njunk\nreset\nx=1\nx=2\n";
        let b = "reset\nx=1\nx=9\n";
        assert_eq!(run(a, b), vec![rec(3, 6, "x=2", 3, "x=9")]);
    }

    #[test]
    fn sync_lines_are_compared() {
        let records = run("reset 0\n", "reset 1\n");
        assert_eq!(records, vec![rec(1, 1, "reset 0", 1, "reset 1")]);
    }

    #[test]
    fn shorter_stream_compares_as_empty() {
        let a = "reset\n1\n2\n3\n4\n";
        let b = "reset\n1\n2\n";
        assert_eq!(run(a, b), vec![rec(4, 4, "3", 4, ""), rec(5, 5, "4", 5, "")]);
    }

    #[test]
    fn missing_marker_degrades_to_all_lines() {
        let a = "no marker here\n";
        let b = "reset\np\nq\n";
        let records = run(a, b);
        assert_eq!(
            records,
            vec![rec(1, 2, "", 1, "reset"), rec(2, 3, "", 2, "p"), rec(3, 4, "", 3, "q")]
        );
    }

    #[test]
    fn raw_line_endings_take_part_in_comparison() {
        let records = run("reset\nsame", "reset\nsame\n");
        assert_eq!(records, vec![rec(2, 2, "same", 2, "same")]);
    }

    #[test]
    fn invalid_utf8_bytes_are_compared_raw() {
        let a = &b"reset\nval=\xff\n"[..];
        let b = &b"reset\nval=\xfe\n"[..];
        let records = diff(a, b, DEFAULT_SYNC_MARKER).unwrap();
        assert_eq!(records, vec![rec(2, 2, "val=\u{fffd}", 2, "val=\u{fffd}")]);
    }

    #[test]
    fn summary_tracks_progress() {
        let mut differ = LogDiffer::new(
            "pre\nreset\na\nb\n".as_bytes(),
            "reset\na\nc\n".as_bytes(),
            "reset",
        );
        let records: Vec<_> = differ.by_ref().collect::<io::Result<_>>().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(
            differ.summary(),
            &DiffSummary {
                sync_a: Some(2),
                sync_b: Some(1),
                positions: 3,
                records: 1,
            }
        );
        assert!(differ.next().is_none());
    }

    #[test]
    fn swapping_inputs_swaps_fields() {
        let a = "x\nreset\n1\n2\n3\n";
        let b = "reset\n1\n5\n";
        let forward = run(a, b);
        let backward: Vec<_> = run(b, a).into_iter().map(DiffRecord::swapped).collect();
        assert_eq!(forward, backward);
    }
}

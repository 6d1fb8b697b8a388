// Single-stream preprocessing passes run before a diff.
//
// - `dedup` drops consecutive records whose key fields repeat. Key fields
//   sit at fixed character columns; the trace format is treated as opaque
//   apart from those columns.
// - `scrub` rewrites unknown simulator values (`0xxxxxxxxx`) to zero so
//   they match logs from simulators that zero-initialize.

use std::fmt;
use std::io::{self, BufRead, Write};
use std::str::FromStr;

use log::debug;

use super::stream::strip_line_ending;

/// Default key fields: the `addr_A=` and `addr_B=` values of
/// `addr_A=0x00000004: data_A=0x1920006f addr_B=0x00000004 ...`.
pub const DEFAULT_FIELDS: [FieldSpec; 2] = [FieldSpec::new(7, 10), FieldSpec::new(44, 10)];

/// Default unknown-value pattern and its replacement.
pub const UNKNOWN_WORD: &str = "0xxxxxxxxx";
pub const ZERO_WORD: &str = "0x00000000";

// ---------------------------------------------------------------------------
// Field extraction
// ---------------------------------------------------------------------------

/// A fixed-width field at a fixed character column (both 0-based counts).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub start: usize,
    pub width: usize,
}

impl FieldSpec {
    pub const fn new(start: usize, width: usize) -> Self {
        Self { start, width }
    }

    /// The field's text in `line`, clipped to the line's length.
    pub fn extract<'a>(&self, line: &'a str) -> &'a str {
        let byte_at = |chars: usize| {
            line.char_indices()
                .nth(chars)
                .map_or(line.len(), |(i, _)| i)
        };
        let begin = byte_at(self.start);
        let end = byte_at(self.start.saturating_add(self.width));
        &line[begin..end]
    }
}

impl fmt::Display for FieldSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.start, self.width)
    }
}

/// Parses `START:WIDTH`.
impl FromStr for FieldSpec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (start, width) = s
            .split_once(':')
            .ok_or_else(|| format!("expected START:WIDTH, got `{s}`"))?;
        let start: usize = start
            .trim()
            .parse()
            .map_err(|e| format!("field start `{start}`: {e}"))?;
        let width: usize = width
            .trim()
            .parse()
            .map_err(|e| format!("field width `{width}`: {e}"))?;
        if width == 0 {
            return Err("field width must be non-zero".into());
        }
        Ok(Self { start, width })
    }
}

/// Builds the duplicate key of a line from a list of fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldExtractor {
    fields: Vec<FieldSpec>,
}

impl FieldExtractor {
    pub fn new(fields: Vec<FieldSpec>) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Field values of `line` (line ending ignored), in field order.
    pub fn key<'a>(&self, line: &'a str) -> Vec<&'a str> {
        let line = strip_line_ending(line);
        self.fields.iter().map(|f| f.extract(line)).collect()
    }
}

impl Default for FieldExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_FIELDS.to_vec())
    }
}

// ---------------------------------------------------------------------------
// Passes
// ---------------------------------------------------------------------------

/// Line counts of one filter pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterStats {
    pub lines_in: u64,
    pub lines_out: u64,
    /// Lines the pass rewrote (scrub only).
    pub lines_changed: u64,
}

/// Copy `input` to `output`, keeping only the first line of every run of
/// lines with equal keys.
pub fn dedup<R: BufRead, W: Write>(
    mut input: R,
    mut output: W,
    extractor: &FieldExtractor,
) -> io::Result<FilterStats> {
    let mut stats = FilterStats::default();
    let mut prev: Option<Vec<String>> = None;
    let mut buf = Vec::new();

    loop {
        buf.clear();
        if input.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        stats.lines_in += 1;
        let line = String::from_utf8_lossy(&buf);
        let key = extractor.key(&line);

        let repeated = prev
            .as_ref()
            .is_some_and(|p| p.iter().map(String::as_str).eq(key.iter().copied()));
        if !repeated {
            output.write_all(&buf)?;
            stats.lines_out += 1;
            prev = Some(key.into_iter().map(str::to_owned).collect());
        }
    }

    output.flush()?;
    debug!(
        "dedup: kept {} of {} line(s)",
        stats.lines_out, stats.lines_in
    );
    Ok(stats)
}

/// Literal text substitution applied to every line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scrubber {
    pattern: String,
    replacement: String,
}

impl Scrubber {
    /// An empty `pattern` matches nothing.
    pub fn new(pattern: impl Into<String>, replacement: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            replacement: replacement.into(),
        }
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn replacement(&self) -> &str {
        &self.replacement
    }

    /// Returns `None` when the line contains no match.
    pub fn apply(&self, line: &str) -> Option<String> {
        if self.pattern.is_empty() || !line.contains(&self.pattern) {
            return None;
        }
        Some(line.replace(&self.pattern, &self.replacement))
    }
}

impl Default for Scrubber {
    fn default() -> Self {
        Self::new(UNKNOWN_WORD, ZERO_WORD)
    }
}

/// Copy `input` to `output`, rewriting every match of the scrubber.
pub fn scrub<R: BufRead, W: Write>(
    mut input: R,
    mut output: W,
    scrubber: &Scrubber,
) -> io::Result<FilterStats> {
    let mut stats = FilterStats::default();
    let mut buf = Vec::new();

    loop {
        buf.clear();
        if input.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        stats.lines_in += 1;
        stats.lines_out += 1;
        let line = String::from_utf8_lossy(&buf);
        match scrubber.apply(&line) {
            Some(rewritten) => {
                output.write_all(rewritten.as_bytes())?;
                stats.lines_changed += 1;
            }
            None => output.write_all(&buf)?,
        }
    }

    output.flush()?;
    Ok(stats)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

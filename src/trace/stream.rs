// Line cursor over one trace log.
//
// Every read attempt advances the 1-based line counter, including attempts
// past the end of input. Two streams compared in lockstep therefore keep
// their own numbering even after one of them runs dry. Reads after EOF
// return `None` immediately and never block.
//
// Lines are kept as raw bytes so that comparison sees exactly what the
// simulator wrote; decoding to text is left to whoever renders them.

use std::io::{self, BufRead};

/// Sequential reader of raw log lines (line ending included).
pub struct LogStream<R> {
    reader: R,
    line_no: u64,
    exhausted: bool,
}

impl<R: BufRead> LogStream<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line_no: 0,
            exhausted: false,
        }
    }

    /// Number of the line returned by the last call to [`next_line`].
    ///
    /// [`next_line`]: Self::next_line
    pub fn line_no(&self) -> u64 {
        self.line_no
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Read the next raw line, bytes untouched.
    pub fn next_line(&mut self) -> io::Result<Option<Vec<u8>>> {
        self.line_no += 1;
        if self.exhausted {
            return Ok(None);
        }
        let mut line = Vec::new();
        if self.reader.read_until(b'\n', &mut line)? == 0 {
            self.exhausted = true;
            return Ok(None);
        }
        Ok(Some(line))
    }

    /// Discard lines until one starts with `marker` and return it.
    ///
    /// Returns `None` if the stream ends first; the stream is then
    /// exhausted.
    pub fn seek_marker(&mut self, marker: &str) -> io::Result<Option<Vec<u8>>> {
        while let Some(line) = self.next_line()? {
            if line.starts_with(marker.as_bytes()) {
                return Ok(Some(line));
            }
        }
        Ok(None)
    }
}

/// Strip one trailing `\n` or `\r\n`.
pub fn strip_line_ending(line: &str) -> &str {
    match line.strip_suffix('\n') {
        Some(rest) => rest.strip_suffix('\r').unwrap_or(rest),
        None => line,
    }
}

/// Byte-level [`strip_line_ending`].
pub fn strip_raw_line_ending(line: &[u8]) -> &[u8] {
    match line.strip_suffix(b"\n") {
        Some(rest) => rest.strip_suffix(b"\r").unwrap_or(rest),
        None => line,
    }
}

/// Display text of a raw line: line ending stripped, invalid UTF-8
/// replaced.
pub fn line_text(line: &[u8]) -> String {
    String::from_utf8_lossy(strip_raw_line_ending(line)).into_owned()
}

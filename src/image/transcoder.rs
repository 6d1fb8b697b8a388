// Sparse-to-dense transcoding.
//
// Feeds parsed records into an `ImageWriter`, turning each directive into
// zero fill (Closed) or an echoed line (Open). The write cursor is the
// number of words emitted since the start of the vector, so a directive
// to word address `k` emits `k - cursor` fill words. Directives behind the
// cursor are ignored. Fills above `LARGE_FILL_WORDS` are logged, and an
// optional `max_fill` turns them into an error.

use std::io::{BufRead, Write};

use log::{debug, warn};
use thiserror::Error;

use super::assemble::{WORD_BYTES, WordAssembly};
use super::record::{ParseError, SparseRecord, parse_line};
use super::writer::{ImageWriter, OutputMode};

// ---------------------------------------------------------------------------
// Options / stats / errors
// ---------------------------------------------------------------------------

/// Unit of directive addresses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AddressUnit {
    /// `@k` names the k-th 32-bit word.
    #[default]
    Word,
    /// `@k` names a byte offset; divided by 4.
    Byte,
}

/// Transcoder configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TranscodeOptions {
    pub mode: OutputMode,
    pub assembly: WordAssembly,
    pub address_unit: AddressUnit,
    /// Write hex digits in uppercase.
    pub uppercase: bool,
    /// Largest gap a single directive may fill; `None` fills any gap.
    pub max_fill: Option<u64>,
}

/// Gap size (in words) above which a fill is reported with `warn!`.
pub const LARGE_FILL_WORDS: u64 = 1 << 24;

/// Counters collected during one transcode.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranscodeStats {
    /// Input lines consumed (blank lines included).
    pub lines: usize,
    /// Words taken from data lines.
    pub data_words: u64,
    /// Zero words inserted for directives.
    pub fill_words: u64,
    pub directives: u64,
    /// Directives whose target was already behind the cursor.
    pub overshoots: u64,
    /// Bytes discarded from incomplete byte-swapped groups.
    pub dropped_bytes: u64,
}

impl TranscodeStats {
    /// Total words in the dense image.
    pub fn total_words(&self) -> u64 {
        self.data_words + self.fill_words
    }
}

#[derive(Debug, Error)]
pub enum TranscodeError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("line {line}: directive to word {target:#x} needs {fill} fill words (limit {limit})")]
    FillLimit {
        line: usize,
        target: u64,
        fill: u64,
        limit: u64,
    },
}

// ---------------------------------------------------------------------------
// Transcoder
// ---------------------------------------------------------------------------

/// Line-at-a-time transcoder.
///
/// ```
/// use memtrace::image::{Transcoder, TranscodeOptions};
///
/// let mut t = Transcoder::new(Vec::new(), TranscodeOptions::default());
/// t.push_line("@00000002").unwrap();
/// t.push_line("deadbeef").unwrap();
/// let (out, stats) = t.finish().unwrap();
/// assert_eq!(stats.fill_words, 2);
/// assert!(String::from_utf8(out).unwrap().ends_with("00000000,\ndeadbeef;"));
/// ```
pub struct Transcoder<W: Write> {
    writer: ImageWriter<W>,
    opts: TranscodeOptions,
    stats: TranscodeStats,
}

impl<W: Write> Transcoder<W> {
    pub fn new(output: W, opts: TranscodeOptions) -> Self {
        Self {
            writer: ImageWriter::new(output, opts.mode, opts.uppercase),
            opts,
            stats: TranscodeStats::default(),
        }
    }

    pub fn stats(&self) -> &TranscodeStats {
        &self.stats
    }

    /// Consume the next input line.
    pub fn push_line(&mut self, line: &str) -> Result<(), TranscodeError> {
        self.stats.lines += 1;
        let line_no = self.stats.lines;

        match parse_line(line_no, line, self.opts.assembly)? {
            None => {}
            Some(SparseRecord::Directive { address }) => {
                self.stats.directives += 1;
                match self.opts.mode {
                    OutputMode::Closed => self.seek(line_no, address)?,
                    OutputMode::Open => self
                        .writer
                        .write_directive(line.trim_end_matches(['\r', '\n']))?,
                }
            }
            Some(SparseRecord::Data(data)) => {
                if data.dropped_bytes > 0 {
                    warn!(
                        "line {line_no}: {} trailing byte(s) do not form a word, dropped",
                        data.dropped_bytes
                    );
                    self.stats.dropped_bytes += data.dropped_bytes as u64;
                }
                for word in data.words {
                    self.writer.write_word(word)?;
                    self.stats.data_words += 1;
                }
            }
        }
        Ok(())
    }

    fn seek(&mut self, line_no: usize, address: u64) -> Result<(), TranscodeError> {
        let target = match self.opts.address_unit {
            AddressUnit::Word => address,
            AddressUnit::Byte => {
                if address % WORD_BYTES as u64 != 0 {
                    warn!("line {line_no}: byte address {address:#x} is not word aligned");
                }
                address / WORD_BYTES as u64
            }
        };

        let cursor = self.writer.words_written();
        if target < cursor {
            warn!(
                "line {line_no}: directive to word {target:#x} is behind cursor {cursor:#x}, ignored"
            );
            self.stats.overshoots += 1;
            return Ok(());
        }

        let fill = target - cursor;
        if let Some(limit) = self.opts.max_fill
            && fill > limit
        {
            return Err(TranscodeError::FillLimit {
                line: line_no,
                target,
                fill,
                limit,
            });
        }
        if fill > LARGE_FILL_WORDS {
            warn!("line {line_no}: directive to word {target:#x} fills {fill} words");
        } else if fill > 0 {
            debug!("line {line_no}: filling {fill} word(s) up to {target:#x}");
        }
        self.writer.write_fill(fill)?;
        self.stats.fill_words += fill;
        Ok(())
    }

    /// Terminate the image and return the output sink with the final stats.
    pub fn finish(self) -> Result<(W, TranscodeStats), TranscodeError> {
        let out = self.writer.finish()?;
        Ok((out, self.stats))
    }
}

// ---------------------------------------------------------------------------
// One-shot helpers
// ---------------------------------------------------------------------------

/// Transcode a whole reader into `output`, flushing it at the end.
pub fn transcode<R: BufRead, W: Write>(
    input: R,
    output: W,
    opts: TranscodeOptions,
) -> Result<TranscodeStats, TranscodeError> {
    let mut transcoder = Transcoder::new(output, opts);
    for line in input.lines() {
        transcoder.push_line(&line?)?;
    }
    let (mut out, stats) = transcoder.finish()?;
    out.flush()?;
    Ok(stats)
}

/// Transcode an in-memory dump.
pub fn transcode_str(input: &str, opts: TranscodeOptions) -> Result<String, TranscodeError> {
    let mut out = Vec::with_capacity(input.len() * 2);
    transcode(input.as_bytes(), &mut out, opts)?;
    // Only ASCII is ever written; directive echoes come from a `&str`.
    Ok(String::from_utf8_lossy(&out).into_owned())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

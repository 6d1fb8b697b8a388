// Dense image framing.
//
// Closed output (`.coe`):
//
//   memory_initialization_radix=16;
//   memory_initialization_vector=
//   00000013,
//   deadbeef;
//
// Open output (`.mem`): directives are echoed, each word is followed by
// three placeholder words, and nothing terminates the listing.
//
// The Closed terminator replaces the last `,\n`. The separator is deferred
// until the next word arrives so the sink never has to seek.

use std::io::{self, Write};

/// Closed-mode preamble: radix declaration and vector list start.
pub const COE_PREAMBLE: &str = "memory_initialization_radix=16;\nmemory_initialization_vector=\n";

/// Word emitted for every address skipped by a directive.
pub const FILL_WORD: u32 = 0;

const COE_SEPARATOR: &[u8] = b",\n";
const COE_TERMINATOR: &[u8] = b";";
const MEM_PADDING: &str = " 00000000 00000000 00000000";

/// Output framing of a dense image.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputMode {
    /// `.coe` vector: preamble, gap filling, `;` terminator.
    #[default]
    Closed,
    /// `.mem` listing: directives echoed, padded words, no terminator.
    Open,
}

impl OutputMode {
    /// Conventional file extension for this framing.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Closed => "coe",
            Self::Open => "mem",
        }
    }
}

/// Writes words in the framing selected by [`OutputMode`].
pub struct ImageWriter<W: Write> {
    inner: W,
    mode: OutputMode,
    uppercase: bool,
    preamble_written: bool,
    words: u64,
}

impl<W: Write> ImageWriter<W> {
    pub fn new(inner: W, mode: OutputMode, uppercase: bool) -> Self {
        Self {
            inner,
            mode,
            uppercase,
            preamble_written: false,
            words: 0,
        }
    }

    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    /// Number of words written so far (data and fill alike).
    pub fn words_written(&self) -> u64 {
        self.words
    }

    fn ensure_preamble(&mut self) -> io::Result<()> {
        if !self.preamble_written {
            if self.mode == OutputMode::Closed {
                self.inner.write_all(COE_PREAMBLE.as_bytes())?;
            }
            self.preamble_written = true;
        }
        Ok(())
    }

    /// Write one word.
    pub fn write_word(&mut self, word: u32) -> io::Result<()> {
        self.ensure_preamble()?;
        match self.mode {
            OutputMode::Closed => {
                if self.words > 0 {
                    self.inner.write_all(COE_SEPARATOR)?;
                }
                self.write_hex(word)?;
            }
            OutputMode::Open => {
                self.write_hex(word)?;
                self.inner.write_all(MEM_PADDING.as_bytes())?;
                self.inner.write_all(b"\n")?;
            }
        }
        self.words += 1;
        Ok(())
    }

    /// Write `count` fill words.
    pub fn write_fill(&mut self, count: u64) -> io::Result<()> {
        for _ in 0..count {
            self.write_word(FILL_WORD)?;
        }
        Ok(())
    }

    /// Echo a directive line unchanged.
    ///
    /// Closed images express directives through fill words, so this fails
    /// with `InvalidInput` in Closed mode and writes nothing.
    pub fn write_directive(&mut self, line: &str) -> io::Result<()> {
        if self.mode == OutputMode::Closed {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "directive lines cannot be echoed into a closed image",
            ));
        }
        self.ensure_preamble()?;
        self.inner.write_all(line.as_bytes())?;
        self.inner.write_all(b"\n")
    }

    fn write_hex(&mut self, word: u32) -> io::Result<()> {
        if self.uppercase {
            write!(self.inner, "{word:08X}")
        } else {
            write!(self.inner, "{word:08x}")
        }
    }

    /// Close the framing and return the inner writer (not flushed).
    pub fn finish(mut self) -> io::Result<W> {
        self.ensure_preamble()?;
        if self.mode == OutputMode::Closed && self.words > 0 {
            self.inner.write_all(COE_TERMINATOR)?;
        }
        Ok(self.inner)
    }
}

// Word assembly from hex tokens.
//
// Two token conventions exist in the dumps we consume:
//
// - `Direct`: each token is one 32-bit word, written MSB first
// - `ByteSwapped`: each token is one byte; 4 bytes in memory order form one
//   little-endian word, so the group is reversed on output

use super::record::{DataLine, is_hex_literal};

/// Bytes per assembled word.
pub const WORD_BYTES: usize = 4;

/// How data tokens become 32-bit words.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WordAssembly {
    /// One token per word, no reordering.
    #[default]
    Direct,
    /// One token per byte, groups of four reversed into a word.
    ByteSwapped,
}

impl WordAssembly {
    /// Maximum hex digits accepted per token.
    pub fn token_digits(self) -> usize {
        match self {
            Self::Direct => 8,
            Self::ByteSwapped => 2,
        }
    }

    /// Assemble one line's tokens into words.
    ///
    /// On failure returns the first token that is not a valid hex literal.
    pub fn assemble<'a>(self, tokens: &[&'a str]) -> Result<DataLine, &'a str> {
        let digits = self.token_digits();
        if let Some(bad) = tokens.iter().find(|t| !is_hex_literal(t, digits)) {
            return Err(*bad);
        }

        match self {
            Self::Direct => {
                let words = tokens
                    .iter()
                    .map(|t| u32::from_str_radix(t, 16).map_err(|_| *t))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(DataLine {
                    words,
                    dropped_bytes: 0,
                })
            }
            Self::ByteSwapped => {
                let bytes = tokens
                    .iter()
                    .map(|t| u8::from_str_radix(t, 16).map_err(|_| *t))
                    .collect::<Result<Vec<_>, _>>()?;
                let chunks = bytes.chunks_exact(WORD_BYTES);
                let dropped_bytes = chunks.remainder().len();
                let words = chunks
                    .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                    .collect();
                Ok(DataLine {
                    words,
                    dropped_bytes,
                })
            }
        }
    }
}

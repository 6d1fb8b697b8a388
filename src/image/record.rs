// Sparse hex-dump line parsing.
//
// A sparse dump is a sequence of lines, each either an offset directive
// (`@` followed by a hex address, no `0x` prefix) or a run of
// whitespace-separated hex tokens. Blank lines carry nothing.

use thiserror::Error;

use super::assemble::WordAssembly;

/// First character of an offset directive line.
pub const DIRECTIVE_MARKER: char = '@';

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// A malformed line in a sparse dump.
///
/// Line numbers are 1-based. `content` is the offending line without its
/// line ending.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("line {line}: invalid directive address in `{content}`")]
    InvalidAddress { line: usize, content: String },
    #[error("line {line}: invalid hex token `{token}` in `{content}`")]
    InvalidToken {
        line: usize,
        token: String,
        content: String,
    },
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// One parsed line of a sparse dump.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SparseRecord {
    /// Resume data at `address` (unit decided by the caller).
    Directive { address: u64 },
    /// Words assembled from one data line.
    Data(DataLine),
}

/// The words carried by one data line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataLine {
    pub words: Vec<u32>,
    /// Bytes left over after assembling whole words (byte-swapped input only).
    pub dropped_bytes: usize,
}

/// Parse one line of a sparse dump.
///
/// Returns `Ok(None)` for blank lines. `line_no` is only used to label
/// errors.
pub fn parse_line(
    line_no: usize,
    line: &str,
    assembly: WordAssembly,
) -> Result<Option<SparseRecord>, ParseError> {
    let content = line.trim_end_matches(['\r', '\n']);
    if content.trim().is_empty() {
        return Ok(None);
    }

    if let Some(rest) = content.strip_prefix(DIRECTIVE_MARKER) {
        let address = parse_hex_u64(rest.trim()).ok_or_else(|| ParseError::InvalidAddress {
            line: line_no,
            content: content.to_string(),
        })?;
        return Ok(Some(SparseRecord::Directive { address }));
    }

    let tokens: Vec<&str> = content.split_whitespace().collect();
    let data = assembly.assemble(&tokens).map_err(|token| ParseError::InvalidToken {
        line: line_no,
        token: token.to_string(),
        content: content.to_string(),
    })?;
    Ok(Some(SparseRecord::Data(data)))
}

/// Strict hex parse: digits only, no sign, no prefix.
pub(crate) fn is_hex_literal(s: &str, max_digits: usize) -> bool {
    !s.is_empty() && s.len() <= max_digits && s.bytes().all(|b| b.is_ascii_hexdigit())
}

fn parse_hex_u64(s: &str) -> Option<u64> {
    if !is_hex_literal(s, 16) {
        return None;
    }
    u64::from_str_radix(s, 16).ok()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str) -> Result<Option<SparseRecord>, ParseError> {
        parse_line(1, line, WordAssembly::Direct)
    }

    #[test]
    fn blank_lines_are_skipped() {
        assert_eq!(parse("").unwrap(), None);
        assert_eq!(parse("   \t\n").unwrap(), None);
        assert_eq!(parse("\r\n").unwrap(), None);
    }

    #[test]
    fn directive_is_hex_word_address() {
        assert_eq!(
            parse("@00000010\n").unwrap(),
            Some(SparseRecord::Directive { address: 0x10 })
        );
        assert_eq!(
            parse("@1F").unwrap(),
            Some(SparseRecord::Directive { address: 0x1f })
        );
    }

    #[test]
    fn directive_rejects_prefix_and_garbage() {
        for bad in ["@", "@0x10", "@zz", "@-1", "@+1", "@12345678901234567"] {
            let err = parse_line(7, bad, WordAssembly::Direct).unwrap_err();
            assert_eq!(
                err,
                ParseError::InvalidAddress {
                    line: 7,
                    content: bad.to_string()
                },
                "{bad}"
            );
        }
    }

    #[test]
    fn data_line_words() {
        let rec = parse("deadbeef 00000013\tCAFEF00D \n").unwrap().unwrap();
        assert_eq!(
            rec,
            SparseRecord::Data(DataLine {
                words: vec![0xdead_beef, 0x13, 0xcafe_f00d],
                dropped_bytes: 0
            })
        );
    }

    #[test]
    fn bad_token_reports_line_and_content() {
        let err = parse_line(42, "00000013 0000g013\n", WordAssembly::Direct).unwrap_err();
        assert_eq!(
            err,
            ParseError::InvalidToken {
                line: 42,
                token: "0000g013".to_string(),
                content: "00000013 0000g013".to_string(),
            }
        );
        let msg = err.to_string();
        assert!(msg.contains("line 42"), "{msg}");
        assert!(msg.contains("0000g013"), "{msg}");
    }

    #[test]
    fn hex_literal_rules() {
        assert!(is_hex_literal("ff", 2));
        assert!(!is_hex_literal("fff", 2));
        assert!(!is_hex_literal("", 8));
        assert!(!is_hex_literal("+f", 8));
    }
}

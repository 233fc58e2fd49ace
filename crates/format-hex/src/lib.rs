//! Hex-text memory image parser.
//!
//! A memory image is a plain-text file of 8-hex-digit little-endian words,
//! one or more per line, separated by whitespace. Blank lines and carriage
//! returns are tolerated; anything else is an error. Word *k* populates
//! bytes `[4k, 4k+4)` of the target region.
//!
//! Parsing is incremental: `HexWords` yields one word at a time so that a
//! malformed token halts the load while leaving every earlier word applied.

use std::fmt;
use std::fs;
use std::io;
use std::path::Path;

#[derive(Debug)]
pub enum HexImageError {
    /// A token contained a character that is not a hex digit.
    BadCharacter { line: usize, token: String },
    /// A token was not exactly eight hex digits long.
    BadWordLength { line: usize, token: String },
    Io(io::Error),
}

impl fmt::Display for HexImageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadCharacter { line, token } => {
                write!(f, "line {line}: unexpected characters in \"{token}\"")
            }
            Self::BadWordLength { line, token } => {
                write!(
                    f,
                    "line {line}: \"{token}\" is not an 8-hex-digit word",
                )
            }
            Self::Io(e) => write!(f, "image read failed: {e}"),
        }
    }
}

impl std::error::Error for HexImageError {}

impl From<io::Error> for HexImageError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

/// Iterator over the words of a hex-text image.
pub struct HexWords<'a> {
    lines: std::str::Lines<'a>,
    tokens: Option<std::str::SplitWhitespace<'a>>,
    line_no: usize,
}

impl<'a> HexWords<'a> {
    #[must_use]
    pub fn new(text: &'a str) -> Self {
        Self {
            lines: text.lines(),
            tokens: None,
            line_no: 0,
        }
    }

    fn parse_token(&self, token: &str) -> Result<u32, HexImageError> {
        if token.len() != 8 {
            return Err(HexImageError::BadWordLength {
                line: self.line_no,
                token: token.to_string(),
            });
        }
        // from_str_radix tolerates a leading sign, so vet the digits first
        if !token.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(HexImageError::BadCharacter {
                line: self.line_no,
                token: token.to_string(),
            });
        }
        u32::from_str_radix(token, 16).map_err(|_| HexImageError::BadCharacter {
            line: self.line_no,
            token: token.to_string(),
        })
    }
}

impl Iterator for HexWords<'_> {
    type Item = Result<u32, HexImageError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(tokens) = &mut self.tokens {
                if let Some(token) = tokens.next() {
                    return Some(self.parse_token(token));
                }
                self.tokens = None;
            }
            let line = self.lines.next()?;
            self.line_no += 1;
            self.tokens = Some(line.split_whitespace());
        }
    }
}

/// Parse a complete image, failing on the first malformed token.
pub fn parse_str(text: &str) -> Result<Vec<u32>, HexImageError> {
    HexWords::new(text).collect()
}

/// Read and parse an image file.
pub fn read_image(path: &Path) -> Result<Vec<u32>, HexImageError> {
    parse_str(&fs::read_to_string(path)?)
}

/// Conventional image file name for a region based at `base`.
#[must_use]
pub fn image_file_name(base: u32) -> String {
    format!("ram_{base:08x}.img")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_word_per_line() {
        let words = parse_str("00500093\n00708113\n").expect("valid");
        assert_eq!(words, vec![0x0050_0093, 0x0070_8113]);
    }

    #[test]
    fn multiple_words_per_line() {
        let words = parse_str("deadbeef 00000001\ncafef00d\n").expect("valid");
        assert_eq!(words, vec![0xDEAD_BEEF, 0x0000_0001, 0xCAFE_F00D]);
    }

    #[test]
    fn blank_lines_skipped() {
        let words = parse_str("\n\n12345678\n\n").expect("valid");
        assert_eq!(words, vec![0x1234_5678]);
    }

    #[test]
    fn crlf_line_endings() {
        let words = parse_str("0000abcd\r\n0000ef01\r\n").expect("valid");
        assert_eq!(words, vec![0x0000_ABCD, 0x0000_EF01]);
    }

    #[test]
    fn upper_and_lower_case() {
        let words = parse_str("ABCDEF01 abcdef01").expect("valid");
        assert_eq!(words, vec![0xABCD_EF01, 0xABCD_EF01]);
    }

    #[test]
    fn reject_short_word() {
        let err = parse_str("1234\n").expect_err("short word");
        assert!(matches!(err, HexImageError::BadWordLength { line: 1, .. }));
    }

    #[test]
    fn reject_non_hex() {
        let err = parse_str("12345678\nnotahexw\n").expect_err("bad chars");
        assert!(matches!(err, HexImageError::BadCharacter { line: 2, .. }));
    }

    #[test]
    fn incremental_parse_keeps_earlier_words() {
        let mut words = HexWords::new("11111111\n22222222\nxyz\n");
        assert_eq!(words.next().expect("first").expect("valid"), 0x1111_1111);
        assert_eq!(words.next().expect("second").expect("valid"), 0x2222_2222);
        assert!(words.next().expect("third").is_err());
    }

    #[test]
    fn empty_input() {
        assert!(parse_str("").expect("valid").is_empty());
    }

    #[test]
    fn image_file_name_format() {
        assert_eq!(image_file_name(0x8000_0000), "ram_80000000.img");
        assert_eq!(image_file_name(0x2040_0000), "ram_20400000.img");
    }
}
